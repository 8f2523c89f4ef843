//! Per-execution working directories.
//!
//! The directory is the file channel between the orchestrator and the
//! connector container: configs go in, catalog and state come back out.

use conduit_core::port::RunnerError;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONFIG_FILE: &str = "config.json";
pub const STREAMS_FILE: &str = "streams.json";
pub const WRITER_FILE: &str = "writer.json";
pub const STATE_FILE: &str = "state.json";

#[cfg(unix)]
const DIR_MODE: u32 = 0o700;
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

/// Directory name for an execution: hex SHA-256 of its id
pub fn dir_name(execution_id: &str) -> String {
    hex::encode(Sha256::digest(execution_id.as_bytes()))
}

/// Create (idempotently) the working directory of an execution
pub async fn prepare(config_dir: &Path, execution_id: &str) -> Result<PathBuf, RunnerError> {
    let work_dir = config_dir.join(dir_name(execution_id));
    tokio::fs::create_dir_all(&work_dir).await.map_err(|e| {
        RunnerError::Io(format!(
            "failed to create work directory {}: {}",
            work_dir.display(),
            e
        ))
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&work_dir, std::fs::Permissions::from_mode(DIR_MODE))
            .await
            .map_err(|e| RunnerError::Io(e.to_string()))?;
    }

    debug!(work_dir = %work_dir.display(), execution_id = %execution_id, "Working directory ready");
    Ok(work_dir)
}

/// Write `(file name, contents)` pairs into the working directory
pub async fn write_files(work_dir: &Path, files: &[(&str, &str)]) -> Result<(), RunnerError> {
    for (name, data) in files {
        let path = work_dir.join(name);
        tokio::fs::write(&path, data.as_bytes())
            .await
            .map_err(|e| RunnerError::Io(format!("failed to write {}: {}", name, e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(FILE_MODE))
                .await
                .map_err(|e| RunnerError::Io(e.to_string()))?;
        }
    }
    Ok(())
}

/// Host-side path of a working directory.
///
/// When the orchestrator itself runs in a container, `config_dir` is a bind
/// mount of `persistent_dir` on the host, and the container runtime needs the
/// host path. Only the first occurrence of the prefix is replaced.
pub fn host_path(work_dir: &Path, config_dir: &Path, persistent_dir: Option<&str>) -> String {
    let local = work_dir.to_string_lossy().to_string();
    match persistent_dir {
        Some(host_root) if !host_root.is_empty() => {
            let prefix = config_dir.to_string_lossy();
            local.replacen(prefix.as_ref(), host_root, 1)
        }
        _ => local,
    }
}
