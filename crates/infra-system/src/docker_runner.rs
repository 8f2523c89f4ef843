// Docker connector runner
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use conduit_core::config::RunnerSettings;
use conduit_core::domain::{ConnectorParams, WorkflowId};
use conduit_core::port::{
    CancelToken, ConnectionStatus, ConnectorRunner, RunnerError, SyncInvocation,
};

use crate::log_parser;
use crate::process::{run_combined, CombinedOutput};
use crate::workdir::{self, CONFIG_FILE, STATE_FILE, STREAMS_FILE, WRITER_FILE};

/// Connector subcommands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Spec,
    Check,
    Discover,
    Sync,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Spec => "spec",
            Command::Check => "check",
            Command::Discover => "discover",
            Command::Sync => "sync",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DockerRunnerConfig {
    /// Container runtime binary
    pub runtime: String,
    pub config_dir: PathBuf,
    pub persistent_dir: Option<String>,
    pub image_namespace: String,
    pub mount_point: String,
}

impl From<&RunnerSettings> for DockerRunnerConfig {
    fn from(s: &RunnerSettings) -> Self {
        Self {
            runtime: s.container_runtime.clone(),
            config_dir: PathBuf::from(&s.config_dir),
            persistent_dir: s.persistent_dir.clone(),
            image_namespace: s.image_namespace.clone(),
            mount_point: s.mount_point.clone(),
        }
    }
}

/// Runs connectors as `<runtime> run -v <host>:<mount> <image> <command> ...`
pub struct DockerRunner {
    config: DockerRunnerConfig,
}

impl DockerRunner {
    pub fn new(config: DockerRunnerConfig) -> Self {
        Self { config }
    }

    /// `<namespace>/source-<type>:<version>`, version defaults to `latest`
    pub fn image_name(&self, connector_type: &str, version: &str) -> String {
        let version = if version.trim().is_empty() {
            "latest"
        } else {
            version
        };
        format!(
            "{}/source-{}:{}",
            self.config.image_namespace, connector_type, version
        )
    }

    fn mounted(&self, file: &str) -> String {
        format!("{}/{}", self.config.mount_point.trim_end_matches('/'), file)
    }

    /// Full argument list for one invocation
    pub fn build_args(
        &self,
        work_dir: Option<&Path>,
        command: Command,
        connector_type: &str,
        version: &str,
        flag: Option<&str>,
        extra: &[String],
    ) -> Vec<String> {
        let mut args = vec!["run".to_string()];
        if let Some(dir) = work_dir {
            let host_dir = workdir::host_path(
                dir,
                &self.config.config_dir,
                self.config.persistent_dir.as_deref(),
            );
            args.push("-v".to_string());
            args.push(format!("{}:{}", host_dir, self.config.mount_point));
        }
        args.push(self.image_name(connector_type, version));
        args.push(command.as_str().to_string());
        if let Some(flag) = flag {
            args.push(format!("--{}", flag));
            args.push(self.mounted(CONFIG_FILE));
        }
        args.extend(extra.iter().cloned());
        args
    }

    /// Run the container and fail on a non-zero exit, keeping raw output
    async fn execute(
        &self,
        execution_id: &WorkflowId,
        args: Vec<String>,
        cancel: CancelToken,
    ) -> Result<String, RunnerError> {
        info!(
            execution_id = %execution_id,
            runtime = %self.config.runtime,
            args = %args.join(" "),
            "Running connector container"
        );

        let CombinedOutput {
            exit_code,
            success,
            output,
        } = run_combined(&self.config.runtime, &args, cancel).await?;

        info!(execution_id = %execution_id, output = %output, "Connector output");

        if success {
            return Ok(output);
        }
        match exit_code {
            Some(code) => {
                error!(execution_id = %execution_id, exit_code = %code, "Connector container failed");
                Err(RunnerError::ExitStatus { code, output })
            }
            None => Err(RunnerError::Signaled { output }),
        }
    }

    async fn prepare(&self, execution_id: &WorkflowId) -> Result<PathBuf, RunnerError> {
        workdir::prepare(&self.config.config_dir, execution_id.as_str()).await
    }
}

fn require_type(connector_type: &str) -> Result<(), RunnerError> {
    if connector_type.trim().is_empty() {
        return Err(RunnerError::InvalidInput(
            "connector type is required".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
impl ConnectorRunner for DockerRunner {
    async fn spec(
        &self,
        execution_id: &WorkflowId,
        connector_type: &str,
        version: &str,
        cancel: CancelToken,
    ) -> Result<serde_json::Value, RunnerError> {
        require_type(connector_type)?;
        let args = self.build_args(None, Command::Spec, connector_type, version, None, &[]);
        let output = self.execute(execution_id, args, cancel).await?;
        log_parser::parse_last_json_object(&output)
    }

    async fn test_connection(
        &self,
        execution_id: &WorkflowId,
        params: &ConnectorParams,
        cancel: CancelToken,
    ) -> Result<ConnectionStatus, RunnerError> {
        require_type(&params.connector_type)?;
        let work_dir = self.prepare(execution_id).await?;
        workdir::write_files(&work_dir, &[(CONFIG_FILE, params.config.as_str())]).await?;

        let args = self.build_args(
            Some(&work_dir),
            Command::Check,
            &params.connector_type,
            &params.version,
            Some(params.flag.as_str()),
            &[],
        );
        let output = self.execute(execution_id, args, cancel).await?;
        log_parser::parse_connection_status(&output)
    }

    async fn discover(
        &self,
        execution_id: &WorkflowId,
        params: &ConnectorParams,
        cancel: CancelToken,
    ) -> Result<serde_json::Value, RunnerError> {
        require_type(&params.connector_type)?;
        let work_dir = self.prepare(execution_id).await?;
        info!(work_dir = %work_dir.display(), "Working directory path");

        let streams = params.streams_config.as_deref().unwrap_or_default();
        workdir::write_files(
            &work_dir,
            &[(CONFIG_FILE, params.config.as_str()), (STREAMS_FILE, streams)],
        )
        .await?;

        let extra = if streams.is_empty() {
            Vec::new()
        } else {
            vec!["--catalog".to_string(), self.mounted(STREAMS_FILE)]
        };
        let args = self.build_args(
            Some(&work_dir),
            Command::Discover,
            &params.connector_type,
            &params.version,
            Some("config"),
            &extra,
        );
        self.execute(execution_id, args, cancel).await?;

        log_parser::parse_json_file(&work_dir.join(STREAMS_FILE)).await
    }

    async fn sync(
        &self,
        invocation: &SyncInvocation,
        cancel: CancelToken,
    ) -> Result<serde_json::Value, RunnerError> {
        require_type(&invocation.connector_type)?;
        let work_dir = self.prepare(&invocation.execution_id).await?;
        info!(work_dir = %work_dir.display(), "Working directory path");

        workdir::write_files(
            &work_dir,
            &[
                (CONFIG_FILE, invocation.source_config.as_str()),
                (STREAMS_FILE, invocation.streams_config.as_str()),
                (WRITER_FILE, invocation.destination_config.as_str()),
                (STATE_FILE, invocation.state.as_str()),
            ],
        )
        .await?;

        let extra = vec![
            "--catalog".to_string(),
            self.mounted(STREAMS_FILE),
            "--destination".to_string(),
            self.mounted(WRITER_FILE),
            "--state".to_string(),
            self.mounted(STATE_FILE),
        ];
        let args = self.build_args(
            Some(&work_dir),
            Command::Sync,
            &invocation.connector_type,
            &invocation.version,
            Some("config"),
            &extra,
        );
        self.execute(&invocation.execution_id, args, cancel).await?;

        log_parser::parse_json_file(&work_dir.join(STATE_FILE)).await
    }
}
