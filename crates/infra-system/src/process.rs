// Cancellable subprocess with combined stdout/stderr capture
use conduit_core::application::constants::GRACEFUL_SHUTDOWN_TIMEOUT_MS;
use conduit_core::port::{CancelToken, RunnerError};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Exit status and interleaved output of a finished process
#[derive(Debug)]
pub struct CombinedOutput {
    pub exit_code: Option<i32>,
    pub success: bool,
    pub output: String,
}

/// Spawn `program args...`, capture both streams in arrival order, and wait.
///
/// Cancelling the token terminates the process (SIGTERM, then SIGKILL after
/// the grace period). The child is also killed if this future is dropped.
pub async fn run_combined(
    program: &str,
    args: &[String],
    mut cancel: CancelToken,
) -> Result<CombinedOutput, RunnerError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| RunnerError::SpawnFailed(format!("{}: {}", program, e)))?;

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(forward_lines(stdout, tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward_lines(stderr, tx.clone()));
    }
    drop(tx);

    let collector = tokio::spawn(async move {
        let mut output = String::new();
        while let Some(line) = rx.recv().await {
            output.push_str(&line);
            output.push('\n');
        }
        output
    });

    let status = tokio::select! {
        status = child.wait() => status.map_err(|e| RunnerError::Io(e.to_string()))?,
        _ = cancel.cancelled() => {
            warn!(pid = ?child.id(), "Cancellation requested, terminating connector process");
            terminate(&mut child).await;
            return Err(RunnerError::Cancelled);
        }
    };

    let output = collector
        .await
        .map_err(|e| RunnerError::Io(format!("output collector failed: {}", e)))?;

    Ok(CombinedOutput {
        exit_code: status.code(),
        success: status.success(),
        output,
    })
}

async fn forward_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(line).is_err() {
            break;
        }
    }
}

/// SIGTERM first, then SIGKILL if the process outlives the grace period
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            info!(pid = %pid, "Sending SIGTERM for graceful shutdown");
            if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok() {
                let grace = Duration::from_millis(GRACEFUL_SHUTDOWN_TIMEOUT_MS);
                if tokio::time::timeout(grace, child.wait()).await.is_ok() {
                    info!(pid = %pid, "Process exited gracefully after SIGTERM");
                    return;
                }
                warn!(pid = %pid, "Process did not exit after SIGTERM, sending SIGKILL");
            }
        }
    }

    if let Err(e) = child.kill().await {
        warn!(error = %e, "Failed to kill connector process");
    }
}
