// Connector Runner Port
// Abstraction over the containerized connector process (spec/check/discover/sync)

use crate::domain::{ConnectorParams, WorkflowId};
use crate::port::CancelToken;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Connection status reported by `check`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub message: String,
    pub status: String,
}

/// Everything a `sync` invocation materializes into its working directory
#[derive(Debug, Clone)]
pub struct SyncInvocation {
    /// Execution id; names the working directory
    pub execution_id: WorkflowId,
    pub connector_type: String,
    pub version: String,
    pub source_config: String,
    pub streams_config: String,
    pub destination_config: String,
    pub state: String,
}

/// Runner errors
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Working directory error: {0}")]
    Io(String),

    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("docker command failed with exit status {code}")]
    ExitStatus { code: i32, output: String },

    #[error("docker command terminated by signal")]
    Signaled { output: String },

    #[error("Output parse error: {0}")]
    Parse(String),

    #[error("connection status not found")]
    ConnectionStatusNotFound,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Connector process cancelled")]
    Cancelled,
}

impl RunnerError {
    /// Raw combined output of a failed connector, when there is one
    pub fn output(&self) -> Option<&str> {
        match self {
            RunnerError::ExitStatus { output, .. } | RunnerError::Signaled { output } => {
                Some(output)
            }
            _ => None,
        }
    }

    /// Infrastructure and connector failures may succeed on a later attempt
    pub fn is_retryable(&self) -> bool {
        !matches!(self, RunnerError::InvalidInput(_) | RunnerError::Cancelled)
    }
}

/// Connector Runner trait
///
/// Implementations:
/// - DockerRunner: shells out to a container runtime
#[async_trait]
pub trait ConnectorRunner: Send + Sync {
    /// Connector specification (JSON object)
    async fn spec(
        &self,
        execution_id: &WorkflowId,
        connector_type: &str,
        version: &str,
        cancel: CancelToken,
    ) -> Result<serde_json::Value, RunnerError>;

    /// Run `check` and parse the connection status from the last log line
    async fn test_connection(
        &self,
        execution_id: &WorkflowId,
        params: &ConnectorParams,
        cancel: CancelToken,
    ) -> Result<ConnectionStatus, RunnerError>;

    /// Run `discover` and return the catalog written to `streams.json`
    async fn discover(
        &self,
        execution_id: &WorkflowId,
        params: &ConnectorParams,
        cancel: CancelToken,
    ) -> Result<serde_json::Value, RunnerError>;

    /// Run `sync` and return the new checkpoint read from `state.json`
    async fn sync(
        &self,
        invocation: &SyncInvocation,
        cancel: CancelToken,
    ) -> Result<serde_json::Value, RunnerError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Mock runner behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Succeed with this JSON
        Success(serde_json::Value),
        /// Exit non-zero with this code
        ExitStatus(i32),
        /// `check` output without a connectionStatus
        NoConnectionStatus,
        /// Sleep, then succeed (honours cancellation)
        Slow(Duration, serde_json::Value),
        /// Fail this many times, then succeed
        FailTimes(usize, serde_json::Value),
    }

    /// Mock Connector Runner for testing
    pub struct MockConnectorRunner {
        behavior: Arc<Mutex<MockBehavior>>,
        call_count: Arc<Mutex<usize>>,
        sync_invocations: Arc<Mutex<Vec<SyncInvocation>>>,
    }

    impl MockConnectorRunner {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior: Arc::new(Mutex::new(behavior)),
                call_count: Arc::new(Mutex::new(0)),
                sync_invocations: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn new_success(value: serde_json::Value) -> Self {
            Self::new(MockBehavior::Success(value))
        }

        pub fn new_slow(delay: Duration, value: serde_json::Value) -> Self {
            Self::new(MockBehavior::Slow(delay, value))
        }

        pub fn call_count(&self) -> usize {
            *self.call_count.lock().unwrap()
        }

        pub fn sync_invocations(&self) -> Vec<SyncInvocation> {
            self.sync_invocations.lock().unwrap().clone()
        }

        async fn respond(&self, mut cancel: CancelToken) -> Result<serde_json::Value, RunnerError> {
            let call = {
                let mut count = self.call_count.lock().unwrap();
                *count += 1;
                *count
            };
            let behavior = self.behavior.lock().unwrap().clone();

            match behavior {
                MockBehavior::Success(v) => Ok(v),
                MockBehavior::ExitStatus(code) => Err(RunnerError::ExitStatus {
                    code,
                    output: "mock failure".to_string(),
                }),
                MockBehavior::NoConnectionStatus => Err(RunnerError::ConnectionStatusNotFound),
                MockBehavior::Slow(delay, v) => {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => Ok(v),
                        _ = cancel.cancelled() => Err(RunnerError::Cancelled),
                    }
                }
                MockBehavior::FailTimes(n, v) => {
                    if call <= n {
                        Err(RunnerError::ExitStatus {
                            code: 1,
                            output: format!("mock failure {}", call),
                        })
                    } else {
                        Ok(v)
                    }
                }
            }
        }
    }

    #[async_trait]
    impl ConnectorRunner for MockConnectorRunner {
        async fn spec(
            &self,
            _execution_id: &WorkflowId,
            _connector_type: &str,
            _version: &str,
            cancel: CancelToken,
        ) -> Result<serde_json::Value, RunnerError> {
            self.respond(cancel).await
        }

        async fn test_connection(
            &self,
            _execution_id: &WorkflowId,
            _params: &ConnectorParams,
            cancel: CancelToken,
        ) -> Result<ConnectionStatus, RunnerError> {
            let value = self.respond(cancel).await?;
            serde_json::from_value(value).map_err(|e| RunnerError::Parse(e.to_string()))
        }

        async fn discover(
            &self,
            _execution_id: &WorkflowId,
            _params: &ConnectorParams,
            cancel: CancelToken,
        ) -> Result<serde_json::Value, RunnerError> {
            self.respond(cancel).await
        }

        async fn sync(
            &self,
            invocation: &SyncInvocation,
            cancel: CancelToken,
        ) -> Result<serde_json::Value, RunnerError> {
            self.sync_invocations
                .lock()
                .unwrap()
                .push(invocation.clone());
            self.respond(cancel).await
        }
    }
}
