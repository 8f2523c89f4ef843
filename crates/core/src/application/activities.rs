// Execution Activities
//
// Each activity wraps exactly one runner call and heartbeats while it is in
// flight. Retries, timeouts and heartbeat supervision belong to the engine.

use crate::application::activity_context::ActivityContext;
use crate::application::constants::HEARTBEAT_INTERVAL;
use crate::domain::{ConnectorParams, JobId, WorkflowRequest};
use crate::error::AppError;
use crate::port::{
    ConnectionStatus, ConnectorRunner, JobRepository, RunnerError, SyncInvocation, TimeProvider,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

/// Activity errors, classified for the retry policy
#[derive(Error, Debug)]
pub enum ActivityError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Activity heartbeat timeout after {0:?}")]
    HeartbeatTimeout(Duration),

    #[error("Activity start-to-close timeout after {0:?}")]
    StartToCloseTimeout(Duration),

    #[error("Activity cancelled")]
    Cancelled,

    #[error("Activity panicked: {0}")]
    Panicked(String),
}

impl ActivityError {
    /// Whether another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ActivityError::Validation(_)
            | ActivityError::NotFound(_)
            | ActivityError::Decryption(_)
            | ActivityError::Cancelled
            | ActivityError::Panicked(_) => false,
            ActivityError::Runner(e) => e.is_retryable(),
            ActivityError::Repository(_)
            | ActivityError::HeartbeatTimeout(_)
            | ActivityError::StartToCloseTimeout(_) => true,
        }
    }
}

impl From<AppError> for ActivityError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::NotFound(msg) => ActivityError::NotFound(msg),
            AppError::Crypto(msg) => ActivityError::Decryption(msg),
            AppError::Validation(msg) => ActivityError::Validation(msg),
            AppError::Domain(e) => ActivityError::Validation(e.to_string()),
            AppError::Runner(e) => ActivityError::Runner(e),
            AppError::Activity(e) => e,
            other => ActivityError::Repository(other.to_string()),
        }
    }
}

/// Activity implementations shared by all workflows
pub struct Activities {
    runner: Arc<dyn ConnectorRunner>,
    job_repo: Arc<dyn JobRepository>,
    time_provider: Arc<dyn TimeProvider>,
    heartbeat_interval: Duration,
}

impl Activities {
    pub fn new(
        runner: Arc<dyn ConnectorRunner>,
        job_repo: Arc<dyn JobRepository>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            runner,
            job_repo,
            time_provider,
            heartbeat_interval: HEARTBEAT_INTERVAL,
        }
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Dispatch a workflow request to its activity
    pub async fn execute(
        &self,
        ctx: &ActivityContext,
        request: &WorkflowRequest,
    ) -> Result<serde_json::Value, ActivityError> {
        match request {
            WorkflowRequest::RunSync { job_id } => self.sync(ctx, *job_id).await,
            WorkflowRequest::DiscoverCatalog { params } => {
                self.discover_catalog(ctx, params).await
            }
            WorkflowRequest::TestConnection { params } => {
                let status = self.test_connection(ctx, params).await?;
                serde_json::to_value(status)
                    .map_err(|e| ActivityError::Runner(RunnerError::Parse(e.to_string())))
            }
            WorkflowRequest::Spec {
                connector_type,
                version,
            } => self.spec(ctx, connector_type, version).await,
        }
    }

    pub async fn discover_catalog(
        &self,
        ctx: &ActivityContext,
        params: &ConnectorParams,
    ) -> Result<serde_json::Value, ActivityError> {
        validate_params(params)?;
        info!(
            workflow_id = %ctx.workflow_id(),
            connector_type = %params.connector_type,
            version = %params.version,
            attempt = %ctx.attempt(),
            "Starting discover catalog activity"
        );

        let result = self
            .heartbeating(ctx, "Running discover command", async {
                self.runner
                    .discover(ctx.workflow_id(), params, ctx.cancel_token())
                    .await
            })
            .await;

        result.map_err(|e| {
            error!(workflow_id = %ctx.workflow_id(), error = %e, "Discover command failed");
            ActivityError::from(e)
        })
    }

    pub async fn test_connection(
        &self,
        ctx: &ActivityContext,
        params: &ConnectorParams,
    ) -> Result<ConnectionStatus, ActivityError> {
        validate_params(params)?;
        info!(
            workflow_id = %ctx.workflow_id(),
            connector_type = %params.connector_type,
            version = %params.version,
            flag = %params.flag,
            "Starting test connection activity"
        );

        let result = self
            .heartbeating(ctx, "Running check command", async {
                self.runner
                    .test_connection(ctx.workflow_id(), params, ctx.cancel_token())
                    .await
            })
            .await;

        result.map_err(|e| {
            error!(workflow_id = %ctx.workflow_id(), error = %e, "Check command failed");
            ActivityError::from(e)
        })
    }

    pub async fn spec(
        &self,
        ctx: &ActivityContext,
        connector_type: &str,
        version: &str,
    ) -> Result<serde_json::Value, ActivityError> {
        if connector_type.trim().is_empty() {
            return Err(ActivityError::Validation(
                "connector type is required".to_string(),
            ));
        }
        info!(
            workflow_id = %ctx.workflow_id(),
            connector_type = %connector_type,
            version = %version,
            "Starting spec activity"
        );

        self.heartbeating(ctx, "Running spec command", async {
            self.runner
                .spec(ctx.workflow_id(), connector_type, version, ctx.cancel_token())
                .await
        })
        .await
        .map_err(ActivityError::from)
    }

    /// Run a sync for `job_id` and persist the returned checkpoint
    pub async fn sync(
        &self,
        ctx: &ActivityContext,
        job_id: JobId,
    ) -> Result<serde_json::Value, ActivityError> {
        info!(
            workflow_id = %ctx.workflow_id(),
            job_id = %job_id,
            attempt = %ctx.attempt(),
            "Starting sync activity"
        );

        let mut job = self.job_repo.get_by_id(job_id).await?;

        let invocation = SyncInvocation {
            execution_id: ctx.workflow_id().clone(),
            connector_type: job.source.connector_type.clone(),
            version: job.source.version.clone(),
            source_config: job.source.config.clone(),
            streams_config: job.streams_config.clone(),
            destination_config: job.destination.config.clone(),
            state: job.state.clone(),
        };

        let state = self
            .heartbeating(ctx, "Running sync command", async {
                self.runner.sync(&invocation, ctx.cancel_token()).await
            })
            .await
            .map_err(|e| {
                error!(
                    workflow_id = %ctx.workflow_id(),
                    job_id = %job_id,
                    error = %e,
                    "Sync command failed"
                );
                ActivityError::from(e)
            })?;

        job.record_checkpoint(&state, self.time_provider.now_millis())
            .map_err(|e| ActivityError::Validation(e.to_string()))?;
        self.job_repo.update(&job).await?;

        info!(
            workflow_id = %ctx.workflow_id(),
            job_id = %job_id,
            "Sync completed, checkpoint persisted"
        );
        Ok(state)
    }

    /// Drive `fut` to completion, recording a heartbeat every interval
    async fn heartbeating<F, T>(&self, ctx: &ActivityContext, details: &str, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        tokio::pin!(fut);
        let mut ticker = tokio::time::interval(self.heartbeat_interval);
        loop {
            tokio::select! {
                out = &mut fut => return out,
                _ = ticker.tick() => ctx.record_heartbeat(details),
            }
        }
    }
}

fn validate_params(params: &ConnectorParams) -> Result<(), ActivityError> {
    if params.connector_type.trim().is_empty() {
        return Err(ActivityError::Validation(
            "connector type is required".to_string(),
        ));
    }
    if params.flag.trim().is_empty() {
        return Err(ActivityError::Validation("config flag is required".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SyncJob, WorkflowId};
    use crate::port::connector_runner::mocks::{MockBehavior, MockConnectorRunner};
    use crate::port::job_repository::mocks::InMemoryJobRepository;
    use crate::port::time_provider::mocks::FixedTimeProvider;
    use crate::port::CancelToken;
    use serde_json::json;

    fn activities(
        runner: Arc<MockConnectorRunner>,
        repo: Arc<InMemoryJobRepository>,
    ) -> Activities {
        Activities::new(runner, repo, Arc::new(FixedTimeProvider::new(9000)))
    }

    #[tokio::test]
    async fn test_sync_persists_checkpoint() {
        let runner = Arc::new(MockConnectorRunner::new_success(json!({"lsn": "0/16B3748"})));
        let repo = Arc::new(InMemoryJobRepository::with_job(SyncJob::new_test(
            4, "p1", "1-hours",
        )));
        let acts = activities(runner.clone(), repo.clone());

        let ctx = ActivityContext::detached(WorkflowId::new("sync-p1-4-run"));
        let state = acts.sync(&ctx, 4).await.unwrap();

        assert_eq!(state, json!({"lsn": "0/16B3748"}));
        let stored = repo.get(4).unwrap();
        assert_eq!(stored.state, r#"{"lsn":"0/16B3748"}"#);
        assert!(stored.active);
        assert_eq!(stored.updated_at, 9000);
        assert_eq!(repo.update_count(), 1);

        let inv = &runner.sync_invocations()[0];
        assert_eq!(inv.execution_id.as_str(), "sync-p1-4-run");
        assert_eq!(inv.connector_type, "postgres");
        assert_eq!(inv.state, "{}");
    }

    #[tokio::test]
    async fn test_sync_failure_keeps_state() {
        let runner = Arc::new(MockConnectorRunner::new(MockBehavior::ExitStatus(2)));
        let repo = Arc::new(InMemoryJobRepository::with_job(SyncJob::new_test(
            4, "p1", "1-hours",
        )));
        let acts = activities(runner, repo.clone());

        let ctx = ActivityContext::detached(WorkflowId::new("wf"));
        let err = acts.sync(&ctx, 4).await.unwrap_err();

        assert!(err.is_retryable());
        assert!(err.to_string().contains("exit status 2"));
        assert_eq!(repo.get(4).unwrap().state, "{}");
        assert_eq!(repo.update_count(), 0);
    }

    #[tokio::test]
    async fn test_sync_missing_job_is_not_retryable() {
        let runner = Arc::new(MockConnectorRunner::new_success(json!({})));
        let repo = Arc::new(InMemoryJobRepository::new());
        let acts = activities(runner.clone(), repo);

        let ctx = ActivityContext::detached(WorkflowId::new("wf"));
        let err = acts.sync(&ctx, 99).await.unwrap_err();

        assert!(matches!(err, ActivityError::NotFound(_)));
        assert!(!err.is_retryable());
        assert_eq!(runner.call_count(), 0);
    }

    #[tokio::test]
    async fn test_test_connection_without_status() {
        let runner = Arc::new(MockConnectorRunner::new(MockBehavior::NoConnectionStatus));
        let acts = activities(runner, Arc::new(InMemoryJobRepository::new()));

        let ctx = ActivityContext::detached(WorkflowId::new("wf"));
        let params = ConnectorParams::new("postgres", "v1", "{}");
        let err = acts.test_connection(&ctx, &params).await.unwrap_err();
        assert_eq!(err.to_string(), "connection status not found");
    }

    #[tokio::test]
    async fn test_execute_dispatches_test_connection() {
        let runner = Arc::new(MockConnectorRunner::new_success(
            json!({"message": "ok", "status": "SUCCEEDED"}),
        ));
        let acts = activities(runner, Arc::new(InMemoryJobRepository::new()));

        let ctx = ActivityContext::detached(WorkflowId::new("wf"));
        let request = WorkflowRequest::TestConnection {
            params: ConnectorParams::new("mysql", "latest", "{}"),
        };
        let out = acts.execute(&ctx, &request).await.unwrap();
        assert_eq!(out["status"], "SUCCEEDED");
    }

    #[tokio::test]
    async fn test_empty_connector_type_rejected() {
        let runner = Arc::new(MockConnectorRunner::new_success(json!({})));
        let acts = activities(runner.clone(), Arc::new(InMemoryJobRepository::new()));

        let ctx = ActivityContext::detached(WorkflowId::new("wf"));
        let params = ConnectorParams::new("", "v1", "{}");
        let err = acts.discover_catalog(&ctx, &params).await.unwrap_err();
        assert!(matches!(err, ActivityError::Validation(_)));
        assert_eq!(runner.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeats_while_running() {
        let runner = Arc::new(MockConnectorRunner::new_slow(
            Duration::from_secs(35),
            json!({"streams": []}),
        ));
        let acts = activities(runner, Arc::new(InMemoryJobRepository::new()));

        let (ctx, monitor) = ActivityContext::new(WorkflowId::new("wf"), 1, CancelToken::never());
        let params = ConnectorParams::new("postgres", "v1", "{}");
        acts.discover_catalog(&ctx, &params).await.unwrap();

        // t=0, 10, 20, 30
        assert_eq!(monitor.last().count, 4);
        assert_eq!(monitor.last().details, "Running discover command");
    }

    #[test]
    fn test_error_classification() {
        assert!(!ActivityError::Decryption("bad tag".into()).is_retryable());
        assert!(!ActivityError::Cancelled.is_retryable());
        assert!(ActivityError::HeartbeatTimeout(Duration::from_secs(60)).is_retryable());
        assert!(ActivityError::Repository("locked".into()).is_retryable());
        assert!(!ActivityError::Runner(RunnerError::InvalidInput("x".into())).is_retryable());
        assert!(ActivityError::from(AppError::Crypto("tag".into()))
            .to_string()
            .contains("Decryption"));
    }
}
