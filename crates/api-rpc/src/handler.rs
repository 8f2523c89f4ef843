//! RPC Method Handlers

use crate::error::{throttled, to_rpc_error};
use crate::rate_limiter::RateLimiter;
use crate::types::{
    CheckRequest, CheckResponse, DiscoverRequest, LastRunRequest, LastRunResponse,
    ManageSyncRequest, ManageSyncResponse, SpecRequest,
};
use conduit_core::application::{ConnectorService, SyncAction, SyncCoordinator};
use conduit_core::port::{JobRepository, TimeProvider};
use jsonrpsee::types::ErrorObjectOwned;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};

type RpcResult<T> = Result<T, ErrorObjectOwned>;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    job_repo: Arc<dyn JobRepository>,
    coordinator: Arc<SyncCoordinator>,
    connectors: Arc<ConnectorService>,
    time_provider: Arc<dyn TimeProvider>,
    rate_limiter: RateLimiter,
}

impl RpcHandler {
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        coordinator: Arc<SyncCoordinator>,
        connectors: Arc<ConnectorService>,
        time_provider: Arc<dyn TimeProvider>,
        rate_limiter: RateLimiter,
    ) -> Self {
        Self {
            job_repo,
            coordinator,
            connectors,
            time_provider,
            rate_limiter,
        }
    }

    fn throttle(&self, method: &str) -> RpcResult<()> {
        if self.rate_limiter.check() {
            Ok(())
        } else {
            warn!(method = %method, "Request throttled");
            Err(throttled())
        }
    }

    /// sync.manage.v1
    pub async fn manage_sync(&self, req: ManageSyncRequest) -> RpcResult<ManageSyncResponse> {
        self.throttle("sync.manage.v1")?;
        let action = SyncAction::from_str(&req.action).map_err(to_rpc_error)?;

        let mut job = self
            .job_repo
            .get_by_id(req.job_id)
            .await
            .map_err(to_rpc_error)?;
        let previous = job.clone();

        // The job row mirrors whether a schedule exists. It is written first so
        // a failed write never leaves a schedule behind for an unchanged job.
        let now = self.time_provider.now_millis();
        let mirrored = match action {
            SyncAction::Create | SyncAction::Update => {
                job.activate(now);
                true
            }
            SyncAction::Delete => {
                job.deactivate(now);
                true
            }
            SyncAction::Trigger => false,
        };
        if mirrored {
            self.job_repo.update(&job).await.map_err(to_rpc_error)?;
        }

        let outcome = match self
            .coordinator
            .manage_sync(&job.project_id, job.id, &job.frequency, action)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                if mirrored {
                    if let Err(restore) = self.job_repo.update(&previous).await {
                        error!(
                            job_id = %job.id,
                            error = %restore,
                            "Failed to restore job after schedule error"
                        );
                    }
                }
                return Err(to_rpc_error(e));
            }
        };

        info!(job_id = %job.id, action = %action, outcome = %outcome.message(), "sync.manage.v1 done");
        Ok(ManageSyncResponse {
            job_id: job.id,
            action: action.to_string(),
            message: outcome.message().to_string(),
            outcome,
        })
    }

    /// sync.last_run.v1
    pub async fn last_run(&self, req: LastRunRequest) -> RpcResult<LastRunResponse> {
        self.throttle("sync.last_run.v1")?;
        let job = self
            .job_repo
            .get_by_id(req.job_id)
            .await
            .map_err(to_rpc_error)?;

        let last_run = self
            .coordinator
            .last_run(&job.project_id, job.id)
            .await
            .map_err(to_rpc_error)?;

        Ok(LastRunResponse {
            job_id: job.id,
            last_run,
        })
    }

    /// connector.check.v1
    pub async fn check(&self, req: CheckRequest) -> RpcResult<CheckResponse> {
        self.throttle("connector.check.v1")?;
        let status = self
            .connectors
            .test_connection(req.into_params())
            .await
            .map_err(to_rpc_error)?;

        Ok(CheckResponse {
            status: status.status,
            message: status.message,
        })
    }

    /// connector.discover.v1
    pub async fn discover(&self, req: DiscoverRequest) -> RpcResult<serde_json::Value> {
        self.throttle("connector.discover.v1")?;
        self.connectors
            .discover_catalog(req.into_params())
            .await
            .map_err(to_rpc_error)
    }

    /// connector.spec.v1
    pub async fn spec(&self, req: SpecRequest) -> RpcResult<serde_json::Value> {
        self.throttle("connector.spec.v1")?;
        self.connectors
            .spec(&req.connector_type, &req.version)
            .await
            .map_err(to_rpc_error)
    }
}
