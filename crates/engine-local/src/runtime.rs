// Workflow Runtime - runs the single activity of a workflow under its options
//
// Each attempt gets a fresh ActivityContext. The attempt races against its
// start-to-close timeout, the heartbeat watchdog and the run-level stop token;
// whichever loses is cancelled and given CANCEL_DRAIN_TIMEOUT to wind down.

use crate::constants::CANCEL_DRAIN_TIMEOUT;
use conduit_core::application::{
    Activities, ActivityContext, ActivityError, ActivityOptions, RetryDecision, RetryPolicy,
};
use conduit_core::domain::{ExecutionStatus, WorkflowId, WorkflowRequest};
use conduit_core::port::{cancel_channel, CancelToken};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Outcome of a whole run (all attempts)
#[derive(Debug)]
pub struct RunReport {
    pub result: Result<serde_json::Value, ActivityError>,
    pub attempts: u32,
}

impl RunReport {
    pub fn status(&self) -> ExecutionStatus {
        match &self.result {
            Ok(_) => ExecutionStatus::Completed,
            Err(ActivityError::Cancelled) => ExecutionStatus::Canceled,
            Err(ActivityError::StartToCloseTimeout(_)) | Err(ActivityError::HeartbeatTimeout(_)) => {
                ExecutionStatus::TimedOut
            }
            Err(_) => ExecutionStatus::Failed,
        }
    }
}

pub struct WorkflowRuntime {
    activities: Arc<Activities>,
    retry_policy: RetryPolicy,
    heartbeat_timeout: Option<Duration>,
}

impl WorkflowRuntime {
    pub fn new(activities: Arc<Activities>, retry_policy: RetryPolicy) -> Self {
        Self {
            activities,
            retry_policy,
            heartbeat_timeout: None,
        }
    }

    /// Override the heartbeat timeout of every workflow
    pub fn with_heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = Some(timeout);
        self
    }

    pub fn options_for(&self, request: &WorkflowRequest) -> ActivityOptions {
        let options = ActivityOptions::for_request(request, self.retry_policy.clone());
        match self.heartbeat_timeout {
            Some(timeout) => options.with_heartbeat_timeout(timeout),
            None => options,
        }
    }

    /// Run `request` until it succeeds, fails permanently or `stop` fires
    pub async fn run(
        &self,
        workflow_id: &WorkflowId,
        request: &WorkflowRequest,
        mut stop: CancelToken,
    ) -> RunReport {
        let options = self.options_for(request);
        let mut attempt = 1;

        loop {
            let result = self
                .run_attempt(workflow_id, request, attempt, &options, stop.clone())
                .await;

            let err = match result {
                Ok(value) => {
                    info!(
                        workflow_id = %workflow_id,
                        workflow_type = %request.workflow_type(),
                        attempt = %attempt,
                        "Workflow completed"
                    );
                    return RunReport {
                        result: Ok(value),
                        attempts: attempt,
                    };
                }
                Err(e) => e,
            };

            match options.retry_policy.should_retry(attempt, err.is_retryable()) {
                RetryDecision::Retry(delay) => {
                    warn!(
                        workflow_id = %workflow_id,
                        attempt = %attempt,
                        delay_ms = %delay.as_millis(),
                        error = %err,
                        "Activity attempt failed, retrying"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = stop.cancelled() => {
                            return RunReport {
                                result: Err(ActivityError::Cancelled),
                                attempts: attempt,
                            };
                        }
                    }
                    attempt += 1;
                }
                RetryDecision::Failed => {
                    error!(
                        workflow_id = %workflow_id,
                        workflow_type = %request.workflow_type(),
                        attempts = %attempt,
                        error = %err,
                        "Workflow failed"
                    );
                    return RunReport {
                        result: Err(err),
                        attempts: attempt,
                    };
                }
            }
        }
    }

    async fn run_attempt(
        &self,
        workflow_id: &WorkflowId,
        request: &WorkflowRequest,
        attempt: u32,
        options: &ActivityOptions,
        mut stop: CancelToken,
    ) -> Result<serde_json::Value, ActivityError> {
        let (cancel_tx, cancel) = cancel_channel();
        let (ctx, mut monitor) = ActivityContext::new(workflow_id.clone(), attempt, cancel);

        let activity = self.activities.execute(&ctx, request);
        tokio::pin!(activity);

        let interrupted = tokio::select! {
            result = &mut activity => return result,
            _ = tokio::time::sleep(options.start_to_close_timeout) => {
                ActivityError::StartToCloseTimeout(options.start_to_close_timeout)
            }
            _ = monitor.stalled(options.heartbeat_timeout) => {
                let last = monitor.last();
                warn!(
                    workflow_id = %workflow_id,
                    attempt = %attempt,
                    heartbeats = %last.count,
                    last_details = %last.details,
                    "Activity heartbeat timed out"
                );
                ActivityError::HeartbeatTimeout(options.heartbeat_timeout)
            }
            _ = stop.cancelled() => ActivityError::Cancelled,
        };

        cancel_tx.cancel();
        if tokio::time::timeout(CANCEL_DRAIN_TIMEOUT, &mut activity)
            .await
            .is_err()
        {
            warn!(
                workflow_id = %workflow_id,
                attempt = %attempt,
                "Cancelled activity did not finish in time, dropping it"
            );
        }
        Err(interrupted)
    }
}
