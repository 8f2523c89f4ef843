// Workflow definitions: one activity per workflow, with its execution options

use crate::application::constants::*;
use crate::application::retry::RetryPolicy;
use crate::domain::WorkflowRequest;
use std::time::Duration;

/// How the engine runs the single activity of a workflow
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityOptions {
    pub start_to_close_timeout: Duration,
    pub heartbeat_timeout: Duration,
    pub retry_policy: RetryPolicy,
}

impl ActivityOptions {
    /// Sync gets 30 days, every other connector operation 10 minutes
    pub fn for_request(request: &WorkflowRequest, retry_policy: RetryPolicy) -> Self {
        let start_to_close_timeout = match request {
            WorkflowRequest::RunSync { .. } => SYNC_TIMEOUT,
            WorkflowRequest::DiscoverCatalog { .. }
            | WorkflowRequest::TestConnection { .. }
            | WorkflowRequest::Spec { .. } => CONNECTOR_OPERATION_TIMEOUT,
        };
        Self {
            start_to_close_timeout,
            heartbeat_timeout: HEARTBEAT_TIMEOUT,
            retry_policy,
        }
    }

    pub fn with_heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = timeout;
        self
    }
}
