// Application Layer - Use Cases and Business Logic

pub mod activities;
pub mod activity_context;
pub mod connector_service;
pub mod constants;
pub mod coordinator;
pub mod retry;
pub mod workflows;

// Re-exports
pub use activities::{ActivityError, Activities};
pub use activity_context::{ActivityContext, HeartbeatMonitor};
pub use connector_service::ConnectorService;
pub use coordinator::{LastRun, SyncAction, SyncCoordinator, SyncOutcome};
pub use retry::{RetryDecision, RetryPolicy};
pub use workflows::ActivityOptions;
