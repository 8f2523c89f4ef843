// Domain Layer - Pure business logic and entities

pub mod error;
pub mod frequency;
pub mod job;
pub mod schedule;
pub mod workflow;

// Re-exports
pub use error::DomainError;
pub use frequency::to_cron;
pub use job::{ConnectorConfig, JobId, ProjectId, SyncJob, EMPTY_STATE};
pub use schedule::{OverlapPolicy, ScheduleAction, ScheduleDescription, ScheduleId, ScheduleSpec};
pub use workflow::{
    ConnectorParams, ExecutionFilter, ExecutionStatus, WorkflowExecution, WorkflowId,
    WorkflowRequest,
};
