// Port Layer - Interfaces for external dependencies

pub mod cancellation;
pub mod connector_runner;
pub mod id_provider; // For deterministic testing
pub mod job_repository;
pub mod time_provider;
pub mod workflow_engine;

// Re-exports
pub use cancellation::{cancel_channel, CancelSender, CancelToken};
pub use connector_runner::{ConnectionStatus, ConnectorRunner, RunnerError, SyncInvocation};
pub use id_provider::IdProvider;
pub use job_repository::JobRepository;
pub use time_provider::TimeProvider;
pub use workflow_engine::{EngineError, ScheduleOptions, TriggerOutcome, WorkflowEngine};
