// Conduit Local Engine
// In-memory implementation of the WorkflowEngine port: cron schedules,
// skip-overlap, and an activity runtime with timeouts, heartbeats and retries

pub mod constants;
pub mod cron_spec;
pub mod engine;
pub mod runtime;
pub mod shutdown;

pub use engine::LocalWorkflowEngine;
pub use runtime::{RunReport, WorkflowRuntime};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
