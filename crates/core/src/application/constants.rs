// Engine constants (ADR: No magic values)
use std::time::Duration;

/// Task queue every connector workflow is dispatched on
pub const DOCKER_TASK_QUEUE: &str = "CONDUIT_DOCKER_TASK_QUEUE";

/// Start-to-close timeout for discover/check/spec activities (10 minutes)
pub const CONNECTOR_OPERATION_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Start-to-close timeout for sync activities (30 days)
pub const SYNC_TIMEOUT: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// How often a running activity records a heartbeat
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// An attempt without a heartbeat for this long is cancelled
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default retry policy
pub const DEFAULT_RETRY_INITIAL_INTERVAL: Duration = Duration::from_secs(15);
pub const DEFAULT_RETRY_BACKOFF_COEFFICIENT: f64 = 2.0;
pub const DEFAULT_RETRY_MAXIMUM_INTERVAL: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_RETRY_MAXIMUM_ATTEMPTS: u32 = 1;

/// Schedule tick of the local engine
pub const DEFAULT_SCHEDULE_TICK: Duration = Duration::from_secs(15);

/// SIGTERM -> SIGKILL grace period for connector processes (5 seconds)
pub const GRACEFUL_SHUTDOWN_TIMEOUT_MS: u64 = 5000;

/// Page size of the last-run query
pub const LAST_RUN_PAGE_SIZE: usize = 1;
