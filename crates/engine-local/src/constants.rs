// Local engine constants

use std::time::Duration;

/// How long a cancelled attempt may take to wind down its subprocess
pub const CANCEL_DRAIN_TIMEOUT: Duration = Duration::from_secs(15);

/// Oldest execution records are dropped past this many
pub const MAX_EXECUTION_HISTORY: usize = 10_000;
