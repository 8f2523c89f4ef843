// Activity retry policy (exponential backoff with a ceiling)
use crate::application::constants::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after this delay
    Retry(Duration),
    /// Do not retry, the execution has failed permanently
    Failed,
}

/// Retry policy applied by the engine to every activity attempt.
///
/// Backoff formula:
/// delay(n) = min(initial_interval * backoff_coefficient ^ (n - 1), maximum_interval)
///
/// `maximum_attempts == 0` means unlimited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub backoff_coefficient: f64,
    pub maximum_interval: Duration,
    pub maximum_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: DEFAULT_RETRY_INITIAL_INTERVAL,
            backoff_coefficient: DEFAULT_RETRY_BACKOFF_COEFFICIENT,
            maximum_interval: DEFAULT_RETRY_MAXIMUM_INTERVAL,
            maximum_attempts: DEFAULT_RETRY_MAXIMUM_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    pub fn new(
        initial_interval: Duration,
        backoff_coefficient: f64,
        maximum_interval: Duration,
        maximum_attempts: u32,
    ) -> Self {
        Self {
            initial_interval,
            backoff_coefficient,
            maximum_interval,
            maximum_attempts,
        }
    }

    /// Delay before the attempt following `attempt` (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_interval.as_secs_f64() * self.backoff_coefficient.powi(exponent);
        let capped = secs.min(self.maximum_interval.as_secs_f64());
        if capped.is_finite() && capped >= 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            self.maximum_interval
        }
    }

    /// Decide what happens after `attempt` (1-based) failed
    pub fn should_retry(&self, attempt: u32, retryable: bool) -> RetryDecision {
        if !retryable {
            warn!(attempt = %attempt, "Non-retryable activity failure");
            return RetryDecision::Failed;
        }

        if self.maximum_attempts != 0 && attempt >= self.maximum_attempts {
            warn!(
                attempt = %attempt,
                maximum_attempts = %self.maximum_attempts,
                "Max retry attempts reached"
            );
            return RetryDecision::Failed;
        }

        let delay = self.delay_for_attempt(attempt);
        info!(
            attempt = %attempt,
            delay_ms = %delay.as_millis(),
            "Scheduling retry"
        );
        RetryDecision::Retry(delay)
    }
}
