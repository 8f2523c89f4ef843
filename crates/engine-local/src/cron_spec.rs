//! Cron evaluation for schedule specs.
//!
//! Specs carry standard 5-field expressions; the `cron` crate wants a leading
//! seconds field, so every expression fires at second zero.

use chrono::{DateTime, Utc};
use conduit_core::domain::ScheduleSpec;
use conduit_core::port::EngineError;
use cron::Schedule;
use std::str::FromStr;

/// Parse one 5-field expression
pub fn parse(expr: &str) -> Result<Schedule, EngineError> {
    let fields = expr.split_whitespace().count();
    if fields != 5 {
        return Err(EngineError::InvalidSpec(format!(
            "expected 5 cron fields, got {} in '{}'",
            fields, expr
        )));
    }
    Schedule::from_str(&format!("0 {}", expr))
        .map_err(|e| EngineError::InvalidSpec(format!("invalid cron expression '{}': {}", expr, e)))
}

/// Parse every expression of a spec; an empty spec is rejected
pub fn parse_spec(spec: &ScheduleSpec) -> Result<Vec<Schedule>, EngineError> {
    if spec.cron_expressions.is_empty() {
        return Err(EngineError::InvalidSpec(
            "schedule spec has no cron expressions".to_string(),
        ));
    }
    spec.cron_expressions.iter().map(|e| parse(e)).collect()
}

/// True when any schedule has a fire time in `(since, now]`
pub fn is_due(schedules: &[Schedule], since: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    schedules
        .iter()
        .any(|s| s.after(&since).take(1).any(|next| next <= now))
}
