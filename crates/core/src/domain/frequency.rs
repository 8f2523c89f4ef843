//! Frequency descriptor -> cron translation
//!
//! Descriptors look like `"<positive-integer>-<unit>"` (case-insensitive).
//! The result is a standard 5-field cron expression, or an empty string when
//! the descriptor is not understood. Callers treat empty as "do not schedule".

/// Translate a frequency descriptor such as `"15-minutes"` into a cron expression.
///
/// Weeks and years have no native cron form, so N is placed on the
/// day-of-week field. Those two are approximations, not exact intervals.
pub fn to_cron(frequency: &str) -> String {
    let lowered = frequency.to_lowercase();
    let parts: Vec<&str> = lowered.split('-').collect();
    if parts.len() != 2 {
        return String::new();
    }

    let (value_str, unit) = (parts[0], parts[1]);
    if value_str.is_empty() || !value_str.bytes().all(|b| b.is_ascii_digit()) {
        return String::new();
    }
    let value = match value_str.parse::<i64>() {
        Ok(v) if v > 0 => v,
        _ => return String::new(),
    };

    match unit {
        "minutes" => format!("*/{} * * * *", value),
        "hours" => format!("0 */{} * * *", value),
        "days" => format!("0 0 */{} * *", value),
        "weeks" => format!("0 0 * * */{}", value),
        "months" => format!("0 0 1 */{} *", value),
        "years" => format!("0 0 1 1 */{}", value),
        _ => String::new(),
    }
}
