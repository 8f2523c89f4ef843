//! Connector output parsing.
//!
//! Connectors log one JSON document per line, usually behind a text prefix
//! (timestamp, level). Only the last line matters for `check` and `spec`.

use conduit_core::port::{ConnectionStatus, RunnerError};
use serde::Deserialize;
use std::path::Path;

/// Structured log line emitted by a connector
#[derive(Debug, Clone, Deserialize)]
pub struct LogMessage {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(rename = "connectionStatus", default)]
    pub connection_status: Option<ConnectionStatus>,
}

/// Parse the JSON part (from the first `{`) of the last non-empty output line
pub fn extract_and_parse_last_log_message(output: &str) -> Result<LogMessage, RunnerError> {
    let json = last_line_json(output)?;
    serde_json::from_str(json)
        .map_err(|e| RunnerError::Parse(format!("failed to parse JSON: {}", e)))
}

/// Connection status from `check` output.
///
/// Earlier lines are ignored even when they carry a status.
pub fn parse_connection_status(output: &str) -> Result<ConnectionStatus, RunnerError> {
    extract_and_parse_last_log_message(output)?
        .connection_status
        .ok_or(RunnerError::ConnectionStatusNotFound)
}

/// Last non-empty line as a JSON object (used for `spec`)
pub fn parse_last_json_object(output: &str) -> Result<serde_json::Value, RunnerError> {
    let json = last_line_json(output)?;
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| RunnerError::Parse(format!("failed to parse JSON: {}", e)))?;
    if !value.is_object() {
        return Err(RunnerError::Parse("expected a JSON object".to_string()));
    }
    Ok(value)
}

fn last_line_json(output: &str) -> Result<&str, RunnerError> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Err(RunnerError::Parse("empty output".to_string()));
    }

    let last_line = trimmed
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| RunnerError::Parse("no log lines found".to_string()))?;

    let start = last_line
        .find('{')
        .ok_or_else(|| RunnerError::Parse("no JSON found in log line".to_string()))?;
    Ok(&last_line[start..])
}

/// Read a file the connector wrote and parse it as a JSON object
pub async fn parse_json_file(path: &Path) -> Result<serde_json::Value, RunnerError> {
    let data = tokio::fs::read(path).await.map_err(|e| {
        RunnerError::Io(format!("failed to read file {}: {}", path.display(), e))
    })?;
    let value: serde_json::Value = serde_json::from_slice(&data).map_err(|e| {
        RunnerError::Parse(format!(
            "failed to parse JSON from file {}: {}",
            path.display(),
            e
        ))
    })?;
    if !value.is_object() {
        return Err(RunnerError::Parse(format!(
            "file {} does not contain a JSON object",
            path.display()
        )));
    }
    Ok(value)
}
