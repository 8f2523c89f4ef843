//! RPC Request/Response Types

use conduit_core::application::{LastRun, SyncOutcome};
use conduit_core::domain::{ConnectorParams, JobId};
use serde::{Deserialize, Serialize};

/// sync.manage.v1 - Apply a schedule action to a job
#[derive(Debug, Deserialize)]
pub struct ManageSyncRequest {
    pub job_id: JobId,
    /// create | update | delete | trigger (alias: sync)
    pub action: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManageSyncResponse {
    pub job_id: JobId,
    pub action: String,
    pub message: String,
    #[serde(flatten)]
    pub outcome: SyncOutcome,
}

/// sync.last_run.v1 - Most recent run of a job
#[derive(Debug, Deserialize)]
pub struct LastRunRequest {
    pub job_id: JobId,
}

#[derive(Debug, Clone, Serialize)]
pub struct LastRunResponse {
    pub job_id: JobId,
    pub last_run: Option<LastRun>,
}

/// connector.check.v1 - Test a connector config
#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub connector_type: String,
    pub version: String,
    pub config: serde_json::Value,
    /// `--<flag>` passed to `check`
    #[serde(default = "default_flag")]
    pub flag: String,
}

fn default_flag() -> String {
    "config".to_string()
}

impl CheckRequest {
    pub fn into_params(self) -> ConnectorParams {
        ConnectorParams::new(self.connector_type, self.version, config_blob(&self.config))
            .with_flag(self.flag)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResponse {
    pub status: String,
    pub message: String,
}

/// connector.discover.v1 - Discover a source catalog
#[derive(Debug, Deserialize)]
pub struct DiscoverRequest {
    pub connector_type: String,
    pub version: String,
    pub config: serde_json::Value,
    #[serde(default)]
    pub streams_config: Option<serde_json::Value>,
}

impl DiscoverRequest {
    pub fn into_params(self) -> ConnectorParams {
        let params =
            ConnectorParams::new(self.connector_type, self.version, config_blob(&self.config));
        match self.streams_config.as_ref() {
            Some(streams) => params.with_streams(config_blob(streams)),
            None => params,
        }
    }
}

/// connector.spec.v1 - Fetch a connector spec
#[derive(Debug, Deserialize)]
pub struct SpecRequest {
    pub connector_type: String,
    pub version: String,
}

/// Configs may arrive as a JSON object or as an already-serialized string
fn config_blob(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_check_request_defaults_flag() {
        let req: CheckRequest = serde_json::from_value(json!({
            "connector_type": "postgres",
            "version": "v1",
            "config": {"host": "db"}
        }))
        .unwrap();
        let params = req.into_params();
        assert_eq!(params.flag, "config");
        assert_eq!(params.config, r#"{"host":"db"}"#);
    }

    #[test]
    fn test_string_config_passes_through() {
        let req: DiscoverRequest = serde_json::from_value(json!({
            "connector_type": "postgres",
            "version": "v1",
            "config": "{\"host\":\"db\"}",
            "streams_config": "[]"
        }))
        .unwrap();
        let params = req.into_params();
        assert_eq!(params.config, r#"{"host":"db"}"#);
        assert_eq!(params.streams_config.as_deref(), Some("[]"));
    }
}
