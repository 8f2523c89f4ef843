// Sync Job Domain Model

use serde::{Deserialize, Serialize};

use super::error::{DomainError, Result};
use super::schedule::ScheduleId;
use super::workflow::WorkflowId;

/// Job ID (database row id)
pub type JobId = i64;

/// Project identifier
pub type ProjectId = String;

/// Checkpoint state of a job that has never synced
pub const EMPTY_STATE: &str = "{}";

/// Source or destination connector configuration.
///
/// `config` is ciphertext at rest. Once loaded through the repository it holds
/// plaintext, and it only ever leaves memory when written to a working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorConfig {
    pub id: i64,
    pub name: String,
    pub connector_type: String,
    pub version: String,
    pub config: String,
}

impl ConnectorConfig {
    pub fn new(
        name: impl Into<String>,
        connector_type: impl Into<String>,
        version: impl Into<String>,
        config: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            name: name.into(),
            connector_type: connector_type.into(),
            version: version.into(),
            config: config.into(),
        }
    }
}

/// Sync Job Entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncJob {
    pub id: JobId,
    pub name: String,
    pub source: ConnectorConfig,
    pub destination: ConnectorConfig,

    /// Human descriptor, e.g. "15-minutes"
    pub frequency: String,
    /// Opaque selected-streams blob handed to the connector
    pub streams_config: String,
    /// Opaque connector checkpoint
    pub state: String,
    pub active: bool,
    pub project_id: ProjectId,

    pub created_at: i64, // epoch ms
    pub updated_at: i64, // epoch ms
    pub deleted_at: Option<i64>,
}

impl SyncJob {
    pub fn new(
        name: impl Into<String>,
        project_id: impl Into<ProjectId>,
        source: ConnectorConfig,
        destination: ConnectorConfig,
        frequency: impl Into<String>,
        streams_config: impl Into<String>,
        now_millis: i64,
    ) -> Self {
        Self {
            id: 0,
            name: name.into(),
            source,
            destination,
            frequency: frequency.into(),
            streams_config: streams_config.into(),
            state: EMPTY_STATE.to_string(),
            active: true,
            project_id: project_id.into(),
            created_at: now_millis,
            updated_at: now_millis,
            deleted_at: None,
        }
    }

    /// Create a test job with fixed connectors and timestamps (for tests only)
    pub fn new_test(id: JobId, project_id: &str, frequency: &str) -> Self {
        let mut job = Self::new(
            format!("job-{}", id),
            project_id,
            ConnectorConfig::new("pg", "postgres", "v0.1.0", r#"{"host":"localhost"}"#),
            ConnectorConfig::new("lake", "iceberg", "v0.1.0", r#"{"bucket":"lake"}"#),
            frequency,
            r#"{"selected_streams":{}}"#,
            1000,
        );
        job.id = id;
        job
    }

    /// Base workflow id: `sync-<project>-<job>`
    pub fn workflow_id(&self) -> WorkflowId {
        WorkflowId::for_job(&self.project_id, self.id)
    }

    /// Schedule id: `schedule-<project>-<job>`
    pub fn schedule_id(&self) -> ScheduleId {
        ScheduleId::for_job(&self.project_id, self.id)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Persist a checkpoint returned by a successful sync.
    ///
    /// The state must be a JSON object; anything else means the connector
    /// produced garbage and the previous checkpoint is kept.
    pub fn record_checkpoint(&mut self, state: &serde_json::Value, now_millis: i64) -> Result<()> {
        if self.is_deleted() {
            return Err(DomainError::JobDeleted(self.id));
        }
        if !state.is_object() {
            return Err(DomainError::InvalidState(format!(
                "expected JSON object, got {}",
                state
            )));
        }
        self.state = state.to_string();
        self.active = true;
        self.updated_at = now_millis;
        Ok(())
    }

    pub fn activate(&mut self, now_millis: i64) {
        self.active = true;
        self.updated_at = now_millis;
    }

    /// Source or destination was deleted
    pub fn deactivate(&mut self, now_millis: i64) {
        self.active = false;
        self.updated_at = now_millis;
    }

    pub fn soft_delete(&mut self, now_millis: i64) {
        self.active = false;
        self.deleted_at = Some(now_millis);
        self.updated_at = now_millis;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_job_defaults() {
        let job = SyncJob::new_test(7, "p1", "15-minutes");
        assert_eq!(job.state, EMPTY_STATE);
        assert!(job.active);
        assert!(!job.is_deleted());
        assert_eq!(job.created_at, job.updated_at);
    }

    #[test]
    fn test_identifiers() {
        let job = SyncJob::new_test(42, "proj", "1-hours");
        assert_eq!(job.workflow_id().as_str(), "sync-proj-42");
        assert_eq!(job.schedule_id().as_str(), "schedule-proj-42");
    }

    #[test]
    fn test_record_checkpoint() {
        let mut job = SyncJob::new_test(1, "p", "1-days");
        job.active = false;

        job.record_checkpoint(&json!({"cursor": 99}), 5000).unwrap();
        assert_eq!(job.state, r#"{"cursor":99}"#);
        assert!(job.active);
        assert_eq!(job.updated_at, 5000);
    }

    #[test]
    fn test_record_checkpoint_rejects_non_object() {
        let mut job = SyncJob::new_test(1, "p", "1-days");
        let err = job.record_checkpoint(&json!([1, 2]), 5000).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
        assert_eq!(job.state, EMPTY_STATE);
        assert_eq!(job.updated_at, 1000);
    }

    #[test]
    fn test_record_checkpoint_on_deleted_job() {
        let mut job = SyncJob::new_test(3, "p", "1-days");
        job.soft_delete(2000);
        let err = job.record_checkpoint(&json!({}), 3000).unwrap_err();
        assert!(matches!(err, DomainError::JobDeleted(3)));
    }

    #[test]
    fn test_deactivate_and_delete() {
        let mut job = SyncJob::new_test(1, "p", "1-days");
        job.deactivate(2000);
        assert!(!job.active);
        assert!(!job.is_deleted());

        job.soft_delete(3000);
        assert_eq!(job.deleted_at, Some(3000));
        assert_eq!(job.updated_at, 3000);
    }
}
