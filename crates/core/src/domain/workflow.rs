// Workflow Domain Model - requests, executions, history filters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::job::JobId;

/// Workflow identifier.
///
/// Sync runs of one job share the `sync-<project>-<job>` prefix, so an
/// inclusive lexicographic range over ids selects the whole history of a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkflowId(String);

impl WorkflowId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn for_job(project_id: &str, job_id: JobId) -> Self {
        Self(format!("sync-{}-{}", project_id, job_id))
    }

    /// Id of one scheduled or triggered run of this workflow.
    ///
    /// `run_id` keeps two runs fired at the same instant apart; the id also
    /// names the run's working directory.
    pub fn for_run(&self, fired_at: DateTime<Utc>, run_id: &str) -> Self {
        Self(format!("{}-{}-{}", self.0, fired_at.to_rfc3339(), run_id))
    }

    /// One-off connector operation, e.g. `test-connection-postgres-1700000000-<run id>`
    pub fn for_operation(
        operation: &str,
        connector_type: &str,
        unix_secs: i64,
        run_id: &str,
    ) -> Self {
        Self(format!(
            "{}-{}-{}-{}",
            operation, connector_type, unix_secs, run_id
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inputs for a connector operation that does not belong to a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorParams {
    pub connector_type: String,
    pub version: String,
    /// Plaintext connector config
    pub config: String,
    pub streams_config: Option<String>,
    /// CLI flag the config file is passed under (`config`, `destination`, ...)
    pub flag: String,
}

impl ConnectorParams {
    pub fn new(
        connector_type: impl Into<String>,
        version: impl Into<String>,
        config: impl Into<String>,
    ) -> Self {
        Self {
            connector_type: connector_type.into(),
            version: version.into(),
            config: config.into(),
            streams_config: None,
            flag: "config".to_string(),
        }
    }

    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flag = flag.into();
        self
    }

    pub fn with_streams(mut self, streams_config: impl Into<String>) -> Self {
        self.streams_config = Some(streams_config.into());
        self
    }
}

/// The unit of work a workflow runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowRequest {
    RunSync { job_id: JobId },
    DiscoverCatalog { params: ConnectorParams },
    TestConnection { params: ConnectorParams },
    Spec { connector_type: String, version: String },
}

impl WorkflowRequest {
    pub fn workflow_type(&self) -> &'static str {
        match self {
            WorkflowRequest::RunSync { .. } => "RunSyncWorkflow",
            WorkflowRequest::DiscoverCatalog { .. } => "DiscoverCatalogWorkflow",
            WorkflowRequest::TestConnection { .. } => "TestConnectionWorkflow",
            WorkflowRequest::Spec { .. } => "SpecWorkflow",
        }
    }
}

/// Execution status as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
    Canceled,
    Terminated,
    TimedOut,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStatus::Running => write!(f, "RUNNING"),
            ExecutionStatus::Completed => write!(f, "COMPLETED"),
            ExecutionStatus::Failed => write!(f, "FAILED"),
            ExecutionStatus::Canceled => write!(f, "CANCELED"),
            ExecutionStatus::Terminated => write!(f, "TERMINATED"),
            ExecutionStatus::TimedOut => write!(f, "TIMED_OUT"),
        }
    }
}

/// Historical record of one workflow invocation (read-only for the core)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub workflow_id: WorkflowId,
    pub run_id: String,
    pub workflow_type: String,
    pub status: ExecutionStatus,
    pub start_time: DateTime<Utc>,
    pub close_time: Option<DateTime<Utc>>,
    pub attempts: u32,
    pub error: Option<String>,
}

/// Inclusive workflow-id range filter over execution history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionFilter {
    pub from: String,
    pub to: String,
}

impl ExecutionFilter {
    /// All runs of one job: `sync-<p>-<j>` ..= `sync-<p>-<j>-~`
    pub fn for_job(project_id: &str, job_id: JobId) -> Self {
        let base = WorkflowId::for_job(project_id, job_id);
        Self {
            from: base.as_str().to_string(),
            to: format!("{}-~", base),
        }
    }

    pub fn matches(&self, workflow_id: &WorkflowId) -> bool {
        let id = workflow_id.as_str();
        id >= self.from.as_str() && id <= self.to.as_str()
    }

    /// Visibility query string understood by remote engines
    pub fn to_query(&self) -> String {
        format!("WorkflowId between '{}' and '{}'", self.from, self.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_run_id_is_inside_job_range() {
        let base = WorkflowId::for_job("p1", 5);
        let fired = Utc.with_ymd_and_hms(2024, 3, 1, 12, 15, 0).unwrap();
        let run = base.for_run(fired, "run-1");

        assert_eq!(run.as_str(), "sync-p1-5-2024-03-01T12:15:00+00:00-run-1");
        assert!(ExecutionFilter::for_job("p1", 5).matches(&run));
        assert!(ExecutionFilter::for_job("p1", 5).matches(&base));
    }

    #[test]
    fn test_filter_excludes_other_jobs() {
        let filter = ExecutionFilter::for_job("p1", 5);
        assert!(!filter.matches(&WorkflowId::for_job("p1", 6)));
        assert!(!filter.matches(&WorkflowId::for_job("p2", 5)));
        assert!(!filter.matches(&WorkflowId::new("discover-catalog-postgres-1")));
    }

    #[test]
    fn test_filter_query() {
        let filter = ExecutionFilter::for_job("proj", 12);
        assert_eq!(
            filter.to_query(),
            "WorkflowId between 'sync-proj-12' and 'sync-proj-12-~'"
        );
    }

    #[test]
    fn test_operation_ids() {
        assert_eq!(
            WorkflowId::for_operation("test-connection", "mysql", 1700000000, "run-3").as_str(),
            "test-connection-mysql-1700000000-run-3"
        );
    }

    #[test]
    fn test_same_instant_runs_get_distinct_ids() {
        let base = WorkflowId::for_job("p1", 5);
        let fired = Utc.with_ymd_and_hms(2024, 3, 1, 12, 15, 0).unwrap();
        let first = base.for_run(fired, "run-1");
        let second = base.for_run(fired, "run-2");

        assert_ne!(first, second);
        assert!(ExecutionFilter::for_job("p1", 5).matches(&second));
        assert_ne!(
            WorkflowId::for_operation("spec", "postgres", 1, "run-1"),
            WorkflowId::for_operation("spec", "postgres", 1, "run-2")
        );
    }

    #[test]
    fn test_request_serialization() {
        let req = WorkflowRequest::RunSync { job_id: 9 };
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"type":"run_sync","job_id":9}"#);
        assert_eq!(req.workflow_type(), "RunSyncWorkflow");
    }
}
