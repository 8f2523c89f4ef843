// Schedule Domain Model

use serde::{Deserialize, Serialize};

use super::job::JobId;
use super::workflow::{WorkflowId, WorkflowRequest};

/// Schedule identifier: `schedule-<project>-<job>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScheduleId(String);

impl ScheduleId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn for_job(project_id: &str, job_id: JobId) -> Self {
        Self(format!("schedule-{}-{}", project_id, job_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ScheduleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What happens when a schedule fires while its previous run is still going
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverlapPolicy {
    /// Drop the new fire
    Skip,
    AllowAll,
}

impl std::fmt::Display for OverlapPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverlapPolicy::Skip => write!(f, "SKIP"),
            OverlapPolicy::AllowAll => write!(f, "ALLOW_ALL"),
        }
    }
}

/// Trigger spec of a schedule. Jobs only ever use a single expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSpec {
    pub cron_expressions: Vec<String>,
}

impl ScheduleSpec {
    pub fn cron(expr: impl Into<String>) -> Self {
        Self {
            cron_expressions: vec![expr.into()],
        }
    }

    /// True when the spec consists of exactly this one expression
    pub fn is_single(&self, expr: &str) -> bool {
        self.cron_expressions.len() == 1 && self.cron_expressions[0] == expr
    }
}

/// Workflow started on every fire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleAction {
    pub workflow_id: WorkflowId,
    pub request: WorkflowRequest,
    pub task_queue: String,
}

/// Schedule as reported by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleDescription {
    pub id: ScheduleId,
    pub spec: ScheduleSpec,
    pub action: ScheduleAction,
    pub overlap: OverlapPolicy,
    /// Workflow id of the run currently in flight, if any
    pub running: Option<WorkflowId>,
}
