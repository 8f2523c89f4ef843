// Schedule/Workflow Coordinator
//
// Turns job-management actions into schedule operations on the engine.
// Every schedule uses overlap "skip", so a job never has two runs in flight.

use crate::application::constants::LAST_RUN_PAGE_SIZE;
use crate::domain::{
    to_cron, ExecutionFilter, ExecutionStatus, JobId, OverlapPolicy, ScheduleAction, ScheduleId,
    ScheduleSpec, WorkflowId, WorkflowRequest,
};
use crate::error::{AppError, Result};
use crate::port::{EngineError, ScheduleOptions, TriggerOutcome, WorkflowEngine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

/// Job-management action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Create,
    Update,
    Delete,
    Trigger,
}

impl FromStr for SyncAction {
    type Err = AppError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "create" => Ok(SyncAction::Create),
            "update" => Ok(SyncAction::Update),
            "delete" => Ok(SyncAction::Delete),
            "trigger" | "sync" => Ok(SyncAction::Trigger),
            other => Err(AppError::Validation(format!("unknown sync action: {}", other))),
        }
    }
}

impl std::fmt::Display for SyncAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncAction::Create => write!(f, "create"),
            SyncAction::Update => write!(f, "update"),
            SyncAction::Delete => write!(f, "delete"),
            SyncAction::Trigger => write!(f, "trigger"),
        }
    }
}

/// What a job-management action did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    Created { schedule_id: String, cron: String },
    Updated { schedule_id: String, cron: String },
    AlreadyUpToDate { schedule_id: String, cron: String },
    Deleted { schedule_id: String },
    Triggered { schedule_id: String, workflow_id: String },
    TriggerSkipped { schedule_id: String },
}

impl SyncOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            SyncOutcome::Created { .. } => "sync schedule created successfully",
            SyncOutcome::Updated { .. } => "sync schedule updated successfully",
            SyncOutcome::AlreadyUpToDate { .. } => "sync schedule already up to date",
            SyncOutcome::Deleted { .. } => "sync schedule deleted successfully",
            SyncOutcome::Triggered { .. } => "sync triggered successfully",
            SyncOutcome::TriggerSkipped { .. } => "sync already running, trigger skipped",
        }
    }
}

/// Most recent run of a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastRun {
    pub workflow_id: String,
    pub start_time: DateTime<Utc>,
    pub status: ExecutionStatus,
}

pub struct SyncCoordinator {
    engine: Arc<dyn WorkflowEngine>,
    task_queue: String,
}

impl SyncCoordinator {
    pub fn new(engine: Arc<dyn WorkflowEngine>, task_queue: impl Into<String>) -> Self {
        Self {
            engine,
            task_queue: task_queue.into(),
        }
    }

    /// Apply a job-management action to the job's schedule
    pub async fn manage_sync(
        &self,
        project_id: &str,
        job_id: JobId,
        frequency: &str,
        action: SyncAction,
    ) -> Result<SyncOutcome> {
        let schedule_id = ScheduleId::for_job(project_id, job_id);
        info!(
            schedule_id = %schedule_id,
            action = %action,
            frequency = %frequency,
            "Managing sync schedule"
        );

        match action {
            SyncAction::Create => self.create(project_id, job_id, &schedule_id, frequency).await,
            SyncAction::Update => self.update(&schedule_id, frequency).await,
            SyncAction::Delete => self.delete(&schedule_id).await,
            SyncAction::Trigger => self.trigger(project_id, job_id, &schedule_id, frequency).await,
        }
    }

    async fn create(
        &self,
        project_id: &str,
        job_id: JobId,
        schedule_id: &ScheduleId,
        frequency: &str,
    ) -> Result<SyncOutcome> {
        let cron = cron_for(frequency)?;

        if self.engine.describe_schedule(schedule_id).await?.is_some() {
            return Err(AppError::Conflict("schedule already exists".to_string()));
        }

        let options = ScheduleOptions {
            id: schedule_id.clone(),
            spec: ScheduleSpec::cron(cron.clone()),
            action: ScheduleAction {
                workflow_id: WorkflowId::for_job(project_id, job_id),
                request: WorkflowRequest::RunSync { job_id },
                task_queue: self.task_queue.clone(),
            },
            overlap: OverlapPolicy::Skip,
        };

        match self.engine.create_schedule(options).await {
            Ok(()) => {}
            // Lost a race with a concurrent create
            Err(EngineError::AlreadyExists(_)) => {
                return Err(AppError::Conflict("schedule already exists".to_string()))
            }
            Err(e) => return Err(e.into()),
        }

        info!(schedule_id = %schedule_id, cron = %cron, "Sync schedule created");
        Ok(SyncOutcome::Created {
            schedule_id: schedule_id.to_string(),
            cron,
        })
    }

    async fn update(&self, schedule_id: &ScheduleId, frequency: &str) -> Result<SyncOutcome> {
        let current = self
            .engine
            .describe_schedule(schedule_id)
            .await?
            .ok_or_else(|| AppError::Conflict("schedule does not exist".to_string()))?;

        let cron = cron_for(frequency)?;

        if current.spec.is_single(&cron) {
            info!(schedule_id = %schedule_id, cron = %cron, "Schedule already up to date");
            return Ok(SyncOutcome::AlreadyUpToDate {
                schedule_id: schedule_id.to_string(),
                cron,
            });
        }

        self.engine
            .update_schedule_spec(schedule_id, ScheduleSpec::cron(cron.clone()))
            .await?;

        info!(schedule_id = %schedule_id, cron = %cron, "Sync schedule updated");
        Ok(SyncOutcome::Updated {
            schedule_id: schedule_id.to_string(),
            cron,
        })
    }

    async fn delete(&self, schedule_id: &ScheduleId) -> Result<SyncOutcome> {
        match self.engine.delete_schedule(schedule_id).await {
            Ok(()) => {}
            Err(EngineError::NotFound(_)) => {
                return Err(AppError::NotFound(format!("schedule {}", schedule_id)))
            }
            Err(e) => return Err(e.into()),
        }

        info!(schedule_id = %schedule_id, "Sync schedule deleted");
        Ok(SyncOutcome::Deleted {
            schedule_id: schedule_id.to_string(),
        })
    }

    async fn trigger(
        &self,
        project_id: &str,
        job_id: JobId,
        schedule_id: &ScheduleId,
        frequency: &str,
    ) -> Result<SyncOutcome> {
        if self.engine.describe_schedule(schedule_id).await?.is_none() {
            if frequency.trim().is_empty() {
                return Err(AppError::Validation(
                    "cannot run immediately without a schedule - frequency must be specified or existing schedule must be present"
                        .to_string(),
                ));
            }
            self.create(project_id, job_id, schedule_id, frequency)
                .await?;
        }

        match self
            .engine
            .trigger_schedule(schedule_id, OverlapPolicy::Skip)
            .await?
        {
            TriggerOutcome::Started(workflow_id) => {
                info!(schedule_id = %schedule_id, workflow_id = %workflow_id, "Sync triggered");
                Ok(SyncOutcome::Triggered {
                    schedule_id: schedule_id.to_string(),
                    workflow_id: workflow_id.to_string(),
                })
            }
            TriggerOutcome::Skipped => {
                warn!(schedule_id = %schedule_id, "Sync already running, trigger skipped");
                Ok(SyncOutcome::TriggerSkipped {
                    schedule_id: schedule_id.to_string(),
                })
            }
        }
    }

    /// Most recent execution of the job, if it ever ran
    pub async fn last_run(&self, project_id: &str, job_id: JobId) -> Result<Option<LastRun>> {
        let filter = ExecutionFilter::for_job(project_id, job_id);
        let executions = self
            .engine
            .list_executions(&filter, LAST_RUN_PAGE_SIZE)
            .await?;

        Ok(executions.into_iter().next().map(|e| LastRun {
            workflow_id: e.workflow_id.to_string(),
            start_time: e.start_time,
            status: e.status,
        }))
    }
}

fn cron_for(frequency: &str) -> Result<String> {
    if frequency.trim().is_empty() {
        return Err(AppError::Validation("frequency is required".to_string()));
    }
    let cron = to_cron(frequency);
    if cron.is_empty() {
        return Err(AppError::Validation(format!(
            "invalid frequency: {:?}",
            frequency
        )));
    }
    Ok(cron)
}
