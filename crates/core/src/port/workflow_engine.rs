// Workflow Engine Port
// Control API of a durable schedule/workflow engine, consumed as a black box

use crate::domain::{
    ExecutionFilter, OverlapPolicy, ScheduleAction, ScheduleDescription, ScheduleId,
    ScheduleSpec, WorkflowExecution, WorkflowId, WorkflowRequest,
};
use async_trait::async_trait;
use thiserror::Error;

/// Options for creating a schedule
#[derive(Debug, Clone)]
pub struct ScheduleOptions {
    pub id: ScheduleId,
    pub spec: ScheduleSpec,
    pub action: ScheduleAction,
    pub overlap: OverlapPolicy,
}

/// Result of a manual trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A run was started with this workflow id
    Started(WorkflowId),
    /// A run was already in flight and the overlap policy dropped the trigger
    Skipped,
}

/// Engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("schedule not found: {0}")]
    NotFound(String),

    #[error("schedule already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid schedule spec: {0}")]
    InvalidSpec(String),

    #[error("workflow {workflow_id} failed: {message}")]
    WorkflowFailed {
        workflow_id: String,
        message: String,
        retryable: bool,
    },

    #[error("engine unavailable: {0}")]
    Unavailable(String),
}

/// Workflow Engine trait
///
/// Implementations:
/// - LocalWorkflowEngine: in-process schedules and activity runtime
#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    /// `None` when no schedule exists under this id
    async fn describe_schedule(
        &self,
        id: &ScheduleId,
    ) -> Result<Option<ScheduleDescription>, EngineError>;

    async fn create_schedule(&self, options: ScheduleOptions) -> Result<(), EngineError>;

    /// Replace the trigger spec only; action and policy stay as created
    async fn update_schedule_spec(
        &self,
        id: &ScheduleId,
        spec: ScheduleSpec,
    ) -> Result<(), EngineError>;

    async fn delete_schedule(&self, id: &ScheduleId) -> Result<(), EngineError>;

    /// Start the schedule's action now, subject to `overlap`
    async fn trigger_schedule(
        &self,
        id: &ScheduleId,
        overlap: OverlapPolicy,
    ) -> Result<TriggerOutcome, EngineError>;

    /// Run a one-off workflow and wait for its result
    async fn execute_workflow(
        &self,
        workflow_id: WorkflowId,
        request: WorkflowRequest,
    ) -> Result<serde_json::Value, EngineError>;

    /// Executions whose workflow id falls in the filter range, newest first
    async fn list_executions(
        &self,
        filter: &ExecutionFilter,
        page_size: usize,
    ) -> Result<Vec<WorkflowExecution>, EngineError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Engine double that records every mutating call.
    ///
    /// `set_running` marks a schedule as having a run in flight so that
    /// skip-overlap triggers can be observed.
    #[derive(Default)]
    pub struct RecordingWorkflowEngine {
        schedules: Mutex<HashMap<ScheduleId, ScheduleDescription>>,
        mutations: Mutex<Vec<String>>,
        executions: Mutex<Vec<WorkflowExecution>>,
        workflow_results: Mutex<Vec<(WorkflowId, WorkflowRequest)>>,
        run_counter: Mutex<u64>,
    }

    impl RecordingWorkflowEngine {
        pub fn new() -> Self {
            Self::default()
        }

        /// Number of create/update/delete/trigger calls that reached the engine
        pub fn mutating_calls(&self) -> usize {
            self.mutations.lock().unwrap().len()
        }

        pub fn mutations(&self) -> Vec<String> {
            self.mutations.lock().unwrap().clone()
        }

        pub fn schedule(&self, id: &ScheduleId) -> Option<ScheduleDescription> {
            self.schedules.lock().unwrap().get(id).cloned()
        }

        pub fn set_running(&self, id: &ScheduleId, running: Option<WorkflowId>) {
            if let Some(s) = self.schedules.lock().unwrap().get_mut(id) {
                s.running = running;
            }
        }

        pub fn push_execution(&self, execution: WorkflowExecution) {
            self.executions.lock().unwrap().push(execution);
        }

        pub fn executed_workflows(&self) -> Vec<(WorkflowId, WorkflowRequest)> {
            self.workflow_results.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.mutations.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl WorkflowEngine for RecordingWorkflowEngine {
        async fn describe_schedule(
            &self,
            id: &ScheduleId,
        ) -> Result<Option<ScheduleDescription>, EngineError> {
            Ok(self.schedules.lock().unwrap().get(id).cloned())
        }

        async fn create_schedule(&self, options: ScheduleOptions) -> Result<(), EngineError> {
            let mut schedules = self.schedules.lock().unwrap();
            if schedules.contains_key(&options.id) {
                return Err(EngineError::AlreadyExists(options.id.to_string()));
            }
            self.record(format!("create {}", options.id));
            schedules.insert(
                options.id.clone(),
                ScheduleDescription {
                    id: options.id,
                    spec: options.spec,
                    action: options.action,
                    overlap: options.overlap,
                    running: None,
                },
            );
            Ok(())
        }

        async fn update_schedule_spec(
            &self,
            id: &ScheduleId,
            spec: ScheduleSpec,
        ) -> Result<(), EngineError> {
            let mut schedules = self.schedules.lock().unwrap();
            let schedule = schedules
                .get_mut(id)
                .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
            self.record(format!("update {}", id));
            schedule.spec = spec;
            Ok(())
        }

        async fn delete_schedule(&self, id: &ScheduleId) -> Result<(), EngineError> {
            let removed = self.schedules.lock().unwrap().remove(id);
            if removed.is_none() {
                return Err(EngineError::NotFound(id.to_string()));
            }
            self.record(format!("delete {}", id));
            Ok(())
        }

        async fn trigger_schedule(
            &self,
            id: &ScheduleId,
            overlap: OverlapPolicy,
        ) -> Result<TriggerOutcome, EngineError> {
            let mut schedules = self.schedules.lock().unwrap();
            let schedule = schedules
                .get_mut(id)
                .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
            self.record(format!("trigger {}", id));

            if overlap == OverlapPolicy::Skip && schedule.running.is_some() {
                return Ok(TriggerOutcome::Skipped);
            }

            let mut counter = self.run_counter.lock().unwrap();
            *counter += 1;
            let run = WorkflowId::new(format!("{}-run{}", schedule.action.workflow_id, *counter));
            schedule.running = Some(run.clone());
            Ok(TriggerOutcome::Started(run))
        }

        async fn execute_workflow(
            &self,
            workflow_id: WorkflowId,
            request: WorkflowRequest,
        ) -> Result<serde_json::Value, EngineError> {
            self.workflow_results
                .lock()
                .unwrap()
                .push((workflow_id.clone(), request));
            Ok(serde_json::json!({ "workflow_id": workflow_id.as_str() }))
        }

        async fn list_executions(
            &self,
            filter: &ExecutionFilter,
            page_size: usize,
        ) -> Result<Vec<WorkflowExecution>, EngineError> {
            let mut matching: Vec<_> = self
                .executions
                .lock()
                .unwrap()
                .iter()
                .filter(|e| filter.matches(&e.workflow_id))
                .cloned()
                .collect();
            matching.sort_by(|a, b| b.start_time.cmp(&a.start_time));
            matching.truncate(page_size);
            Ok(matching)
        }
    }
}
