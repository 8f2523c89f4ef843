// Local Workflow Engine
//
// Schedules and execution history live in memory. A tick loop fires due
// schedules; every run is spawned on its own task and tracked until it closes.

use crate::constants::MAX_EXECUTION_HISTORY;
use crate::cron_spec;
use crate::runtime::{RunReport, WorkflowRuntime};
use crate::shutdown::ShutdownToken;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use conduit_core::application::constants::DEFAULT_SCHEDULE_TICK;
use conduit_core::application::ActivityError;
use conduit_core::domain::{
    ExecutionFilter, ExecutionStatus, OverlapPolicy, ScheduleDescription, ScheduleId,
    ScheduleSpec, WorkflowExecution, WorkflowId, WorkflowRequest,
};
use conduit_core::port::{
    cancel_channel, CancelSender, EngineError, IdProvider, ScheduleOptions, TimeProvider,
    TriggerOutcome, WorkflowEngine,
};
use cron::Schedule;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

struct ScheduleEntry {
    options: ScheduleOptions,
    compiled: Vec<Schedule>,
    last_fired: DateTime<Utc>,
    running: Option<WorkflowId>,
}

impl ScheduleEntry {
    fn describe(&self) -> ScheduleDescription {
        ScheduleDescription {
            id: self.options.id.clone(),
            spec: self.options.spec.clone(),
            action: self.options.action.clone(),
            overlap: self.options.overlap,
            running: self.running.clone(),
        }
    }
}

#[derive(Default)]
struct EngineState {
    schedules: HashMap<ScheduleId, ScheduleEntry>,
    executions: VecDeque<WorkflowExecution>,
    in_flight: HashMap<WorkflowId, CancelSender>,
}

struct Shared {
    runtime: WorkflowRuntime,
    time_provider: Arc<dyn TimeProvider>,
    id_provider: Arc<dyn IdProvider>,
    tick_interval: Duration,
    state: Mutex<EngineState>,
}

/// In-process `WorkflowEngine`. Cloning shares the same engine.
#[derive(Clone)]
pub struct LocalWorkflowEngine {
    shared: Arc<Shared>,
}

impl LocalWorkflowEngine {
    pub fn new(
        runtime: WorkflowRuntime,
        time_provider: Arc<dyn TimeProvider>,
        id_provider: Arc<dyn IdProvider>,
    ) -> Self {
        Self::with_tick_interval(runtime, time_provider, id_provider, DEFAULT_SCHEDULE_TICK)
    }

    pub fn with_tick_interval(
        runtime: WorkflowRuntime,
        time_provider: Arc<dyn TimeProvider>,
        id_provider: Arc<dyn IdProvider>,
        tick_interval: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                runtime,
                time_provider,
                id_provider,
                tick_interval,
                state: Mutex::new(EngineState::default()),
            }),
        }
    }

    /// Run the tick loop until `shutdown`, then cancel in-flight runs
    pub fn start(&self, mut shutdown: ShutdownToken) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            info!(
                tick_interval_ms = %engine.shared.tick_interval.as_millis(),
                "Local workflow engine started"
            );
            let mut ticker = tokio::time::interval(engine.shared.tick_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        engine.tick().await;
                    }
                    _ = shutdown.wait() => {
                        info!("Local workflow engine shutting down");
                        break;
                    }
                }
            }
            engine.stop_all().await;
        })
    }

    /// Fire every schedule with a cron time in `(last_fired, now]`.
    ///
    /// Returns the workflow ids of the runs started.
    pub async fn tick(&self) -> Vec<WorkflowId> {
        let now = self.shared.time_provider.now();
        let mut state = self.shared.state.lock().await;

        let due: Vec<ScheduleId> = state
            .schedules
            .iter()
            .filter(|(_, entry)| cron_spec::is_due(&entry.compiled, entry.last_fired, now))
            .map(|(id, _)| id.clone())
            .collect();

        let mut started = Vec::new();
        for id in due {
            let Some(entry) = state.schedules.get_mut(&id) else {
                continue;
            };
            entry.last_fired = now;

            if entry.running.is_some() && entry.options.overlap == OverlapPolicy::Skip {
                info!(
                    schedule_id = %id,
                    running = ?entry.running,
                    "Schedule fired while a run is in flight, skipping"
                );
                continue;
            }

            let run_id = self.shared.id_provider.generate_id();
            let workflow_id = entry.options.action.workflow_id.for_run(now, &run_id);
            let request = entry.options.action.request.clone();
            match self.launch(
                &mut state,
                workflow_id.clone(),
                run_id,
                request,
                Some(id.clone()),
            ) {
                Ok(_) => {
                    if let Some(entry) = state.schedules.get_mut(&id) {
                        entry.running = Some(workflow_id.clone());
                    }
                    info!(schedule_id = %id, workflow_id = %workflow_id, "Schedule fired");
                    started.push(workflow_id);
                }
                Err(e) => {
                    warn!(schedule_id = %id, error = %e, "Failed to start scheduled run");
                }
            }
        }
        started
    }

    /// Cancel every in-flight run
    pub async fn stop_all(&self) {
        let state = self.shared.state.lock().await;
        for (workflow_id, cancel) in state.in_flight.iter() {
            info!(workflow_id = %workflow_id, "Cancelling in-flight run");
            cancel.cancel();
        }
    }

    pub async fn in_flight(&self) -> usize {
        self.shared.state.lock().await.in_flight.len()
    }

    /// Wait until no run is in flight. Returns false on timeout.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let poll = async {
            while self.in_flight().await > 0 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        };
        tokio::time::timeout(timeout, poll).await.is_ok()
    }

    /// Register and spawn a run. The caller holds the state lock.
    fn launch(
        &self,
        state: &mut EngineState,
        workflow_id: WorkflowId,
        run_id: String,
        request: WorkflowRequest,
        schedule: Option<ScheduleId>,
    ) -> Result<JoinHandle<RunReport>, EngineError> {
        if state.in_flight.contains_key(&workflow_id) {
            return Err(EngineError::AlreadyExists(format!(
                "workflow {} is already running",
                workflow_id
            )));
        }

        let (cancel_tx, stop) = cancel_channel();
        state.in_flight.insert(workflow_id.clone(), cancel_tx);

        state.executions.push_back(WorkflowExecution {
            workflow_id: workflow_id.clone(),
            run_id: run_id.clone(),
            workflow_type: request.workflow_type().to_string(),
            status: ExecutionStatus::Running,
            start_time: self.shared.time_provider.now(),
            close_time: None,
            attempts: 0,
            error: None,
        });
        while state.executions.len() > MAX_EXECUTION_HISTORY {
            state.executions.pop_front();
        }

        debug!(workflow_id = %workflow_id, run_id = %run_id, "Run registered");

        let shared = Arc::clone(&self.shared);
        let run_workflow_id = workflow_id.clone();
        let run = tokio::spawn(async move {
            shared.runtime.run(&run_workflow_id, &request, stop).await
        });

        let shared = Arc::clone(&self.shared);
        Ok(tokio::spawn(async move {
            let report = match run.await {
                Ok(report) => report,
                Err(join_err) => {
                    error!(workflow_id = %workflow_id, error = %join_err, "Workflow task panicked");
                    RunReport {
                        result: Err(ActivityError::Panicked(join_err.to_string())),
                        attempts: 1,
                    }
                }
            };
            shared
                .finish(&workflow_id, &run_id, schedule.as_ref(), &report)
                .await;
            report
        }))
    }
}

impl Shared {
    async fn finish(
        &self,
        workflow_id: &WorkflowId,
        run_id: &str,
        schedule: Option<&ScheduleId>,
        report: &RunReport,
    ) {
        let close_time = self.time_provider.now();
        let mut state = self.state.lock().await;
        state.in_flight.remove(workflow_id);

        if let Some(execution) = state.executions.iter_mut().find(|e| e.run_id == run_id) {
            execution.status = report.status();
            execution.close_time = Some(close_time);
            execution.attempts = report.attempts;
            execution.error = report.result.as_ref().err().map(|e| e.to_string());
        }

        if let Some(entry) = schedule.and_then(|id| state.schedules.get_mut(id)) {
            if entry.running.as_ref() == Some(workflow_id) {
                entry.running = None;
            }
        }

        info!(
            workflow_id = %workflow_id,
            run_id = %run_id,
            status = %report.status(),
            attempts = %report.attempts,
            "Run closed"
        );
    }
}

#[async_trait]
impl WorkflowEngine for LocalWorkflowEngine {
    async fn describe_schedule(
        &self,
        id: &ScheduleId,
    ) -> Result<Option<ScheduleDescription>, EngineError> {
        let state = self.shared.state.lock().await;
        Ok(state.schedules.get(id).map(ScheduleEntry::describe))
    }

    async fn create_schedule(&self, options: ScheduleOptions) -> Result<(), EngineError> {
        let compiled = cron_spec::parse_spec(&options.spec)?;
        let mut state = self.shared.state.lock().await;
        if state.schedules.contains_key(&options.id) {
            return Err(EngineError::AlreadyExists(options.id.to_string()));
        }

        info!(
            schedule_id = %options.id,
            cron = ?options.spec.cron_expressions,
            overlap = %options.overlap,
            task_queue = %options.action.task_queue,
            "Schedule created"
        );
        state.schedules.insert(
            options.id.clone(),
            ScheduleEntry {
                options,
                compiled,
                last_fired: self.shared.time_provider.now(),
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
        let compiled = cron_spec::parse_spec(&spec)?;
        let mut state = self.shared.state.lock().await;
        let entry = state
            .schedules
            .get_mut(id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;

        info!(
            schedule_id = %id,
            from = ?entry.options.spec.cron_expressions,
            to = ?spec.cron_expressions,
            "Schedule spec updated"
        );
        entry.options.spec = spec;
        entry.compiled = compiled;
        Ok(())
    }

    async fn delete_schedule(&self, id: &ScheduleId) -> Result<(), EngineError> {
        let mut state = self.shared.state.lock().await;
        let removed = state
            .schedules
            .remove(id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;

        if let Some(running) = removed.running {
            info!(schedule_id = %id, workflow_id = %running, "Schedule deleted, in-flight run continues");
        } else {
            info!(schedule_id = %id, "Schedule deleted");
        }
        Ok(())
    }

    async fn trigger_schedule(
        &self,
        id: &ScheduleId,
        overlap: OverlapPolicy,
    ) -> Result<TriggerOutcome, EngineError> {
        let now = self.shared.time_provider.now();
        let mut state = self.shared.state.lock().await;
        let entry = state
            .schedules
            .get(id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;

        if entry.running.is_some() && overlap == OverlapPolicy::Skip {
            info!(
                schedule_id = %id,
                running = ?entry.running,
                "Trigger dropped, a run is already in flight"
            );
            return Ok(TriggerOutcome::Skipped);
        }

        let run_id = self.shared.id_provider.generate_id();
        let workflow_id = entry.options.action.workflow_id.for_run(now, &run_id);
        let request = entry.options.action.request.clone();
        self.launch(
            &mut state,
            workflow_id.clone(),
            run_id,
            request,
            Some(id.clone()),
        )?;
        if let Some(entry) = state.schedules.get_mut(id) {
            entry.running = Some(workflow_id.clone());
        }

        info!(schedule_id = %id, workflow_id = %workflow_id, "Schedule triggered");
        Ok(TriggerOutcome::Started(workflow_id))
    }

    async fn execute_workflow(
        &self,
        workflow_id: WorkflowId,
        request: WorkflowRequest,
    ) -> Result<serde_json::Value, EngineError> {
        let handle = {
            let mut state = self.shared.state.lock().await;
            let run_id = self.shared.id_provider.generate_id();
            self.launch(&mut state, workflow_id.clone(), run_id, request, None)?
        };

        let report = handle
            .await
            .map_err(|e| EngineError::Unavailable(e.to_string()))?;

        report.result.map_err(|e| EngineError::WorkflowFailed {
            workflow_id: workflow_id.to_string(),
            message: e.to_string(),
            retryable: e.is_retryable(),
        })
    }

    async fn list_executions(
        &self,
        filter: &ExecutionFilter,
        page_size: usize,
    ) -> Result<Vec<WorkflowExecution>, EngineError> {
        let state = self.shared.state.lock().await;
        // Newer records sit at the back; the stable sort keeps that order on ties
        let mut matching: Vec<WorkflowExecution> = state
            .executions
            .iter()
            .rev()
            .filter(|e| filter.matches(&e.workflow_id))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        if page_size > 0 {
            matching.truncate(page_size);
        }
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::shutdown_channel;
    use conduit_core::application::{Activities, RetryPolicy};
    use conduit_core::domain::{ConnectorParams, ScheduleAction, SyncJob};
    use conduit_core::port::connector_runner::mocks::{MockBehavior, MockConnectorRunner};
    use conduit_core::port::id_provider::mocks::SequentialIdProvider;
    use conduit_core::port::job_repository::mocks::InMemoryJobRepository;
    use conduit_core::port::time_provider::mocks::FixedTimeProvider;
    use conduit_core::port::{ConnectorRunner, JobRepository};
    use serde_json::json;

    // 2024-03-01T12:00:00Z
    const NOON: i64 = 1_709_294_400_000;
    const MINUTE: i64 = 60_000;

    struct Harness {
        engine: LocalWorkflowEngine,
        runner: Arc<MockConnectorRunner>,
        repo: Arc<InMemoryJobRepository>,
        time: Arc<FixedTimeProvider>,
    }

    fn harness(behavior: MockBehavior) -> Harness {
        let runner = Arc::new(MockConnectorRunner::new(behavior));
        let repo = Arc::new(InMemoryJobRepository::with_job(SyncJob::new_test(
            7,
            "p1",
            "15-minutes",
        )));
        let time = Arc::new(FixedTimeProvider::new(NOON));

        let runner_port: Arc<dyn ConnectorRunner> = runner.clone();
        let repo_port: Arc<dyn JobRepository> = repo.clone();
        let activities = Activities::new(runner_port, repo_port, time.clone());
        let runtime = WorkflowRuntime::new(Arc::new(activities), RetryPolicy::default());
        let engine = LocalWorkflowEngine::new(
            runtime,
            time.clone(),
            Arc::new(SequentialIdProvider::default()),
        );

        Harness {
            engine,
            runner,
            repo,
            time,
        }
    }

    fn job_schedule(cron: &str) -> ScheduleOptions {
        ScheduleOptions {
            id: ScheduleId::for_job("p1", 7),
            spec: ScheduleSpec::cron(cron),
            action: ScheduleAction {
                workflow_id: WorkflowId::for_job("p1", 7),
                request: WorkflowRequest::RunSync { job_id: 7 },
                task_queue: "test-queue".to_string(),
            },
            overlap: OverlapPolicy::Skip,
        }
    }

    #[tokio::test]
    async fn test_create_describe_delete() {
        let h = harness(MockBehavior::Success(json!({})));
        let id = ScheduleId::for_job("p1", 7);

        assert!(h.engine.describe_schedule(&id).await.unwrap().is_none());
        h.engine
            .create_schedule(job_schedule("*/15 * * * *"))
            .await
            .unwrap();

        let desc = h.engine.describe_schedule(&id).await.unwrap().unwrap();
        assert!(desc.spec.is_single("*/15 * * * *"));
        assert_eq!(desc.overlap, OverlapPolicy::Skip);
        assert!(desc.running.is_none());

        let dup = h.engine.create_schedule(job_schedule("*/15 * * * *")).await;
        assert!(matches!(dup, Err(EngineError::AlreadyExists(_))));

        h.engine.delete_schedule(&id).await.unwrap();
        assert!(h.engine.describe_schedule(&id).await.unwrap().is_none());
        assert!(matches!(
            h.engine.delete_schedule(&id).await,
            Err(EngineError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_cron_rejected() {
        let h = harness(MockBehavior::Success(json!({})));
        let err = h.engine.create_schedule(job_schedule("not a cron")).await;
        assert!(matches!(err, Err(EngineError::InvalidSpec(_))));

        h.engine
            .create_schedule(job_schedule("*/15 * * * *"))
            .await
            .unwrap();
        let err = h
            .engine
            .update_schedule_spec(&ScheduleId::for_job("p1", 7), ScheduleSpec::cron(""))
            .await;
        assert!(matches!(err, Err(EngineError::InvalidSpec(_))));
    }

    #[tokio::test]
    async fn test_update_spec_only() {
        let h = harness(MockBehavior::Success(json!({})));
        let id = ScheduleId::for_job("p1", 7);
        h.engine
            .create_schedule(job_schedule("*/15 * * * *"))
            .await
            .unwrap();

        h.engine
            .update_schedule_spec(&id, ScheduleSpec::cron("0 */2 * * *"))
            .await
            .unwrap();
        let desc = h.engine.describe_schedule(&id).await.unwrap().unwrap();
        assert!(desc.spec.is_single("0 */2 * * *"));
        assert_eq!(desc.action.request, WorkflowRequest::RunSync { job_id: 7 });

        let missing = h
            .engine
            .update_schedule_spec(&ScheduleId::new("schedule-p1-99"), ScheduleSpec::cron("* * * * *"))
            .await;
        assert!(matches!(missing, Err(EngineError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_tick_fires_due_schedule_once() {
        let h = harness(MockBehavior::Success(json!({"cursor": 1})));
        h.engine
            .create_schedule(job_schedule("*/15 * * * *"))
            .await
            .unwrap();

        // Nothing due yet
        h.time.advance(10 * MINUTE);
        assert!(h.engine.tick().await.is_empty());

        h.time.advance(5 * MINUTE);
        let started = h.engine.tick().await;
        assert_eq!(started.len(), 1);
        assert!(started[0].as_str().starts_with("sync-p1-7-2024-03-01T12:15:00"));
        assert!(h.engine.drain(Duration::from_secs(5)).await);

        // Same instant again: already fired
        assert!(h.engine.tick().await.is_empty());

        let history = h
            .engine
            .list_executions(&ExecutionFilter::for_job("p1", 7), 10)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, ExecutionStatus::Completed);
        assert_eq!(history[0].attempts, 1);
        assert_eq!(h.repo.get(7).unwrap().state, r#"{"cursor":1}"#);
    }

    #[tokio::test]
    async fn test_skip_overlap_drops_concurrent_triggers() {
        let h = harness(MockBehavior::Slow(Duration::from_secs(3600), json!({})));
        let id = ScheduleId::for_job("p1", 7);
        h.engine
            .create_schedule(job_schedule("*/15 * * * *"))
            .await
            .unwrap();

        let first = h
            .engine
            .trigger_schedule(&id, OverlapPolicy::Skip)
            .await
            .unwrap();
        assert!(matches!(first, TriggerOutcome::Started(_)));

        h.time.advance(MINUTE);
        let second = h
            .engine
            .trigger_schedule(&id, OverlapPolicy::Skip)
            .await
            .unwrap();
        assert_eq!(second, TriggerOutcome::Skipped);

        // A cron fire during the run is dropped too
        h.time.advance(15 * MINUTE);
        assert!(h.engine.tick().await.is_empty());

        let history = h
            .engine
            .list_executions(&ExecutionFilter::for_job("p1", 7), 10)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, ExecutionStatus::Running);

        h.engine.stop_all().await;
        assert!(h.engine.drain(Duration::from_secs(5)).await);
        let history = h
            .engine
            .list_executions(&ExecutionFilter::for_job("p1", 7), 10)
            .await
            .unwrap();
        assert_eq!(history[0].status, ExecutionStatus::Canceled);
        assert!(h
            .engine
            .describe_schedule(&id)
            .await
            .unwrap()
            .unwrap()
            .running
            .is_none());
    }

    #[tokio::test]
    async fn test_trigger_missing_schedule() {
        let h = harness(MockBehavior::Success(json!({})));
        let err = h
            .engine
            .trigger_schedule(&ScheduleId::for_job("p1", 7), OverlapPolicy::Skip)
            .await;
        assert!(matches!(err, Err(EngineError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_back_to_back_triggers_get_distinct_ids() {
        let h = harness(MockBehavior::Success(json!({})));
        let id = ScheduleId::for_job("p1", 7);
        h.engine
            .create_schedule(job_schedule("*/15 * * * *"))
            .await
            .unwrap();

        // Both triggers happen at the same instant, the first run already closed
        let TriggerOutcome::Started(first) = h
            .engine
            .trigger_schedule(&id, OverlapPolicy::Skip)
            .await
            .unwrap()
        else {
            panic!("first trigger skipped");
        };
        assert!(h.engine.drain(Duration::from_secs(5)).await);
        let TriggerOutcome::Started(second) = h
            .engine
            .trigger_schedule(&id, OverlapPolicy::Skip)
            .await
            .unwrap()
        else {
            panic!("second trigger skipped");
        };
        assert!(h.engine.drain(Duration::from_secs(5)).await);

        assert_ne!(first, second);
        assert!(first.as_str().ends_with("-run-1"));
        assert!(second.as_str().ends_with("-run-2"));

        let history = h
            .engine
            .list_executions(&ExecutionFilter::for_job("p1", 7), 0)
            .await
            .unwrap();
        assert_eq!(history.len(), 2);
        assert!(history
            .iter()
            .all(|e| e.workflow_id.as_str().ends_with(&e.run_id)));
        assert_eq!(h.runner.sync_invocations().len(), 2);
        assert_ne!(
            h.runner.sync_invocations()[0].execution_id,
            h.runner.sync_invocations()[1].execution_id
        );
    }

    #[tokio::test]
    async fn test_execute_workflow_returns_result() {
        let h = harness(MockBehavior::Success(json!({"connectionSpecification": {}})));
        let value = h
            .engine
            .execute_workflow(
                WorkflowId::new("spec-postgres-1709294400"),
                WorkflowRequest::Spec {
                    connector_type: "postgres".to_string(),
                    version: "v1".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(value, json!({"connectionSpecification": {}}));
        assert_eq!(h.engine.in_flight().await, 0);
    }

    #[tokio::test]
    async fn test_execute_workflow_failure_is_classified() {
        let h = harness(MockBehavior::NoConnectionStatus);
        let err = h
            .engine
            .execute_workflow(
                WorkflowId::new("test-connection-postgres-1"),
                WorkflowRequest::TestConnection {
                    params: ConnectorParams::new("postgres", "v1", "{}"),
                },
            )
            .await
            .unwrap_err();

        match err {
            EngineError::WorkflowFailed {
                message, retryable, ..
            } => {
                assert!(message.contains("connection status not found"));
                assert!(retryable);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(h.runner.call_count(), 1);
    }

    #[tokio::test]
    async fn test_list_executions_newest_first() {
        let h = harness(MockBehavior::Success(json!({})));
        let id = ScheduleId::for_job("p1", 7);
        h.engine
            .create_schedule(job_schedule("*/15 * * * *"))
            .await
            .unwrap();

        for _ in 0..3 {
            h.engine
                .trigger_schedule(&id, OverlapPolicy::Skip)
                .await
                .unwrap();
            assert!(h.engine.drain(Duration::from_secs(5)).await);
            h.time.advance(MINUTE);
        }
        // Another job's run must not leak into the range
        h.engine
            .execute_workflow(
                WorkflowId::new("sync-p1-70"),
                WorkflowRequest::Spec {
                    connector_type: "x".to_string(),
                    version: "v".to_string(),
                },
            )
            .await
            .unwrap();

        let all = h
            .engine
            .list_executions(&ExecutionFilter::for_job("p1", 7), 0)
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
        assert!(all[0].start_time > all[1].start_time);
        assert!(all[1].start_time > all[2].start_time);

        let last = h
            .engine
            .list_executions(&ExecutionFilter::for_job("p1", 7), 1)
            .await
            .unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].run_id, all[0].run_id);
    }

    #[tokio::test]
    async fn test_shutdown_stops_loop_and_cancels_runs() {
        let h = harness(MockBehavior::Slow(Duration::from_secs(3600), json!({})));
        let id = ScheduleId::for_job("p1", 7);
        h.engine
            .create_schedule(job_schedule("*/15 * * * *"))
            .await
            .unwrap();
        h.engine
            .trigger_schedule(&id, OverlapPolicy::Skip)
            .await
            .unwrap();

        let (tx, token) = shutdown_channel();
        let handle = h.engine.start(token);
        tx.shutdown();
        handle.await.unwrap();

        assert!(h.engine.drain(Duration::from_secs(5)).await);
        let history = h
            .engine
            .list_executions(&ExecutionFilter::for_job("p1", 7), 1)
            .await
            .unwrap();
        assert_eq!(history[0].status, ExecutionStatus::Canceled);
    }
}
