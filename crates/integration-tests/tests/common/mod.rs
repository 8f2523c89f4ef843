//! Shared wiring for integration tests: SQLite (in memory, encrypted
//! configs), the local engine and a caller-supplied connector runner.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use conduit_core::application::constants::DOCKER_TASK_QUEUE;
use conduit_core::application::{Activities, ConnectorService, RetryPolicy, SyncCoordinator};
use conduit_core::domain::{JobId, SyncJob};
use conduit_core::port::id_provider::mocks::SequentialIdProvider;
use conduit_core::port::time_provider::mocks::FixedTimeProvider;
use conduit_core::port::{
    ConnectorRunner, IdProvider, JobRepository, TimeProvider, WorkflowEngine,
};
use conduit_engine_local::{LocalWorkflowEngine, WorkflowRuntime};
use conduit_infra_crypto::SecretCodec;
use conduit_infra_sqlite::{create_pool, run_migrations, SqliteJobRepository};

/// 2024-03-01 12:00:00 UTC
pub const NOON: i64 = 1_709_294_400_000;
pub const PROJECT: &str = "p1";

pub struct Stack {
    pub engine: LocalWorkflowEngine,
    pub coordinator: SyncCoordinator,
    pub connectors: ConnectorService,
    pub repo: Arc<SqliteJobRepository>,
    pub time: Arc<FixedTimeProvider>,
    pub job_id: JobId,
    pub source_id: i64,
}

impl Stack {
    pub async fn job(&self) -> SyncJob {
        self.repo.get_by_id(self.job_id).await.unwrap()
    }

    /// Wait for every spawned run to close
    pub async fn settle(&self) {
        assert!(
            self.engine.drain(Duration::from_secs(10)).await,
            "runs still in flight"
        );
    }
}

/// Build the full stack around `runner` and store one job with `frequency`
pub async fn stack(runner: Arc<dyn ConnectorRunner>, frequency: &str) -> Stack {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();

    let time = Arc::new(FixedTimeProvider::new(NOON));
    let time_port: Arc<dyn TimeProvider> = time.clone();

    let repo = Arc::new(SqliteJobRepository::new(
        pool,
        SecretCodec::local("integration-secret"),
        time_port.clone(),
    ));

    let mut job = SyncJob::new_test(0, PROJECT, frequency);
    job.source.id = repo.insert_source(&job.source, PROJECT).await.unwrap();
    job.destination.id = repo
        .insert_destination(&job.destination, PROJECT)
        .await
        .unwrap();
    let job_id = repo.insert_job(&job).await.unwrap();

    let repo_port: Arc<dyn JobRepository> = repo.clone();
    let activities = Activities::new(runner, repo_port, time_port.clone());
    let runtime = WorkflowRuntime::new(Arc::new(activities), RetryPolicy::default());
    let ids: Arc<dyn IdProvider> = Arc::new(SequentialIdProvider::default());
    let engine = LocalWorkflowEngine::new(runtime, time_port.clone(), ids.clone());

    let engine_port: Arc<dyn WorkflowEngine> = Arc::new(engine.clone());
    Stack {
        coordinator: SyncCoordinator::new(engine_port.clone(), DOCKER_TASK_QUEUE),
        connectors: ConnectorService::new(engine_port, time_port, ids),
        engine,
        repo,
        time,
        job_id,
        source_id: job.source.id,
    }
}
