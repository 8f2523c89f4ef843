//! Conduit Worker - Main Entry Point
//!
//! Composition root: settings, storage, crypto, connector runner, local
//! engine and the JSON-RPC server.

mod logging;
mod settings;
mod telemetry;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use conduit_api_rpc::rate_limiter::RateLimiter;
use conduit_api_rpc::{RpcHandler, RpcServer, RpcServerConfig};
use conduit_core::application::constants::GRACEFUL_SHUTDOWN_TIMEOUT_MS;
use conduit_core::application::{
    Activities, ConnectorService, RetryPolicy, SyncCoordinator,
};
use conduit_core::config::Settings;
use conduit_core::port::id_provider::UuidProvider;
use conduit_core::port::time_provider::SystemTimeProvider;
use conduit_core::port::{
    ConnectorRunner, IdProvider, JobRepository, TimeProvider, WorkflowEngine,
};
use conduit_engine_local::{shutdown_channel, LocalWorkflowEngine, WorkflowRuntime};
use conduit_infra_crypto::{KmsApi, SecretCodec};
use conduit_infra_sqlite::{create_pool, run_migrations, SqliteJobRepository};
use conduit_infra_system::{DockerRunner, DockerRunnerConfig};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Configuration and logging
    let settings = settings::load()?;
    let _log_guard = logging::init(&settings.log)?;

    info!(version = %VERSION, "Conduit worker starting");

    // 2. Storage
    if let Some(path) = settings::sqlite_file(&settings.database_url) {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create database directory {}", parent.display()))?;
        }
    }
    info!(database_url = %settings.database_url, "Initializing database");
    let pool = create_pool(&settings.database_url)
        .await
        .context("DB pool creation failed")?;
    run_migrations(&pool).await.context("Migration failed")?;

    // 3. DI wiring
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let id_provider: Arc<dyn IdProvider> = Arc::new(UuidProvider);

    let codec = SecretCodec::from_secret(&settings.secret_key, kms_client(&settings).await)
        .context("invalid secret key configuration")?;
    let job_repo: Arc<dyn JobRepository> = Arc::new(SqliteJobRepository::new(
        pool.clone(),
        codec,
        time_provider.clone(),
    ));

    let runner: Arc<dyn ConnectorRunner> =
        Arc::new(DockerRunner::new(DockerRunnerConfig::from(&settings.runner)));
    let activities = Arc::new(Activities::new(
        runner,
        job_repo.clone(),
        time_provider.clone(),
    ));
    let runtime = WorkflowRuntime::new(activities, RetryPolicy::from(&settings.engine.retry));
    let engine = LocalWorkflowEngine::with_tick_interval(
        runtime,
        time_provider.clone(),
        id_provider.clone(),
        settings.engine.schedule_tick(),
    );
    let engine_port: Arc<dyn WorkflowEngine> = Arc::new(engine.clone());

    let handler = RpcHandler::new(
        job_repo,
        Arc::new(SyncCoordinator::new(
            engine_port.clone(),
            settings.engine.task_queue.clone(),
        )),
        Arc::new(ConnectorService::new(
            engine_port,
            time_provider.clone(),
            id_provider,
        )),
        time_provider,
        RateLimiter::new(settings.rpc.rate_limit_burst, settings.rpc.rate_limit_per_sec),
    );

    // 4. JSON-RPC server
    let rpc_handle = RpcServer::new(RpcServerConfig::from(&settings.rpc), Arc::new(handler))
        .start()
        .await
        .context("RPC server start failed")?;

    // 5. Engine tick loop
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let engine_handle = engine.start(shutdown_rx);

    info!(
        rpc_addr = %settings.rpc.addr(),
        task_queue = %settings.engine.task_queue,
        "System ready. Press Ctrl+C to shutdown"
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    // 6. Graceful shutdown: stop intake, cancel runs, wait for them to close
    rpc_handle.stop().context("RPC server stop failed")?;
    shutdown_tx.shutdown();
    let grace = Duration::from_millis(GRACEFUL_SHUTDOWN_TIMEOUT_MS);
    if tokio::time::timeout(grace, engine_handle).await.is_err() {
        warn!("Engine loop did not stop in time");
    }
    if !engine.drain(grace).await {
        warn!(in_flight = %engine.in_flight().await, "Runs still in flight at exit");
    }
    pool.close().await;
    telemetry::shutdown();

    info!("Shutdown complete");
    Ok(())
}

#[cfg(feature = "kms")]
async fn kms_client(settings: &Settings) -> Option<Arc<dyn KmsApi>> {
    if !SecretCodec::is_kms_key(&settings.secret_key) {
        return None;
    }
    let api = conduit_infra_crypto::kms::real::AwsKmsApi::from_env().await;
    Some(Arc::new(api))
}

#[cfg(not(feature = "kms"))]
async fn kms_client(settings: &Settings) -> Option<Arc<dyn KmsApi>> {
    if SecretCodec::is_kms_key(&settings.secret_key) {
        warn!("Secret key is a KMS ARN but conduit-worker was built without the 'kms' feature");
    }
    None
}
