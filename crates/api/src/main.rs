use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use domain::services::{AlertSink, OfflineQueue};
use persistence::repositories::AlertRepository;
use persistence::FileOfflineQueue;
use tourist_safety_api::{
    app, config,
    jobs::{FeedReconcileJob, JobScheduler, OfflineReplayJob, PoolMetricsJob},
    middleware,
    services::{RuntimeOptions, SafetyRuntime},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = config::Config::load()?;

    middleware::logging::init_logging(&config.logging);
    if let Err(e) = middleware::init_metrics() {
        warn!(error = %e, "Prometheus recorder not installed");
    }

    info!("Starting Tourist Safety relay v{}", env!("CARGO_PKG_VERSION"));

    // The pool connects lazily so alerts still queue offline while the
    // database is down.
    let pool = persistence::db::create_pool(&config.pool_config())?;

    info!("Running database migrations...");
    match persistence::db::run_migrations(&pool).await {
        Ok(()) => info!("Migrations completed"),
        Err(e) => warn!(error = %e, "Migrations not applied, database unreachable?"),
    }

    let sink: Arc<dyn AlertSink> = Arc::new(AlertRepository::new(pool.clone()));
    let queue: Arc<dyn OfflineQueue> = Arc::new(FileOfflineQueue::new(
        &config.relay.queue_path,
        config.relay.queue_capacity,
    ));
    let runtime = Arc::new(
        SafetyRuntime::new(RuntimeOptions::from_config(&config), sink, queue)
            .context("invalid zone configuration")?,
    );
    runtime.start().await;

    let mut scheduler = JobScheduler::new();
    scheduler.register(OfflineReplayJob::new(
        runtime.relay().clone(),
        config.relay.replay_interval_secs,
    ));
    scheduler.register(FeedReconcileJob::new(
        runtime.feed().clone(),
        runtime.queue().clone(),
    ));
    scheduler.register(PoolMetricsJob::new(pool.clone()));
    scheduler.start();

    let addr = config.socket_addr()?;
    let app = app::create_app(config, runtime.clone(), Some(pool));

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown();
    scheduler.wait_for_shutdown(Duration::from_secs(10)).await;
    runtime.shutdown().await;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
