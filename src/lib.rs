//! metricwatch -- anomaly detection and early warnings for operational metrics.
//!
//! This crate provides the detection engine (statistical, seasonal and trend
//! detectors over a baseline/recent window split), forward-projecting early
//! warnings, a detection rule registry, the background scheduler that drives
//! both passes, and a thin JSON API over all of it.

pub mod api;
pub mod config;
pub mod detect;
pub mod engine;
pub mod gateway;
pub mod rules;
pub mod scheduler;
pub mod storage;
pub mod warning;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::engine::Engine;
use crate::gateway::SqliteGateway;

/// Start the metricwatch daemon: API server plus the detection and warning loops.
pub async fn serve(config: Config) -> Result<()> {
    // 1. Initialize Storage
    tracing::info!(db_path = %config.gateway.db_path, "Initializing database");
    let pool = storage::open_pool(&config.gateway.db_path)?;

    // 2. Build the engine over the sample store
    let bind = config.server.bind.clone();
    let engine = Arc::new(Engine::new(Arc::new(SqliteGateway::new(pool)), config));

    // 3. Start both background loops
    let scheduler = scheduler::Scheduler::new(engine.clone()).spawn();

    // 4. Start API Server
    let addr: std::net::SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid bind address: {}", bind))?;
    let app = api::router(api::state::AppState::new(engine));

    tracing::info!(%addr, "metricwatch listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    tracing::info!("Stopping scheduler");
    scheduler.shutdown().await;
    served?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
