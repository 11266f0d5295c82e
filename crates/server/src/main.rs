//! dashcache entry point.
//!
//! Boots the offline cache manager: load configuration, install the static
//! manifest, activate, then serve the dashboard through the caching proxy
//! until Ctrl-C. Logs go to stderr as JSON.

use std::sync::Arc;

use anyhow::{Context, Result};
use dashcache_client::{FetchClient, FetchConfig};
use dashcache_core::{AppConfig, CacheDb};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod error;
mod hub;
mod proxy;
mod routes;
mod tunnel;
mod worker;

use hub::PageHub;
use routes::AppState;
use worker::{Worker, spawn_sweeper};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    let origin = config.origin_url()?;

    tracing::info!(cache = %config.cache_name(), %origin, db = %config.db_path.display(), "starting dashcache");

    let db = CacheDb::open(&config.db_path).await?;
    let network = Arc::new(FetchClient::new(FetchConfig::from_app(&config, origin.clone()))?);
    let hub = Arc::new(PageHub::new(origin));
    let worker = Arc::new(Worker::new(&config, db, network, hub.clone(), hub.clone())?);

    worker.install().await.context("install failed, worker is redundant")?;
    tracing::debug!(skip_waiting = worker.skip_waiting(), "installed");
    worker.activate().await?;

    let sweeper = spawn_sweeper(Arc::clone(&worker), config.sweep_interval());

    let app = routes::router(AppState { worker: Arc::clone(&worker), hub, max_body_bytes: config.max_bytes });
    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;

    tracing::info!(addr = %config.listen_addr, "dashcache listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    sweeper.abort();
    tracing::info!(in_flight = worker.lifetime().pending(), "draining in-flight work");
    worker.lifetime().drained().await;
    tracing::info!("dashcache stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
