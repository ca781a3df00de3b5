//! precache host entry point.
//!
//! Loads configuration, opens the cache, boots the worker (install then
//! activate) and serves the lifecycle tools over stdio.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use precache_client::{FetchClient, FetchConfig, ServiceWorker, WorkerConfig};
use precache_core::{AppConfig, CacheDb};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;
    tracing::info!(
        generation = %config.cache_version,
        origin = %config.origin,
        db = %config.db_path.display(),
        "Starting precache host on stdio transport"
    );

    let cache = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening cache at {}", config.db_path.display()))?;
    let network = FetchClient::new(FetchConfig::from_app_config(&config)?)?;
    let worker = ServiceWorker::builder(WorkerConfig::from_app_config(&config)?, Arc::new(cache.clone()), Arc::new(network))
        .build()?;
    let worker = Arc::new(worker);

    // A failed boot leaves the worker redundant; the host still serves so
    // sw_install can retry.
    match worker.start().await {
        Ok((installed, activated)) => tracing::info!(
            generation = %installed.generation,
            cached = installed.cached.len(),
            deleted = activated.deleted.len(),
            "worker activated"
        ),
        Err(e) => tracing::warn!(error = %e, "worker failed to start"),
    }

    let handler = handler::PrecacheHost::new(Arc::clone(&worker), cache);
    let server = serve_server(handler, stdio()).await?;
    server.waiting().await?;

    let aborted = worker.shutdown(config.drain_timeout()).await;
    if aborted > 0 {
        tracing::warn!(aborted, "pending cache writes aborted at shutdown");
    }

    Ok(())
}
