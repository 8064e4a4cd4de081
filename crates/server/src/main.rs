//! postcache server entry point.
//!
//! Boots the cache worker and serves it over MCP on stdio.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use anyhow::{Context, Result};
use postcache_client::worker::messages::DEFAULT_CAPACITY;
use postcache_client::{FetchConfig, HttpFetcher, Worker, spawn_controller};
use postcache_core::{AppConfig, CacheDb, SystemClock};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use std::sync::Arc;
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

    let config = Arc::new(AppConfig::load()?);
    tracing::info!(
        db = %config.db_path.display(),
        prefix = %config.cache_prefix,
        version = %config.cache_version,
        "Starting postcache server on stdio transport"
    );

    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening cache at {}", config.db_path.display()))?;
    let fetcher = Arc::new(HttpFetcher::new(FetchConfig::from(config.as_ref()))?);
    let worker = Worker::from_parts(config.clone(), db, fetcher, Arc::new(SystemClock))?;

    match worker.start().await {
        Ok(report) => tracing::info!(
            static_cached = report.install.static_assets.cached.len(),
            static_failed = report.install.static_assets.failed.len(),
            third_party_cached = report.install.third_party.cached.len(),
            third_party_failed = report.install.third_party.failed.len(),
            stale_deleted = report.activate.deleted.len(),
            "worker active"
        ),
        // requests still pass through to the network
        Err(err) => tracing::error!(error = %err, "worker failed to start"),
    }
    let _sweeper = worker.spawn_sweeper();
    let (admin, _controller) = spawn_controller(worker.clone(), DEFAULT_CAPACITY);

    let handler = handler::PostcacheServer::new(worker, admin);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
