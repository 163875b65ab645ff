//! # Application Controller Metrics Exporter
//!
//! Serves Prometheus metrics for a declarative continuous-delivery controller.
//!
//! ## Overview
//!
//! The exporter:
//!
//! 1. **Watches `Application` resources** - Keeps an in-memory reflector store up to date
//! 2. **Computes per-application gauges at scrape time** - Info, creation time, sync and health status
//! 3. **Counts controller events** - Syncs, Kubernetes requests, kubectl executions, cluster events, reconciles
//! 4. **Polls cluster information** - API server version, API count and cache age
//!
//! ## Endpoints
//!
//! - `/metrics` - Prometheus text exposition
//! - `/healthz` - liveness, fails once the application watch stops
//! - `/readyz` - readiness, succeeds once the listener is bound

use anyhow::Result;
use cd_controller_metrics::runtime::{initialize, run_watch_loop};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize the exporter runtime
    let init_result = initialize().await?;

    let cancel = init_result.cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl-C, shutting down"),
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
        cancel.cancel();
    });

    // Run the watch loop
    let watch_result = run_watch_loop(
        init_result.applications,
        init_result.writer,
        init_result.lister,
        init_result.server.metrics().clone(),
        init_result.cluster_url,
        init_result.watch_alive,
        init_result.cancel.clone(),
    )
    .await;

    // Stop the server and poller whether the watch exited cleanly or not
    init_result.cancel.cancel();
    if let Err(e) = init_result.server_handle.await {
        error!("HTTP server task failed: {}", e);
    }
    if let Err(e) = init_result.poller_handle.await {
        error!("Clusters info poller task failed: {}", e);
    }

    info!("Exporter stopped");
    watch_result
}
