//! # Watch Loop
//!
//! Drives the Application watcher that keeps the reflector store fresh, and
//! counts every watch event it receives.

use crate::constants::{APPLICATION_GROUP, APPLICATION_KIND};
use crate::crd::Application;
use crate::observability::metrics::ControllerMetrics;
use crate::store::ReflectorLister;
use anyhow::{bail, Result};
use futures::StreamExt;
use kube::Api;
use kube_runtime::reflector::store::Writer;
use kube_runtime::watcher::{self, Event};
use kube_runtime::WatchStreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Run the application watcher until `cancel` fires
///
/// Returns an error if the watch stream ends on its own. `watch_alive` is
/// cleared in that case so the liveness probe starts failing.
///
/// # Errors
///
/// Returns an error when the watch stream terminates before `cancel` fires.
pub async fn run_watch_loop(
    applications: Api<Application>,
    writer: Writer<Application>,
    lister: ReflectorLister,
    metrics: ControllerMetrics,
    server: String,
    watch_alive: Arc<AtomicBool>,
    cancel: CancellationToken,
) -> Result<()> {
    let stream = watcher::watcher(applications, watcher::Config::default())
        .default_backoff()
        .reflect(writer);
    let mut stream = std::pin::pin!(stream);

    info!(server = %server, "Watching Application resources");

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                info!("Application watch received shutdown signal, exiting");
                return Ok(());
            }
            event = stream.next() => match event {
                Some(Ok(event)) => handle_event(&event, &lister, &metrics, &server),
                Some(Err(e)) => warn!(error = %e, "Application watch error, retrying with backoff"),
                None => {
                    watch_alive.store(false, Ordering::Relaxed);
                    bail!("Application watch stream ended unexpectedly");
                }
            }
        }
    }
}

fn handle_event(
    event: &Event<Application>,
    lister: &ReflectorLister,
    metrics: &ControllerMetrics,
    server: &str,
) {
    match event {
        Event::Apply(_) | Event::Delete(_) | Event::InitApply(_) => {
            metrics.inc_cluster_events_count(server, APPLICATION_GROUP, APPLICATION_KIND);
        }
        Event::Init => debug!("Application watch started a full listing"),
        Event::InitDone => {
            if !lister.is_synced() {
                info!(applications = lister.len(), "Application store synced");
            }
            lister.mark_synced();
        }
    }
}
