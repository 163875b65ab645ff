//! # Metrics Server
//!
//! HTTP server exposing `/metrics`, `/healthz` and `/readyz`, and the
//! [`MetricsServer`] handle through which the rest of the controller records events.

use crate::constants::{HEALTHZ_PATH, METRICS_PATH, READYZ_PATH};
use crate::observability::metrics::{
    AppCollector, ClusterCollector, ClustersInfoSource, ControllerMetrics, MetricsError,
    MetricsRegistry, SharedClusterCollector,
};
use crate::store::ApplicationLister;
use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Liveness check injected by the embedding controller
pub type HealthCheck = Arc<dyn Fn() -> Result<()> + Send + Sync>;

/// Server readiness state
#[derive(Debug, Default)]
pub struct ServerState {
    /// Set once the listener is bound
    pub is_ready: Arc<AtomicBool>,
}

/// Metrics registry, event counters and HTTP surface of the controller
///
/// Cheap to clone; all clones share the same registry and counters.
#[derive(Clone)]
pub struct MetricsServer {
    registry: MetricsRegistry,
    metrics: ControllerMetrics,
    health_check: HealthCheck,
    state: Arc<ServerState>,
}

impl MetricsServer {
    /// Build the server and register the application collector, the event
    /// counters and the process metrics.
    ///
    /// # Errors
    ///
    /// Any [`MetricsError`] from registration. It is a schema error and must
    /// abort startup.
    pub fn new(
        registry: MetricsRegistry,
        store: Arc<dyn ApplicationLister>,
        health_check: HealthCheck,
    ) -> Result<Self, MetricsError> {
        registry.register(AppCollector::new(store)?)?;
        registry.register_process_metrics()?;

        let metrics = ControllerMetrics::new()?;
        metrics.register(&registry)?;

        Ok(Self {
            registry,
            metrics,
            health_check,
            state: Arc::new(ServerState::default()),
        })
    }

    pub fn registry(&self) -> &MetricsRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> &ControllerMetrics {
        &self.metrics
    }

    pub fn state(&self) -> &Arc<ServerState> {
        &self.state
    }

    /// Register a clusters info source and start polling it until `cancel` fires
    ///
    /// The collector is registered before the poller is spawned, so a
    /// registration failure leaves no task behind.
    ///
    /// # Errors
    ///
    /// [`MetricsError::ZeroPollInterval`] if `interval` is zero, or
    /// [`MetricsError::Registration`] if a clusters collector is already registered.
    pub fn register_clusters_info_source(
        &self,
        cancel: CancellationToken,
        source: Arc<dyn ClustersInfoSource>,
        interval: Duration,
    ) -> Result<JoinHandle<()>, MetricsError> {
        if interval.is_zero() {
            return Err(MetricsError::ZeroPollInterval);
        }
        let collector = Arc::new(ClusterCollector::new()?);
        self.registry
            .register(SharedClusterCollector(Arc::clone(&collector)))?;
        Ok(tokio::spawn(collector.run(source, interval, cancel)))
    }

    /// Router serving the metrics and probe endpoints
    pub fn router(&self) -> Router {
        Router::new()
            .route(METRICS_PATH, get(metrics_handler))
            .route(HEALTHZ_PATH, get(healthz_handler))
            .route(READYZ_PATH, get(readyz_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(self.clone())
    }
}

impl Deref for MetricsServer {
    type Target = ControllerMetrics;

    fn deref(&self) -> &Self::Target {
        &self.metrics
    }
}

impl std::fmt::Debug for MetricsServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsServer")
            .field("registry", &self.registry)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Handler for GET /metrics
#[tracing::instrument(skip_all, name = "metrics.scrape")]
async fn metrics_handler(State(server): State<MetricsServer>) -> Response {
    match server.registry.render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, server.registry.content_type())],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Handler for GET /healthz
#[tracing::instrument(skip_all, name = "metrics.healthz")]
async fn healthz_handler(State(server): State<MetricsServer>) -> Response {
    match (server.health_check)() {
        Ok(()) => (StatusCode::OK, "ok").into_response(),
        Err(e) => {
            warn!(error = %e, "Health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response()
        }
    }
}

/// Handler for GET /readyz
async fn readyz_handler(State(server): State<MetricsServer>) -> Response {
    if server.state.is_ready.load(Ordering::Relaxed) {
        (StatusCode::OK, "ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
    }
}

/// Bind `port` and serve until `cancel` fires
///
/// Marks the server ready as soon as the listener is bound.
///
/// # Errors
///
/// Returns an error if `port` cannot be bound or the server fails while serving.
pub async fn start_server(server: MetricsServer, port: u16, cancel: CancellationToken) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind metrics server to {addr}"))?;

    server.state.is_ready.store(true, Ordering::Relaxed);
    info!(%addr, "Metrics server listening");

    axum::serve(listener, server.router())
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .context("Metrics server failed")?;

    info!("Metrics server stopped");
    Ok(())
}
