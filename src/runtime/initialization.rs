//! # Initialization
//!
//! Exporter initialization: rustls setup, tracing, configuration, Kubernetes
//! client, application store, metrics registry, HTTP server startup and the
//! clusters info poller.

use crate::config::{self, MetricsConfig, ServerConfig};
use crate::crd::Application;
use crate::observability::metrics::MetricsRegistry;
use crate::runtime::cluster_info::KubeClustersInfoSource;
use crate::server::{start_server, HealthCheck, MetricsServer, ServerState};
use crate::store::ReflectorLister;
use anyhow::{anyhow, Context, Result};
use kube::{Api, Client};
use kube_runtime::reflector;
use kube_runtime::reflector::store::Writer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Initialization result containing all necessary components for the exporter
pub struct InitializationResult {
    /// API server URL, used as the `server` label
    pub cluster_url: String,
    /// API for the Application resource (namespaced or cluster-wide)
    pub applications: Api<Application>,
    /// Read side of the application store
    pub lister: ReflectorLister,
    /// Write side of the application store, consumed by the watch loop
    pub writer: Writer<Application>,
    /// Metrics registry, counters and HTTP surface
    pub server: MetricsServer,
    /// Cleared when the application watch stops; backs the liveness probe
    pub watch_alive: Arc<AtomicBool>,
    /// Cancels the HTTP server, the watch loop and the clusters info poller
    pub cancel: CancellationToken,
    pub server_handle: JoinHandle<()>,
    pub poller_handle: JoinHandle<()>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("cluster_url", &self.cluster_url)
            .field("server", &self.server)
            .finish_non_exhaustive()
    }
}

/// Initialize the exporter runtime
///
/// This function handles:
/// - Tracing subscriber setup
/// - rustls crypto provider setup
/// - Configuration loading
/// - Kubernetes client creation
/// - Application store and metrics registration
/// - HTTP server startup
/// - Clusters info poller registration
///
/// # Errors
///
/// Returns an error if the Kubernetes configuration cannot be inferred, the
/// client or metrics cannot be set up, or the HTTP server does not become ready
/// within the startup timeout.
pub async fn initialize() -> Result<InitializationResult> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cd_controller_metrics=info".into()),
        )
        .init();

    // Required for rustls 0.23+ when no default provider is set via features
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("rustls crypto provider was already installed");
    }

    info!("Starting application controller metrics exporter");

    let (metrics_config, server_config) = config::load_config();
    info!(
        metrics_port = server_config.metrics_port,
        prefix = metrics_config.prefix.as_deref().unwrap_or(""),
        namespace = metrics_config.application_namespace.as_deref().unwrap_or("*"),
        cluster_info_poll_interval_secs = metrics_config.cluster_info_poll_interval_secs,
        "Loaded configuration"
    );

    let kube_config = kube::Config::infer()
        .await
        .context("Failed to infer Kubernetes configuration")?;
    let cluster_url = kube_config.cluster_url.to_string();
    let client = Client::try_from(kube_config).context("Failed to create Kubernetes client")?;

    let applications: Api<Application> = match &metrics_config.application_namespace {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    };
    let (reader, writer) = reflector::store();
    let lister = ReflectorLister::new(reader);

    let watch_alive = Arc::new(AtomicBool::new(true));
    let server = build_metrics_server(&metrics_config, &lister, Arc::clone(&watch_alive))?;

    let cancel = CancellationToken::new();
    let server_handle = spawn_server(&server, &server_config, cancel.clone());
    wait_for_server_ready(server.state(), &server_handle, &server_config).await?;

    let source = Arc::new(KubeClustersInfoSource::new(
        client,
        cluster_url.clone(),
        lister.clone(),
        server.metrics().clone(),
    ));
    let poller_handle = server
        .register_clusters_info_source(
            cancel.clone(),
            source,
            metrics_config.cluster_info_poll_interval(),
        )
        .context("Failed to register clusters info source")?;

    info!("Exporter initialized, starting watch loop...");

    Ok(InitializationResult {
        cluster_url,
        applications,
        lister,
        writer,
        server,
        watch_alive,
        cancel,
        server_handle,
        poller_handle,
    })
}

/// Registry, application collector, counters and liveness check
fn build_metrics_server(
    metrics_config: &MetricsConfig,
    lister: &ReflectorLister,
    watch_alive: Arc<AtomicBool>,
) -> Result<MetricsServer> {
    let registry = MetricsRegistry::new(metrics_config.prefix.as_deref())
        .context("Failed to create metrics registry")?;

    let health_check: HealthCheck = Arc::new(move || {
        if watch_alive.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(anyhow!("application watch has stopped"))
        }
    });

    MetricsServer::new(registry, Arc::new(lister.clone()), health_check)
        .context("Failed to register metrics")
}

fn spawn_server(
    server: &MetricsServer,
    server_config: &ServerConfig,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let server = server.clone();
    let port = server_config.metrics_port;
    tokio::spawn(async move {
        if let Err(e) = start_server(server, port, cancel).await {
            error!("HTTP server error: {:#}", e);
        }
    })
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &JoinHandle<()>,
    server_config: &ServerConfig,
) -> Result<()> {
    let startup_timeout = server_config.startup_timeout();
    let poll_interval = server_config.poll_interval();
    let start_time = std::time::Instant::now();

    loop {
        // Check if server task crashed
        if server_handle.is_finished() {
            return Err(anyhow!("HTTP server failed to start"));
        }

        // Set by start_server once bound
        if server_state.is_ready.load(Ordering::Relaxed) {
            info!("HTTP server is ready and accepting connections");
            break;
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }

    Ok(())
}
