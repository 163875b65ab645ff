//! # Cluster Metrics
//!
//! Informational gauges about monitored clusters, refreshed in the background.
//!
//! A poll loop fetches from a [`ClustersInfoSource`] at a fixed interval and
//! publishes the result as an immutable [`ClustersSnapshot`]. Scrapes only read
//! the latest published snapshot, so a slow or failing source never stalls a scrape.

use crate::observability::metrics::controller_metrics::CLUSTER_DEFAULT_LABELS;
use crate::observability::metrics::registry::MetricsError;
use async_trait::async_trait;
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{GaugeVec, Opts};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Cache state of one monitored cluster
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterInfo {
    /// API server URL
    pub server: String,
    pub k8s_version: String,
    /// Number of Kubernetes objects held in the cluster cache
    pub resources_count: u64,
    /// Number of monitored API resources
    pub apis_count: u64,
    /// Last time the cluster cache was fully synced, if ever
    pub last_cache_sync_time: Option<SystemTime>,
}

/// Provider of cluster information, typically the cluster cache
#[async_trait]
pub trait ClustersInfoSource: Send + Sync {
    async fn clusters_info(&self) -> anyhow::Result<Vec<ClusterInfo>>;
}

/// Result of one successful fetch
#[derive(Debug, Clone, Default)]
pub struct ClustersSnapshot {
    pub clusters: Vec<ClusterInfo>,
    pub fetched_at: Option<SystemTime>,
}

struct ClusterGauge {
    name: &'static str,
    help: &'static str,
    extra_labels: &'static [&'static str],
}

impl ClusterGauge {
    fn label_names(&self) -> Vec<&'static str> {
        CLUSTER_DEFAULT_LABELS
            .iter()
            .chain(self.extra_labels)
            .copied()
            .collect()
    }

    fn desc(&self) -> Result<Desc, MetricsError> {
        Desc::new(
            self.name.to_string(),
            self.help.to_string(),
            self.label_names().into_iter().map(str::to_string).collect(),
            HashMap::new(),
        )
        .map_err(MetricsError::Descriptor)
    }

    fn gauge_vec(&self) -> Result<GaugeVec, MetricsError> {
        GaugeVec::new(Opts::new(self.name, self.help), &self.label_names())
            .map_err(MetricsError::Descriptor)
    }
}

const CLUSTER_INFO: ClusterGauge = ClusterGauge {
    name: "cluster_info",
    help: "Information about cluster.",
    extra_labels: &["k8s_version"],
};

const CLUSTER_CACHE_RESOURCES: ClusterGauge = ClusterGauge {
    name: "cluster_api_resource_objects",
    help: "Number of k8s resource objects in the cache.",
    extra_labels: &[],
};

const CLUSTER_APIS: ClusterGauge = ClusterGauge {
    name: "cluster_api_resources",
    help: "Number of monitored kubernetes API resources.",
    extra_labels: &[],
};

const CLUSTER_CACHE_AGE: ClusterGauge = ClusterGauge {
    name: "cluster_cache_age_seconds",
    help: "Cluster cache age in seconds.",
    extra_labels: &[],
};

/// Prometheus collector publishing the latest clusters snapshot
pub struct ClusterCollector {
    snapshot: RwLock<Arc<ClustersSnapshot>>,
    descs: Vec<Desc>,
}

impl ClusterCollector {
    /// Collector with an empty snapshot
    ///
    /// # Errors
    ///
    /// [`MetricsError::Descriptor`] if a gauge descriptor is invalid.
    pub fn new() -> Result<Self, MetricsError> {
        let descs = [
            &CLUSTER_INFO,
            &CLUSTER_CACHE_RESOURCES,
            &CLUSTER_APIS,
            &CLUSTER_CACHE_AGE,
        ]
        .into_iter()
        .map(ClusterGauge::desc)
        .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            snapshot: RwLock::new(Arc::new(ClustersSnapshot::default())),
            descs,
        })
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Arc<ClustersSnapshot> {
        match self.snapshot.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Replace the published snapshot as a whole
    pub fn publish(&self, clusters: Vec<ClusterInfo>) {
        let next = Arc::new(ClustersSnapshot {
            clusters,
            fetched_at: Some(SystemTime::now()),
        });
        match self.snapshot.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    /// Poll `source` until `cancel` fires.
    ///
    /// The first fetch happens immediately. A failed fetch keeps the previous
    /// snapshot. Cancellation is checked between fetches; a fetch in flight when
    /// cancellation happens completes and its result is dropped.
    ///
    /// # Panics
    ///
    /// Panics if `interval` is zero. Callers go through
    /// `MetricsServer::register_clusters_info_source`, which rejects it up front.
    pub async fn run(
        self: Arc<Self>,
        source: Arc<dyn ClustersInfoSource>,
        interval: Duration,
        cancel: CancellationToken,
    ) {
        info!(interval_secs = interval.as_secs_f64(), "Starting clusters info poller");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let result = source.clusters_info().await;
                    if cancel.is_cancelled() {
                        debug!("Discarding clusters info fetched after cancellation");
                        break;
                    }
                    match result {
                        Ok(clusters) => {
                            debug!(clusters = clusters.len(), "Refreshed clusters info");
                            self.publish(clusters);
                        }
                        Err(e) => {
                            warn!(error = %e, "Failed to fetch clusters info, keeping previous snapshot");
                        }
                    }
                }
            }
        }

        info!("Clusters info poller stopped");
    }

    fn families(&self, snapshot: &ClustersSnapshot) -> Result<Vec<MetricFamily>, MetricsError> {
        let info = CLUSTER_INFO.gauge_vec()?;
        let resources = CLUSTER_CACHE_RESOURCES.gauge_vec()?;
        let apis = CLUSTER_APIS.gauge_vec()?;
        let cache_age = CLUSTER_CACHE_AGE.gauge_vec()?;

        let now = SystemTime::now();
        for cluster in &snapshot.clusters {
            let server = cluster.server.as_str();
            info.with_label_values(&[server, cluster.k8s_version.as_str()])
                .set(1.0);
            #[allow(
                clippy::cast_precision_loss,
                reason = "Object counts stay far below 2^52"
            )]
            let (resources_count, apis_count) =
                (cluster.resources_count as f64, cluster.apis_count as f64);
            resources.with_label_values(&[server]).set(resources_count);
            apis.with_label_values(&[server]).set(apis_count);
            cache_age
                .with_label_values(&[server])
                .set(cache_age_seconds(cluster.last_cache_sync_time, now));
        }

        Ok([&info, &resources, &apis, &cache_age]
            .into_iter()
            .flat_map(Collector::collect)
            .collect())
    }
}

/// Seconds since the last cache sync, `-1` when the cache never synced
fn cache_age_seconds(last_sync: Option<SystemTime>, now: SystemTime) -> f64 {
    last_sync.map_or(-1.0, |synced| {
        now.duration_since(synced)
            .unwrap_or(Duration::ZERO)
            .as_secs_f64()
    })
}

impl std::fmt::Debug for ClusterCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterCollector")
            .field("snapshot", &self.snapshot())
            .finish_non_exhaustive()
    }
}

impl Collector for ClusterCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.descs.iter().collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let snapshot = self.snapshot();
        match self.families(&snapshot) {
            Ok(families) => families,
            Err(e) => {
                warn!(error = %e, "Failed to build cluster metric families");
                Vec::new()
            }
        }
    }
}

/// Shared collector handle so one instance can be both registered and polled
#[derive(Debug, Clone)]
pub struct SharedClusterCollector(pub Arc<ClusterCollector>);

impl Collector for SharedClusterCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.0.desc()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.0.collect()
    }
}
