//! # Application Metrics
//!
//! Collector that derives per-application gauges from the application store
//! at scrape time. Nothing is cached between scrapes: every `collect` lists the
//! store and builds fresh metric families.

use crate::crd::{Application, HealthStatusCode, SyncStatusCode};
use crate::git::normalize_git_url;
use crate::observability::metrics::registry::MetricsError;
use crate::store::ApplicationLister;
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{GaugeVec, Opts};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Labels every per-application metric starts with
pub const APP_DEFAULT_LABELS: [&str; 3] = ["namespace", "name", "project"];

/// Name, help text and metric-specific labels of a per-application gauge
struct AppGauge {
    name: &'static str,
    help: &'static str,
    extra_labels: &'static [&'static str],
}

impl AppGauge {
    fn label_names(&self) -> Vec<&'static str> {
        APP_DEFAULT_LABELS
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

// Follow Prometheus naming practices
// https://prometheus.io/docs/practices/naming/
const APP_INFO: AppGauge = AppGauge {
    name: "app_info",
    help: "Information about application.",
    extra_labels: &["repo", "dest_server", "dest_namespace"],
};

const APP_CREATED: AppGauge = AppGauge {
    name: "app_created_time",
    help: "Creation time in unix timestamp for an application.",
    extra_labels: &[],
};

const APP_SYNC_STATUS: AppGauge = AppGauge {
    name: "app_sync_status",
    help: "The application current sync status.",
    extra_labels: &["sync_status"],
};

const APP_HEALTH_STATUS: AppGauge = AppGauge {
    name: "app_health_status",
    help: "The application current health status.",
    extra_labels: &["health_status"],
};

/// Prometheus collector for application metrics
pub struct AppCollector {
    store: Arc<dyn ApplicationLister>,
    descs: Vec<Desc>,
}

impl AppCollector {
    /// Collector listing applications from `store` on every scrape
    ///
    /// # Errors
    ///
    /// [`MetricsError::Descriptor`] if a gauge descriptor is invalid.
    pub fn new(store: Arc<dyn ApplicationLister>) -> Result<Self, MetricsError> {
        let descs = [&APP_INFO, &APP_CREATED, &APP_SYNC_STATUS, &APP_HEALTH_STATUS]
            .into_iter()
            .map(AppGauge::desc)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { store, descs })
    }
}

impl std::fmt::Debug for AppCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppCollector").finish_non_exhaustive()
    }
}

impl Collector for AppCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.descs.iter().collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let apps = match self.store.list() {
            Ok(apps) => apps,
            Err(e) => {
                warn!(error = %e, "Failed to collect applications");
                return Vec::new();
            }
        };

        let families = match AppFamilies::new() {
            Ok(families) => families,
            Err(e) => {
                warn!(error = %e, "Failed to build application metric families");
                return Vec::new();
            }
        };
        for app in &apps {
            families.observe(app);
        }
        families.collect()
    }
}

/// Scrape-local gauges, dropped once the scrape has been rendered
struct AppFamilies {
    info: GaugeVec,
    created: GaugeVec,
    sync_status: GaugeVec,
    health_status: GaugeVec,
}

impl AppFamilies {
    fn new() -> Result<Self, MetricsError> {
        Ok(Self {
            info: APP_INFO.gauge_vec()?,
            created: APP_CREATED.gauge_vec()?,
            sync_status: APP_SYNC_STATUS.gauge_vec()?,
            health_status: APP_HEALTH_STATUS.gauge_vec()?,
        })
    }

    fn observe(&self, app: &Application) {
        let namespace = app.namespace_str();
        let name = app.name_str();
        let project = app.spec.project();
        let set = |vec: &GaugeVec, value: f64, extra: &[&str]| {
            let mut labels = vec![namespace, name, project];
            labels.extend_from_slice(extra);
            vec.with_label_values(&labels).set(value);
        };

        let repo = normalize_git_url(&app.spec.source.repo_url);
        set(
            &self.info,
            1.0,
            &[
                repo.as_str(),
                app.spec.destination.server.as_str(),
                app.spec.destination.namespace.as_str(),
            ],
        );

        #[allow(
            clippy::cast_precision_loss,
            reason = "Unix seconds fit in f64 mantissa for any realistic date"
        )]
        let created = app.created_unix_seconds() as f64;
        set(&self.created, created, &[]);

        let sync_status = app.sync_status();
        for code in SyncStatusCode::ALL {
            set(
                &self.sync_status,
                bool_gauge(code.matches(sync_status)),
                &[code.as_str()],
            );
        }

        let health_status = app.health_status();
        for code in HealthStatusCode::ALL {
            set(
                &self.health_status,
                bool_gauge(code.matches(health_status)),
                &[code.as_str()],
            );
        }
    }

    fn collect(&self) -> Vec<MetricFamily> {
        [
            &self.info,
            &self.created,
            &self.sync_status,
            &self.health_status,
        ]
        .into_iter()
        .flat_map(Collector::collect)
        .collect()
    }
}

fn bool_gauge(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}
