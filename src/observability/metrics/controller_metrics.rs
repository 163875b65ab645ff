//! # Controller Metrics
//!
//! Event counters mutated by the controller as things happen: completed syncs,
//! Kubernetes API requests, cluster watch events, kubectl executions and
//! reconciliation durations.
//!
//! All families are safe to update from any thread; the underlying `prometheus`
//! metrics are atomic per label set.

use crate::crd::{Application, OperationState};
use crate::observability::metrics::app_collector::APP_DEFAULT_LABELS;
use crate::observability::metrics::registry::{MetricsError, MetricsRegistry};
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts};
use std::time::Duration;

/// Labels identifying a monitored cluster
pub const CLUSTER_DEFAULT_LABELS: [&str; 1] = ["server"];

/// Reconcile histogram buckets in seconds, chosen around a ~2s mean reconcile time
pub const RECONCILE_BUCKETS: [f64; 7] = [0.25, 0.5, 1.0, 2.0, 4.0, 8.0, 16.0];

fn app_labels(extra: &[&'static str]) -> Vec<&'static str> {
    APP_DEFAULT_LABELS.iter().chain(extra).copied().collect()
}

/// Handles to the event metric families
///
/// Cloning is cheap and every clone updates the same underlying metrics.
#[derive(Clone)]
pub struct ControllerMetrics {
    sync_counter: IntCounterVec,
    k8s_request_counter: IntCounterVec,
    kubectl_exec_counter: IntCounterVec,
    kubectl_exec_pending_gauge: IntGaugeVec,
    reconcile_histogram: HistogramVec,
    cluster_events_counter: IntCounterVec,
}

impl ControllerMetrics {
    /// Create the counter, gauge and histogram families, unregistered
    ///
    /// # Errors
    ///
    /// [`MetricsError::Descriptor`] if a metric name or label set is invalid.
    pub fn new() -> Result<Self, MetricsError> {
        let sync_counter = IntCounterVec::new(
            Opts::new("app_sync_total", "Number of application syncs."),
            &app_labels(&["phase"]),
        )
        .map_err(MetricsError::Descriptor)?;

        let k8s_request_counter = IntCounterVec::new(
            Opts::new(
                "app_k8s_request_total",
                "Number of kubernetes requests executed during application reconciliation.",
            ),
            &app_labels(&[
                "server",
                "response_code",
                "verb",
                "resource_kind",
                "resource_namespace",
            ]),
        )
        .map_err(MetricsError::Descriptor)?;

        let kubectl_exec_counter = IntCounterVec::new(
            Opts::new("kubectl_exec_total", "Number of kubectl executions"),
            &["command"],
        )
        .map_err(MetricsError::Descriptor)?;

        let kubectl_exec_pending_gauge = IntGaugeVec::new(
            Opts::new("kubectl_exec_pending", "Number of pending kubectl executions"),
            &["command"],
        )
        .map_err(MetricsError::Descriptor)?;

        let reconcile_histogram = HistogramVec::new(
            HistogramOpts::new("app_reconcile", "Application reconciliation performance.")
                .buckets(RECONCILE_BUCKETS.to_vec()),
            &APP_DEFAULT_LABELS,
        )
        .map_err(MetricsError::Descriptor)?;

        let cluster_events_labels: Vec<&str> = CLUSTER_DEFAULT_LABELS
            .iter()
            .chain(&["group", "kind"])
            .copied()
            .collect();
        let cluster_events_counter = IntCounterVec::new(
            Opts::new("cluster_events_total", "Number of processes k8s resource events."),
            &cluster_events_labels,
        )
        .map_err(MetricsError::Descriptor)?;

        Ok(Self {
            sync_counter,
            k8s_request_counter,
            kubectl_exec_counter,
            kubectl_exec_pending_gauge,
            reconcile_histogram,
            cluster_events_counter,
        })
    }

    /// Register every family with the registry
    ///
    /// Prometheus `Registry::register()` takes ownership, so the metrics are cloned.
    /// The clones share state with `self`.
    ///
    /// # Errors
    ///
    /// [`MetricsError::Registration`] if any family is already registered.
    pub fn register(&self, registry: &MetricsRegistry) -> Result<(), MetricsError> {
        registry.register(self.sync_counter.clone())?;
        registry.register(self.k8s_request_counter.clone())?;
        registry.register(self.kubectl_exec_counter.clone())?;
        registry.register(self.kubectl_exec_pending_gauge.clone())?;
        registry.register(self.reconcile_histogram.clone())?;
        registry.register(self.cluster_events_counter.clone())?;
        Ok(())
    }

    /// Count a sync operation once it has reached a terminal phase.
    ///
    /// Running or terminating operations are ignored so retried operations are
    /// not counted more than once.
    pub fn inc_sync(&self, app: &Application, state: &OperationState) {
        if !state.phase.is_completed() {
            return;
        }
        self.sync_counter
            .with_label_values(&[
                app.namespace_str(),
                app.name_str(),
                app.spec.project(),
                state.phase.as_str(),
            ])
            .inc();
    }

    pub fn inc_kubectl_exec(&self, command: &str) {
        self.kubectl_exec_counter.with_label_values(&[command]).inc();
    }

    pub fn inc_kubectl_exec_pending(&self, command: &str) {
        self.kubectl_exec_pending_gauge
            .with_label_values(&[command])
            .inc();
    }

    pub fn dec_kubectl_exec_pending(&self, command: &str) {
        self.kubectl_exec_pending_gauge
            .with_label_values(&[command])
            .dec();
    }

    /// Count a kubectl execution and hold it as pending until the guard is dropped
    pub fn track_kubectl_exec(&self, command: &str) -> KubectlExecGuard {
        self.inc_kubectl_exec(command);
        let pending = self.kubectl_exec_pending_gauge.with_label_values(&[command]);
        pending.inc();
        KubectlExecGuard { pending }
    }

    /// Count a raw watch event received from a monitored cluster
    pub fn inc_cluster_events_count(&self, server: &str, group: &str, kind: &str) {
        self.cluster_events_counter
            .with_label_values(&[server, group, kind])
            .inc();
    }

    /// Count a Kubernetes API request.
    ///
    /// Requests not tied to an application are recorded with empty
    /// `namespace`, `name` and `project` labels.
    pub fn inc_kubernetes_request(
        &self,
        app: Option<&Application>,
        server: &str,
        response_code: &str,
        verb: &str,
        resource_kind: &str,
        resource_namespace: &str,
    ) {
        let (namespace, name, project) = app.map_or(("", "", ""), |app| {
            (app.namespace_str(), app.name_str(), app.spec.project())
        });
        self.k8s_request_counter
            .with_label_values(&[
                namespace,
                name,
                project,
                server,
                response_code,
                verb,
                resource_kind,
                resource_namespace,
            ])
            .inc();
    }

    /// Observe the duration of one reconciliation
    pub fn inc_reconcile(&self, app: &Application, duration: Duration) {
        self.reconcile_histogram
            .with_label_values(&[app.namespace_str(), app.name_str(), app.spec.project()])
            .observe(duration.as_secs_f64());
    }
}

impl std::fmt::Debug for ControllerMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerMetrics").finish_non_exhaustive()
    }
}

/// Pending kubectl execution. Decrements `kubectl_exec_pending` when dropped,
/// including on early returns and unwinding.
#[must_use = "the execution stops being pending as soon as the guard is dropped"]
pub struct KubectlExecGuard {
    pending: IntGauge,
}

impl Drop for KubectlExecGuard {
    fn drop(&mut self) {
        self.pending.dec();
    }
}

impl std::fmt::Debug for KubectlExecGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubectlExecGuard")
            .field("pending", &self.pending.get())
            .finish()
    }
}
