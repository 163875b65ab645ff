//! # cd-controller-metrics
//!
//! Prometheus metrics for a declarative continuous-delivery controller.
//!
//! Per-application gauges are computed from the application store on every
//! scrape by [`AppCollector`](observability::metrics::AppCollector). Event
//! counters live in [`ControllerMetrics`](observability::metrics::ControllerMetrics)
//! and are reachable through [`MetricsServer`], which also serves the HTTP
//! endpoints.

pub mod config;
pub mod constants;
pub mod crd;
pub mod git;
pub mod observability;
pub mod runtime;
pub mod server;
pub mod store;

pub use observability::metrics::{
    ClusterInfo, ClustersInfoSource, ControllerMetrics, KubectlExecGuard, MetricsError,
    MetricsRegistry,
};
pub use server::{start_server, HealthCheck, MetricsServer, ServerState};
pub use store::{ApplicationLister, ReflectorLister, StoreError};
