//! # Metrics Module
//!
//! Prometheus metrics for monitoring the application controller, organized by responsibility.
//!
//! ## Sub-modules
//!
//! - `registry` - Metrics registry setup, registration and rendering
//! - `app_collector` - Per-application gauges computed from the application store at scrape time
//! - `controller_metrics` - Event counters (syncs, Kubernetes requests, kubectl, reconciles, cluster events)
//! - `cluster_collector` - Cluster information gauges refreshed by a background poller

pub mod app_collector;
pub mod cluster_collector;
pub mod controller_metrics;
pub mod registry;

pub use app_collector::*;
pub use cluster_collector::*;
pub use controller_metrics::*;
pub use registry::*;
