//! # Constants
//!
//! Default values and well-known names shared across the crate.

/// Default HTTP port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 8082;

/// How long to wait for the HTTP server to bind before giving up (seconds)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// How often to check whether the HTTP server is ready during startup (milliseconds)
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Interval between two clusters info fetches (seconds)
pub const DEFAULT_CLUSTER_INFO_POLL_INTERVAL_SECS: u64 = 30;

/// Endpoint serving the Prometheus text exposition format
pub const METRICS_PATH: &str = "/metrics";

/// Liveness endpoint backed by the injected health check
pub const HEALTHZ_PATH: &str = "/healthz";

/// Readiness endpoint, ready once the listener is bound
pub const READYZ_PATH: &str = "/readyz";

/// API group of the Application resource
pub const APPLICATION_GROUP: &str = "argoproj.io";

/// Kind of the Application resource
pub const APPLICATION_KIND: &str = "Application";
