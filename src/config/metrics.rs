//! # Metrics Configuration
//!
//! Metric naming, polling and watch scope settings.

use super::{env_var_opt, env_var_or_default};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Optional prefix prepended to every metric name (`<prefix>_app_info`)
    pub prefix: Option<String>,
    /// Interval between two clusters info fetches (seconds)
    pub cluster_info_poll_interval_secs: u64,
    /// Watch applications in this namespace only. `None` watches all namespaces.
    pub application_namespace: Option<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            prefix: None,
            cluster_info_poll_interval_secs:
                crate::constants::DEFAULT_CLUSTER_INFO_POLL_INTERVAL_SECS,
            application_namespace: None,
        }
    }
}

impl MetricsConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            prefix: env_var_opt("METRICS_PREFIX"),
            cluster_info_poll_interval_secs: env_var_or_default(
                "CLUSTER_INFO_POLL_INTERVAL_SECS",
                crate::constants::DEFAULT_CLUSTER_INFO_POLL_INTERVAL_SECS,
            )
            .max(1),
            application_namespace: env_var_opt("APPLICATION_NAMESPACE"),
        }
    }

    pub fn cluster_info_poll_interval(&self) -> Duration {
        Duration::from_secs(self.cluster_info_poll_interval_secs)
    }
}
