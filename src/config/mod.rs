//! # Configuration
//!
//! Exporter configuration loaded from environment variables (populated from a ConfigMap
//! using `envFrom` in the deployment).
//!
//! All configuration has sensible defaults and can be overridden via environment variables.

mod metrics;
mod server;

pub use metrics::MetricsConfig;
pub use server::ServerConfig;

/// Load configuration from environment variables with defaults
pub fn load_config() -> (MetricsConfig, ServerConfig) {
    (MetricsConfig::from_env(), ServerConfig::from_env())
}

/// Read environment variable or return default value
///
/// Unparseable values fall back to the default.
pub(crate) fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read an optional, non-blank environment variable
pub(crate) fn env_var_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
