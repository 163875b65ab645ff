//! # Metrics Registry
//!
//! Prometheus metrics registry setup, registration and text rendering.
//!
//! One [`MetricsRegistry`] is constructed at startup and handed to every
//! component that registers or serves metrics. There is no process-global registry.

use prometheus::core::Collector;
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, Registry, TextEncoder};
use thiserror::Error;
use tracing::debug;

/// Metrics registration and exposition errors
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Duplicate or inconsistent metric schema. Indicates a programming error.
    #[error("failed to register metrics collector: {0}")]
    Registration(#[source] prometheus::Error),
    /// Invalid metric descriptor (name, help text or label names)
    #[error("invalid metric descriptor: {0}")]
    Descriptor(#[source] prometheus::Error),
    /// Text encoding of the gathered metric families failed
    #[error("failed to encode metrics: {0}")]
    Encode(#[source] prometheus::Error),
    /// A background poller was asked to run with a zero interval
    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,
}

/// Shared handle to the process metrics registry
///
/// Cloning is cheap: `prometheus::Registry` is reference counted internally and
/// guards its collector list with a lock held only while registering or gathering.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry").finish_non_exhaustive()
    }
}

impl MetricsRegistry {
    /// Create a registry, optionally prefixing every metric name with `prefix_`
    ///
    /// # Errors
    ///
    /// [`MetricsError::Registration`] if `prefix` is not a valid metric name prefix.
    pub fn new(prefix: Option<&str>) -> Result<Self, MetricsError> {
        let prefix = prefix
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        let registry = Registry::new_custom(prefix, None).map_err(MetricsError::Registration)?;
        Ok(Self { registry })
    }

    /// Register a collector
    ///
    /// # Errors
    ///
    /// [`MetricsError::Registration`] when any of its descriptors clashes with an
    /// already registered one.
    pub fn register<C>(&self, collector: C) -> Result<(), MetricsError>
    where
        C: Collector + 'static,
    {
        self.registry
            .register(Box::new(collector))
            .map_err(MetricsError::Registration)
    }

    /// Register the process collector (CPU, memory, open file descriptors)
    ///
    /// # Errors
    ///
    /// [`MetricsError::Registration`] if process metrics are already registered.
    #[cfg(target_os = "linux")]
    pub fn register_process_metrics(&self) -> Result<(), MetricsError> {
        self.register(prometheus::process_collector::ProcessCollector::for_self())
    }

    /// Process metrics are only available on Linux
    #[cfg(not(target_os = "linux"))]
    #[allow(
        clippy::missing_errors_doc,
        clippy::unnecessary_wraps,
        reason = "Signature matches the Linux implementation"
    )]
    pub fn register_process_metrics(&self) -> Result<(), MetricsError> {
        debug!("Process metrics are not supported on this platform");
        Ok(())
    }

    /// Collect every registered collector
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Gather and encode in the Prometheus text exposition format
    ///
    /// # Errors
    ///
    /// [`MetricsError::Encode`] if a gathered family cannot be encoded.
    pub fn render(&self) -> Result<String, MetricsError> {
        let families = self.gather();
        debug!(families = families.len(), "Gathered metric families");
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&families, &mut buffer)
            .map_err(MetricsError::Encode)?;
        String::from_utf8(buffer)
            .map_err(|e| MetricsError::Encode(prometheus::Error::Msg(e.to_string())))
    }

    /// Content type of [`MetricsRegistry::render`] output
    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }
}
