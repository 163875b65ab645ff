//! # Observability
//!
//! Prometheus metrics exposed by the controller.

pub mod metrics;
