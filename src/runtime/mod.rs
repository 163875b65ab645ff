//! # Runtime Module
//!
//! Runtime components of the exporter binary: initialization, the application
//! watch loop and the Kubernetes-backed clusters info source.

pub mod cluster_info;
pub mod initialization;
pub mod watch_loop;

pub use initialization::*;
pub use watch_loop::*;
