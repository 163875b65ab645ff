//! Shared fixtures for the metrics server integration tests

mod clusters;
mod probes;
mod scrape;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use cd_controller_metrics::crd::Application;
use cd_controller_metrics::{
    ApplicationLister, HealthCheck, MetricsRegistry, MetricsServer, StoreError,
};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

/// In-memory store returning a fixed set of applications
pub struct FakeLister(pub Vec<Arc<Application>>);

impl ApplicationLister for FakeLister {
    fn list(&self) -> Result<Vec<Arc<Application>>, StoreError> {
        Ok(self.0.clone())
    }
}

/// Store whose informer never synced
pub struct UnsyncedLister;

impl ApplicationLister for UnsyncedLister {
    fn list(&self) -> Result<Vec<Arc<Application>>, StoreError> {
        Err(StoreError::NotSynced)
    }
}

pub fn application(
    namespace: &str,
    name: &str,
    project: &str,
    repo: &str,
    sync: &str,
    health: &str,
) -> Arc<Application> {
    Arc::new(
        serde_json::from_value(json!({
            "apiVersion": "argoproj.io/v1alpha1",
            "kind": "Application",
            "metadata": {
                "name": name,
                "namespace": namespace,
                "creationTimestamp": "2023-11-14T22:13:20Z"
            },
            "spec": {
                "project": project,
                "source": { "repoURL": repo, "path": "guestbook" },
                "destination": {
                    "server": "https://kubernetes.default.svc",
                    "namespace": "default"
                }
            },
            "status": {
                "sync": { "status": sync },
                "health": { "status": health }
            }
        }))
        .expect("valid application fixture"),
    )
}

pub fn always_healthy() -> HealthCheck {
    Arc::new(|| Ok(()))
}

pub fn server_with(store: impl ApplicationLister + 'static, health_check: HealthCheck) -> MetricsServer {
    let registry = MetricsRegistry::new(None).expect("registry");
    MetricsServer::new(registry, Arc::new(store), health_check).expect("metrics server")
}

/// GET `path` on the server's router
pub async fn get(server: &MetricsServer, path: &str) -> (StatusCode, Option<String>, String) {
    let response = server
        .router()
        .oneshot(Request::builder().uri(path).body(Body::empty()).expect("request"))
        .await
        .expect("router is infallible");

    let status = response.status();
    let content_type = response
        .headers()
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    (status, content_type, String::from_utf8_lossy(&body).into_owned())
}

/// Value of the sample of `metric` carrying every `labels` pair
pub fn sample(text: &str, metric: &str, labels: &[(&str, &str)]) -> Option<f64> {
    text.lines()
        .filter(|line| is_sample_of(line, metric))
        .find(|line| {
            labels
                .iter()
                .all(|(k, v)| line.contains(&format!("{k}=\"{v}\"")))
        })
        .and_then(|line| line.rsplit(' ').next())
        .and_then(|value| value.parse().ok())
}

/// Number of samples whose name is exactly `metric`
pub fn sample_count(text: &str, metric: &str) -> usize {
    text.lines()
        .filter(|line| is_sample_of(line, metric))
        .count()
}

fn is_sample_of(line: &str, metric: &str) -> bool {
    line.strip_prefix(metric)
        .is_some_and(|rest| rest.starts_with('{') || rest.starts_with(' '))
}
