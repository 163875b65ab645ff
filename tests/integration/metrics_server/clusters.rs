//! Clusters info source registration

use super::*;
use async_trait::async_trait;
use cd_controller_metrics::{ClusterInfo, ClustersInfoSource, MetricsError};
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;

struct StaticSource(Vec<ClusterInfo>);

#[async_trait]
impl ClustersInfoSource for StaticSource {
    async fn clusters_info(&self) -> anyhow::Result<Vec<ClusterInfo>> {
        Ok(self.0.clone())
    }
}

struct BrokenSource;

#[async_trait]
impl ClustersInfoSource for BrokenSource {
    async fn clusters_info(&self) -> anyhow::Result<Vec<ClusterInfo>> {
        Err(anyhow::anyhow!("cluster cache unavailable"))
    }
}

fn in_cluster() -> ClusterInfo {
    ClusterInfo {
        server: "https://kubernetes.default.svc".to_string(),
        k8s_version: "v1.30.2".to_string(),
        resources_count: 42,
        apis_count: 7,
        last_cache_sync_time: Some(SystemTime::now()),
    }
}

#[tokio::test]
async fn test_registered_source_is_scraped() {
    let server = server_with(FakeLister(Vec::new()), always_healthy());
    let cancel = CancellationToken::new();

    let handle = server
        .register_clusters_info_source(
            cancel.clone(),
            Arc::new(StaticSource(vec![in_cluster()])),
            Duration::from_secs(30),
        )
        .expect("register source");

    // the first fetch runs immediately
    let mut body = String::new();
    for _ in 0..100 {
        body = get(&server, "/metrics").await.2;
        if sample_count(&body, "cluster_info") > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let server_label = [("server", "https://kubernetes.default.svc")];
    assert_eq!(
        sample(&body, "cluster_info", &[server_label[0], ("k8s_version", "v1.30.2")]),
        Some(1.0)
    );
    assert_eq!(sample(&body, "cluster_api_resource_objects", &server_label), Some(42.0));
    assert_eq!(sample(&body, "cluster_api_resources", &server_label), Some(7.0));

    cancel.cancel();
    handle.await.expect("poller exits on cancel");
}

#[tokio::test]
async fn test_failing_source_exports_nothing_and_keeps_serving() {
    let server = server_with(FakeLister(Vec::new()), always_healthy());
    let cancel = CancellationToken::new();
    let handle = server
        .register_clusters_info_source(cancel.clone(), Arc::new(BrokenSource), Duration::from_secs(30))
        .expect("register source");

    tokio::time::sleep(Duration::from_millis(50)).await;
    let (status, _, body) = get(&server, "/metrics").await;
    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(sample_count(&body, "cluster_info"), 0);

    cancel.cancel();
    handle.await.expect("poller exits on cancel");
}

#[tokio::test]
async fn test_second_source_conflicts_with_first() {
    let server = server_with(FakeLister(Vec::new()), always_healthy());
    let cancel = CancellationToken::new();
    let first = server
        .register_clusters_info_source(cancel.clone(), Arc::new(BrokenSource), Duration::from_secs(30))
        .expect("first source");

    let second = server.register_clusters_info_source(
        cancel.clone(),
        Arc::new(BrokenSource),
        Duration::from_secs(30),
    );
    assert!(matches!(second, Err(MetricsError::Registration(_))));

    cancel.cancel();
    first.await.expect("poller exits on cancel");
}

#[tokio::test]
async fn test_zero_interval_is_rejected_before_registering() {
    let server = server_with(FakeLister(Vec::new()), always_healthy());
    let cancel = CancellationToken::new();

    let rejected = server.register_clusters_info_source(
        cancel.clone(),
        Arc::new(StaticSource(vec![in_cluster()])),
        Duration::ZERO,
    );
    assert!(matches!(rejected, Err(MetricsError::ZeroPollInterval)));

    // nothing was registered, so a valid interval still succeeds
    let handle = server
        .register_clusters_info_source(
            cancel.clone(),
            Arc::new(StaticSource(vec![in_cluster()])),
            Duration::from_secs(30),
        )
        .expect("register source");

    cancel.cancel();
    handle.await.expect("poller exits on cancel");
}
