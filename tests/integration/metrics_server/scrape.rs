//! `/metrics` scrape scenarios

use super::*;
use axum::http::StatusCode;
use cd_controller_metrics::crd::{OperationPhase, OperationState};
use std::time::Duration;

#[tokio::test]
async fn test_guestbook_scrape() {
    let guestbook = application(
        "argocd",
        "guestbook",
        "default",
        "https://github.com/argoproj/argocd-example-apps.git",
        "Synced",
        "Healthy",
    );
    let server = server_with(FakeLister(vec![guestbook]), always_healthy());

    let (status, content_type, body) = get(&server, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.is_some_and(|ct| ct.starts_with("text/plain")));

    let identity = [("namespace", "argocd"), ("name", "guestbook"), ("project", "default")];

    let mut info_labels = identity.to_vec();
    info_labels.extend([
        ("repo", "https://github.com/argoproj/argocd-example-apps"),
        ("dest_server", "https://kubernetes.default.svc"),
        ("dest_namespace", "default"),
    ]);
    assert_eq!(sample(&body, "app_info", &info_labels), Some(1.0));
    assert_eq!(sample(&body, "app_created_time", &identity), Some(1_700_000_000.0));

    for (code, expected) in [("Synced", 1.0), ("OutOfSync", 0.0), ("Unknown", 0.0)] {
        let mut labels = identity.to_vec();
        labels.push(("sync_status", code));
        assert_eq!(sample(&body, "app_sync_status", &labels), Some(expected), "{code}");
    }
    for (code, expected) in [
        ("Unknown", 0.0),
        ("Progressing", 0.0),
        ("Suspended", 0.0),
        ("Healthy", 1.0),
        ("Degraded", 0.0),
        ("Missing", 0.0),
    ] {
        let mut labels = identity.to_vec();
        labels.push(("health_status", code));
        assert_eq!(sample(&body, "app_health_status", &labels), Some(expected), "{code}");
    }
}

#[tokio::test]
async fn test_scrape_reflects_store_changes_without_caching() {
    let server = server_with(FakeLister(Vec::new()), always_healthy());
    let (_, _, body) = get(&server, "/metrics").await;
    assert_eq!(sample_count(&body, "app_info"), 0);

    let apps = (0..3)
        .map(|i| application("team", &format!("app-{i}"), "", "git@github.com:org/repo.git", "OutOfSync", "Degraded"))
        .collect();
    let server = server_with(FakeLister(apps), always_healthy());
    let (_, _, body) = get(&server, "/metrics").await;
    assert_eq!(sample_count(&body, "app_info"), 3);
    assert_eq!(sample_count(&body, "app_sync_status"), 9);
    assert_eq!(sample_count(&body, "app_health_status"), 18);
    // empty project is reported as the default project
    assert_eq!(
        sample(&body, "app_info", &[("name", "app-1"), ("project", "default"), ("repo", "ssh://git@github.com/org/repo")]),
        Some(1.0)
    );
}

#[tokio::test]
async fn test_store_failure_still_serves_counters() {
    let server = server_with(UnsyncedLister, always_healthy());
    let app = application("argocd", "guestbook", "default", "https://x/y.git", "Synced", "Healthy");

    server.inc_sync(&app, &OperationState::new(OperationPhase::Succeeded));
    server.inc_kubectl_exec("apply");
    server.inc_cluster_events_count("https://k8s", "apps", "Deployment");

    let (status, _, body) = get(&server, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sample_count(&body, "app_info"), 0);
    assert_eq!(sample_count(&body, "app_sync_status"), 0);
    assert_eq!(
        sample(&body, "app_sync_total", &[("name", "guestbook"), ("phase", "Succeeded")]),
        Some(1.0)
    );
    assert_eq!(sample(&body, "kubectl_exec_total", &[("command", "apply")]), Some(1.0));
    assert_eq!(
        sample(&body, "cluster_events_total", &[("server", "https://k8s"), ("kind", "Deployment")]),
        Some(1.0)
    );
}

#[tokio::test]
async fn test_event_counters_through_server_handle() {
    let server = server_with(FakeLister(Vec::new()), always_healthy());
    let app = application("argocd", "guestbook", "default", "https://x/y.git", "Synced", "Healthy");

    server.inc_sync(&app, &OperationState::new(OperationPhase::Running));
    server.inc_sync(&app, &OperationState::new(OperationPhase::Failed));
    server.inc_kubernetes_request(None, "https://k8s", "200", "list", "Pod", "");
    server.inc_kubernetes_request(Some(&app), "https://k8s", "404", "get", "Deployment", "default");
    server.inc_reconcile(&app, Duration::from_millis(300));
    {
        let _exec = server.track_kubectl_exec("diff");
        let (_, _, body) = get(&server, "/metrics").await;
        assert_eq!(sample(&body, "kubectl_exec_pending", &[("command", "diff")]), Some(1.0));
    }

    let (_, _, body) = get(&server, "/metrics").await;
    assert_eq!(sample(&body, "app_sync_total", &[("phase", "Running")]), None);
    assert_eq!(sample(&body, "app_sync_total", &[("phase", "Failed")]), Some(1.0));
    assert_eq!(
        sample(
            &body,
            "app_k8s_request_total",
            &[("name", ""), ("namespace", ""), ("project", ""), ("verb", "list")]
        ),
        Some(1.0)
    );
    assert_eq!(
        sample(&body, "app_k8s_request_total", &[("name", "guestbook"), ("response_code", "404")]),
        Some(1.0)
    );
    assert_eq!(sample(&body, "app_reconcile_bucket", &[("le", "0.25")]), Some(0.0));
    assert_eq!(sample(&body, "app_reconcile_bucket", &[("le", "0.5")]), Some(1.0));
    assert_eq!(sample(&body, "app_reconcile_count", &[("name", "guestbook")]), Some(1.0));
    assert_eq!(sample(&body, "kubectl_exec_pending", &[("command", "diff")]), Some(0.0));
    assert_eq!(sample(&body, "kubectl_exec_total", &[("command", "diff")]), Some(1.0));
}

#[tokio::test]
async fn test_prefix_is_applied_to_every_metric() {
    let registry = MetricsRegistry::new(Some("argocd")).expect("registry");
    let app = application("argocd", "guestbook", "default", "https://x/y.git", "Synced", "Healthy");
    let server = MetricsServer::new(registry, Arc::new(FakeLister(vec![app])), always_healthy())
        .expect("metrics server");
    server.inc_kubectl_exec("apply");

    let (_, _, body) = get(&server, "/metrics").await;
    assert_eq!(sample_count(&body, "argocd_app_info"), 1);
    assert_eq!(sample(&body, "argocd_kubectl_exec_total", &[("command", "apply")]), Some(1.0));
    assert_eq!(sample_count(&body, "app_info"), 0);
}
