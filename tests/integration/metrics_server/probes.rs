//! `/healthz` and `/readyz`

use super::*;
use anyhow::anyhow;
use axum::http::StatusCode;
use std::sync::atomic::{AtomicBool, Ordering};

#[tokio::test]
async fn test_healthz_follows_health_check() {
    let alive = Arc::new(AtomicBool::new(true));
    let check_alive = Arc::clone(&alive);
    let health_check: HealthCheck = Arc::new(move || {
        if check_alive.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(anyhow!("application watch has stopped"))
        }
    });
    let server = server_with(FakeLister(Vec::new()), health_check);

    let (status, _, body) = get(&server, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");

    alive.store(false, Ordering::Relaxed);
    let (status, _, body) = get(&server, "/healthz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, "application watch has stopped");
}

#[tokio::test]
async fn test_readyz_reports_listener_state() {
    let server = server_with(FakeLister(Vec::new()), always_healthy());

    let (status, _, _) = get(&server, "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    server.state().is_ready.store(true, Ordering::Relaxed);
    let (status, _, body) = get(&server, "/readyz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ready");
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let server = server_with(FakeLister(Vec::new()), always_healthy());
    let (status, _, _) = get(&server, "/debug").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
