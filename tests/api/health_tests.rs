//! Health Check and Metrics API Tests

use axum::http::{Method, StatusCode};
use pretty_assertions::assert_eq;

use crate::common::TestApp;

/// Test basic health check endpoint returns 200 OK
#[tokio::test]
async fn test_health_check_returns_ok() {
    let app = TestApp::new();

    let (status, body) = app.request(Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["version"].is_string());
}

/// Test liveness probe endpoint
#[tokio::test]
async fn test_liveness_probe() {
    let app = TestApp::new();

    let (status, body) = app.request(Method::GET, "/health/live", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "alive");
}

/// Readiness reports the store, the bus and open sessions
#[tokio::test]
async fn test_readiness_probe_checks_dependencies() {
    let app = TestApp::new();

    let (status, body) = app.request(Method::GET, "/health/ready", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["store"]["status"], "healthy");
    assert_eq!(body["checks"]["bus"]["backend"], "memory");
    assert!(body["checks"]["websocket"]["active_sessions"].is_i64());
}

/// Metrics endpoint exposes Prometheus text
#[tokio::test]
async fn test_metrics_endpoint_exports_counters() {
    let app = TestApp::new();
    app.request(Method::GET, "/health", None, None).await;

    let (status, body) = app.request(Method::GET, "/metrics", None, None).await;

    assert_eq!(status, StatusCode::OK);
    let text = body.as_str().unwrap();
    assert!(text.contains("chatapp_http_requests_total"));
}
