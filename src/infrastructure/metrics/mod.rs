//! Prometheus Metrics Module
//!
//! Provides application-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - HTTP request counts and latency by method and route
//! - Active WebSocket sessions by kind (private, public, notifications)
//! - Messages persisted by chat kind
//! - Broadcast bus publish failures
//! - Session closes by reason

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// HTTP request counter - tracks total requests by method, path, and status code
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests").namespace("chatapp"),
        &["method", "path", "status"],
    )
    .expect("Failed to create HTTP_REQUESTS_TOTAL metric")
});

/// HTTP request latency histogram - tracks request duration in seconds
pub static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];
    HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
        )
        .namespace("chatapp")
        .buckets(buckets),
        &["method", "path"],
    )
    .expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric")
});

/// Active WebSocket sessions gauge
pub static WEBSOCKET_SESSIONS_ACTIVE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("websocket_sessions_active", "Number of active WebSocket sessions")
            .namespace("chatapp"),
        &["kind"], // "private", "public", "notifications"
    )
    .expect("Failed to create WEBSOCKET_SESSIONS_ACTIVE metric")
});

/// Persisted messages counter
pub static MESSAGES_PERSISTED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("messages_persisted_total", "Messages written to the store").namespace("chatapp"),
        &["kind"],
    )
    .expect("Failed to create MESSAGES_PERSISTED_TOTAL metric")
});

/// Failed bus publishes counter
pub static BUS_PUBLISH_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("bus_publish_failures_total", "Envelopes the bus failed to publish")
            .namespace("chatapp"),
        &["kind"],
    )
    .expect("Failed to create BUS_PUBLISH_FAILURES_TOTAL metric")
});

/// Session close counter
pub static SESSION_CLOSES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("session_closes_total", "WebSocket sessions closed, by reason")
            .namespace("chatapp"),
        &["kind", "reason"],
    )
    .expect("Failed to create SESSION_CLOSES_TOTAL metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .expect("Failed to register HTTP_REQUESTS_TOTAL");
    registry
        .register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))
        .expect("Failed to register HTTP_REQUEST_DURATION_SECONDS");
    registry
        .register(Box::new(WEBSOCKET_SESSIONS_ACTIVE.clone()))
        .expect("Failed to register WEBSOCKET_SESSIONS_ACTIVE");
    registry
        .register(Box::new(MESSAGES_PERSISTED_TOTAL.clone()))
        .expect("Failed to register MESSAGES_PERSISTED_TOTAL");
    registry
        .register(Box::new(BUS_PUBLISH_FAILURES_TOTAL.clone()))
        .expect("Failed to register BUS_PUBLISH_FAILURES_TOTAL");
    registry
        .register(Box::new(SESSION_CLOSES_TOTAL.clone()))
        .expect("Failed to register SESSION_CLOSES_TOTAL");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Helper to record HTTP request metrics
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let status = status.to_string();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, status.as_str()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration_secs);
}

/// Helper to track a session opening (`delta = 1`) or ending (`delta = -1`)
pub fn add_active_session(kind: &str, delta: i64) {
    WEBSOCKET_SESSIONS_ACTIVE.with_label_values(&[kind]).add(delta);
}

/// Helper to count a persisted message
pub fn record_message_persisted(kind: &str) {
    MESSAGES_PERSISTED_TOTAL.with_label_values(&[kind]).inc();
}

/// Helper to count a failed publish
pub fn record_publish_failure(kind: &str) {
    BUS_PUBLISH_FAILURES_TOTAL.with_label_values(&[kind]).inc();
}

/// Helper to count a session close
pub fn record_session_close(kind: &str, reason: &str) {
    SESSION_CLOSES_TOTAL.with_label_values(&[kind, reason]).inc();
}

/// Total active sessions across all kinds
pub fn active_sessions() -> i64 {
    ["private", "public", "notifications"]
        .iter()
        .map(|kind| WEBSOCKET_SESSIONS_ACTIVE.with_label_values(&[*kind]).get())
        .sum()
}
