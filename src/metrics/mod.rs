// src/metrics/mod.rs
// Prometheus metrics: a process-global recorder installed once at startup,
// with small counter/histogram helpers called from the connection and HTTP
// paths, and a scrape endpoint that renders the current snapshot.

use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub fn init_metrics() {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    PROMETHEUS_HANDLE
        .set(handle)
        .expect("Prometheus handle already initialized");

    tracing::info!("prometheus metrics initialized");
}

/// GET /metrics
pub async fn metrics_handler() -> impl IntoResponse {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics not initialized".to_string(),
        ),
    }
}

pub fn record_http_request(route: &str, status: u16) {
    counter!("chat_http_requests_total", "route" => route.to_string(), "status" => status.to_string())
        .increment(1);
}

pub fn record_message_sent() {
    counter!("chat_messages_sent_total").increment(1);
}

pub fn record_broadcast_dropped() {
    counter!("chat_broadcasts_dropped_total").increment(1);
}

/// Times an HTTP handler and records the duration as a histogram on drop.
pub struct RequestTimer {
    start: Instant,
    route: String,
}

impl RequestTimer {
    pub fn new(route: &str) -> Self {
        Self {
            start: Instant::now(),
            route: route.to_string(),
        }
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        histogram!("chat_http_request_duration_seconds", "route" => self.route.clone())
            .record(self.start.elapsed().as_secs_f64());
    }
}

/// Axum middleware layer: times every request and records its status, keyed
/// by the matched route path.
pub async fn track_request_metrics(req: Request, next: Next) -> Response {
    let route = req.uri().path().to_string();
    let timer = RequestTimer::new(&route);
    let response = next.run(req).await;
    record_http_request(&route, response.status().as_u16());
    drop(timer);
    response
}
