//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Initialize the Prometheus metrics recorder.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "recap_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "recap_http_request_duration_seconds";

    // Pipeline metrics
    pub const CLIPS_STORED_TOTAL: &str = "recap_clips_stored_total";
    pub const EVENTS_STORED_TOTAL: &str = "recap_events_stored_total";
    pub const JOBS_ENQUEUED_TOTAL: &str = "recap_jobs_enqueued_total";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "recap_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a stored clip batch.
pub fn record_clips_stored(count: u64) {
    counter!(names::CLIPS_STORED_TOTAL).increment(count);
}

/// Record a stored webhook event.
pub fn record_event_stored(event_type: &str) {
    let labels = [("event_type", event_type.to_string())];
    counter!(names::EVENTS_STORED_TOTAL, &labels).increment(1);
}

/// Record an enqueued job.
pub fn record_job_enqueued(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!(names::JOBS_ENQUEUED_TOTAL, &labels).increment(1);
}

/// Record a rate limit hit.
pub fn record_rate_limit_hit(path: &str) {
    let labels = [("path", sanitize_path(path))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// HTTP metrics middleware.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}

/// Collapse id-bearing path segments so label cardinality stays bounded.
fn sanitize_path(path: &str) -> String {
    let mut segments: Vec<String> = Vec::new();
    for segment in path.split('/') {
        let id_like = !segment.is_empty()
            && segment.len() >= 8
            && segment.chars().any(|c| c.is_ascii_digit())
            && segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if id_like && segments.len() >= 2 {
            segments.push(":id".to_string());
        } else {
            segments.push(segment.to_string());
        }
    }
    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_sanitization() {
        assert_eq!(
            sanitize_path("/api/jobs/0190a1b2-7000-8000-0000-abcdef012345/status"),
            "/api/jobs/:id/status"
        );
        assert_eq!(sanitize_path("/api/jobs/stats"), "/api/jobs/stats");
        assert_eq!(sanitize_path("/health"), "/health");
    }
}
