//! Prometheus metrics for the job-state store.

use metrics::counter;

/// Metric names as constants for consistency.
pub mod names {
    pub const REQUESTS_TOTAL: &str = "recap_firestore_requests_total";
    pub const RETRIES_TOTAL: &str = "recap_firestore_retries_total";
}

/// Record a completed request.
pub fn record_request(operation: &str, outcome: &str) {
    let labels = [
        ("operation", operation.to_string()),
        ("outcome", outcome.to_string()),
    ];
    counter!(names::REQUESTS_TOTAL, &labels).increment(1);
}

/// Record a retried request.
pub fn record_retry(operation: &str) {
    let labels = [("operation", operation.to_string())];
    counter!(names::RETRIES_TOTAL, &labels).increment(1);
}
