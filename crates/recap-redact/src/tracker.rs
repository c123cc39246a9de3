//! Process-wide error tracker.
//!
//! A bounded record of recent errors, shared as an explicit dependency by
//! handlers and workers. Contexts are deep-sanitized before storage so the
//! tracker can be dumped to logs or an admin endpoint safely.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::context::sanitize_context;

/// Maximum retained entries; the oldest are evicted beyond this.
pub const TRACKER_CAPACITY: usize = 1000;

/// Entries older than this are dropped by the sweep.
pub const TRACKER_TTL_HOURS: i64 = 24;

/// One tracked error occurrence.
#[derive(Debug, Clone, Serialize)]
pub struct TrackedError {
    pub code: String,
    pub message: String,
    pub context: Value,
    pub occurred_at: DateTime<Utc>,
}

/// Bounded, swept error record.
pub struct ErrorTracker {
    entries: Mutex<VecDeque<TrackedError>>,
    capacity: usize,
    ttl: Duration,
}

impl Default for ErrorTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorTracker {
    pub fn new() -> Self {
        Self::with_capacity(TRACKER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            capacity,
            ttl: Duration::hours(TRACKER_TTL_HOURS),
        }
    }

    /// Record an error with a sanitized context.
    pub fn track_error(&self, code: impl Into<String>, message: impl Into<String>, context: Value) {
        let entry = TrackedError {
            code: code.into(),
            message: message.into(),
            context: sanitize_context(&context),
            occurred_at: Utc::now(),
        };
        warn!(code = %entry.code, "Tracked error: {}", entry.message);

        let mut entries = self.entries.lock().expect("error tracker poisoned");
        self.sweep_locked(&mut entries, entry.occurred_at);
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Most recent entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<TrackedError> {
        let mut entries = self.entries.lock().expect("error tracker poisoned");
        let now = Utc::now();
        self.sweep_locked(&mut entries, now);
        entries.iter().rev().take(limit).cloned().collect()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let mut entries = self.entries.lock().expect("error tracker poisoned");
        self.sweep_locked(&mut entries, Utc::now());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop entries past the TTL. Entries are appended in time order, so the
    /// expired prefix is contiguous.
    fn sweep_locked(&self, entries: &mut VecDeque<TrackedError>, now: DateTime<Utc>) {
        let cutoff = now - self.ttl;
        while entries
            .front()
            .map(|e| e.occurred_at < cutoff)
            .unwrap_or(false)
        {
            entries.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_capacity_eviction() {
        let tracker = ErrorTracker::with_capacity(3);
        for i in 0..5 {
            tracker.track_error("code", format!("error {i}"), json!({}));
        }
        let recent = tracker.recent(10);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].message, "error 4");
        assert_eq!(recent[2].message, "error 2");
    }

    #[test]
    fn test_context_sanitized_on_entry() {
        let tracker = ErrorTracker::new();
        tracker.track_error(
            "collaborator-failed",
            "upstream 500",
            json!({"api_key": "sk-123", "attempt": 2}),
        );
        let recent = tracker.recent(1);
        assert_eq!(recent[0].context["api_key"], "[redacted]");
        assert_eq!(recent[0].context["attempt"], 2);
    }
}
