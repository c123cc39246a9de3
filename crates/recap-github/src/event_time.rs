//! Per-type event-time extraction from webhook payloads.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Extract the event time from a webhook payload.
///
/// Preference order per type:
/// - `pull_request`: `merged_at`, `closed_at`, `updated_at`, `created_at`
/// - `push`: head-commit timestamp
/// - `issues`: `closed_at`, `updated_at`, `created_at`
/// - `release`: `published_at`, `created_at`
/// - anything else: top-level `updated_at`, then `created_at`
///
/// Returns `None` when no field parses; the caller falls back to the
/// delivery time.
pub fn extract_event_time(event_type: &str, payload: &Value) -> Option<DateTime<Utc>> {
    match event_type {
        "pull_request" => first_timestamp(
            payload.get("pull_request")?,
            &["merged_at", "closed_at", "updated_at", "created_at"],
        ),
        "push" => parse_timestamp(payload.get("head_commit")?.get("timestamp")?),
        "issues" => first_timestamp(
            payload.get("issue")?,
            &["closed_at", "updated_at", "created_at"],
        ),
        "release" => first_timestamp(payload.get("release")?, &["published_at", "created_at"]),
        _ => first_timestamp(payload, &["updated_at", "created_at"]),
    }
}

fn first_timestamp(object: &Value, fields: &[&str]) -> Option<DateTime<Utc>> {
    fields
        .iter()
        .filter_map(|field| object.get(*field))
        .find_map(parse_timestamp)
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let s = value.as_str()?;
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_pull_request_prefers_merged_at() {
        let payload = json!({
            "pull_request": {
                "created_at": "2024-05-10T10:00:00Z",
                "updated_at": "2024-05-10T12:00:00Z",
                "merged_at": "2024-05-10T13:00:00Z",
                "closed_at": "2024-05-10T13:00:05Z"
            }
        });
        let t = extract_event_time("pull_request", &payload).unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 5, 10, 13, 0, 0).unwrap());
    }

    #[test]
    fn test_pull_request_falls_through_null_merged_at() {
        let payload = json!({
            "pull_request": {
                "merged_at": null,
                "closed_at": "2024-05-10T13:00:00Z",
                "created_at": "2024-05-10T10:00:00Z"
            }
        });
        let t = extract_event_time("pull_request", &payload).unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 5, 10, 13, 0, 0).unwrap());
    }

    #[test]
    fn test_push_uses_head_commit_timestamp() {
        let payload = json!({
            "head_commit": {"timestamp": "2024-05-10T14:30:00-04:00"}
        });
        let t = extract_event_time("push", &payload).unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 5, 10, 18, 30, 0).unwrap());
    }

    #[test]
    fn test_issue_prefers_closed_at() {
        let payload = json!({
            "issue": {
                "closed_at": "2024-05-10T15:00:00Z",
                "updated_at": "2024-05-10T15:00:01Z",
                "created_at": "2024-05-09T09:00:00Z"
            }
        });
        let t = extract_event_time("issues", &payload).unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 5, 10, 15, 0, 0).unwrap());
    }

    #[test]
    fn test_unknown_type_uses_top_level() {
        let payload = json!({"created_at": "2024-05-10T08:00:00Z"});
        let t = extract_event_time("watch", &payload).unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 5, 10, 8, 0, 0).unwrap());
    }

    #[test]
    fn test_missing_fields_yield_none() {
        assert!(extract_event_time("push", &json!({})).is_none());
        assert!(extract_event_time("pull_request", &json!({"pull_request": {}})).is_none());
    }
}
