//! Event persistence and temporal correlation.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Days, Duration, Utc};
use futures::stream::{self, StreamExt};
use serde_json::Value;
use tracing::{debug, info};

use recap_models::{
    event_day_prefix, event_key, Confidence, GitHubContext, LinkedActivity, RepoEvent,
    DEFAULT_CONFIDENCE_SCORE,
};
use recap_storage::{ArtifactStore, DEFAULT_HEAD_PARALLELISM};

use crate::error::{GithubError, GithubResult};
use crate::event_time::extract_event_time;

/// Default correlation window, applied on both sides of the clip instant.
pub const DEFAULT_WINDOW_HOURS: i64 = 2;

/// Every link carries the same reason today.
const MATCH_REASON: &str = "temporal_proximity";

/// Stores repository events by event time and correlates them to clips.
#[derive(Clone)]
pub struct EventCorrelator {
    store: Arc<ArtifactStore>,
    window: Duration,
}

impl EventCorrelator {
    pub fn new(store: Arc<ArtifactStore>) -> Self {
        Self {
            store,
            window: Duration::hours(DEFAULT_WINDOW_HOURS),
        }
    }

    pub fn with_window(store: Arc<ArtifactStore>, window: Duration) -> Self {
        Self { store, window }
    }

    /// Persist a webhook delivery under its event-time day bucket.
    ///
    /// The event time comes from the payload using the per-type rule; a
    /// payload without any usable timestamp is stamped with the delivery
    /// time.
    pub async fn store_event(
        &self,
        delivery_id: &str,
        event_type: &str,
        payload: Value,
    ) -> GithubResult<RepoEvent> {
        let event_time = extract_event_time(event_type, &payload).unwrap_or_else(Utc::now);
        let repository = payload
            .get("repository")
            .and_then(|r| r.get("full_name"))
            .and_then(|n| n.as_str())
            .unwrap_or("unknown")
            .to_string();
        let action = payload
            .get("action")
            .and_then(|a| a.as_str())
            .map(|a| a.to_string());

        let event = RepoEvent {
            id: delivery_id.to_string(),
            event_type: event_type.to_string(),
            repository: repository.clone(),
            event_time,
            action,
            payload,
            processed: false,
        };

        let key = event_key(delivery_id, event_time)?;
        let body = serde_json::to_vec(&event)?;
        let metadata = HashMap::from([
            ("event-type".to_string(), event_type.to_string()),
            ("repository".to_string(), repository),
        ]);
        self.store
            .put(&key, body, "application/json", metadata)
            .await?;

        info!(delivery_id, event_type, event_time = %event_time, "Stored repository event");
        Ok(event)
    }

    /// Find qualifying events within the window around a clip instant.
    ///
    /// Events whose event time falls outside `[clip - W, clip + W]` never
    /// contribute, regardless of type.
    pub async fn find_events_for_clip(
        &self,
        clip_id: &str,
        clip_created_at: DateTime<Utc>,
        repo: Option<&str>,
    ) -> GithubResult<GitHubContext> {
        let window_start = clip_created_at - self.window;
        let window_end = clip_created_at + self.window;

        // Metadata listings let the repository filter run before any body
        // fetch.
        let mut keys = Vec::new();
        let mut day = window_start;
        while day.date_naive() <= window_end.date_naive() {
            let prefix = event_day_prefix(day);
            let mut cursor: Option<String> = None;
            loop {
                let page = self
                    .store
                    .list_with_metadata(&prefix, cursor.as_deref(), None)
                    .await?;
                for obj in page.objects {
                    let matches_repo = match repo {
                        Some(repo) => obj
                            .custom_metadata
                            .get("repository")
                            .map(|r| r == repo)
                            .unwrap_or(false),
                        None => true,
                    };
                    if matches_repo {
                        keys.push(obj.key);
                    }
                }
                if page.truncated {
                    cursor = page.cursor;
                } else {
                    break;
                }
            }
            day = day
                .checked_add_days(Days::new(1))
                .expect("window end stays in range");
        }

        debug!(clip_id, candidates = keys.len(), "Enumerated event candidates");

        let events: Vec<RepoEvent> = stream::iter(keys.iter())
            .map(|key| self.store.get_json::<RepoEvent>(key))
            .buffered(DEFAULT_HEAD_PARALLELISM)
            .filter_map(|result| async move { result.ok() })
            .collect()
            .await;

        let mut context = GitHubContext::empty(clip_id);
        context.confidence_score = DEFAULT_CONFIDENCE_SCORE;

        for event in events {
            if event.event_time < window_start || event.event_time > window_end {
                continue;
            }
            let minutes = (event.event_time - clip_created_at).num_minutes();
            let confidence = Confidence::from_minute_distance(minutes);
            classify_event(&event, confidence, &mut context);
        }

        info!(
            clip_id,
            prs = context.linked_prs.len(),
            commits = context.linked_commits.len(),
            issues = context.linked_issues.len(),
            "Correlated events for clip"
        );
        Ok(context)
    }
}

/// Route one in-window event into the context, applying the per-type
/// qualification rules.
fn classify_event(event: &RepoEvent, confidence: Confidence, context: &mut GitHubContext) {
    match event.event_type.as_str() {
        "pull_request" => {
            if let Some(activity) = qualify_pull_request(event, confidence) {
                context.linked_prs.push(activity);
            }
        }
        "push" => {
            if let Some(activity) = qualify_push(event, confidence) {
                context.linked_commits.push(activity);
            }
        }
        "issues" => {
            if let Some(activity) = qualify_issue(event, confidence) {
                context.linked_issues.push(activity);
            }
        }
        _ => {}
    }
}

/// PR events contribute only when closed-and-merged.
fn qualify_pull_request(event: &RepoEvent, confidence: Confidence) -> Option<LinkedActivity> {
    if event.action.as_deref() != Some("closed") {
        return None;
    }
    let pr = event.payload.get("pull_request")?;
    if pr.get("merged").and_then(|m| m.as_bool()) != Some(true) {
        return None;
    }
    Some(LinkedActivity {
        title: pr.get("title")?.as_str()?.to_string(),
        url: pr.get("html_url")?.as_str()?.to_string(),
        timestamp: event.event_time,
        confidence,
        match_reason: MATCH_REASON.to_string(),
    })
}

/// Push events contribute only when targeting the default branch.
fn qualify_push(event: &RepoEvent, confidence: Confidence) -> Option<LinkedActivity> {
    let default_branch = event
        .payload
        .get("repository")
        .and_then(|r| r.get("default_branch"))
        .and_then(|b| b.as_str())
        .unwrap_or("main");
    let pushed_ref = event.payload.get("ref")?.as_str()?;
    if pushed_ref != format!("refs/heads/{default_branch}") {
        return None;
    }
    let head = event.payload.get("head_commit")?;
    let message = head.get("message")?.as_str()?;
    Some(LinkedActivity {
        // First line of the commit message
        title: message.lines().next().unwrap_or(message).to_string(),
        url: head.get("url")?.as_str()?.to_string(),
        timestamp: event.event_time,
        confidence,
        match_reason: MATCH_REASON.to_string(),
    })
}

/// Issue events contribute only when closed.
fn qualify_issue(event: &RepoEvent, confidence: Confidence) -> Option<LinkedActivity> {
    if event.action.as_deref() != Some("closed") {
        return None;
    }
    let issue = event.payload.get("issue")?;
    Some(LinkedActivity {
        title: issue.get("title")?.as_str()?.to_string(),
        url: issue.get("html_url")?.as_str()?.to_string(),
        timestamp: event.event_time,
        confidence,
        match_reason: MATCH_REASON.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn event(event_type: &str, action: Option<&str>, at: DateTime<Utc>, payload: Value) -> RepoEvent {
        RepoEvent {
            id: "delivery-1".to_string(),
            event_type: event_type.to_string(),
            repository: "acme/app".to_string(),
            event_time: at,
            action: action.map(|a| a.to_string()),
            payload,
            processed: false,
        }
    }

    fn clip_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 14, 0, 0).unwrap()
    }

    #[test]
    fn test_merged_pr_qualifies() {
        let e = event(
            "pull_request",
            Some("closed"),
            clip_time(),
            json!({"pull_request": {
                "merged": true,
                "title": "Fix retry loop",
                "html_url": "https://github.com/acme/app/pull/7"
            }}),
        );
        let mut ctx = GitHubContext::empty("ClipA_01");
        classify_event(&e, Confidence::High, &mut ctx);
        assert_eq!(ctx.linked_prs.len(), 1);
        assert_eq!(ctx.linked_prs[0].match_reason, "temporal_proximity");
    }

    #[test]
    fn test_unmerged_pr_close_skipped() {
        let e = event(
            "pull_request",
            Some("closed"),
            clip_time(),
            json!({"pull_request": {"merged": false, "title": "t", "html_url": "u"}}),
        );
        let mut ctx = GitHubContext::empty("ClipA_01");
        classify_event(&e, Confidence::High, &mut ctx);
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_push_requires_default_branch() {
        let on_feature = event(
            "push",
            None,
            clip_time(),
            json!({
                "ref": "refs/heads/feature-x",
                "repository": {"default_branch": "main"},
                "head_commit": {"message": "wip", "url": "https://github.com/acme/app/commit/a"}
            }),
        );
        let on_main = event(
            "push",
            None,
            clip_time(),
            json!({
                "ref": "refs/heads/main",
                "repository": {"default_branch": "main"},
                "head_commit": {
                    "message": "Fix cache key\n\nlonger body",
                    "url": "https://github.com/acme/app/commit/b"
                }
            }),
        );

        let mut ctx = GitHubContext::empty("ClipA_01");
        classify_event(&on_feature, Confidence::High, &mut ctx);
        classify_event(&on_main, Confidence::High, &mut ctx);
        assert_eq!(ctx.linked_commits.len(), 1);
        assert_eq!(ctx.linked_commits[0].title, "Fix cache key");
    }

    #[test]
    fn test_push_default_branch_falls_back_to_main() {
        let e = event(
            "push",
            None,
            clip_time(),
            json!({
                "ref": "refs/heads/main",
                "repository": {},
                "head_commit": {"message": "m", "url": "u"}
            }),
        );
        let mut ctx = GitHubContext::empty("ClipA_01");
        classify_event(&e, Confidence::Low, &mut ctx);
        assert_eq!(ctx.linked_commits.len(), 1);
    }

    #[test]
    fn test_open_issue_skipped_closed_qualifies() {
        let opened = event(
            "issues",
            Some("opened"),
            clip_time(),
            json!({"issue": {"title": "bug", "html_url": "u"}}),
        );
        let closed = event(
            "issues",
            Some("closed"),
            clip_time(),
            json!({"issue": {"title": "bug", "html_url": "u"}}),
        );
        let mut ctx = GitHubContext::empty("ClipA_01");
        classify_event(&opened, Confidence::Medium, &mut ctx);
        classify_event(&closed, Confidence::Medium, &mut ctx);
        assert_eq!(ctx.linked_issues.len(), 1);
    }

    /// Clip at 14:00Z; events at 13:35, 14:50, 16:10. With W=2h the first
    /// two land at medium and the third is outside the window.
    #[test]
    fn test_window_and_tier_assignment() {
        let clip = clip_time();
        let window = Duration::hours(DEFAULT_WINDOW_HOURS);

        let offsets_and_expected = [
            (Utc.with_ymd_and_hms(2024, 5, 10, 13, 35, 0).unwrap(), Some(Confidence::Medium)),
            (Utc.with_ymd_and_hms(2024, 5, 10, 14, 50, 0).unwrap(), Some(Confidence::Medium)),
            (Utc.with_ymd_and_hms(2024, 5, 10, 16, 10, 0).unwrap(), None),
        ];

        for (at, expected) in offsets_and_expected {
            let in_window = at >= clip - window && at <= clip + window;
            let tier = Confidence::from_minute_distance((at - clip).num_minutes());
            match expected {
                Some(want) => {
                    assert!(in_window);
                    assert_eq!(tier, want);
                }
                None => assert!(!in_window),
            }
        }
    }
}
