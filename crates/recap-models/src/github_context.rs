//! Per-clip GitHub correlation records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Aggregate confidence assigned to a correlation record.
pub const DEFAULT_CONFIDENCE_SCORE: f64 = 0.8;

/// Temporal-proximity confidence tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Within 30 minutes of the clip
    High,
    /// Within 60 minutes of the clip
    Medium,
    /// Inside the window but more than an hour away
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }

    /// Tier for an absolute clip-to-event distance in minutes.
    pub fn from_minute_distance(minutes: i64) -> Self {
        let minutes = minutes.abs();
        if minutes <= 30 {
            Confidence::High
        } else if minutes <= 60 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

/// One linked PR, commit, or issue.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LinkedActivity {
    pub title: String,
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub confidence: Confidence,
    /// Why the link was made; always "temporal_proximity" today
    pub match_reason: String,
}

/// The per-clip correlation record, stored as its own artifact and
/// referenced from the content item by URL.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitHubContext {
    pub clip_id: String,
    pub linked_prs: Vec<LinkedActivity>,
    pub linked_commits: Vec<LinkedActivity>,
    pub linked_issues: Vec<LinkedActivity>,
    /// Aggregate confidence (0..1)
    pub confidence_score: f64,
}

impl GitHubContext {
    /// Empty context for a clip.
    pub fn empty(clip_id: impl Into<String>) -> Self {
        Self {
            clip_id: clip_id.into(),
            linked_prs: Vec::new(),
            linked_commits: Vec::new(),
            linked_issues: Vec::new(),
            confidence_score: DEFAULT_CONFIDENCE_SCORE,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.linked_prs.is_empty() && self.linked_commits.is_empty() && self.linked_issues.is_empty()
    }

    /// Total number of linked activities.
    pub fn total_links(&self) -> usize {
        self.linked_prs.len() + self.linked_commits.len() + self.linked_issues.len()
    }

    /// One-line summary stored on the content item.
    pub fn summary(&self) -> String {
        format!(
            "{} PRs, {} commits, {} issues",
            self.linked_prs.len(),
            self.linked_commits.len(),
            self.linked_issues.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_tiers() {
        assert_eq!(Confidence::from_minute_distance(0), Confidence::High);
        assert_eq!(Confidence::from_minute_distance(-25), Confidence::High);
        assert_eq!(Confidence::from_minute_distance(30), Confidence::High);
        assert_eq!(Confidence::from_minute_distance(31), Confidence::Medium);
        assert_eq!(Confidence::from_minute_distance(60), Confidence::Medium);
        assert_eq!(Confidence::from_minute_distance(61), Confidence::Low);
        assert_eq!(Confidence::from_minute_distance(119), Confidence::Low);
    }

    #[test]
    fn test_summary_counts() {
        let mut ctx = GitHubContext::empty("ClipA_01");
        ctx.linked_commits.push(LinkedActivity {
            title: "Fix ingest retry".to_string(),
            url: "https://github.com/acme/app/commit/abc".to_string(),
            timestamp: Utc::now(),
            confidence: Confidence::High,
            match_reason: "temporal_proximity".to_string(),
        });
        assert_eq!(ctx.summary(), "0 PRs, 1 commits, 0 issues");
        assert!(!ctx.is_empty());
    }
}
