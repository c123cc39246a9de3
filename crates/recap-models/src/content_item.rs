//! Per-clip content items and their lifecycle state machine.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::clip::Clip;
use crate::error::{ModelError, ModelResult};
use crate::keys::{content_item_key, is_valid_clip_id};

/// Current content-item schema version.
pub const CONTENT_ITEM_SCHEMA_VERSION: u32 = 2;

/// Cap on the stored transcript summary.
pub const MAX_TRANSCRIPT_SUMMARY_CHARS: usize = 200;

/// Processing lifecycle of a content item.
///
/// Advances monotonically towards `ReadyForContent`, or to `Failed`. The
/// manager rejects any regression.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    /// Clip ingested, nothing processed yet
    #[default]
    Pending,
    /// Audio extracted and stored
    AudioReady,
    /// Transcript artifacts written
    Transcribed,
    /// GitHub context linked
    Enhanced,
    /// Eligible for selection
    ReadyForContent,
    /// Unrecoverable per-item failure
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::AudioReady => "audio_ready",
            ProcessingStatus::Transcribed => "transcribed",
            ProcessingStatus::Enhanced => "enhanced",
            ProcessingStatus::ReadyForContent => "ready_for_content",
            ProcessingStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "audio_ready" => Some(Self::AudioReady),
            "transcribed" => Some(Self::Transcribed),
            "enhanced" => Some(Self::Enhanced),
            "ready_for_content" => Some(Self::ReadyForContent),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Position in the forward chain. `Failed` is outside the chain.
    fn rank(&self) -> Option<u8> {
        match self {
            ProcessingStatus::Pending => Some(0),
            ProcessingStatus::AudioReady => Some(1),
            ProcessingStatus::Transcribed => Some(2),
            ProcessingStatus::Enhanced => Some(3),
            ProcessingStatus::ReadyForContent => Some(4),
            ProcessingStatus::Failed => None,
        }
    }

    /// Whether a transition from `self` to `next` is allowed.
    ///
    /// Forward moves (including re-writing the same status) and moves to
    /// `Failed` are allowed; everything else is a regression.
    pub fn can_transition_to(&self, next: ProcessingStatus) -> bool {
        if next == ProcessingStatus::Failed {
            return true;
        }
        match (self.rank(), next.rank()) {
            (Some(from), Some(to)) => to >= from,
            // Failed is terminal for the forward chain
            (None, _) => false,
            (_, None) => unreachable!("non-failed status has a rank"),
        }
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Editorial category assigned during enhancement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContentCategory {
    #[default]
    Development,
    Gaming,
    Tutorial,
    Review,
    Other,
}

impl ContentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentCategory::Development => "development",
            ContentCategory::Gaming => "gaming",
            ContentCategory::Tutorial => "tutorial",
            ContentCategory::Review => "review",
            ContentCategory::Other => "other",
        }
    }
}

/// The per-clip aggregate that advances through the lifecycle.
///
/// Large sub-objects (transcript, GitHub context) live in separate artifacts
/// referenced by URL so the record stays small enough for metadata-filtered
/// listings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ContentItem {
    /// Record schema version
    pub schema_version: u32,

    /// Clip identifier (storage key component)
    pub clip_id: String,

    /// Embedded clip title
    pub clip_title: String,

    /// Embedded clip watch URL
    pub clip_url: String,

    /// Embedded clip duration in seconds
    pub clip_duration: f64,

    /// Embedded clip creation instant (UTC); drives the storage key
    pub clip_created_at: DateTime<Utc>,

    /// Embedded clip view count
    #[serde(default)]
    pub clip_view_count: u64,

    /// Lifecycle status
    #[serde(default)]
    pub processing_status: ProcessingStatus,

    /// URL of the canonical transcript artifact
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_url: Option<String>,

    /// First 200 chars of the transcript
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_summary: Option<String>,

    /// Size of the canonical transcript artifact
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_size_bytes: Option<u64>,

    /// URL of the GitHub context artifact
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_context_url: Option<String>,

    /// One-line summary of linked repository activity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_summary: Option<String>,

    /// Editorial score (0..1)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_score: Option<f64>,

    /// Editorial category
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_category: Option<ContentCategory>,

    /// Server-side storage instant
    pub stored_at: DateTime<Utc>,

    /// When enhancement completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enhanced_at: Option<DateTime<Utc>>,

    /// Last per-item error, kept for the next run to inspect
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ContentItem {
    /// Create a pending item from an ingested clip.
    pub fn from_clip(clip: &Clip) -> Self {
        Self {
            schema_version: CONTENT_ITEM_SCHEMA_VERSION,
            clip_id: clip.clip_id.clone(),
            clip_title: clip.title.clone(),
            clip_url: clip.url.clone(),
            clip_duration: clip.duration_seconds,
            clip_created_at: clip.created_at,
            clip_view_count: clip.view_count,
            processing_status: ProcessingStatus::Pending,
            transcript_url: None,
            transcript_summary: None,
            transcript_size_bytes: None,
            github_context_url: None,
            github_summary: None,
            content_score: None,
            content_category: None,
            stored_at: Utc::now(),
            enhanced_at: None,
            error: None,
        }
    }

    /// Storage key derived from the clip creation instant (UTC).
    pub fn storage_key(&self) -> ModelResult<String> {
        content_item_key(&self.clip_id, self.clip_created_at)
    }

    /// Validate the record against the schema.
    pub fn validate(&self) -> ModelResult<()> {
        if !is_valid_clip_id(&self.clip_id) {
            return Err(ModelError::InvalidClipId(self.clip_id.clone()));
        }
        if self.schema_version == 0 || self.schema_version > CONTENT_ITEM_SCHEMA_VERSION {
            return Err(ModelError::invalid_field(
                "schema_version",
                format!("unsupported: {}", self.schema_version),
            ));
        }
        if let Some(summary) = &self.transcript_summary {
            if summary.chars().count() > MAX_TRANSCRIPT_SUMMARY_CHARS {
                return Err(ModelError::invalid_field(
                    "transcript_summary",
                    "exceeds 200 chars",
                ));
            }
        }
        if let Some(score) = self.content_score {
            if !(0.0..=1.0).contains(&score) {
                return Err(ModelError::invalid_field(
                    "content_score",
                    format!("out of range: {score}"),
                ));
            }
        }
        Ok(())
    }
}

/// Partial update to a content item.
///
/// Immutable fields (`schema_version`, `clip_id`, `clip_title`, `clip_url`,
/// `clip_duration`, `clip_created_at`, `stored_at`) are not representable
/// here; the manager's read-modify-write preserves them by construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ContentItemUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_status: Option<ProcessingStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_context_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_category: Option<ContentCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enhanced_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ContentItemUpdate {
    /// Merge into an existing item, enforcing the status state machine.
    pub fn apply(self, mut item: ContentItem) -> ModelResult<ContentItem> {
        if let Some(next) = self.processing_status {
            if !item.processing_status.can_transition_to(next) {
                return Err(ModelError::invalid_transition(
                    item.processing_status,
                    next,
                ));
            }
            item.processing_status = next;
        }
        if let Some(v) = self.transcript_url {
            item.transcript_url = Some(v);
        }
        if let Some(v) = self.transcript_summary {
            item.transcript_summary = Some(v);
        }
        if let Some(v) = self.transcript_size_bytes {
            item.transcript_size_bytes = Some(v);
        }
        if let Some(v) = self.github_context_url {
            item.github_context_url = Some(v);
        }
        if let Some(v) = self.github_summary {
            item.github_summary = Some(v);
        }
        if let Some(v) = self.content_score {
            item.content_score = Some(v);
        }
        if let Some(v) = self.content_category {
            item.content_category = Some(v);
        }
        if let Some(v) = self.enhanced_at {
            item.enhanced_at = Some(v);
        }
        if let Some(v) = self.error {
            item.error = Some(v);
        }
        item.validate()?;
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_item() -> ContentItem {
        ContentItem {
            schema_version: CONTENT_ITEM_SCHEMA_VERSION,
            clip_id: "ClipA_01".to_string(),
            clip_title: "Refactoring the ingest loop".to_string(),
            clip_url: "https://clips.example.tv/ClipA_01".to_string(),
            clip_duration: 55.0,
            clip_created_at: Utc.with_ymd_and_hms(2024, 5, 10, 14, 0, 0).unwrap(),
            clip_view_count: 12,
            processing_status: ProcessingStatus::Pending,
            transcript_url: None,
            transcript_summary: None,
            transcript_size_bytes: None,
            github_context_url: None,
            github_summary: None,
            content_score: None,
            content_category: None,
            stored_at: Utc::now(),
            enhanced_at: None,
            error: None,
        }
    }

    #[test]
    fn test_status_advances_monotonically() {
        use ProcessingStatus::*;
        assert!(Pending.can_transition_to(AudioReady));
        assert!(Pending.can_transition_to(Transcribed));
        assert!(Transcribed.can_transition_to(Transcribed));
        assert!(AudioReady.can_transition_to(Failed));
        assert!(!Transcribed.can_transition_to(Pending));
        assert!(!ReadyForContent.can_transition_to(Enhanced));
        assert!(!Failed.can_transition_to(Pending));
    }

    #[test]
    fn test_storage_key_matches_created_at() {
        let item = sample_item();
        assert_eq!(
            item.storage_key().unwrap(),
            "content-items/2024/05/ClipA_01.json"
        );
    }

    #[test]
    fn test_update_rejects_regression() {
        let mut item = sample_item();
        item.processing_status = ProcessingStatus::Transcribed;

        let update = ContentItemUpdate {
            processing_status: Some(ProcessingStatus::Pending),
            ..Default::default()
        };
        assert!(update.apply(item).is_err());
    }

    #[test]
    fn test_update_merges_fields() {
        let item = sample_item();
        let update = ContentItemUpdate {
            processing_status: Some(ProcessingStatus::Transcribed),
            transcript_url: Some("https://store/transcripts/ClipA_01.json".to_string()),
            transcript_size_bytes: Some(1024),
            ..Default::default()
        };
        let merged = update.apply(item).unwrap();
        assert_eq!(merged.processing_status, ProcessingStatus::Transcribed);
        assert_eq!(merged.transcript_size_bytes, Some(1024));
    }

    #[test]
    fn test_out_of_range_score_rejected() {
        let item = sample_item();
        let update = ContentItemUpdate {
            content_score: Some(1.5),
            ..Default::default()
        };
        assert!(update.apply(item).is_err());
    }
}
