//! Broadcast clip records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::keys::is_valid_clip_id;

/// Maximum clip duration accepted at ingest (one hour).
pub const MAX_CLIP_DURATION_SECONDS: f64 = 3600.0;

/// Immutable record of a broadcast clip.
///
/// Created when ingested from the platform, never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Clip {
    /// Platform clip identifier, matches `[A-Za-z0-9_-]{1,50}`
    pub clip_id: String,

    /// Clip title as set by the creator
    pub title: String,

    /// Public watch URL
    pub url: String,

    /// Player embed URL
    pub embed_url: String,

    /// Thumbnail image URL
    pub thumbnail_url: String,

    /// Clip length in seconds (0..3600)
    pub duration_seconds: f64,

    /// Platform view count
    pub view_count: u64,

    /// When the clip was created on the platform (UTC)
    pub created_at: DateTime<Utc>,

    /// Broadcaster display name
    pub broadcaster: String,

    /// Clip creator display name
    pub creator: String,
}

impl Clip {
    /// Validate the record against the ingest schema.
    pub fn validate(&self) -> ModelResult<()> {
        if !is_valid_clip_id(&self.clip_id) {
            return Err(ModelError::InvalidClipId(self.clip_id.clone()));
        }
        if self.title.trim().is_empty() {
            return Err(ModelError::invalid_field("title", "must not be empty"));
        }
        if !self.duration_seconds.is_finite()
            || self.duration_seconds < 0.0
            || self.duration_seconds > MAX_CLIP_DURATION_SECONDS
        {
            return Err(ModelError::invalid_field(
                "duration_seconds",
                format!("out of range: {}", self.duration_seconds),
            ));
        }
        for (field, value) in [
            ("url", &self.url),
            ("embed_url", &self.embed_url),
            ("thumbnail_url", &self.thumbnail_url),
        ] {
            if !value.is_empty() && !value.starts_with("https://") {
                return Err(ModelError::invalid_field(field, "must be an https URL"));
            }
        }
        Ok(())
    }
}

/// Partial clip update accepted by the administrative surface.
///
/// Only these fields may change after ingest; everything else on a stored
/// clip is immutable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ClipUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_count: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

impl ClipUpdate {
    /// Apply the whitelisted fields to a stored clip, returning the merged
    /// record.
    pub fn apply(self, mut clip: Clip) -> Clip {
        if let Some(title) = self.title {
            clip.title = title;
        }
        if let Some(view_count) = self.view_count {
            clip.view_count = view_count;
        }
        if let Some(thumbnail_url) = self.thumbnail_url {
            clip.thumbnail_url = thumbnail_url;
        }
        clip
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.view_count.is_none() && self.thumbnail_url.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_clip() -> Clip {
        Clip {
            clip_id: "ClipA_01".to_string(),
            title: "Fixing the flaky deploy".to_string(),
            url: "https://clips.example.tv/ClipA_01".to_string(),
            embed_url: "https://clips.example.tv/embed?clip=ClipA_01".to_string(),
            thumbnail_url: "https://clips.example.tv/ClipA_01/thumb.jpg".to_string(),
            duration_seconds: 42.5,
            view_count: 10,
            created_at: Utc.with_ymd_and_hms(2024, 5, 10, 14, 0, 0).unwrap(),
            broadcaster: "streamer".to_string(),
            creator: "viewer".to_string(),
        }
    }

    #[test]
    fn test_valid_clip() {
        assert!(sample_clip().validate().is_ok());
    }

    #[test]
    fn test_invalid_duration_rejected() {
        let mut clip = sample_clip();
        clip.duration_seconds = 4000.0;
        assert!(clip.validate().is_err());

        clip.duration_seconds = f64::NAN;
        assert!(clip.validate().is_err());
    }

    #[test]
    fn test_traversal_clip_id_rejected() {
        let mut clip = sample_clip();
        clip.clip_id = "../foo".to_string();
        assert!(clip.validate().is_err());
    }

    #[test]
    fn test_update_applies_whitelisted_fields_only() {
        let clip = sample_clip();
        let update = ClipUpdate {
            title: Some("New title".to_string()),
            view_count: Some(99),
            thumbnail_url: None,
        };
        let merged = update.apply(clip.clone());
        assert_eq!(merged.title, "New title");
        assert_eq!(merged.view_count, 99);
        assert_eq!(merged.url, clip.url);
        assert_eq!(merged.created_at, clip.created_at);
    }
}
