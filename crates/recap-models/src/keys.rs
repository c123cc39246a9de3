//! Storage keyspace composition and identifier validation.
//!
//! Every key under which an artifact is stored is derived here, from
//! validated identifiers only. User-supplied ids are checked against the
//! clip-id lexicon before any key is composed, so path traversal can never
//! reach the object store.

use chrono::{DateTime, Datelike, Utc};

use crate::error::{ModelError, ModelResult};

/// Maximum clip id length.
pub const MAX_CLIP_ID_LEN: usize = 50;

/// Validate a clip id against the lexicon `[A-Za-z0-9_-]{1,50}`.
///
/// The lexicon excludes `/`, `\`, `.` and NUL by construction, so a valid
/// clip id is always safe to embed in a storage key.
pub fn is_valid_clip_id(id: &str) -> bool {
    if id.is_empty() || id.len() > MAX_CLIP_ID_LEN {
        return false;
    }
    id.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Validate a clip id, returning it on success.
pub fn validate_clip_id(id: &str) -> ModelResult<&str> {
    if is_valid_clip_id(id) {
        Ok(id)
    } else {
        Err(ModelError::InvalidClipId(id.to_string()))
    }
}

/// Transcript sibling artifacts sharing the `transcripts/{clip_id}` key root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptArtifact {
    /// Canonical JSON transcript
    Json,
    /// Full plain text
    Text,
    /// WebVTT subtitles (only written when segments exist)
    Vtt,
    /// Completion marker adjacent to the JSON artifact
    Ok,
}

impl TranscriptArtifact {
    pub fn extension(&self) -> &'static str {
        match self {
            TranscriptArtifact::Json => "json",
            TranscriptArtifact::Text => "txt",
            TranscriptArtifact::Vtt => "vtt",
            TranscriptArtifact::Ok => "ok",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            TranscriptArtifact::Json | TranscriptArtifact::Ok => "application/json",
            TranscriptArtifact::Text => "text/plain; charset=utf-8",
            TranscriptArtifact::Vtt => "text/vtt",
        }
    }
}

/// `clips/{clip_id}.json`
pub fn clip_key(clip_id: &str) -> ModelResult<String> {
    Ok(format!("clips/{}.json", validate_clip_id(clip_id)?))
}

/// `audio/{clip_id}.wav`
pub fn audio_key(clip_id: &str) -> ModelResult<String> {
    Ok(format!("audio/{}.wav", validate_clip_id(clip_id)?))
}

/// `transcripts/{clip_id}.{json|txt|vtt|ok}`
pub fn transcript_key(clip_id: &str, artifact: TranscriptArtifact) -> ModelResult<String> {
    Ok(format!(
        "transcripts/{}.{}",
        validate_clip_id(clip_id)?,
        artifact.extension()
    ))
}

/// `content-items/{YYYY}/{MM}/{clip_id}.json` with the date taken from the
/// clip creation instant in UTC.
pub fn content_item_key(clip_id: &str, clip_created_at: DateTime<Utc>) -> ModelResult<String> {
    Ok(format!(
        "content-items/{:04}/{:02}/{}.json",
        clip_created_at.year(),
        clip_created_at.month(),
        validate_clip_id(clip_id)?
    ))
}

/// `content-items/{YYYY}/{MM}/` month prefix for listings.
pub fn content_item_prefix(year: i32, month: u32) -> String {
    format!("content-items/{:04}/{:02}/", year, month)
}

/// `events/{YYYY}/{MM}/{DD}/{delivery_id}.json` with the date taken from the
/// event time in UTC. Delivery ids come from the webhook producer and share
/// the clip-id lexicon.
pub fn event_key(delivery_id: &str, event_time: DateTime<Utc>) -> ModelResult<String> {
    if !is_valid_clip_id(delivery_id) {
        return Err(ModelError::InvalidClipId(delivery_id.to_string()));
    }
    Ok(format!(
        "{}{}.json",
        event_day_prefix(event_time),
        delivery_id
    ))
}

/// `events/{YYYY}/{MM}/{DD}/` day-bucket prefix.
pub fn event_day_prefix(day: DateTime<Utc>) -> String {
    format!(
        "events/{:04}/{:02}/{:02}/",
        day.year(),
        day.month(),
        day.day()
    )
}

/// `manifests/{YYYY}/{MM}/{post_id}.json`. Post ids are `YYYY-MM-DD`.
pub fn manifest_key(post_id: &str) -> ModelResult<String> {
    let (year, month) = parse_post_id(post_id)?;
    Ok(format!("manifests/{:04}/{:02}/{}.json", year, month, post_id))
}

/// `blog-posts/{post_id}.md`
pub fn blog_post_key(post_id: &str) -> ModelResult<String> {
    parse_post_id(post_id)?;
    Ok(format!("blog-posts/{}.md", post_id))
}

fn parse_post_id(post_id: &str) -> ModelResult<(i32, u32)> {
    let date = chrono::NaiveDate::parse_from_str(post_id, "%Y-%m-%d")
        .map_err(|_| ModelError::invalid_field("post_id", format!("not a date: {post_id}")))?;
    Ok((date.year(), date.month()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_clip_id_lexicon() {
        assert!(is_valid_clip_id("ClipA_01"));
        assert!(is_valid_clip_id("a-b_C9"));
        assert!(!is_valid_clip_id(""));
        assert!(!is_valid_clip_id("../foo"));
        assert!(!is_valid_clip_id("a/b"));
        assert!(!is_valid_clip_id("a\\b"));
        assert!(!is_valid_clip_id("a.b"));
        assert!(!is_valid_clip_id("a\0b"));
        assert!(!is_valid_clip_id(&"x".repeat(51)));
    }

    #[test]
    fn test_content_item_key_uses_utc_month() {
        let created = Utc.with_ymd_and_hms(2024, 5, 10, 23, 59, 0).unwrap();
        let key = content_item_key("ClipA_01", created).unwrap();
        assert_eq!(key, "content-items/2024/05/ClipA_01.json");
    }

    #[test]
    fn test_traversal_rejected_before_key_composition() {
        assert!(clip_key("../etc/passwd").is_err());
        assert!(audio_key("a/b").is_err());
        assert!(transcript_key("a.b", TranscriptArtifact::Json).is_err());
    }

    #[test]
    fn test_event_key_day_bucket() {
        let at = Utc.with_ymd_and_hms(2024, 5, 10, 14, 0, 0).unwrap();
        assert_eq!(
            event_key("delivery-123", at).unwrap(),
            "events/2024/05/10/delivery-123.json"
        );
    }

    #[test]
    fn test_manifest_key_from_post_id() {
        assert_eq!(
            manifest_key("2024-05-10").unwrap(),
            "manifests/2024/05/2024-05-10.json"
        );
        assert!(manifest_key("not-a-date").is_err());
    }
}
