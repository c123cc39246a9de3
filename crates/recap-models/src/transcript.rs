//! Transcript records and segments.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::content_item::MAX_TRANSCRIPT_SUMMARY_CHARS;
use crate::error::{ModelError, ModelResult};

/// One timed segment of a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TranscriptSegment {
    /// Segment start offset in seconds
    pub start_s: f64,
    /// Segment end offset in seconds
    pub end_s: f64,
    /// Redacted segment text
    pub text: String,
}

/// Canonical transcript record, written once under
/// `transcripts/{clip_id}.json`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Transcript {
    /// Clip this transcript belongs to
    pub clip_id: String,
    /// When the transcript was produced
    pub created_at: DateTime<Utc>,
    /// Transcription model identifier
    pub model: String,
    /// Detected or declared language tag
    pub language: String,
    /// Ordered timed segments; may be empty for models without alignment
    pub segments: Vec<TranscriptSegment>,
    /// Full redacted text
    pub text: String,
    /// Always true for persisted transcripts
    pub redacted: bool,
}

impl Transcript {
    /// Validate segment ordering invariants (`0 <= start < end`).
    pub fn validate(&self) -> ModelResult<()> {
        for (i, seg) in self.segments.iter().enumerate() {
            if !seg.start_s.is_finite() || !seg.end_s.is_finite() {
                return Err(ModelError::invalid_field(
                    "segments",
                    format!("segment {i} has a non-finite timestamp"),
                ));
            }
            if seg.start_s < 0.0 || seg.start_s >= seg.end_s {
                return Err(ModelError::invalid_field(
                    "segments",
                    format!("segment {i} violates 0 <= start < end"),
                ));
            }
        }
        Ok(())
    }

    /// Summary for the content item: the first 200 chars of the text (with
    /// an ellipsis when truncated), or a segment-count fallback when the
    /// text is blank.
    pub fn summary(&self) -> String {
        let trimmed = self.text.trim();
        if trimmed.is_empty() {
            return format!("{} segments in {}", self.segments.len(), self.language);
        }
        let chars: Vec<char> = trimmed.chars().collect();
        if chars.len() <= MAX_TRANSCRIPT_SUMMARY_CHARS {
            trimmed.to_string()
        } else {
            let mut s: String = chars[..MAX_TRANSCRIPT_SUMMARY_CHARS - 3].iter().collect();
            s.push_str("...");
            s
        }
    }
}

/// Metadata returned to callers after a transcript is persisted.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TranscriptMeta {
    /// URL of the canonical JSON artifact
    pub url: String,
    /// Summary as stored on the content item
    pub summary: String,
    /// Size of the canonical artifact in bytes
    pub size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcript_with(text: &str, segments: Vec<TranscriptSegment>) -> Transcript {
        Transcript {
            clip_id: "ClipA_01".to_string(),
            created_at: Utc::now(),
            model: "whisper-1".to_string(),
            language: "en".to_string(),
            segments,
            text: text.to_string(),
            redacted: true,
        }
    }

    #[test]
    fn test_segment_ordering_enforced() {
        let ok = transcript_with(
            "hello world",
            vec![TranscriptSegment {
                start_s: 0.0,
                end_s: 1.0,
                text: "hello world".to_string(),
            }],
        );
        assert!(ok.validate().is_ok());

        let bad = transcript_with(
            "hello",
            vec![TranscriptSegment {
                start_s: 2.0,
                end_s: 1.0,
                text: "hello".to_string(),
            }],
        );
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_summary_truncates_with_ellipsis() {
        let long = "a".repeat(500);
        let t = transcript_with(&long, vec![]);
        let summary = t.summary();
        assert_eq!(summary.chars().count(), 200);
        assert!(summary.ends_with("..."));
    }

    #[test]
    fn test_summary_falls_back_to_segment_count() {
        let t = transcript_with(
            "   ",
            vec![TranscriptSegment {
                start_s: 0.0,
                end_s: 1.0,
                text: "hi".to_string(),
            }],
        );
        assert_eq!(t.summary(), "1 segments in en");
    }
}
