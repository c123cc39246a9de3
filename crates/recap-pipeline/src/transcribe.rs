//! Transcription orchestration: WAV fetch, validation, model call,
//! redaction, and write-once artifact persistence.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{info, warn};

use recap_ai::TranscriptionClient;
use recap_content::ContentItemManager;
use recap_models::{
    transcript_key, ContentItem, ContentItemUpdate, ProcessingStatus, Transcript, TranscriptMeta,
    TranscriptSegment, TranscriptArtifact,
};
use recap_redact::redact_text;
use recap_storage::ArtifactStore;

use crate::error::PipelineResult;
use crate::subtitle::build_vtt;
use crate::wav::{encode_base64_chunked, validate_wav};

/// Bounded parallelism for batch transcription.
pub const BATCH_PARALLELISM: usize = 5;

/// Transcripts shorter than this are noise.
const MIN_TRANSCRIPT_CHARS: usize = 10;

/// Minimum share of alphanumeric characters in a valid transcript.
const MIN_ALNUM_RATIO: f64 = 0.3;

/// Error phrases some models emit instead of failing.
const ERROR_PHRASES: [&str; 7] = [
    "no speech detected",
    "silence",
    "no audio",
    "error",
    "failed",
    "null",
    "undefined",
];

/// Per-clip outcome. Failures here are recoverable: the content item keeps
/// its status and a later run re-attempts.
#[derive(Debug, Clone)]
pub enum TranscribeOutcome {
    Complete(TranscriptMeta),
    Failed { code: &'static str },
}

impl TranscribeOutcome {
    fn failed(code: &'static str) -> Self {
        Self::Failed { code }
    }
}

/// Summary of a batch run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// Drives a clip from stored audio to persisted transcript artifacts.
#[derive(Clone)]
pub struct TranscriptionOrchestrator {
    store: Arc<ArtifactStore>,
    client: TranscriptionClient,
}

impl TranscriptionOrchestrator {
    pub fn new(store: Arc<ArtifactStore>, client: TranscriptionClient) -> Self {
        Self { store, client }
    }

    /// Transcribe one clip.
    ///
    /// Idempotent: an existing canonical transcript short-circuits without
    /// touching the model. No artifact is written before the transcript
    /// passes full validation.
    pub async fn transcribe_clip(&self, clip_id: &str) -> PipelineResult<TranscribeOutcome> {
        let json_key = transcript_key(clip_id, TranscriptArtifact::Json)?;

        // Idempotent short-circuit on the canonical artifact
        if self.store.exists(&json_key).await? {
            let transcript: Transcript = self.store.get_json(&json_key).await?;
            let head = self.store.head(&json_key).await?;
            info!(clip_id, "Transcript already exists, emitting stored metadata");
            return Ok(TranscribeOutcome::Complete(TranscriptMeta {
                url: self.store.object_url(&json_key),
                summary: transcript.summary(),
                size_bytes: head.size,
            }));
        }

        // Fetch the audio artifact
        let audio_key = recap_models::audio_key(clip_id)?;
        let audio = match self.store.get(&audio_key).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => {
                warn!(clip_id, "Audio artifact missing");
                return Ok(TranscribeOutcome::failed("audio-missing"));
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(rejection) = validate_wav(&audio) {
            warn!(clip_id, code = rejection.code(), "Rejected audio artifact");
            return Ok(TranscribeOutcome::failed(rejection.code()));
        }

        // One model call; job-level retry is the worker's decision
        let audio_base64 = encode_base64_chunked(&audio);
        let response = match self.client.transcribe(&audio_base64).await {
            Ok(response) => response,
            Err(e) => {
                warn!(clip_id, "Transcription collaborator failed: {}", e);
                return Ok(TranscribeOutcome::failed("transcription-failed"));
            }
        };

        // Redact before anything is persisted or measured
        let text = redact_text(response.text.trim());
        let segments: Vec<TranscriptSegment> = response
            .segments
            .into_iter()
            .map(|s| TranscriptSegment {
                start_s: s.start,
                end_s: s.end,
                text: redact_text(s.text.trim()),
            })
            .collect();

        if !transcript_is_usable(&text, &segments) {
            warn!(clip_id, "Transcript failed validation");
            return Ok(TranscribeOutcome::failed("empty-transcript"));
        }

        let transcript = Transcript {
            clip_id: clip_id.to_string(),
            created_at: Utc::now(),
            model: self.client.model().to_string(),
            language: response.language,
            segments,
            text,
            redacted: true,
        };
        transcript.validate()?;

        // Persist all sibling artifacts, marker last
        let body = serde_json::to_vec(&transcript)?;
        let size_bytes = body.len() as u64;
        let metadata = HashMap::from([("clip-id".to_string(), clip_id.to_string())]);

        self.store
            .put(&json_key, body, TranscriptArtifact::Json.content_type(), metadata.clone())
            .await?;

        let txt_key = transcript_key(clip_id, TranscriptArtifact::Text)?;
        self.store
            .put(
                &txt_key,
                transcript.text.clone().into_bytes(),
                TranscriptArtifact::Text.content_type(),
                metadata.clone(),
            )
            .await?;

        if !transcript.segments.is_empty() {
            let vtt_key = transcript_key(clip_id, TranscriptArtifact::Vtt)?;
            self.store
                .put(
                    &vtt_key,
                    build_vtt(&transcript.segments).into_bytes(),
                    TranscriptArtifact::Vtt.content_type(),
                    metadata.clone(),
                )
                .await?;
        }

        let ok_key = transcript_key(clip_id, TranscriptArtifact::Ok)?;
        let marker = serde_json::json!({ "completed_at": transcript.created_at });
        self.store
            .put(
                &ok_key,
                serde_json::to_vec(&marker)?,
                TranscriptArtifact::Ok.content_type(),
                metadata,
            )
            .await?;

        info!(clip_id, size_bytes, "Persisted transcript artifacts");
        Ok(TranscribeOutcome::Complete(TranscriptMeta {
            url: self.store.object_url(&json_key),
            summary: transcript.summary(),
            size_bytes,
        }))
    }

    /// Transcribe a batch of content items with bounded parallelism,
    /// recording each outcome on its item.
    ///
    /// A successful clip advances to `transcribed`; a failed clip records
    /// the failure code without a status change so the next run retries.
    pub async fn transcribe_items(
        &self,
        items: Vec<ContentItem>,
        manager: &ContentItemManager,
    ) -> PipelineResult<BatchReport> {
        let outcomes: Vec<(ContentItem, PipelineResult<TranscribeOutcome>)> =
            stream::iter(items.into_iter())
                .map(|item| async move {
                    let outcome = self.transcribe_clip(&item.clip_id).await;
                    (item, outcome)
                })
                .buffer_unordered(BATCH_PARALLELISM)
                .collect()
                .await;

        let mut report = BatchReport::default();
        for (item, outcome) in outcomes {
            match outcome {
                Ok(TranscribeOutcome::Complete(meta)) => {
                    let update = ContentItemUpdate {
                        processing_status: Some(ProcessingStatus::Transcribed),
                        transcript_url: Some(meta.url),
                        transcript_summary: Some(meta.summary),
                        transcript_size_bytes: Some(meta.size_bytes),
                        ..Default::default()
                    };
                    manager
                        .update(&item.clip_id, item.clip_created_at, update)
                        .await?;
                    report.succeeded.push(item.clip_id);
                }
                Ok(TranscribeOutcome::Failed { code }) => {
                    let update = ContentItemUpdate {
                        error: Some(code.to_string()),
                        ..Default::default()
                    };
                    manager
                        .update(&item.clip_id, item.clip_created_at, update)
                        .await?;
                    report.failed.push((item.clip_id, code.to_string()));
                }
                Err(e) => {
                    warn!(clip_id = %item.clip_id, "Transcription errored: {}", e);
                    report.failed.push((item.clip_id, "collaborator-failed".to_string()));
                }
            }
        }

        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "Finished transcription batch"
        );
        Ok(report)
    }
}

/// Validate transcript content before persistence.
fn transcript_is_usable(text: &str, segments: &[TranscriptSegment]) -> bool {
    let trimmed = text.trim();
    if trimmed.chars().count() < MIN_TRANSCRIPT_CHARS {
        return false;
    }
    let lowered = trimmed.to_lowercase();
    if ERROR_PHRASES.iter().any(|phrase| lowered == *phrase) {
        return false;
    }
    if !segments.is_empty() && !segments.iter().any(|s| !s.text.trim().is_empty()) {
        return false;
    }
    let total = trimmed.chars().count() as f64;
    let alnum = trimmed.chars().filter(|c| c.is_alphanumeric()).count() as f64;
    alnum / total >= MIN_ALNUM_RATIO
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(text: &str) -> TranscriptSegment {
        TranscriptSegment {
            start_s: 0.0,
            end_s: 1.0,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_usable_transcript() {
        assert!(transcript_is_usable("hello world", &[seg("hello world")]));
    }

    #[test]
    fn test_short_text_rejected() {
        assert!(!transcript_is_usable("hi", &[seg("hi")]));
    }

    #[test]
    fn test_error_phrases_rejected() {
        assert!(!transcript_is_usable("no speech detected", &[]));
        assert!(!transcript_is_usable("Undefined", &[]));
        // A real sentence mentioning an error phrase is fine
        assert!(transcript_is_usable("the deploy failed twice today", &[]));
    }

    #[test]
    fn test_all_blank_segments_rejected() {
        assert!(!transcript_is_usable("some perfectly fine text", &[seg(""), seg("  ")]));
    }

    #[test]
    fn test_low_alnum_ratio_rejected() {
        assert!(!transcript_is_usable("... --- ... !!! ???", &[]));
    }

    #[test]
    fn test_no_segments_is_acceptable() {
        assert!(transcript_is_usable("a transcript without alignment", &[]));
    }
}
