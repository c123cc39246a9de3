//! Shared data models for the StreamRecap backend.
//!
//! This crate provides Serde-serializable types for:
//! - Broadcast clips and their per-clip content items
//! - Transcripts and transcript segments
//! - Repository events and per-clip GitHub context
//! - The daily manifest and its sections
//! - Jobs, job status, and pipeline progress
//! - Storage keyspace composition and identifier validation

pub mod clip;
pub mod content_item;
pub mod error;
pub mod event;
pub mod github_context;
pub mod job;
pub mod keys;
pub mod manifest;
pub mod transcript;

// Re-export common types
pub use clip::{Clip, ClipUpdate, MAX_CLIP_DURATION_SECONDS};
pub use content_item::{
    ContentCategory, ContentItem, ContentItemUpdate, ProcessingStatus, CONTENT_ITEM_SCHEMA_VERSION,
    MAX_TRANSCRIPT_SUMMARY_CHARS,
};
pub use error::{ModelError, ModelResult};
pub use event::RepoEvent;
pub use github_context::{Confidence, GitHubContext, LinkedActivity, DEFAULT_CONFIDENCE_SCORE};
pub use job::{
    Job, JobFailure, JobId, JobProgress, JobStatus, PipelineStep, DEFAULT_JOB_TTL_HOURS,
};
pub use keys::{
    audio_key, blog_post_key, clip_key, content_item_key, content_item_prefix, event_key,
    event_day_prefix, is_valid_clip_id, manifest_key, transcript_key, TranscriptArtifact,
};
pub use manifest::{
    AlignmentStatus, Draft, GenMeta, Manifest, ManifestJudge, ManifestSection, ManifestStatus,
    PostKind, MANIFEST_SCHEMA_VERSION, MAX_HEADLINE_CHARS, MAX_SECTIONS, MAX_TITLE_CHARS,
    MIN_SECTIONS,
};
pub use transcript::{Transcript, TranscriptMeta, TranscriptSegment};
