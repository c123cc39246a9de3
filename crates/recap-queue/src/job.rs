//! Job payloads carried on the queue.
//!
//! Queue messages carry job identifiers plus enough of the request to run
//! without another round-trip; the job-state store remains authoritative
//! for status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use recap_models::{JobId, PostKind};

/// Job to generate the daily recap for one date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateContentJob {
    /// State-store job id
    pub job_id: JobId,
    /// Day to recap (`YYYY-MM-DD`, in `tz`)
    pub date: String,
    /// IANA timezone the day window is computed in
    pub tz: String,
    /// Kind of post to produce
    #[serde(default)]
    pub post_kind: PostKind,
    /// When the job was created
    pub created_at: DateTime<Utc>,
}

impl GenerateContentJob {
    pub fn new(job_id: JobId, date: impl Into<String>, tz: impl Into<String>) -> Self {
        Self {
            job_id,
            date: date.into(),
            tz: tz.into(),
            post_kind: PostKind::default(),
            created_at: Utc::now(),
        }
    }

    /// One recap per date and kind; a second enqueue for the same day is a
    /// duplicate.
    pub fn idempotency_key(&self) -> String {
        format!("generate:{}:{}", self.date, self.post_kind.as_str())
    }
}

/// Job to transcribe a batch of clips.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscribeBatchJob {
    /// State-store job id
    pub job_id: JobId,
    /// Clips to transcribe, already validated against the lexicon
    pub clip_ids: Vec<String>,
    /// When the job was created
    pub created_at: DateTime<Utc>,
}

impl TranscribeBatchJob {
    pub fn new(job_id: JobId, clip_ids: Vec<String>) -> Self {
        Self {
            job_id,
            clip_ids,
            created_at: Utc::now(),
        }
    }

    /// Deduplicate re-enqueues of the same job record.
    pub fn idempotency_key(&self) -> String {
        format!("transcribe:{}", self.job_id)
    }
}

/// All job types carried on the stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueJob {
    GenerateContent(GenerateContentJob),
    TranscribeBatch(TranscribeBatchJob),
}

impl QueueJob {
    /// The state-store job id.
    pub fn job_id(&self) -> &JobId {
        match self {
            QueueJob::GenerateContent(job) => &job.job_id,
            QueueJob::TranscribeBatch(job) => &job.job_id,
        }
    }

    /// Idempotency key used for enqueue dedup.
    pub fn idempotency_key(&self) -> String {
        match self {
            QueueJob::GenerateContent(job) => job.idempotency_key(),
            QueueJob::TranscribeBatch(job) => job.idempotency_key(),
        }
    }

    /// Short kind tag for logging and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            QueueJob::GenerateContent(_) => "generate_content",
            QueueJob::TranscribeBatch(_) => "transcribe_batch",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_idempotency_by_date_and_kind() {
        let a = GenerateContentJob::new(JobId::new(), "2024-05-10", "America/New_York");
        let b = GenerateContentJob::new(JobId::new(), "2024-05-10", "America/New_York");
        assert_eq!(a.idempotency_key(), b.idempotency_key());

        let c = GenerateContentJob::new(JobId::new(), "2024-05-11", "America/New_York");
        assert_ne!(a.idempotency_key(), c.idempotency_key());
    }

    #[test]
    fn test_queue_job_serde_roundtrip() {
        let job = QueueJob::TranscribeBatch(TranscribeBatchJob::new(
            JobId::new(),
            vec!["ClipA_01".to_string(), "ClipB_02".to_string()],
        ));
        let payload = serde_json::to_string(&job).unwrap();
        let back: QueueJob = serde_json::from_str(&payload).unwrap();
        assert_eq!(back.job_id(), job.job_id());
        assert_eq!(back.kind(), "transcribe_batch");
    }
}
