//! Job records for queue processing.

use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{ModelError, ModelResult};

/// Jobs expire this long after creation unless configured otherwise.
pub const DEFAULT_JOB_TTL_HOURS: i64 = 24;

/// Unique, sortable identifier for a job.
///
/// Backed by UUIDv7 so lexicographic order matches creation order, which is
/// what the cursor-paged job listing sorts by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new time-ordered job ID.
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job state in the state store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is waiting for a worker
    #[default]
    Queued,
    /// Job is being processed
    Processing,
    /// Job completed successfully
    Completed,
    /// Job failed
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether `queued -> processing -> {completed|failed}` permits this edge.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The five stages the worker drives a content job through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    FetchingContentItems,
    BuildingManifest,
    AiContentJudgment,
    PreparingResponse,
    Completing,
}

impl PipelineStep {
    /// Stage order as driven by the worker.
    pub const ALL: [PipelineStep; 5] = [
        PipelineStep::FetchingContentItems,
        PipelineStep::BuildingManifest,
        PipelineStep::AiContentJudgment,
        PipelineStep::PreparingResponse,
        PipelineStep::Completing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStep::FetchingContentItems => "fetching_content_items",
            PipelineStep::BuildingManifest => "building_manifest",
            PipelineStep::AiContentJudgment => "ai_content_judgment",
            PipelineStep::PreparingResponse => "preparing_response",
            PipelineStep::Completing => "completing",
        }
    }

    /// 1-based position in the stage order.
    pub fn position(&self) -> u32 {
        Self::ALL.iter().position(|s| s == self).unwrap_or(0) as u32 + 1
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress snapshot exposed to job-status observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct JobProgress {
    /// Current step name
    pub step: String,
    /// 1-based step index
    pub current: u32,
    /// Total number of steps
    pub total: u32,
}

impl Default for JobProgress {
    fn default() -> Self {
        Self {
            step: "queued".to_string(),
            current: 0,
            total: PipelineStep::ALL.len() as u32,
        }
    }
}

impl JobProgress {
    pub fn at(step: PipelineStep) -> Self {
        Self {
            step: step.as_str().to_string(),
            current: step.position(),
            total: PipelineStep::ALL.len() as u32,
        }
    }
}

/// What observers see about a failed job. Never carries internals.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobFailure {
    /// Stable error code (`collaborator-timeout`, `insufficient-content`, ...)
    pub code: String,
    /// Redacted human-readable message
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

/// A durable job record, owned by the job-state store.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Sortable unique identifier
    pub job_id: JobId,

    /// Job state
    #[serde(default)]
    pub status: JobStatus,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// When the record may be swept
    pub expires_at: DateTime<Utc>,

    /// Stamped when a worker picks the job up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// Stamped on terminal transitions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Worker that owns the job
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,

    /// Progress through the pipeline stages
    #[serde(default)]
    pub progress: JobProgress,

    /// Serialized request that created the job
    pub request_data: serde_json::Value,

    /// Results payload on completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<serde_json::Value>,

    /// Redacted failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Stable failure code paired with `error_message`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl Job {
    /// Create a queued job from a request payload.
    pub fn new(request_data: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            job_id: JobId::new(),
            status: JobStatus::Queued,
            created_at: now,
            updated_at: now,
            expires_at: now + Duration::hours(DEFAULT_JOB_TTL_HOURS),
            started_at: None,
            completed_at: None,
            worker_id: None,
            progress: JobProgress::default(),
            request_data,
            results: None,
            error_message: None,
            error_code: None,
        }
    }

    /// Whether the record is past its expiry.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// Apply a status transition, stamping the bookkeeping fields.
    ///
    /// This is the only mutation path for job status; illegal transitions
    /// are rejected.
    pub fn transition(&mut self, next: JobStatus, worker_id: Option<&str>) -> ModelResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(ModelError::invalid_transition(self.status, next));
        }
        let now = Utc::now();
        self.status = next;
        self.updated_at = now;
        match next {
            JobStatus::Processing => {
                self.started_at = Some(now);
                self.worker_id = worker_id.map(|w| w.to_string());
            }
            JobStatus::Completed | JobStatus::Failed => {
                self.completed_at = Some(now);
            }
            JobStatus::Queued => {}
        }
        Ok(())
    }

    /// Failure view exposed through the administrative surface.
    pub fn failure(&self) -> Option<JobFailure> {
        self.error_message.as_ref().map(|message| JobFailure {
            code: self
                .error_code
                .clone()
                .unwrap_or_else(|| "internal".to_string()),
            message: message.clone(),
            occurred_at: self.completed_at.unwrap_or(self.updated_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_ids_sort_by_creation() {
        let a = JobId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = JobId::new();
        assert!(a.as_str() < b.as_str());
    }

    #[test]
    fn test_legal_transitions() {
        let mut job = Job::new(serde_json::json!({"kind": "generate_content"}));

        job.transition(JobStatus::Processing, Some("worker-1")).unwrap();
        assert!(job.started_at.is_some());
        assert_eq!(job.worker_id.as_deref(), Some("worker-1"));

        job.transition(JobStatus::Completed, None).unwrap();
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let mut job = Job::new(serde_json::json!({}));
        assert!(job.transition(JobStatus::Completed, None).is_err());
        assert!(job.transition(JobStatus::Failed, None).is_err());

        job.transition(JobStatus::Processing, Some("w")).unwrap();
        job.transition(JobStatus::Failed, None).unwrap();
        assert!(job.transition(JobStatus::Processing, Some("w")).is_err());
    }

    #[test]
    fn test_expiry_default() {
        let job = Job::new(serde_json::json!({}));
        assert!(!job.is_expired(Utc::now()));
        assert!(job.is_expired(Utc::now() + Duration::hours(25)));
    }

    #[test]
    fn test_progress_steps() {
        let p = JobProgress::at(PipelineStep::BuildingManifest);
        assert_eq!(p.step, "building_manifest");
        assert_eq!(p.current, 2);
        assert_eq!(p.total, 5);
    }
}
