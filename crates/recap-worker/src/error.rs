//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Queue error: {0}")]
    Queue(#[from] recap_queue::QueueError),

    #[error("Job store error: {0}")]
    Firestore(#[from] recap_firestore::FirestoreError),

    #[error("Storage error: {0}")]
    Storage(#[from] recap_storage::StorageError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] recap_pipeline::PipelineError),

    #[error("Content error: {0}")]
    Content(#[from] recap_content::ContentError),

    #[error("Model client error: {0}")]
    Ai(#[from] recap_ai::AiError),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    /// Stable code recorded on failed jobs.
    pub fn code(&self) -> &'static str {
        match self {
            WorkerError::Pipeline(e) => e.code(),
            WorkerError::ConfigError(_) => "validation",
            WorkerError::JobFailed(_) => "internal",
            WorkerError::Queue(_) | WorkerError::Firestore(_) | WorkerError::Storage(_) => {
                "collaborator-failed"
            }
            WorkerError::Content(_) => "collaborator-failed",
            WorkerError::Ai(_) => "collaborator-failed",
        }
    }

    /// Whether a retry might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Pipeline(e) => e.is_retryable(),
            WorkerError::Queue(_)
            | WorkerError::Firestore(_)
            | WorkerError::Storage(_)
            | WorkerError::Content(_)
            | WorkerError::Ai(_) => true,
            WorkerError::ConfigError(_) | WorkerError::JobFailed(_) => false,
        }
    }
}
