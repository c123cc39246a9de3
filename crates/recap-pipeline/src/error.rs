//! Pipeline error types.

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Insufficient content: {found} eligible sections, need {need}")]
    InsufficientContent { found: usize, need: usize },

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Storage error: {0}")]
    Storage(#[from] recap_storage::StorageError),

    #[error("Content error: {0}")]
    Content(#[from] recap_content::ContentError),

    #[error("Correlator error: {0}")]
    Github(#[from] recap_github::GithubError),

    #[error("Model collaborator error: {0}")]
    Ai(#[from] recap_ai::AiError),

    #[error("Model error: {0}")]
    Model(#[from] recap_models::ModelError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl PipelineError {
    /// Stable code surfaced on failed jobs.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::InsufficientContent { .. } => "insufficient-content",
            PipelineError::InvalidTimezone(_) | PipelineError::InvalidDate(_) => "validation",
            PipelineError::Storage(_) => "collaborator-failed",
            PipelineError::Content(_) => "collaborator-failed",
            PipelineError::Github(_) => "collaborator-failed",
            PipelineError::Ai(_) => "collaborator-failed",
            PipelineError::Model(_) => "schema",
            PipelineError::Json(_) | PipelineError::Yaml(_) => "internal",
        }
    }

    /// Whether the next scheduled run should re-attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::Storage(_)
                | PipelineError::Content(_)
                | PipelineError::Github(_)
                | PipelineError::Ai(_)
        )
    }
}
