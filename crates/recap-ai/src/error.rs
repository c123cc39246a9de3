//! Model collaborator error types.

use thiserror::Error;

pub type AiResult<T> = Result<T, AiError>;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("Failed to configure model client: {0}")]
    ConfigError(String),

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("Drafting failed: {0}")]
    DraftingFailed(String),

    #[error("Model returned malformed output: {0}")]
    MalformedOutput(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AiError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn transcription_failed(msg: impl Into<String>) -> Self {
        Self::TranscriptionFailed(msg.into())
    }

    pub fn drafting_failed(msg: impl Into<String>) -> Self {
        Self::DraftingFailed(msg.into())
    }
}
