//! Correlator error types.

use thiserror::Error;

pub type GithubResult<T> = Result<T, GithubError>;

#[derive(Debug, Error)]
pub enum GithubError {
    #[error("Invalid delivery: {0}")]
    InvalidDelivery(String),

    #[error("Storage error: {0}")]
    Storage(#[from] recap_storage::StorageError),

    #[error("Model error: {0}")]
    Model(#[from] recap_models::ModelError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GithubError {
    pub fn invalid_delivery(msg: impl Into<String>) -> Self {
        Self::InvalidDelivery(msg.into())
    }
}
