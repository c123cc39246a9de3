//! Content management error types.

use thiserror::Error;

pub type ContentResult<T> = Result<T, ContentError>;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Storage error: {0}")]
    Storage(#[from] recap_storage::StorageError),

    #[error("Model error: {0}")]
    Model(#[from] recap_models::ModelError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ContentError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn invalid_query(msg: impl Into<String>) -> Self {
        Self::InvalidQuery(msg.into())
    }
}
