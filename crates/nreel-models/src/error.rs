//! Model validation errors.

use thiserror::Error;

/// Result type for model parsing and validation.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while parsing or validating model documents.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Scene script contains no scenes")]
    EmptyScript,

    #[error("Invalid scene id: {0}")]
    InvalidSceneId(String),

    #[error("Scene ids are not contiguous: expected {expected}, found {found}")]
    NonContiguousIds { expected: u32, found: u32 },
}
