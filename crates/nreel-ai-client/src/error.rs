//! AI client error types.

use std::fmt;

use thiserror::Error;

/// Result type for AI client operations.
pub type AiResult<T> = Result<T, AiError>;

/// Why an image could not be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFailureKind {
    /// Prompt was empty; nothing was sent
    InvalidPrompt,
    /// Provider answered without any image
    EmptyResult,
    /// Every attempt failed
    RetriesExhausted,
    /// Image was generated but could not be saved locally
    Download,
}

impl fmt::Display for ImageFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ImageFailureKind::InvalidPrompt => "invalid prompt",
            ImageFailureKind::EmptyResult => "empty result",
            ImageFailureKind::RetriesExhausted => "retries exhausted",
            ImageFailureKind::Download => "download failed",
        };
        f.write_str(s)
    }
}

/// Errors from the completion service and the generation provider.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Provider returned HTTP {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Completion returned no content")]
    EmptyCompletion,

    #[error("Image generation failed ({kind}): {message}")]
    ImageGeneration {
        kind: ImageFailureKind,
        message: String,
    },

    #[error("Video task {task_id} ended as {status}: {message}")]
    VideoGenerationFailed {
        task_id: String,
        status: String,
        message: String,
    },

    #[error("Video task {task_id} not finished after {attempts} polls")]
    VideoGenerationTimedOut { task_id: String, attempts: u32 },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] nreel_storage::StorageError),
}

impl AiError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn provider(status: u16, msg: impl Into<String>) -> Self {
        Self::Provider {
            status,
            message: msg.into(),
        }
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    pub fn image(kind: ImageFailureKind, msg: impl Into<String>) -> Self {
        Self::ImageGeneration {
            kind,
            message: msg.into(),
        }
    }

    /// Check if a retry could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            AiError::Network(_) => true,
            AiError::Provider { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Failure kind when this is an image generation error.
    pub fn image_failure_kind(&self) -> Option<ImageFailureKind> {
        match self {
            AiError::ImageGeneration { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}
