//! Pipeline error types.

use nreel_ai_client::AiError;
use nreel_models::SceneId;
use thiserror::Error;

pub type StageResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Chapter not found: {0}")]
    ChapterNotFound(String),

    #[error("Scene script is not valid JSON: {0}")]
    ScriptFormat(String),

    #[error("Portrait for {character} failed: {message}")]
    PortraitGeneration { character: String, message: String },

    #[error("Scene {scene_id}: image prompt failed: {message}")]
    ImagePrompt { scene_id: SceneId, message: String },

    #[error("Scene {scene_id}: frame generation failed: {message}")]
    FrameGeneration { scene_id: SceneId, message: String },

    #[error("Scene {scene_id}: video prompt failed: {message}")]
    VideoPrompt { scene_id: SceneId, message: String },

    #[error("Scene {scene_id}: video generation failed: {message}")]
    VideoGenerationFailed { scene_id: SceneId, message: String },

    #[error("Scene {scene_id}: video generation timed out: {message}")]
    VideoGenerationTimedOut { scene_id: SceneId, message: String },

    #[error("Scene {scene_id}: audio mux failed: {message}")]
    Mux { scene_id: SceneId, message: String },

    #[error("Concatenation failed: {0}")]
    Concat(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] nreel_storage::StorageError),

    #[error("Media error: {0}")]
    Media(#[from] nreel_media::MediaError),

    #[error("AI client error: {0}")]
    Ai(#[from] AiError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn script_format(msg: impl Into<String>) -> Self {
        Self::ScriptFormat(msg.into())
    }

    pub fn portrait(character: impl Into<String>, msg: impl ToString) -> Self {
        Self::PortraitGeneration {
            character: character.into(),
            message: msg.to_string(),
        }
    }

    pub fn image_prompt(scene_id: SceneId, msg: impl ToString) -> Self {
        Self::ImagePrompt {
            scene_id,
            message: msg.to_string(),
        }
    }

    pub fn frame(scene_id: SceneId, msg: impl ToString) -> Self {
        Self::FrameGeneration {
            scene_id,
            message: msg.to_string(),
        }
    }

    pub fn video_prompt(scene_id: SceneId, msg: impl ToString) -> Self {
        Self::VideoPrompt {
            scene_id,
            message: msg.to_string(),
        }
    }

    pub fn mux(scene_id: SceneId, msg: impl ToString) -> Self {
        Self::Mux {
            scene_id,
            message: msg.to_string(),
        }
    }

    /// Classify a failure from the submit/poll/download sequence.
    pub fn from_video(scene_id: SceneId, err: AiError) -> Self {
        match err {
            AiError::VideoGenerationTimedOut { .. } => Self::VideoGenerationTimedOut {
                scene_id,
                message: err.to_string(),
            },
            other => Self::VideoGenerationFailed {
                scene_id,
                message: other.to_string(),
            },
        }
    }

    /// Check if the error aborts the whole run.
    ///
    /// Everything scoped to one character or one scene is logged and
    /// skipped instead.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::ChapterNotFound(_)
                | PipelineError::ScriptFormat(_)
                | PipelineError::Config(_)
                | PipelineError::Storage(_)
                | PipelineError::Io(_)
        )
    }

    /// Scene the error is scoped to, if any.
    pub fn scene_id(&self) -> Option<SceneId> {
        match self {
            PipelineError::ImagePrompt { scene_id, .. }
            | PipelineError::FrameGeneration { scene_id, .. }
            | PipelineError::VideoPrompt { scene_id, .. }
            | PipelineError::VideoGenerationFailed { scene_id, .. }
            | PipelineError::VideoGenerationTimedOut { scene_id, .. }
            | PipelineError::Mux { scene_id, .. } => Some(*scene_id),
            _ => None,
        }
    }
}
