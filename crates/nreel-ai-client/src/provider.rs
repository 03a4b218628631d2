//! Generation provider contract.

use async_trait::async_trait;
use nreel_models::{ImageSize, ProviderTaskStatus, TaskHandle};

use crate::error::AiResult;

/// Text-to-image request as sent to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub prompt: String,
    pub size: ImageSize,
    /// Conditioning images as `data:` URLs, in clause order
    pub reference_images: Vec<String>,
}

/// Provider answer to an image request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageOutput {
    pub urls: Vec<String>,
    /// Provider-reported error accompanying an empty result
    pub error: Option<String>,
}

/// Image-to-video job seeded with a first and last frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoJobRequest {
    /// Prompt text including `--duration`/`--resolution` flags
    pub prompt_text: String,
    pub first_frame_base64: String,
    pub last_frame_base64: String,
}

/// One observation of an asynchronous video task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStatusReport {
    pub status: ProviderTaskStatus,
    pub video_url: Option<String>,
    pub error_message: Option<String>,
    pub completion_tokens: Option<u64>,
}

impl TaskStatusReport {
    pub fn with_status(status: ProviderTaskStatus) -> Self {
        Self {
            status,
            video_url: None,
            error_message: None,
            completion_tokens: None,
        }
    }
}

/// Remote image/video generation backend.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Synchronous image generation.
    async fn create_image(&self, request: &ImageRequest) -> AiResult<ImageOutput>;

    /// Submit an asynchronous video job and return its handle.
    async fn create_video_task(&self, request: &VideoJobRequest) -> AiResult<TaskHandle>;

    /// Query the current state of a video job.
    async fn get_video_task(&self, handle: &TaskHandle) -> AiResult<TaskStatusReport>;

    /// Fetch a generated artifact by URL.
    async fn download(&self, url: &str) -> AiResult<Vec<u8>>;
}
