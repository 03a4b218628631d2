//! HTTP client for the Ark image/video generation API.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use nreel_models::{ProviderTaskStatus, TaskHandle};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AiError, AiResult};
use crate::metrics;
use crate::provider::{GenerationProvider, ImageOutput, ImageRequest, TaskStatusReport, VideoJobRequest};

/// Ark API settings.
#[derive(Debug, Clone)]
pub struct ArkConfig {
    pub base_url: String,
    pub api_key: String,
    pub image_model: String,
    pub video_model: String,
    pub timeout: Duration,
}

/// Ark generation client.
#[derive(Debug, Clone)]
pub struct ArkClient {
    http: Client,
    config: ArkConfig,
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct ImageGenerationBody<'a> {
    model: &'a str,
    prompt: &'a str,
    size: &'a str,
    watermark: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<&'a [String]>,
}

#[derive(Debug, Deserialize)]
struct ImageGenerationResponse {
    #[serde(default)]
    data: Vec<ImageData>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Serialize)]
struct TaskCreateBody<'a> {
    model: &'a str,
    content: Vec<TaskContent>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum TaskContent {
    Text {
        text: String,
    },
    ImageUrl {
        image_url: ImageUrl,
        role: &'static str,
    },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct TaskCreateResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TaskGetResponse {
    status: ProviderTaskStatus,
    content: Option<TaskResultContent>,
    error: Option<ApiError>,
    usage: Option<TaskUsage>,
}

#[derive(Debug, Deserialize)]
struct TaskResultContent {
    video_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TaskUsage {
    completion_tokens: Option<u64>,
}

// =============================================================================
// Client
// =============================================================================

impl ArkClient {
    pub fn new(config: ArkConfig) -> AiResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(AiError::config_error("generation API key is empty"));
        }
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Send a request, record metrics, and turn non-2xx answers into
    /// provider errors.
    async fn send(&self, operation: &'static str, request: RequestBuilder) -> AiResult<Response> {
        let started = Instant::now();
        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                metrics::record_remote_call(operation, "error", started.elapsed().as_secs_f64());
                return Err(e.into());
            }
        };

        let status = response.status();
        metrics::record_remote_call(operation, status.as_str(), started.elapsed().as_secs_f64());

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AiError::provider(status.as_u16(), error_text));
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> AiResult<T> {
        let response = self.send(operation, request).await?;
        response
            .json()
            .await
            .map_err(|e| AiError::invalid_response(format!("{}: {}", operation, e)))
    }
}

#[async_trait]
impl GenerationProvider for ArkClient {
    async fn create_image(&self, request: &ImageRequest) -> AiResult<ImageOutput> {
        let body = ImageGenerationBody {
            model: &self.config.image_model,
            prompt: &request.prompt,
            size: request.size.as_str(),
            watermark: false,
            image: Some(request.reference_images.as_slice()).filter(|r| !r.is_empty()),
        };
        debug!(
            size = %request.size,
            references = request.reference_images.len(),
            "Requesting image generation"
        );

        let response: ImageGenerationResponse = self
            .send_json(
                "image_generation",
                self.http
                    .post(self.url("images/generations"))
                    .bearer_auth(&self.config.api_key)
                    .json(&body),
            )
            .await?;

        Ok(ImageOutput {
            urls: response.data.into_iter().filter_map(|d| d.url).collect(),
            error: response.error.map(|e| e.message),
        })
    }

    async fn create_video_task(&self, request: &VideoJobRequest) -> AiResult<TaskHandle> {
        let body = TaskCreateBody {
            model: &self.config.video_model,
            content: vec![
                TaskContent::Text {
                    text: request.prompt_text.clone(),
                },
                TaskContent::ImageUrl {
                    image_url: ImageUrl {
                        url: format!("data:image/jpeg;base64,{}", request.first_frame_base64),
                    },
                    role: "first_frame",
                },
                TaskContent::ImageUrl {
                    image_url: ImageUrl {
                        url: format!("data:image/jpeg;base64,{}", request.last_frame_base64),
                    },
                    role: "last_frame",
                },
            ],
        };

        let response: TaskCreateResponse = self
            .send_json(
                "video_task_create",
                self.http
                    .post(self.url("contents/generations/tasks"))
                    .bearer_auth(&self.config.api_key)
                    .json(&body),
            )
            .await?;

        if response.id.trim().is_empty() {
            return Err(AiError::invalid_response("video task created without an id"));
        }
        Ok(TaskHandle::new(response.id))
    }

    async fn get_video_task(&self, handle: &TaskHandle) -> AiResult<TaskStatusReport> {
        let response: TaskGetResponse = self
            .send_json(
                "video_task_get",
                self.http
                    .get(self.url(&format!("contents/generations/tasks/{}", handle)))
                    .bearer_auth(&self.config.api_key),
            )
            .await?;

        Ok(TaskStatusReport {
            status: response.status,
            video_url: response.content.and_then(|c| c.video_url),
            error_message: response.error.map(|e| e.message),
            completion_tokens: response.usage.and_then(|u| u.completion_tokens),
        })
    }

    async fn download(&self, url: &str) -> AiResult<Vec<u8>> {
        let response = self.send("download", self.http.get(url)).await?;
        Ok(response.bytes().await?.to_vec())
    }
}
