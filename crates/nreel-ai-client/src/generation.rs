//! Content generation client.
//!
//! Wraps a [`GenerationProvider`] with the pipeline's policies:
//! - image generation with linear-backoff retries and character references
//! - video job submission from a start/end frame pair
//! - fixed-interval polling of video tasks until a terminal state
//! - downloading results to their artifact paths

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use nreel_models::{FramePair, ImageSize, ProviderTaskStatus, VideoTask};
use tracing::{debug, info, warn};

use crate::error::{AiError, AiResult, ImageFailureKind};
use crate::metrics;
use crate::provider::{GenerationProvider, ImageRequest, VideoJobRequest};
use crate::retry::{retry_async, RetryConfig};

/// A character portrait attached to an image request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceImage {
    pub name: String,
    /// `data:image/png;base64,...`
    pub data_url: String,
}

impl ReferenceImage {
    pub fn png(name: impl Into<String>, base64: &str) -> Self {
        Self {
            name: name.into(),
            data_url: format!("data:image/png;base64,{}", base64),
        }
    }
}

/// A successfully generated image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub url: String,
    /// Prompt actually sent, including reference clauses
    pub prompt: String,
}

/// Extend a prompt with one clause per reference, in reference order.
pub fn prompt_with_references(prompt: &str, references: &[ReferenceImage]) -> String {
    let mut out = prompt.to_string();
    for (index, reference) in references.iter().enumerate() {
        out.push_str(&format!(",{} 的外貌特征如图{}所示", reference.name, index));
    }
    out
}

/// Prompt text sent with a video job.
pub fn video_prompt_text(prompt: &str, duration_secs: u32, resolution: &str) -> String {
    format!(
        "{} --duration {} --resolution {}",
        prompt.trim(),
        duration_secs,
        resolution
    )
}

/// Output resolution and polling limits for video jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoPolicy {
    pub resolution: String,
    pub max_polls: u32,
    pub poll_interval: Duration,
}

impl Default for VideoPolicy {
    fn default() -> Self {
        Self {
            resolution: "480p".to_string(),
            max_polls: 100,
            poll_interval: Duration::from_secs(8),
        }
    }
}

/// Generation client shared by every pipeline stage.
#[derive(Clone)]
pub struct GenerationClient {
    provider: Arc<dyn GenerationProvider>,
    image_retry: RetryConfig,
    video: VideoPolicy,
}

impl GenerationClient {
    pub fn new(provider: Arc<dyn GenerationProvider>) -> Self {
        Self {
            provider,
            image_retry: RetryConfig::new("image_generation"),
            video: VideoPolicy::default(),
        }
    }

    pub fn with_video_policy(mut self, video: VideoPolicy) -> Self {
        self.video = video;
        self
    }

    pub fn video_policy(&self) -> &VideoPolicy {
        &self.video
    }

    /// Configure image retries: `max_attempts` tries, waiting `unit * n`
    /// after failed attempt `n`.
    pub fn with_image_retry(mut self, max_attempts: u32, unit: Duration) -> Self {
        self.image_retry = self
            .image_retry
            .with_max_attempts(max_attempts)
            .with_base_delay(unit);
        self
    }

    /// Generate one image and, when `save_to` is given, store it there.
    ///
    /// Remote call failures are retried; a response without any image is a
    /// provider-reported error and is returned immediately.
    pub async fn generate_image(
        &self,
        prompt: &str,
        size: ImageSize,
        references: &[ReferenceImage],
        save_to: Option<&Path>,
    ) -> AiResult<GeneratedImage> {
        if prompt.trim().is_empty() {
            return Err(AiError::image(
                ImageFailureKind::InvalidPrompt,
                "image prompt is empty",
            ));
        }

        let request = ImageRequest {
            prompt: prompt_with_references(prompt, references),
            size,
            reference_images: references.iter().map(|r| r.data_url.clone()).collect(),
        };
        if !references.is_empty() {
            info!(references = references.len(), "Conditioning image on character portraits");
        }

        let output = retry_async(&self.image_retry, || self.provider.create_image(&request))
            .await
            .into_result(|error, attempts| {
                AiError::image(
                    ImageFailureKind::RetriesExhausted,
                    format!("{} attempts failed, last error: {}", attempts, error),
                )
            })?;

        let url = output.urls.into_iter().next().ok_or_else(|| {
            AiError::image(
                ImageFailureKind::EmptyResult,
                output
                    .error
                    .unwrap_or_else(|| "provider returned no image".to_string()),
            )
        })?;
        info!(url = %url, "Image generated");

        if let Some(path) = save_to {
            self.download_to(&url, path).await.map_err(|e| {
                AiError::image(
                    ImageFailureKind::Download,
                    format!("saving {} failed: {}", path.display(), e),
                )
            })?;
        }

        Ok(GeneratedImage {
            url,
            prompt: request.prompt,
        })
    }

    /// Submit an image-to-video job seeded with the pair's frames.
    pub async fn submit_video_job(
        &self,
        frames: &FramePair,
        prompt: &str,
        duration_secs: u32,
        resolution: &str,
    ) -> AiResult<VideoTask> {
        let request = VideoJobRequest {
            prompt_text: video_prompt_text(prompt, duration_secs, resolution),
            first_frame_base64: frames.start.base64.clone(),
            last_frame_base64: frames.end.base64.clone(),
        };
        let handle = self.provider.create_video_task(&request).await?;
        info!(
            scene_id = %frames.scene_id,
            task_id = %handle,
            duration_secs,
            "Video task submitted"
        );
        Ok(VideoTask::new(handle, frames.scene_id))
    }

    /// Poll a video task until it succeeds, fails, or `max_attempts` polls
    /// pass. Sleeps `interval` between polls, never after the last one.
    ///
    /// Query errors are logged and count as an ordinary non-terminal poll.
    pub async fn poll_until_done(
        &self,
        task: &mut VideoTask,
        max_attempts: u32,
        interval: Duration,
    ) -> AiResult<String> {
        let scene_id = task.scene_id;
        for attempt in 1..=max_attempts {
            task.record_poll();
            debug!(scene_id = %scene_id, task_id = %task.handle, attempt, "Polling video task");

            match self.provider.get_video_task(&task.handle).await {
                Ok(report) => {
                    metrics::record_video_poll(report.status.as_str());
                    match report.status {
                        ProviderTaskStatus::Succeeded => {
                            match report.video_url.filter(|u| !u.trim().is_empty()) {
                                Some(url) => {
                                    info!(
                                        scene_id = %scene_id,
                                        task_id = %task.handle,
                                        polls = task.polls,
                                        completion_tokens = report.completion_tokens,
                                        "Video generated"
                                    );
                                    task.succeed(url.clone());
                                    return Ok(url);
                                }
                                None => warn!(
                                    scene_id = %scene_id,
                                    task_id = %task.handle,
                                    "Task reported success without a video URL"
                                ),
                            }
                        }
                        ProviderTaskStatus::Failed | ProviderTaskStatus::Cancelled => {
                            let message = report
                                .error_message
                                .unwrap_or_else(|| "no error message".to_string());
                            task.fail(report.status, message.clone());
                            return Err(AiError::VideoGenerationFailed {
                                task_id: task.handle.to_string(),
                                status: report.status.as_str().to_string(),
                                message,
                            });
                        }
                        status => info!(
                            scene_id = %scene_id,
                            task_id = %task.handle,
                            status = status.as_str(),
                            "Video still generating"
                        ),
                    }
                }
                Err(e) => {
                    metrics::record_video_poll("error");
                    warn!(
                        scene_id = %scene_id,
                        task_id = %task.handle,
                        attempt,
                        "Video status query failed, will retry: {}",
                        e
                    );
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(interval).await;
            }
        }

        task.time_out();
        Err(AiError::VideoGenerationTimedOut {
            task_id: task.handle.to_string(),
            attempts: max_attempts,
        })
    }

    /// Download a generated artifact and write it atomically to `path`.
    pub async fn download_to(&self, url: &str, path: &Path) -> AiResult<()> {
        let bytes = self.provider.download(url).await?;
        nreel_storage::write_atomic(path, &bytes).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "Downloaded artifact");
        Ok(())
    }

    /// Submit, poll and download in one step using the configured
    /// [`VideoPolicy`]. Returns the finished task; its `result_url` is set.
    pub async fn generate_video(
        &self,
        frames: &FramePair,
        prompt: &str,
        duration_secs: u32,
        save_to: &Path,
    ) -> AiResult<VideoTask> {
        let mut task = self
            .submit_video_job(frames, prompt, duration_secs, &self.video.resolution)
            .await?;
        let url = self
            .poll_until_done(&mut task, self.video.max_polls, self.video.poll_interval)
            .await?;
        self.download_to(&url, save_to).await?;
        info!(scene_id = %task.scene_id, path = %save_to.display(), "Video saved");
        Ok(task)
    }
}
