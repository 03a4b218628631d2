//! Language-model writing tasks.
//!
//! [`SceneWriter`] wraps a [`CompletionService`] with the pipeline's
//! prompts and turns its replies into typed values. Replies are trimmed and
//! stripped of Markdown code fences before JSON parsing.

use std::sync::Arc;

use nreel_ai_client::{
    strip_code_fences, AiError, AiResult, ChatMessage, CompletionService, ContentPart,
};
use nreel_models::{FramePair, FramePrompts, SceneScript};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, StageResult};
use crate::prompts;

/// Prompt for an image-to-video job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoPrompt {
    pub prompt: String,
    /// Narration line returned alongside the prompt, if any
    pub narration: Option<String>,
}

#[derive(Clone)]
pub struct SceneWriter {
    completion: Arc<dyn CompletionService>,
}

impl SceneWriter {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self { completion }
    }

    /// Adapt a chapter into a scene script.
    ///
    /// Any failure here is a [`PipelineError::ScriptFormat`]; the call is
    /// not retried.
    pub async fn voice_script(&self, chapter: &str) -> StageResult<SceneScript> {
        info!(chars = chapter.chars().count(), "Generating scene script");
        let reply = self
            .completion
            .complete(&[
                ChatMessage::system(prompts::SCRIPT_SYSTEM_PROMPT),
                ChatMessage::user(prompts::script_request(chapter)),
            ])
            .await
            .map_err(|e| PipelineError::script_format(format!("completion failed: {}", e)))?;

        let body = strip_code_fences(&reply);
        SceneScript::parse(body).map_err(|e| {
            debug!(reply = %preview(body), "Unusable scene script reply");
            PipelineError::script_format(e.to_string())
        })
    }

    /// Derive start and end frame prompts for a scene description.
    ///
    /// A reply that is not JSON at all is used verbatim for both frames.
    pub async fn frame_prompts(&self, content: &str) -> AiResult<FramePrompts> {
        let reply = self
            .completion
            .complete(&[
                ChatMessage::system(prompts::IMAGE_SYSTEM_PROMPT),
                ChatMessage::user(prompts::image_request(content)),
            ])
            .await?;
        parse_frame_prompts(strip_code_fences(&reply))
    }

    /// Derive the video prompt from a scene's narration and its two frames.
    pub async fn video_prompt(&self, frames: &FramePair) -> AiResult<VideoPrompt> {
        let mut parts = vec![ContentPart::text(prompts::video_request(
            &frames.narration,
            frames.start.prompt_text(),
            frames.end.prompt_text(),
        ))];
        for frame in [&frames.start, &frames.end] {
            if !frame.base64.is_empty() {
                parts.push(ContentPart::jpeg(frame.base64.clone()));
            }
        }

        let reply = self
            .completion
            .complete(&[
                ChatMessage::system(prompts::VIDEO_SYSTEM_PROMPT),
                ChatMessage::user_parts(parts),
            ])
            .await?;
        parse_video_prompt(strip_code_fences(&reply))
    }

    /// Extract one character's appearance from the chapter text.
    pub async fn appearance(&self, name: &str, chapter: &str) -> AiResult<String> {
        let reply = self
            .completion
            .complete(&[
                ChatMessage::system(prompts::APPEARANCE_SYSTEM_PROMPT),
                ChatMessage::user(prompts::appearance_request(name, chapter)),
            ])
            .await?;
        let features = strip_code_fences(&reply);
        if features.is_empty() {
            return Err(AiError::invalid_response(format!(
                "no appearance returned for {}",
                name
            )));
        }
        Ok(features.to_string())
    }

    /// Text-to-image prompt for a character portrait.
    pub async fn portrait_prompt(&self, name: &str, features: &str) -> AiResult<String> {
        let prompts = self
            .frame_prompts(&prompts::portrait_description(name, features))
            .await?;
        Ok(prompts.start_frame)
    }
}

fn parse_frame_prompts(body: &str) -> AiResult<FramePrompts> {
    if body.is_empty() {
        return Err(AiError::invalid_response("empty image prompt reply"));
    }
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => {
            let field = |key: &str| {
                map.get(key)
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .ok_or_else(|| {
                        AiError::invalid_response(format!("image prompt reply has no {}", key))
                    })
            };
            Ok(FramePrompts {
                start_frame: field("start_frame")?,
                end_frame: field("end_frame")?,
            })
        }
        Ok(_) | Err(_) => {
            warn!(reply = %preview(body), "Image prompt reply is not a JSON object, using it for both frames");
            Ok(FramePrompts::uniform(body))
        }
    }
}

fn parse_video_prompt(body: &str) -> AiResult<VideoPrompt> {
    let parsed = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => map
            .get("video_prompt")
            .and_then(Value::as_str)
            .map(|prompt| VideoPrompt {
                prompt: prompt.trim().to_string(),
                narration: map
                    .get("narration")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            }),
        _ => None,
    };
    let prompt = parsed.unwrap_or_else(|| VideoPrompt {
        prompt: body.to_string(),
        narration: None,
    });

    if prompt.prompt.is_empty() {
        return Err(AiError::invalid_response("empty video prompt reply"));
    }
    Ok(prompt)
}

fn preview(text: &str) -> String {
    text.chars().take(100).collect()
}
