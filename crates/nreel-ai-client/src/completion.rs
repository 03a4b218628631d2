//! Chat completion service.
//!
//! The pipeline talks to the language model through [`CompletionService`].
//! [`ChatCompletionClient`] implements it against any OpenAI-compatible
//! `/chat/completions` endpoint.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{AiError, AiResult};
use crate::metrics;

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One piece of multimodal message content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    Image { base64: String, mime_type: String },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn jpeg(base64: impl Into<String>) -> Self {
        Self::Image {
            base64: base64.into(),
            mime_type: "image/jpeg".to_string(),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            ContentPart::Text(text) => json!({ "type": "text", "text": text }),
            ContentPart::Image { base64, mime_type } => json!({
                "type": "image_url",
                "image_url": { "url": format!("data:{};base64,{}", mime_type, base64) }
            }),
        }
    }
}

/// A chat message with one or more content parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub parts: Vec<ContentPart>,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            parts: vec![ContentPart::text(text)],
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            parts: vec![ContentPart::text(text)],
        }
    }

    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: ChatRole::User,
            parts,
        }
    }

    /// Concatenated text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text(t) => Some(t.as_str()),
                ContentPart::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn image_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|p| matches!(p, ContentPart::Image { .. }))
            .count()
    }

    /// Plain string content for text-only messages, a part array otherwise.
    fn to_json(&self) -> Value {
        let content = match self.parts.as_slice() {
            [ContentPart::Text(text)] => Value::String(text.clone()),
            parts => Value::Array(parts.iter().map(ContentPart::to_json).collect()),
        };
        json!({ "role": self.role, "content": content })
    }
}

/// A language model that turns a conversation into one reply.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Return the assistant's reply text.
    async fn complete(&self, messages: &[ChatMessage]) -> AiResult<String>;
}

/// Chat completion API settings.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

/// OpenAI-compatible chat completion client.
#[derive(Debug, Clone)]
pub struct ChatCompletionClient {
    http: Client,
    config: CompletionConfig,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl ChatCompletionClient {
    pub fn new(config: CompletionConfig) -> AiResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(AiError::config_error("completion API key is empty"));
        }
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionService for ChatCompletionClient {
    async fn complete(&self, messages: &[ChatMessage]) -> AiResult<String> {
        let body = json!({
            "model": self.config.model,
            "messages": messages.iter().map(ChatMessage::to_json).collect::<Vec<_>>(),
        });

        debug!(
            model = %self.config.model,
            messages = messages.len(),
            "Calling chat completion"
        );

        let started = Instant::now();
        let response = match self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                metrics::record_remote_call("chat_completion", "error", started.elapsed().as_secs_f64());
                return Err(e.into());
            }
        };

        let status = response.status();
        metrics::record_remote_call(
            "chat_completion",
            status.as_str(),
            started.elapsed().as_secs_f64(),
        );

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AiError::provider(status.as_u16(), error_text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AiError::invalid_response(format!("chat completion body: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(AiError::EmptyCompletion)
    }
}

/// Strip a surrounding Markdown code fence (` ```json ... ``` `) from a
/// model reply.
pub fn strip_code_fences(text: &str) -> &str {
    let mut s = text.trim();
    if let Some(rest) = s.strip_prefix("```") {
        s = match rest.find('\n') {
            Some(i) => &rest[i + 1..],
            None => rest.strip_prefix("json").unwrap_or(rest),
        };
    }
    if let Some(rest) = s.trim_end().strip_suffix("```") {
        s = rest;
    }
    s.trim()
}
