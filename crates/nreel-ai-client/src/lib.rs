//! Remote AI clients for the NovelReel pipeline.
//!
//! This crate provides:
//! - The `CompletionService` trait and an OpenAI-compatible chat client
//! - The `GenerationProvider` trait and an Ark HTTP implementation
//! - `GenerationClient`: image retries, video job submission and polling
//! - Remote-call metrics

pub mod ark;
pub mod completion;
pub mod error;
pub mod generation;
pub mod metrics;
pub mod provider;
pub mod retry;


pub use ark::{ArkClient, ArkConfig};
pub use completion::{
    strip_code_fences, ChatCompletionClient, ChatMessage, ChatRole, CompletionConfig,
    CompletionService, ContentPart,
};
pub use error::{AiError, AiResult, ImageFailureKind};
pub use generation::{
    prompt_with_references, video_prompt_text, GeneratedImage, GenerationClient, ReferenceImage,
    VideoPolicy,
};
pub use provider::{GenerationProvider, ImageOutput, ImageRequest, TaskStatusReport, VideoJobRequest};
pub use retry::{retry_async, RetryConfig, RetryResult};
