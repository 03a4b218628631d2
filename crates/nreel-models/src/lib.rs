//! Shared data models for the NovelReel pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - The scene script extracted from a chapter
//! - Key-frame prompts and image pairs
//! - Video-generation task tracking
//! - Clip records and the pipeline result

pub mod clip;
pub mod error;
pub mod frame;
pub mod image_size;
pub mod run;
pub mod scene;
pub mod task;

// Re-export common types
pub use clip::SceneClip;
pub use error::{ModelError, ModelResult};
pub use frame::{ArtifactOrigin, FrameImage, FramePair, FramePrompts, FrameRole, RECOVERED_PROMPT};
pub use image_size::ImageSize;
pub use run::{MergeOutcome, PipelineResult, RunId};
pub use scene::{Scene, SceneId, SceneScript};
pub use task::{ProviderTaskStatus, TaskHandle, TaskPhase, VideoTask};
