//! Chapter-to-video pipeline.
//!
//! This crate provides:
//! - The stage orchestrator (`Pipeline`, `run_pipeline`)
//! - Novel loading and chapter selection
//! - Language-model writing tasks and their prompts
//! - Character portraits and frame references
//! - Configuration, run logging and the error taxonomy
//! - The command-line interface of the `nreel` binary

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod novel;
pub mod pipeline;
pub mod portraits;
pub mod prompts;
pub mod writer;

#[cfg(test)]
mod pipeline_tests;

pub use cli::Cli;
pub use config::{AiConfig, PipelineConfig};
pub use error::{PipelineError, StageResult};
pub use logging::RunLogger;
pub use novel::{load_novel, split_chapters, Chapters};
pub use pipeline::{requested_duration, run_pipeline, Pipeline};
pub use portraits::{generate_missing_portraits, load_references, PortraitSummary};
pub use writer::{SceneWriter, VideoPrompt};
