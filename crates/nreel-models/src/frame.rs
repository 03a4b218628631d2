//! Key-frame prompts and image pairs.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::SceneId;

/// Start/end image prompts derived from a scene's narration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FramePrompts {
    pub start_frame: String,
    pub end_frame: String,
}

impl FramePrompts {
    /// Use the same prompt for both frames.
    pub fn uniform(prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        Self {
            start_frame: prompt.clone(),
            end_frame: prompt,
        }
    }
}

/// Whether an artifact was produced in this run or found on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactOrigin {
    Generated,
    Recovered,
}

/// Which end of a scene a frame seeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameRole {
    Start,
    End,
}

impl FrameRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameRole::Start => "start",
            FrameRole::End => "end",
        }
    }
}

/// One key-frame image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameImage {
    /// Local path of the JPEG
    pub path: PathBuf,
    /// Remote URL, only known when generated in this run
    pub remote_url: Option<String>,
    /// Generation prompt, `None` when recovered from disk
    pub prompt: Option<String>,
    /// Base64 payload kept for the video-generation request
    #[serde(skip)]
    pub base64: String,
}

/// Placeholder prompt text for frames recovered from a previous run.
pub const RECOVERED_PROMPT: &str = "(recovered from existing frame)";

impl FrameImage {
    pub fn prompt_text(&self) -> &str {
        self.prompt.as_deref().unwrap_or(RECOVERED_PROMPT)
    }
}

/// Start and end frames for one scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FramePair {
    pub scene_id: SceneId,
    /// Narration text of the scene
    pub narration: String,
    pub start: FrameImage,
    pub end: FrameImage,
    pub origin: ArtifactOrigin,
}

impl FramePair {
    pub fn frame(&self, role: FrameRole) -> &FrameImage {
        match role {
            FrameRole::Start => &self.start,
            FrameRole::End => &self.end,
        }
    }
}
