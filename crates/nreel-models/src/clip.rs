//! Scene clip records.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{ArtifactOrigin, SceneId};

/// Raw generated clip for one scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneClip {
    pub scene_id: SceneId,
    /// Local path of `<videoDir>/<id>.mp4`
    pub path: PathBuf,
    /// Remote URL, only known when generated in this run
    pub video_url: Option<String>,
    /// Provider task id, only known when generated in this run
    pub task_id: Option<String>,
    /// Narration line returned alongside the video prompt, if any
    pub narration: Option<String>,
    /// Requested duration in whole seconds
    pub duration_secs: Option<u32>,
    pub origin: ArtifactOrigin,
}

impl SceneClip {
    /// Clip found on disk from a previous run.
    pub fn recovered(scene_id: SceneId, path: PathBuf) -> Self {
        Self {
            scene_id,
            path,
            video_url: None,
            task_id: None,
            narration: None,
            duration_secs: None,
            origin: ArtifactOrigin::Recovered,
        }
    }

    /// Whether downstream muxed output must be rebuilt.
    pub fn is_fresh(&self) -> bool {
        self.origin == ArtifactOrigin::Generated
    }
}
