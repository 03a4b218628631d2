//! Deterministic artifact paths.
//!
//! Every artifact produced by a run has exactly one path derived from the
//! working directory and its identity. Presence of a file at that path is the
//! resume checkpoint for the stage that produces it.

use std::path::{Path, PathBuf};

use nreel_models::{FrameRole, SceneId};

/// Script file name inside the history directory.
pub const SCRIPT_FILE_NAME: &str = "voice_script.json";

/// Directory layout for one working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetLayout {
    pub root: PathBuf,
    pub history_dir: PathBuf,
    pub character_dir: PathBuf,
    pub image_dir: PathBuf,
    pub video_dir: PathBuf,
    pub voice_dir: PathBuf,
    pub merged_video: PathBuf,
}

impl AssetLayout {
    /// Standard layout rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_dirs(
            root,
            "history",
            "character",
            "image",
            "video",
            "voice",
            "merged_video.mp4",
        )
    }

    /// Layout with custom directory names. Relative names are resolved
    /// against `root`; absolute ones are kept as-is.
    pub fn with_dirs(
        root: impl Into<PathBuf>,
        history: impl AsRef<Path>,
        character: impl AsRef<Path>,
        image: impl AsRef<Path>,
        video: impl AsRef<Path>,
        voice: impl AsRef<Path>,
        merged: impl AsRef<Path>,
    ) -> Self {
        let root = root.into();
        Self {
            history_dir: root.join(history),
            character_dir: root.join(character),
            image_dir: root.join(image),
            video_dir: root.join(video),
            voice_dir: root.join(voice),
            merged_video: root.join(merged),
            root,
        }
    }

    pub fn script_path(&self) -> PathBuf {
        self.history_dir.join(SCRIPT_FILE_NAME)
    }

    /// Portrait of a character: `<character>/<name>.png`.
    pub fn portrait_path(&self, name: &str) -> PathBuf {
        self.character_dir
            .join(format!("{}.png", sanitize_file_stem(name)))
    }

    /// Start or end frame: `<image>/<id>_start.jpeg`.
    pub fn frame_path(&self, scene_id: SceneId, role: FrameRole) -> PathBuf {
        self.image_dir
            .join(format!("{}_{}.jpeg", scene_id, role.as_str()))
    }

    /// Raw generated clip without narration: `<video>/<id>.mp4`.
    pub fn clip_path(&self, scene_id: SceneId) -> PathBuf {
        self.video_dir.join(format!("{}.mp4", scene_id))
    }

    /// Clip with narration muxed in: `<video>/<id>_voice.mp4`.
    pub fn muxed_path(&self, scene_id: SceneId) -> PathBuf {
        self.video_dir.join(format!("{}_voice.mp4", scene_id))
    }

    /// Narration audio supplied out-of-band: `<voice>/<id>.wav`.
    pub fn narration_path(&self, scene_id: SceneId) -> PathBuf {
        self.voice_dir.join(format!("{}.wav", scene_id))
    }

    pub fn merged_path(&self) -> &Path {
        &self.merged_video
    }

    /// Directories the pipeline writes into.
    pub fn output_dirs(&self) -> [&Path; 4] {
        [
            &self.history_dir,
            &self.character_dir,
            &self.image_dir,
            &self.video_dir,
        ]
    }
}

/// Character names become file stems; path separators and NULs are replaced
/// so a name can never escape the character directory.
fn sanitize_file_stem(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}
