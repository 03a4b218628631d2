//! Command-line interface for the `nreel` binary.

use clap::Parser;
use std::path::PathBuf;

use crate::config::PipelineConfig;

/// Turn a novel chapter into a narrated short video.
///
/// Flags override the matching `NREEL_*` environment settings.
#[derive(Debug, Parser)]
#[command(name = "nreel")]
#[command(version)]
pub struct Cli {
    /// Enable test mode (only the first --max-scenes scenes)
    #[arg(long, overrides_with = "no_test")]
    pub test: bool,

    /// Disable test mode and process every scene
    #[arg(long, overrides_with = "test")]
    pub no_test: bool,

    /// Scene cap in test mode
    #[arg(long, value_name = "N")]
    pub max_scenes: Option<usize>,

    /// Chapter heading to adapt, e.g. "第3章 闻姑娘还真是……娇气"
    #[arg(long, value_name = "TITLE")]
    pub chapter: Option<String>,

    /// Novel text file
    #[arg(long, value_name = "PATH")]
    pub novel_file: Option<PathBuf>,

    /// Root directory for every generated artifact
    #[arg(long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    /// Scenes processed concurrently
    #[arg(long, value_name = "N")]
    pub parallel: Option<usize>,
}

impl Cli {
    /// Test mode as requested on the command line, if either flag was given.
    pub fn test_mode(&self) -> Option<bool> {
        match (self.test, self.no_test) {
            (true, _) => Some(true),
            (false, true) => Some(false),
            (false, false) => None,
        }
    }

    /// Apply command-line overrides to a configuration.
    pub fn apply_to_config(&self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(test_mode) = self.test_mode() {
            config.test_mode = test_mode;
        }
        if let Some(max_scenes) = self.max_scenes {
            config.max_scenes = max_scenes;
        }
        if let Some(chapter) = &self.chapter {
            config.chapter = chapter.clone();
        }
        if let Some(novel_file) = &self.novel_file {
            config.novel_file = novel_file.clone();
        }
        if let Some(work_dir) = &self.work_dir {
            config.work_dir = work_dir.clone();
        }
        if let Some(parallel) = self.parallel {
            config.max_scene_parallel = parallel;
        }
        config
    }
}
