//! Pipeline configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use nreel_ai_client::{ArkConfig, CompletionConfig, VideoPolicy};
use nreel_storage::AssetLayout;

use crate::error::{PipelineError, StageResult};

/// Pipeline configuration, built once at startup and read-only afterwards.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Novel text file, split into chapters by heading
    pub novel_file: PathBuf,
    /// Exact chapter heading to adapt
    pub chapter: String,
    /// Limit downstream stages to the first `max_scenes` scenes
    pub test_mode: bool,
    pub max_scenes: usize,
    /// Root for every artifact directory below
    pub work_dir: PathBuf,
    pub history_dir: PathBuf,
    pub character_dir: PathBuf,
    pub image_dir: PathBuf,
    pub video_dir: PathBuf,
    /// Narration tracks supplied out-of-band as `<id>.wav`
    pub voice_dir: PathBuf,
    pub merged_video_path: PathBuf,
    /// Clip length when no narration track can be measured
    pub video_duration_secs: u32,
    /// Upper bound for narration-derived clip length
    pub max_clip_duration_secs: f64,
    pub video_resolution: String,
    pub max_video_polls: u32,
    pub video_poll_interval: Duration,
    /// Total attempts per image
    pub image_max_retries: u32,
    /// Linear backoff unit between image attempts
    pub image_retry_unit: Duration,
    /// Scenes processed concurrently within a stage (1 = strictly sequential)
    pub max_scene_parallel: usize,
    /// Kill a single FFmpeg invocation after this long
    pub ffmpeg_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            novel_file: PathBuf::from("小说素材.txt"),
            chapter: "第3章 闻姑娘还真是……娇气".to_string(),
            test_mode: true,
            max_scenes: 1,
            work_dir: PathBuf::from("."),
            history_dir: PathBuf::from("history"),
            character_dir: PathBuf::from("character"),
            image_dir: PathBuf::from("image"),
            video_dir: PathBuf::from("video"),
            voice_dir: PathBuf::from("voice"),
            merged_video_path: PathBuf::from("merged_video.mp4"),
            video_duration_secs: 5,
            max_clip_duration_secs: 13.0,
            video_resolution: "480p".to_string(),
            max_video_polls: 100,
            video_poll_interval: Duration::from_secs(8),
            image_max_retries: 3,
            image_retry_unit: Duration::from_secs(1),
            max_scene_parallel: 1,
            ffmpeg_timeout: Duration::from_secs(600),
        }
    }
}

impl PipelineConfig {
    /// Create config from `NREEL_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            novel_file: env_path("NREEL_NOVEL_FILE", defaults.novel_file),
            chapter: std::env::var("NREEL_CHAPTER").unwrap_or(defaults.chapter),
            test_mode: env_bool("NREEL_TEST_MODE", defaults.test_mode),
            max_scenes: env_parse("NREEL_MAX_SCENES", defaults.max_scenes),
            work_dir: env_path("NREEL_WORK_DIR", defaults.work_dir),
            history_dir: env_path("NREEL_HISTORY_DIR", defaults.history_dir),
            character_dir: env_path("NREEL_CHARACTER_DIR", defaults.character_dir),
            image_dir: env_path("NREEL_IMAGE_DIR", defaults.image_dir),
            video_dir: env_path("NREEL_VIDEO_DIR", defaults.video_dir),
            voice_dir: env_path("NREEL_VOICE_DIR", defaults.voice_dir),
            merged_video_path: env_path("NREEL_MERGED_VIDEO", defaults.merged_video_path),
            video_duration_secs: env_parse("NREEL_VIDEO_DURATION", defaults.video_duration_secs),
            max_clip_duration_secs: env_parse(
                "NREEL_MAX_CLIP_DURATION",
                defaults.max_clip_duration_secs,
            ),
            video_resolution: std::env::var("NREEL_VIDEO_RESOLUTION")
                .unwrap_or(defaults.video_resolution),
            max_video_polls: env_parse("NREEL_MAX_VIDEO_POLLS", defaults.max_video_polls),
            video_poll_interval: Duration::from_secs(env_parse(
                "NREEL_VIDEO_POLL_INTERVAL_SECS",
                defaults.video_poll_interval.as_secs(),
            )),
            image_max_retries: env_parse("NREEL_IMAGE_MAX_RETRIES", defaults.image_max_retries),
            image_retry_unit: Duration::from_millis(env_parse(
                "NREEL_IMAGE_RETRY_UNIT_MS",
                defaults.image_retry_unit.as_millis() as u64,
            )),
            max_scene_parallel: env_parse("NREEL_MAX_SCENE_PARALLEL", defaults.max_scene_parallel),
            ffmpeg_timeout: Duration::from_secs(env_parse(
                "NREEL_FFMPEG_TIMEOUT_SECS",
                defaults.ffmpeg_timeout.as_secs(),
            )),
        }
    }

    /// Scene cap applied to downstream stages, if any.
    pub fn scene_limit(&self) -> Option<usize> {
        self.test_mode.then_some(self.max_scenes)
    }

    /// Artifact layout rooted at `work_dir`.
    pub fn layout(&self) -> AssetLayout {
        AssetLayout::with_dirs(
            &self.work_dir,
            &self.history_dir,
            &self.character_dir,
            &self.image_dir,
            &self.video_dir,
            &self.voice_dir,
            &self.merged_video_path,
        )
    }

    pub fn video_policy(&self) -> VideoPolicy {
        VideoPolicy {
            resolution: self.video_resolution.clone(),
            max_polls: self.max_video_polls,
            poll_interval: self.video_poll_interval,
        }
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> StageResult<()> {
        if self.chapter.trim().is_empty() {
            return Err(PipelineError::config_error("chapter title is empty"));
        }
        if self.test_mode && self.max_scenes == 0 {
            return Err(PipelineError::config_error(
                "max_scenes must be at least 1 in test mode",
            ));
        }
        if self.video_duration_secs == 0 {
            return Err(PipelineError::config_error("video duration must be positive"));
        }
        if self.max_clip_duration_secs.is_nan() || self.max_clip_duration_secs <= 0.0 {
            return Err(PipelineError::config_error(
                "max clip duration must be positive",
            ));
        }
        if self.max_video_polls == 0 {
            return Err(PipelineError::config_error("max video polls must be positive"));
        }
        Ok(())
    }
}

/// Remote provider settings.
#[derive(Clone)]
pub struct AiConfig {
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub llm_model: String,
    pub ark_api_key: String,
    pub ark_base_url: String,
    pub image_model: String,
    pub video_model: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for AiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiConfig")
            .field("llm_base_url", &self.llm_base_url)
            .field("llm_model", &self.llm_model)
            .field("ark_base_url", &self.ark_base_url)
            .field("image_model", &self.image_model)
            .field("video_model", &self.video_model)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl AiConfig {
    /// Create config from environment variables. API keys are required.
    pub fn from_env() -> StageResult<Self> {
        Ok(Self {
            llm_api_key: env_first(&["NREEL_LLM_API_KEY", "DASHSCOPE_API_KEY"]).ok_or_else(
                || PipelineError::config_error("NREEL_LLM_API_KEY (or DASHSCOPE_API_KEY) not set"),
            )?,
            llm_base_url: env_first(&["NREEL_LLM_BASE_URL", "DASHSCOPE_BASE_URL"])
                .unwrap_or_else(|| "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string()),
            llm_model: std::env::var("NREEL_LLM_MODEL").unwrap_or_else(|_| "qwen3-max".to_string()),
            ark_api_key: env_first(&["NREEL_ARK_API_KEY", "DOUBAO_API_KEY"]).ok_or_else(|| {
                PipelineError::config_error("NREEL_ARK_API_KEY (or DOUBAO_API_KEY) not set")
            })?,
            ark_base_url: std::env::var("NREEL_ARK_BASE_URL")
                .unwrap_or_else(|_| "https://ark.cn-beijing.volces.com/api/v3".to_string()),
            image_model: std::env::var("NREEL_IMAGE_MODEL")
                .unwrap_or_else(|_| "doubao-seedream-4-5-251128".to_string()),
            video_model: std::env::var("NREEL_VIDEO_MODEL")
                .unwrap_or_else(|_| "doubao-seedance-1-0-pro-250528".to_string()),
            timeout: Duration::from_secs(env_parse("NREEL_HTTP_TIMEOUT_SECS", 300)),
        })
    }

    pub fn completion(&self) -> CompletionConfig {
        CompletionConfig {
            base_url: self.llm_base_url.clone(),
            api_key: self.llm_api_key.clone(),
            model: self.llm_model.clone(),
            timeout: self.timeout,
        }
    }

    pub fn ark(&self) -> ArkConfig {
        ArkConfig {
            base_url: self.ark_base_url.clone(),
            api_key: self.ark_api_key.clone(),
            image_model: self.image_model.clone(),
            video_model: self.video_model.clone(),
            timeout: self.timeout,
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_path(key: &str, default: PathBuf) -> PathBuf {
    std::env::var_os(key).map(PathBuf::from).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|s| parse_bool(&s))
        .unwrap_or(default)
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_first(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| std::env::var(k).ok())
        .find(|v| !v.trim().is_empty())
}
