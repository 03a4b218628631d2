//! Tests for the stage orchestrator.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use nreel_ai_client::{
    AiError, AiResult, ChatMessage, CompletionService, GenerationProvider, ImageOutput,
    ImageRequest, TaskStatusReport, VideoJobRequest,
};
use nreel_media::{MediaError, MediaResult, MediaTranscoder};
use nreel_models::{MergeOutcome, ProviderTaskStatus, SceneId, TaskHandle};
use tempfile::TempDir;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::pipeline::{error_chain, requested_duration, Pipeline};
use crate::prompts;

// =============================================================================
// Test Helpers
// =============================================================================

const CHAPTER: &str = "第1章 开端";
const NOVEL: &str = "第1章 开端\n\nAlice 在雨夜遇见了 Bob。\n\n第2章 后来\n\n完。\n";

/// Answers each request by its system prompt and counts calls per kind.
struct FakeCompletion {
    script: String,
    script_calls: AtomicU32,
    image_calls: AtomicU32,
    video_calls: AtomicU32,
    appearance_calls: AtomicU32,
}

impl FakeCompletion {
    fn new(script: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            script: script.into(),
            script_calls: AtomicU32::new(0),
            image_calls: AtomicU32::new(0),
            video_calls: AtomicU32::new(0),
            appearance_calls: AtomicU32::new(0),
        })
    }

    fn total(&self) -> u32 {
        self.script_calls.load(Ordering::SeqCst)
            + self.image_calls.load(Ordering::SeqCst)
            + self.video_calls.load(Ordering::SeqCst)
            + self.appearance_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionService for FakeCompletion {
    async fn complete(&self, messages: &[ChatMessage]) -> AiResult<String> {
        let system = messages[0].text();
        let user = messages[1].text();
        let body = user.split_once('\n').map(|(_, b)| b).unwrap_or_default();

        if system == prompts::SCRIPT_SYSTEM_PROMPT {
            self.script_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.script.clone())
        } else if system == prompts::IMAGE_SYSTEM_PROMPT {
            self.image_calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!(
                "```json\n{{\"start_frame\": \"{} start\", \"end_frame\": \"{} end\"}}\n```",
                body, body
            ))
        } else if system == prompts::VIDEO_SYSTEM_PROMPT {
            self.video_calls.fetch_add(1, Ordering::SeqCst);
            Ok("镜头缓慢推近".to_string())
        } else if system == prompts::APPEARANCE_SYSTEM_PROMPT {
            self.appearance_calls.fetch_add(1, Ordering::SeqCst);
            Ok("长发，杏眼".to_string())
        } else {
            Err(AiError::invalid_response("unexpected request"))
        }
    }
}

/// Generation backend that succeeds immediately unless told otherwise.
#[derive(Default)]
struct FakeProvider {
    /// Image prompts containing this text come back empty
    fail_images_containing: Option<String>,
    /// Every video task reports this status instead of success
    video_status: Option<ProviderTaskStatus>,
    image_requests: Mutex<Vec<ImageRequest>>,
    video_requests: Mutex<Vec<VideoJobRequest>>,
    polls: AtomicU32,
    downloads: AtomicU32,
}

impl FakeProvider {
    fn remote_calls(&self) -> usize {
        self.image_requests.lock().unwrap().len()
            + self.video_requests.lock().unwrap().len()
            + self.polls.load(Ordering::SeqCst) as usize
            + self.downloads.load(Ordering::SeqCst) as usize
    }

    fn video_tasks(&self) -> usize {
        self.video_requests.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerationProvider for FakeProvider {
    async fn create_image(&self, request: &ImageRequest) -> AiResult<ImageOutput> {
        let mut requests = self.image_requests.lock().unwrap();
        requests.push(request.clone());
        if let Some(needle) = &self.fail_images_containing {
            if request.prompt.contains(needle.as_str()) {
                return Ok(ImageOutput {
                    urls: vec![],
                    error: Some("content filtered".into()),
                });
            }
        }
        Ok(ImageOutput {
            urls: vec![format!("https://img.test/{}.jpeg", requests.len())],
            error: None,
        })
    }

    async fn create_video_task(&self, request: &VideoJobRequest) -> AiResult<TaskHandle> {
        let mut requests = self.video_requests.lock().unwrap();
        requests.push(request.clone());
        Ok(TaskHandle::new(format!("cgt-{}", requests.len())))
    }

    async fn get_video_task(&self, handle: &TaskHandle) -> AiResult<TaskStatusReport> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        match self.video_status {
            Some(status) => Ok(TaskStatusReport {
                error_message: Some("rejected".into()),
                ..TaskStatusReport::with_status(status)
            }),
            None => Ok(TaskStatusReport {
                video_url: Some(format!("https://video.test/{}.mp4", handle)),
                ..TaskStatusReport::with_status(ProviderTaskStatus::Succeeded)
            }),
        }
    }

    async fn download(&self, url: &str) -> AiResult<Vec<u8>> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(url.as_bytes().to_vec())
    }
}

/// Local transcoder that writes placeholder outputs and records calls.
#[derive(Default)]
struct FakeTranscoder {
    /// Muxing into an output with this file name fails
    fail_mux_for: Mutex<Option<String>>,
    muxed: Mutex<Vec<PathBuf>>,
    concats: Mutex<Vec<Vec<PathBuf>>>,
}

impl FakeTranscoder {
    fn muxed_names(&self) -> Vec<String> {
        self.muxed.lock().unwrap().iter().map(|p| file_name(p)).collect()
    }

    fn last_concat_names(&self) -> Vec<String> {
        self.concats
            .lock()
            .unwrap()
            .last()
            .map(|inputs| inputs.iter().map(|p| file_name(p)).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MediaTranscoder for FakeTranscoder {
    async fn probe_duration(&self, _path: &Path) -> MediaResult<f64> {
        Ok(7.6)
    }

    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> MediaResult<()> {
        self.concats.lock().unwrap().push(inputs.to_vec());
        tokio::fs::write(output, b"merged").await?;
        Ok(())
    }

    async fn mux_audio(&self, _video: &Path, _audio: &Path, output: &Path) -> MediaResult<()> {
        if self.fail_mux_for.lock().unwrap().as_deref() == Some(file_name(output).as_str()) {
            return Err(MediaError::ffmpeg_failed("mux failed", None, Some(1)));
        }
        self.muxed.lock().unwrap().push(output.to_path_buf());
        tokio::fs::write(output, b"muxed").await?;
        Ok(())
    }
}

struct Harness {
    dir: TempDir,
    completion: Arc<FakeCompletion>,
    provider: Arc<FakeProvider>,
    transcoder: Arc<FakeTranscoder>,
}

impl Harness {
    fn new(script: &str) -> Self {
        Self::with_provider(script, FakeProvider::default())
    }

    fn with_provider(script: &str, provider: FakeProvider) -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("novel.txt"), NOVEL).unwrap();
        Self {
            dir,
            completion: FakeCompletion::new(script),
            provider: Arc::new(provider),
            transcoder: Arc::new(FakeTranscoder::default()),
        }
    }

    fn config(&self) -> PipelineConfig {
        PipelineConfig {
            novel_file: self.dir.path().join("novel.txt"),
            chapter: CHAPTER.to_string(),
            test_mode: false,
            work_dir: self.dir.path().to_path_buf(),
            video_poll_interval: Duration::from_millis(1),
            image_retry_unit: Duration::ZERO,
            ..Default::default()
        }
    }

    fn pipeline(&self, config: PipelineConfig) -> Pipeline {
        Pipeline::new(
            config,
            self.completion.clone(),
            self.provider.clone(),
            self.transcoder.clone(),
        )
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    fn add_voice(&self, scene_ids: impl IntoIterator<Item = u32>) {
        std::fs::create_dir_all(self.path("voice")).unwrap();
        for id in scene_ids {
            std::fs::write(self.path(&format!("voice/{}.wav", id)), b"RIFF").unwrap();
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}

/// Script JSON with `n` scenes, each naming `Alice`.
fn script_json(n: u32) -> String {
    let scenes: Vec<String> = (1..=n)
        .map(|i| format!("\"{i}\": {{\"content\": \"scene {i}\", \"character\": [\"Alice\"]}}"))
        .collect();
    format!("{{{}}}", scenes.join(", "))
}

const TWO_SCENES: &str = r#"{
    "1": {"content": "scene one", "character": ["Alice"]},
    "2": {"content": "scene two", "character": ["Alice", "Bob"]}
}"#;

// =============================================================================
// Full runs
// =============================================================================

#[tokio::test]
async fn test_full_run_produces_every_artifact() {
    let h = Harness::new(TWO_SCENES);
    h.add_voice([1, 2]);

    let result = h.pipeline(h.config()).run().await.unwrap();

    assert_eq!(result.script.len(), 2);
    assert_eq!(result.image_results.len(), 2);
    assert_eq!(result.video_results.len(), 2);
    assert!(result.video_results.iter().all(|clip| clip.is_fresh()));
    assert_eq!(result.merged_video_path, h.path("merged_video.mp4"));
    assert!(matches!(&result.merge, MergeOutcome::Merged { inputs } if inputs.len() == 2));

    for artifact in [
        "history/voice_script.json",
        "character/Alice.png",
        "character/Bob.png",
        "image/1_start.jpeg",
        "image/1_end.jpeg",
        "image/2_start.jpeg",
        "image/2_end.jpeg",
        "video/1.mp4",
        "video/2.mp4",
        "video/1_voice.mp4",
        "video/2_voice.mp4",
        "merged_video.mp4",
    ] {
        assert!(h.path(artifact).exists(), "missing {}", artifact);
    }
}

#[tokio::test]
async fn test_portraits_generated_once_per_character() {
    let h = Harness::new(TWO_SCENES);

    h.pipeline(h.config()).run().await.unwrap();

    assert_eq!(h.completion.appearance_calls.load(Ordering::SeqCst), 2);
    let requests = h.provider.image_requests.lock().unwrap();
    let portraits: Vec<&ImageRequest> = requests
        .iter()
        .filter(|r| r.prompt.starts_with("人物"))
        .collect();
    assert_eq!(portraits.len(), 2);
    assert!(portraits.iter().all(|r| r.reference_images.is_empty()));
    assert!(portraits[0].prompt.contains("人物Alice的外貌特征"));
    assert!(portraits[1].prompt.contains("人物Bob的外貌特征"));
}

#[tokio::test]
async fn test_frames_reference_scene_characters() {
    let h = Harness::new(TWO_SCENES);

    h.pipeline(h.config()).run().await.unwrap();

    let requests = h.provider.image_requests.lock().unwrap();
    let scene_two_start = requests
        .iter()
        .find(|r| r.prompt.starts_with("scene two start"))
        .unwrap();
    assert_eq!(scene_two_start.reference_images.len(), 2);
    assert!(scene_two_start.prompt.ends_with(",Alice 的外貌特征如图0所示,Bob 的外貌特征如图1所示"));
    assert!(scene_two_start.reference_images[0].starts_with("data:image/png;base64,"));

    let scene_one_end = requests
        .iter()
        .find(|r| r.prompt.starts_with("scene one end"))
        .unwrap();
    assert_eq!(scene_one_end.reference_images.len(), 1);
}

#[tokio::test]
async fn test_failed_portrait_is_skipped() {
    let h = Harness::with_provider(
        TWO_SCENES,
        FakeProvider {
            fail_images_containing: Some("人物Bob".into()),
            ..Default::default()
        },
    );

    let result = h.pipeline(h.config()).run().await.unwrap();

    assert_eq!(result.image_results.len(), 2);
    assert_eq!(result.video_results.len(), 2);
    assert!(h.path("character/Alice.png").exists());
    assert!(!h.path("character/Bob.png").exists());

    let requests = h.provider.image_requests.lock().unwrap();
    for frame in ["scene two start", "scene two end"] {
        let request = requests.iter().find(|r| r.prompt.starts_with(frame)).unwrap();
        assert_eq!(request.reference_images.len(), 1);
        assert!(request.prompt.ends_with(",Alice 的外貌特征如图0所示"));
        assert!(!request.prompt.contains("Bob"));
    }
}

#[tokio::test]
async fn test_clip_duration_follows_narration() {
    let h = Harness::new(TWO_SCENES);
    h.add_voice([1]);

    h.pipeline(h.config()).run().await.unwrap();

    let requests = h.provider.video_requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].prompt_text.ends_with("--duration 7 --resolution 480p"));
    assert!(requests[1].prompt_text.ends_with("--duration 5 --resolution 480p"));
    assert!(!requests[0].first_frame_base64.is_empty());
    assert!(!requests[0].last_frame_base64.is_empty());
}

#[test]
fn test_requested_duration() {
    assert_eq!(requested_duration(7.6, 13.0), 7);
    assert_eq!(requested_duration(42.0, 13.0), 13);
    assert_eq!(requested_duration(0.4, 13.0), 1);
}

// =============================================================================
// Scene limits
// =============================================================================

#[tokio::test]
async fn test_processed_scene_count() {
    let h = Harness::new(&script_json(3));

    let result = h.pipeline(h.config()).run().await.unwrap();
    assert_eq!(result.image_results.len(), 3);
    assert_eq!(result.video_results.len(), 3);
}

#[tokio::test]
async fn test_test_mode_caps_downstream_scenes() {
    let h = Harness::new(r#"{
        "1": {"content": "scene one", "character": ["Alice"]},
        "2": {"content": "scene two", "character": []},
        "3": {"content": "scene three", "character": ["Carol"]}
    }"#);
    let config = PipelineConfig {
        test_mode: true,
        max_scenes: 2,
        ..h.config()
    };

    let result = h.pipeline(config).run().await.unwrap();

    assert_eq!(result.script.len(), 3);
    assert_eq!(result.image_results.len(), 2);
    assert_eq!(result.video_results.len(), 2);
    assert!(!h.path("image/3_start.jpeg").exists());
    // Portraits always cover the whole script
    assert!(h.path("character/Carol.png").exists());

    let persisted = std::fs::read_to_string(h.path("history/voice_script.json")).unwrap();
    assert!(persisted.contains("scene three"));
}

// =============================================================================
// Resume
// =============================================================================

#[tokio::test]
async fn test_second_run_makes_no_remote_calls() {
    let h = Harness::new(TWO_SCENES);
    h.add_voice([1, 2]);

    let first = h.pipeline(h.config()).run().await.unwrap();
    let completions = h.completion.total();
    let remote = h.provider.remote_calls();
    let muxed = h.transcoder.muxed_names().len();

    let second = h.pipeline(h.config()).run().await.unwrap();

    assert_eq!(h.completion.total(), completions);
    assert_eq!(h.provider.remote_calls(), remote);
    assert_eq!(h.transcoder.muxed_names().len(), muxed);
    assert_eq!(second.merged_video_path, first.merged_video_path);
    assert_eq!(second.image_results.len(), 2);
    assert!(second.video_results.iter().all(|clip| !clip.is_fresh()));
    assert_eq!(
        second.image_results[0].start.prompt_text(),
        nreel_models::RECOVERED_PROMPT
    );
    assert!(second.merge.is_merged());
}

#[tokio::test]
async fn test_deleted_clip_is_regenerated_alone() {
    let h = Harness::new(&script_json(4));
    h.add_voice(1..=4);

    h.pipeline(h.config()).run().await.unwrap();
    assert_eq!(h.provider.video_tasks(), 4);
    let images = h.provider.image_requests.lock().unwrap().len();
    h.transcoder.muxed.lock().unwrap().clear();

    std::fs::remove_file(h.path("video/3.mp4")).unwrap();
    let result = h.pipeline(h.config()).run().await.unwrap();

    assert_eq!(h.provider.video_tasks(), 5);
    assert_eq!(h.provider.image_requests.lock().unwrap().len(), images);
    assert_eq!(h.transcoder.muxed_names(), vec!["3_voice.mp4"]);
    assert_eq!(
        h.transcoder.last_concat_names(),
        vec!["1_voice.mp4", "2_voice.mp4", "3_voice.mp4", "4_voice.mp4"]
    );

    let fresh: Vec<SceneId> = result
        .video_results
        .iter()
        .filter(|clip| clip.is_fresh())
        .map(|clip| clip.scene_id)
        .collect();
    assert_eq!(fresh, vec![SceneId::new(3).unwrap()]);
}

#[tokio::test]
async fn test_failed_mux_leaves_scene_out_of_merge() {
    let h = Harness::new(&script_json(3));
    h.add_voice(1..=3);
    *h.transcoder.fail_mux_for.lock().unwrap() = Some("2_voice.mp4".into());

    let result = h.pipeline(h.config()).run().await.unwrap();

    assert_eq!(result.video_results.len(), 3);
    assert!(!h.path("video/2_voice.mp4").exists());
    assert_eq!(
        h.transcoder.last_concat_names(),
        vec!["1_voice.mp4", "3_voice.mp4"]
    );
    assert!(matches!(&result.merge, MergeOutcome::Merged { inputs } if inputs.len() == 2));
}

#[tokio::test]
async fn test_failed_remux_drops_stale_muxed_clip() {
    let h = Harness::new(&script_json(3));
    h.add_voice(1..=3);

    h.pipeline(h.config()).run().await.unwrap();
    assert!(h.path("video/3_voice.mp4").exists());

    std::fs::remove_file(h.path("video/3.mp4")).unwrap();
    *h.transcoder.fail_mux_for.lock().unwrap() = Some("3_voice.mp4".into());
    let result = h.pipeline(h.config()).run().await.unwrap();

    assert!(h.path("video/3.mp4").exists());
    assert!(!h.path("video/3_voice.mp4").exists());
    assert_eq!(
        h.transcoder.last_concat_names(),
        vec!["1_voice.mp4", "2_voice.mp4"]
    );
    assert!(matches!(&result.merge, MergeOutcome::Merged { inputs } if inputs.len() == 2));
}

#[tokio::test]
async fn test_existing_script_is_reused() {
    let h = Harness::new("not used");
    std::fs::create_dir_all(h.path("history")).unwrap();
    std::fs::write(h.path("history/voice_script.json"), TWO_SCENES).unwrap();

    let result = h.pipeline(h.config()).run().await.unwrap();

    assert_eq!(h.completion.script_calls.load(Ordering::SeqCst), 0);
    assert_eq!(result.script.len(), 2);
}

#[tokio::test]
async fn test_corrupt_script_is_regenerated() {
    let h = Harness::new(TWO_SCENES);
    std::fs::create_dir_all(h.path("history")).unwrap();
    std::fs::write(h.path("history/voice_script.json"), "{ truncated").unwrap();

    let result = h.pipeline(h.config()).run().await.unwrap();

    assert_eq!(h.completion.script_calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.script.len(), 2);
}

// =============================================================================
// Merge ordering
// =============================================================================

#[tokio::test]
async fn test_merge_orders_scenes_numerically() {
    let h = Harness::new(&script_json(10));
    h.add_voice(1..=10);
    let config = PipelineConfig {
        max_scene_parallel: 4,
        ..h.config()
    };

    let result = h.pipeline(config).run().await.unwrap();

    let expected: Vec<String> = (1..=10).map(|i| format!("{}_voice.mp4", i)).collect();
    assert_eq!(h.transcoder.last_concat_names(), expected);
    let ids: Vec<u32> = result.video_results.iter().map(|c| c.scene_id.get()).collect();
    assert_eq!(ids, (1..=10).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_merge_without_narration_reports_failure() {
    let h = Harness::new(TWO_SCENES);

    let result = h.pipeline(h.config()).run().await.unwrap();

    assert_eq!(
        result.merge,
        MergeOutcome::Failed {
            message: "no muxed clips to merge".into()
        }
    );
    assert!(h.transcoder.concats.lock().unwrap().is_empty());
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_frame_failure_drops_only_that_scene() {
    let provider = FakeProvider {
        fail_images_containing: Some("scene two".into()),
        ..Default::default()
    };
    let h = Harness::with_provider(TWO_SCENES, provider);

    let result = h.pipeline(h.config()).run().await.unwrap();

    let ids: Vec<u32> = result.image_results.iter().map(|p| p.scene_id.get()).collect();
    assert_eq!(ids, vec![1]);
    assert_eq!(result.video_results.len(), 1);
    assert!(!h.path("video/2.mp4").exists());
}

#[tokio::test]
async fn test_failed_video_tasks_drop_scenes() {
    let provider = FakeProvider {
        video_status: Some(ProviderTaskStatus::Failed),
        ..Default::default()
    };
    let h = Harness::with_provider(TWO_SCENES, provider);
    h.add_voice([1, 2]);

    let result = h.pipeline(h.config()).run().await.unwrap();

    assert_eq!(result.image_results.len(), 2);
    assert!(result.video_results.is_empty());
    // Terminal failure stops polling right away
    assert_eq!(h.provider.polls.load(Ordering::SeqCst), 2);
    assert!(!result.merge.is_merged());
}

#[tokio::test]
async fn test_unparseable_script_aborts_run() {
    let h = Harness::new("Sorry, here is a summary instead.");
    let pipeline = h.pipeline(h.config());

    assert!(pipeline.run().await.is_none());
    let err = pipeline.try_run(Default::default()).await.unwrap_err();
    assert!(matches!(err, PipelineError::ScriptFormat(_)));
    assert!(!h.path("history/voice_script.json").exists());
    assert_eq!(h.provider.remote_calls(), 0);
}

#[tokio::test]
async fn test_missing_chapter_aborts_run() {
    let h = Harness::new(TWO_SCENES);
    let config = PipelineConfig {
        chapter: "第9章 不存在".into(),
        ..h.config()
    };
    let pipeline = h.pipeline(config);

    assert!(pipeline.run().await.is_none());
    let err = pipeline.try_run(Default::default()).await.unwrap_err();
    assert!(matches!(err, PipelineError::ChapterNotFound(ref title) if title == "第9章 不存在"));
    assert_eq!(h.completion.total(), 0);
}

#[test]
fn test_error_chain_keeps_every_cause() {
    #[derive(Debug)]
    struct Layer(&'static str, Option<Box<Layer>>);

    impl std::fmt::Display for Layer {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.0)
        }
    }

    impl std::error::Error for Layer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            self.1.as_deref().map(|e| e as &(dyn std::error::Error + 'static))
        }
    }

    let err = Layer(
        "mux failed",
        Some(Box::new(Layer("mux", Some(Box::new(Layer("exit code 1", None)))))),
    );
    assert_eq!(error_chain(&err), "mux failed: mux: exit code 1");
}
