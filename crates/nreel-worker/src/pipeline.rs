//! Stage orchestrator.
//!
//! Runs the chapter through six ordered stages. Every stage checks the
//! asset store first and only does remote work for artifacts that are
//! missing, so a re-run picks up where the previous one stopped:
//!
//! 1. load the novel and select the chapter
//! 2. produce or recover the scene script
//! 3. generate missing character portraits
//! 4. generate missing start/end frames per scene
//! 5. generate missing video clips per scene
//! 6. mux narration onto clips, then concatenate in scene order

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use nreel_ai_client::{CompletionService, GenerationClient, GenerationProvider, ReferenceImage};
use nreel_media::MediaTranscoder;
use nreel_models::{
    ArtifactOrigin, FrameImage, FramePair, FrameRole, ImageSize, MergeOutcome, PipelineResult,
    RunId, Scene, SceneClip, SceneId, SceneScript,
};
use nreel_storage::{AssetStore, StorageError};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn, Instrument};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, StageResult};
use crate::logging::RunLogger;
use crate::novel::load_novel;
use crate::portraits::{generate_missing_portraits, load_references};
use crate::writer::SceneWriter;

/// What happened to one scene in the mux stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MuxOutcome {
    Muxed,
    Reused,
    NoNarration,
}

/// Requested clip length for a narration track of `narration_secs`.
///
/// Clamped to `max_secs` and truncated to whole seconds, never below one.
pub fn requested_duration(narration_secs: f64, max_secs: f64) -> u32 {
    (narration_secs.min(max_secs).trunc() as u32).max(1)
}

/// The novel-to-video pipeline.
pub struct Pipeline {
    config: PipelineConfig,
    store: AssetStore,
    writer: SceneWriter,
    generator: GenerationClient,
    transcoder: Arc<dyn MediaTranscoder>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        completion: Arc<dyn CompletionService>,
        provider: Arc<dyn GenerationProvider>,
        transcoder: Arc<dyn MediaTranscoder>,
    ) -> Self {
        let generator = GenerationClient::new(provider)
            .with_image_retry(config.image_max_retries, config.image_retry_unit)
            .with_video_policy(config.video_policy());
        Self {
            store: AssetStore::new(config.layout()),
            writer: SceneWriter::new(completion),
            generator,
            transcoder,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &AssetStore {
        &self.store
    }

    /// Run every stage.
    ///
    /// Returns `None` when the run aborts; the error is logged and never
    /// propagated.
    pub async fn run(&self) -> Option<PipelineResult> {
        let run_id = RunId::new();
        let logger = RunLogger::new(&run_id, "pipeline");
        let span = logger.create_span();

        match self.try_run(run_id).instrument(span).await {
            Ok(result) => {
                logger.log_completion(&format!(
                    "{} frame pairs, {} clips, merge {}, took {}s",
                    result.image_results.len(),
                    result.video_results.len(),
                    if result.merge.is_merged() { "succeeded" } else { "failed" },
                    result.elapsed().num_seconds()
                ));
                Some(result)
            }
            Err(e) => {
                logger.log_error(&format!("Pipeline failed: {}", error_chain(&e)));
                debug!(error = ?e, "Pipeline failure detail");
                None
            }
        }
    }

    /// Run every stage, returning the first run-fatal error.
    pub async fn try_run(&self, run_id: RunId) -> StageResult<PipelineResult> {
        let started_at = Utc::now();
        let logger = RunLogger::new(&run_id, "chapter");

        logger.log_start(&format!("loading {}", self.config.novel_file.display()));
        let chapter = self.load_chapter().await?;
        logger.log_completion(&format!("loaded {}", self.config.chapter));

        self.store.ensure_dirs().await?;

        let logger = logger.for_stage("script");
        let script = self.scene_script(&chapter, &logger).await?;
        let scene_ids = script.processed_ids(self.config.scene_limit());
        if self.config.test_mode {
            logger.log_progress(&format!(
                "Test mode: processing the first {} of {} scenes",
                scene_ids.len(),
                script.len()
            ));
        }

        generate_missing_portraits(
            &self.writer,
            &self.generator,
            &self.store,
            &script.character_names(),
            &chapter,
            &logger.for_stage("portraits"),
        )
        .await;

        let image_results = self
            .frame_stage(&script, &scene_ids, &logger.for_stage("images"))
            .await;
        let video_results = self
            .clip_stage(&image_results, &logger.for_stage("videos"))
            .await;

        let logger = logger.for_stage("merge");
        let muxed_ids = self.mux_stage(&video_results, &logger).await;
        let merge = self.merge_stage(&muxed_ids, &logger).await;

        Ok(PipelineResult {
            run_id,
            script,
            image_results,
            video_results,
            merged_video_path: self.store.layout().merged_path().to_path_buf(),
            merge,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn load_chapter(&self) -> StageResult<String> {
        let mut chapters = load_novel(&self.config.novel_file).await?;
        chapters
            .remove(&self.config.chapter)
            .ok_or_else(|| PipelineError::ChapterNotFound(self.config.chapter.clone()))
    }

    /// Reuse the persisted script, or generate and persist a new one.
    async fn scene_script(&self, chapter: &str, logger: &RunLogger) -> StageResult<SceneScript> {
        match self.store.load_script().await {
            Ok(Some(script)) if !script.is_empty() => {
                logger.log_progress(&format!(
                    "Reusing existing script with {} scenes",
                    script.len()
                ));
                return Ok(script);
            }
            Ok(Some(_)) => logger.log_warning("Existing script is empty, regenerating"),
            Ok(None) => {}
            Err(e @ StorageError::CorruptScript { .. }) => {
                logger.log_warning(&format!("{}, regenerating", e));
            }
            Err(e) => return Err(e.into()),
        }

        logger.log_start("generating scene script");
        let script = self.writer.voice_script(chapter).await?;
        self.store.save_script(&script).await?;
        logger.log_completion(&format!("generated {} scenes", script.len()));
        Ok(script)
    }

    /// Run `work` for every item with at most `max_scene_parallel` in flight.
    /// Results come back in input order.
    async fn for_each_scene<T, R, F, Fut>(&self, items: Vec<T>, work: F) -> Vec<R>
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = R>,
    {
        let semaphore = Semaphore::new(self.config.max_scene_parallel.max(1));
        let futures = items.into_iter().map(|item| {
            let semaphore = &semaphore;
            let task = work(item);
            async move {
                let _permit = semaphore.acquire().await;
                task.await
            }
        });
        join_all(futures).await
    }

    async fn frame_stage(
        &self,
        script: &SceneScript,
        scene_ids: &[SceneId],
        logger: &RunLogger,
    ) -> Vec<FramePair> {
        logger.log_start(&format!("{} scenes", scene_ids.len()));
        let scenes: Vec<(SceneId, &Scene)> = scene_ids
            .iter()
            .filter_map(|id| script.get(*id).map(|scene| (*id, scene)))
            .collect();

        let results = self
            .for_each_scene(scenes, |(id, scene)| self.scene_frames(id, scene))
            .await;
        let pairs = keep_successes(results, logger);

        logger.log_completion(&format!("{} frame pairs ready", pairs.len()));
        pairs
    }

    async fn scene_frames(&self, id: SceneId, scene: &Scene) -> StageResult<FramePair> {
        let _guard = self.store.locks().lock_scene(id).await;
        let layout = self.store.layout();
        let start_path = layout.frame_path(id, FrameRole::Start);
        let end_path = layout.frame_path(id, FrameRole::End);

        if self.store.exists(&start_path).await && self.store.exists(&end_path).await {
            info!(scene_id = %id, "Frames already exist, skipping generation");
            return Ok(FramePair {
                scene_id: id,
                narration: scene.content.clone(),
                start: self.recovered_frame(id, start_path).await?,
                end: self.recovered_frame(id, end_path).await?,
                origin: ArtifactOrigin::Recovered,
            });
        }

        info!(scene_id = %id, "Generating frames");
        let prompts = self
            .writer
            .frame_prompts(&scene.content)
            .await
            .map_err(|e| PipelineError::image_prompt(id, e))?;
        debug!(scene_id = %id, start = %prompts.start_frame, end = %prompts.end_frame, "Frame prompts");

        let references = load_references(&self.store, &scene.character).await;
        let start = self
            .generate_frame(id, &prompts.start_frame, &references, start_path)
            .await?;
        let end = self
            .generate_frame(id, &prompts.end_frame, &references, end_path)
            .await?;

        Ok(FramePair {
            scene_id: id,
            narration: scene.content.clone(),
            start,
            end,
            origin: ArtifactOrigin::Generated,
        })
    }

    async fn generate_frame(
        &self,
        id: SceneId,
        prompt: &str,
        references: &[ReferenceImage],
        path: PathBuf,
    ) -> StageResult<FrameImage> {
        let image = self
            .generator
            .generate_image(prompt, ImageSize::default(), references, Some(&path))
            .await
            .map_err(|e| PipelineError::frame(id, e))?;
        let base64 = self
            .store
            .read_base64(&path)
            .await
            .map_err(|e| PipelineError::frame(id, e))?;
        info!(scene_id = %id, path = %path.display(), "Frame saved");

        Ok(FrameImage {
            path,
            remote_url: Some(image.url),
            prompt: Some(prompt.to_string()),
            base64,
        })
    }

    async fn recovered_frame(&self, id: SceneId, path: PathBuf) -> StageResult<FrameImage> {
        let base64 = self
            .store
            .read_base64(&path)
            .await
            .map_err(|e| PipelineError::frame(id, e))?;
        Ok(FrameImage {
            path,
            remote_url: None,
            prompt: None,
            base64,
        })
    }

    async fn clip_stage(&self, pairs: &[FramePair], logger: &RunLogger) -> Vec<SceneClip> {
        logger.log_start(&format!("{} scenes with frames", pairs.len()));
        let pairs: Vec<&FramePair> = pairs.iter().collect();
        let results = self
            .for_each_scene(pairs, |pair| self.scene_clip(pair))
            .await;
        let clips = keep_successes(results, logger);

        logger.log_completion(&format!("{} clips ready", clips.len()));
        clips
    }

    async fn scene_clip(&self, pair: &FramePair) -> StageResult<SceneClip> {
        let id = pair.scene_id;
        let _guard = self.store.locks().lock_scene(id).await;
        let path = self.store.layout().clip_path(id);

        if self.store.exists(&path).await {
            info!(scene_id = %id, "Clip already exists, skipping generation");
            return Ok(SceneClip::recovered(id, path));
        }

        let duration_secs = self.clip_duration(id).await;
        let prompt = self
            .writer
            .video_prompt(pair)
            .await
            .map_err(|e| PipelineError::video_prompt(id, e))?;
        debug!(scene_id = %id, prompt = %prompt.prompt, "Video prompt");

        let task = self
            .generator
            .generate_video(pair, &prompt.prompt, duration_secs, &path)
            .await
            .map_err(|e| PipelineError::from_video(id, e))?;

        Ok(SceneClip {
            scene_id: id,
            path,
            video_url: task.result_url.clone(),
            task_id: Some(task.handle.to_string()),
            narration: prompt.narration,
            duration_secs: Some(duration_secs),
            origin: ArtifactOrigin::Generated,
        })
    }

    /// Clip length from the scene's narration track, or the configured
    /// default when there is none.
    async fn clip_duration(&self, id: SceneId) -> u32 {
        let fallback = self.config.video_duration_secs;
        let audio = self.store.layout().narration_path(id);
        if !self.store.exists(&audio).await {
            return fallback;
        }

        match self.transcoder.probe_duration(&audio).await {
            Ok(secs) if secs > 0.0 => {
                let duration = requested_duration(secs, self.config.max_clip_duration_secs);
                info!(scene_id = %id, narration_secs = secs, duration, "Clip length from narration");
                duration
            }
            Ok(secs) => {
                warn!(scene_id = %id, narration_secs = secs, "Narration has no usable duration");
                fallback
            }
            Err(e) => {
                warn!(scene_id = %id, "Could not probe narration: {}", e);
                fallback
            }
        }
    }

    /// Mux every clip that has narration. Returns the scenes whose muxed
    /// clip belongs in the merge.
    async fn mux_stage(&self, clips: &[SceneClip], logger: &RunLogger) -> Vec<SceneId> {
        logger.log_start("muxing narration onto clips");
        let ids: Vec<SceneId> = clips.iter().map(|c| c.scene_id).collect();
        let clips: Vec<&SceneClip> = clips.iter().collect();
        let results = self
            .for_each_scene(clips, |clip| self.mux_scene(clip))
            .await;

        let mut muxed = 0;
        let mut ready = Vec::with_capacity(ids.len());
        for (id, result) in ids.into_iter().zip(results) {
            match result {
                Ok(MuxOutcome::Muxed) => {
                    muxed += 1;
                    ready.push(id);
                }
                Ok(MuxOutcome::Reused) => ready.push(id),
                Ok(MuxOutcome::NoNarration) => {}
                Err(e) => logger.log_warning(&format!("Leaving scene out of the merge: {}", e)),
            }
        }
        logger.log_progress(&format!("{} clips muxed", muxed));
        ready
    }

    async fn mux_scene(&self, clip: &SceneClip) -> StageResult<MuxOutcome> {
        let id = clip.scene_id;
        let _guard = self.store.locks().lock_scene(id).await;
        let layout = self.store.layout();
        let audio = layout.narration_path(id);
        let output = layout.muxed_path(id);

        if !self.store.exists(&audio).await {
            debug!(scene_id = %id, "No narration track, skipping mux");
            return Ok(MuxOutcome::NoNarration);
        }
        if !clip.is_fresh() && self.store.exists(&output).await {
            info!(scene_id = %id, "Muxed clip already exists, skipping");
            return Ok(MuxOutcome::Reused);
        }

        // A muxed clip from an earlier clip must not outlive a failed remux.
        self.store.remove(&output).await?;
        self.transcoder
            .mux_audio(&clip.path, &audio, &output)
            .await
            .map_err(|e| PipelineError::mux(id, e))?;
        info!(scene_id = %id, path = %output.display(), "Muxed narration");
        Ok(MuxOutcome::Muxed)
    }

    async fn merge_stage(&self, ids: &[SceneId], logger: &RunLogger) -> MergeOutcome {
        let inputs = self.store.existing_muxed_clips(ids.iter().copied()).await;
        if inputs.is_empty() {
            let message = "no muxed clips to merge".to_string();
            logger.log_warning(&message);
            return MergeOutcome::Failed { message };
        }

        let output = self.store.layout().merged_path();
        logger.log_start(&format!("concatenating {} clips", inputs.len()));
        match self.transcoder.concat(&inputs, output).await {
            Ok(()) => {
                logger.log_completion(&format!("merged video at {}", output.display()));
                MergeOutcome::Merged { inputs }
            }
            Err(e) => {
                let err = PipelineError::Concat(e.to_string());
                logger.log_error(&err.to_string());
                MergeOutcome::Failed {
                    message: err.to_string(),
                }
            }
        }
    }
}

/// Build a pipeline and run it.
pub async fn run_pipeline(
    config: PipelineConfig,
    completion: Arc<dyn CompletionService>,
    provider: Arc<dyn GenerationProvider>,
    transcoder: Arc<dyn MediaTranscoder>,
) -> Option<PipelineResult> {
    Pipeline::new(config, completion, provider, transcoder)
        .run()
        .await
}

/// Log and drop per-scene failures.
fn keep_successes<T>(results: Vec<StageResult<T>>, logger: &RunLogger) -> Vec<T> {
    results
        .into_iter()
        .filter_map(|result| match result {
            Ok(value) => Some(value),
            Err(e) => {
                logger.log_warning(&format!("Dropping scene: {}", e));
                None
            }
        })
        .collect()
}

/// Every message in the source chain, joined with `: `.
pub(crate) fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        out.push_str(": ");
        out.push_str(&inner.to_string());
        source = inner.source();
    }
    out
}
