//! The media-transcoder seam used by the pipeline.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::command::FfmpegRunner;
use crate::compose::{concat_clips, mux_audio};
use crate::error::MediaResult;
use crate::probe::probe_duration;

/// Local media operations needed by the final pipeline stages.
#[async_trait]
pub trait MediaTranscoder: Send + Sync {
    /// Duration of an audio or video file in seconds.
    async fn probe_duration(&self, path: &Path) -> MediaResult<f64>;

    /// Concatenate clips in order into `output` (stream copy).
    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> MediaResult<()>;

    /// Mux an audio track onto a video clip.
    async fn mux_audio(&self, video: &Path, audio: &Path, output: &Path) -> MediaResult<()>;
}

/// Transcoder backed by the `ffmpeg`/`ffprobe` binaries on `PATH`.
#[derive(Debug, Clone, Default)]
pub struct FfmpegTranscoder {
    runner: FfmpegRunner,
}

impl FfmpegTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill any single FFmpeg invocation that exceeds `secs`.
    pub fn with_timeout(secs: u64) -> Self {
        Self {
            runner: FfmpegRunner::new().with_timeout(secs),
        }
    }
}

#[async_trait]
impl MediaTranscoder for FfmpegTranscoder {
    async fn probe_duration(&self, path: &Path) -> MediaResult<f64> {
        probe_duration(path).await
    }

    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> MediaResult<()> {
        concat_clips(&self.runner, inputs, output).await
    }

    async fn mux_audio(&self, video: &Path, audio: &Path, output: &Path) -> MediaResult<()> {
        mux_audio(&self.runner, video, audio, output).await
    }
}
