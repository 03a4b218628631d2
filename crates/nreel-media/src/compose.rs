//! Clip composition: audio muxing and stream-copy concatenation.

use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{commit_staged, discard_staged, staging_path};

/// Lay a narration track over a video clip.
///
/// The video stream is copied verbatim, audio is re-encoded to AAC, and the
/// output ends with the shorter of the two streams.
pub async fn mux_audio(
    runner: &FfmpegRunner,
    video: &Path,
    audio: &Path,
    output: &Path,
) -> MediaResult<()> {
    for input in [video, audio] {
        if !input.exists() {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }
    }

    info!(
        "Muxing audio: {} + {} -> {}",
        video.display(),
        audio.display(),
        output.display()
    );

    let staging = staging_path(output);
    let cmd = mux_command(video, audio, &staging);
    run_staged(runner, &cmd, &staging, output).await
}

/// Concatenate clips in the given order without re-encoding.
///
/// Inputs must share codecs and dimensions; the concat demuxer copies
/// streams as-is.
pub async fn concat_clips(
    runner: &FfmpegRunner,
    inputs: &[PathBuf],
    output: &Path,
) -> MediaResult<()> {
    if inputs.is_empty() {
        return Err(MediaError::NoInputs);
    }

    let mut absolute = Vec::with_capacity(inputs.len());
    for input in inputs {
        if !input.exists() {
            return Err(MediaError::FileNotFound(input.clone()));
        }
        absolute.push(tokio::fs::canonicalize(input).await?);
    }

    info!(
        "Concatenating {} clips -> {}",
        absolute.len(),
        output.display()
    );

    let mut list = tempfile::Builder::new()
        .prefix("nreel-concat-")
        .suffix(".txt")
        .tempfile()?;
    list.write_all(build_concat_list(&absolute).as_bytes())?;
    list.flush()?;

    let staging = staging_path(output);
    let cmd = concat_command(list.path(), &staging);
    run_staged(runner, &cmd, &staging, output).await
}

async fn run_staged(
    runner: &FfmpegRunner,
    cmd: &FfmpegCommand,
    staging: &Path,
    output: &Path,
) -> MediaResult<()> {
    if let Err(e) = runner.run(cmd).await {
        discard_staged(staging).await;
        return Err(e);
    }
    commit_staged(staging, output).await?;
    info!("Wrote {}", output.display());
    Ok(())
}

fn mux_command(video: &Path, audio: &Path, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(output)
        .input(video)
        .input(audio)
        .video_codec("copy")
        .audio_codec("aac")
        .map("0:v:0")
        .map("1:a:0")
        .shortest()
}

fn concat_command(list: &Path, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(output)
        .input_with_args(["-f", "concat", "-safe", "0"], list)
        .codec_copy()
}

/// Render the concat demuxer's file list.
///
/// Single quotes in paths are closed, escaped, and reopened as the demuxer
/// expects.
fn build_concat_list(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| {
            let path = p.to_string_lossy().replace('\\', "/").replace('\'', r"'\''");
            format!("file '{}'\n", path)
        })
        .collect()
}
