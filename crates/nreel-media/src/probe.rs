//! Media duration probing.
//!
//! Prefers the structured `ffprobe -print_format json` output. When ffprobe is
//! not installed, falls back to scraping the `Duration: HH:MM:SS.ss` banner
//! that `ffmpeg -i` prints to stderr.

use regex::Regex;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use std::sync::OnceLock;
use tokio::process::Command;
use tracing::debug;

use crate::command::{check_ffmpeg, check_ffprobe};
use crate::error::{MediaError, MediaResult};

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Duration of an audio or video file in seconds.
pub async fn probe_duration(path: impl AsRef<Path>) -> MediaResult<f64> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let duration = match check_ffprobe() {
        Some(ffprobe) => probe_with_ffprobe(&ffprobe, path).await?,
        None => {
            debug!("ffprobe not found, reading duration from ffmpeg banner");
            probe_with_ffmpeg_banner(path).await?
        }
    };

    duration.ok_or_else(|| MediaError::DurationUnavailable(path.to_path_buf()))
}

async fn probe_with_ffprobe(ffprobe: &Path, path: &Path) -> MediaResult<Option<f64>> {
    let output = Command::new(ffprobe)
        .args(["-v", "quiet", "-print_format", "json", "-show_format"])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: "FFprobe failed".to_string(),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_ffprobe_duration(&output.stdout)
}

async fn probe_with_ffmpeg_banner(path: &Path) -> MediaResult<Option<f64>> {
    let ffmpeg = check_ffmpeg()?;

    // `ffmpeg -i` without an output exits non-zero but still prints the banner.
    let output = Command::new(ffmpeg)
        .arg("-i")
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await?;

    Ok(parse_duration_banner(&String::from_utf8_lossy(&output.stderr)))
}

/// Extract `format.duration` from ffprobe JSON.
fn parse_ffprobe_duration(stdout: &[u8]) -> MediaResult<Option<f64>> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;
    Ok(probe
        .format
        .duration
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite()))
}

fn duration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"Duration: (\d{2}):(\d{2}):(\d{2}(?:\.\d+)?)").expect("valid duration regex")
    })
}

/// Parse the `Duration: HH:MM:SS.ss` line from ffmpeg's stderr banner.
fn parse_duration_banner(stderr: &str) -> Option<f64> {
    let caps = duration_regex().captures(stderr)?;
    let hours: f64 = caps[1].parse().ok()?;
    let minutes: f64 = caps[2].parse().ok()?;
    let seconds: f64 = caps[3].parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}
