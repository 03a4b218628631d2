//! FFmpeg CLI wrapper for the NovelReel pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with multiple inputs
//! - Duration probing (ffprobe JSON, with an ffmpeg banner fallback)
//! - Audio muxing and stream-copy concatenation
//! - Staged outputs renamed into place on success
//! - The `MediaTranscoder` trait the pipeline depends on

pub mod command;
pub mod compose;
pub mod error;
pub mod fs_utils;
pub mod probe;
pub mod transcoder;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use compose::{concat_clips, mux_audio};
pub use error::{MediaError, MediaResult};
pub use probe::probe_duration;
pub use transcoder::{FfmpegTranscoder, MediaTranscoder};
