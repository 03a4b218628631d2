//! Staged output files.
//!
//! FFmpeg writes into a sibling staging path which is renamed over the final
//! destination only after the process succeeds, so an interrupted run never
//! leaves a truncated file at the final path.

use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{MediaError, MediaResult};

/// Sibling path used while an output is being written.
///
/// Keeps the extension so FFmpeg can still infer the container:
/// `video/3_voice.mp4` -> `video/3_voice.partial.mp4`.
pub fn staging_path(dst: &Path) -> PathBuf {
    let stem = dst
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = match dst.extension() {
        Some(ext) => format!("{}.partial.{}", stem, ext.to_string_lossy()),
        None => format!("{}.partial", stem),
    };
    dst.with_file_name(name)
}

/// Move a finished staging file over its destination.
///
/// Falls back to copy+delete when the rename crosses filesystems (EXDEV).
pub async fn commit_staged(staging: &Path, dst: &Path) -> MediaResult<()> {
    if let Some(parent) = dst.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    match fs::rename(staging, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            tracing::debug!(
                "Cross-device rename, copying instead: {} -> {}",
                staging.display(),
                dst.display()
            );
            fs::copy(staging, dst).await?;
            if let Err(e) = fs::remove_file(staging).await {
                tracing::warn!("Failed to remove staging file {}: {}", staging.display(), e);
            }
            Ok(())
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

/// Best-effort removal of a leftover staging file.
pub async fn discard_staged(staging: &Path) {
    if let Err(e) = fs::remove_file(staging).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Failed to remove staging file {}: {}", staging.display(), e);
        }
    }
}

/// EXDEV is error code 18 on Linux/macOS.
fn is_cross_device_error(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(18)
}
