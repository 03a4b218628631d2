//! Filesystem-backed artifact store.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use nreel_models::{SceneId, SceneScript};
use tokio::fs;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::layout::AssetLayout;
use crate::locks::AssetLocks;

/// Reads and writes pipeline artifacts under an [`AssetLayout`].
///
/// Writes go to a hidden sibling file first and are renamed into place, so
/// an existing file at an artifact path is always complete.
#[derive(Debug)]
pub struct AssetStore {
    layout: AssetLayout,
    locks: AssetLocks,
}

impl AssetStore {
    pub fn new(layout: AssetLayout) -> Self {
        Self {
            layout,
            locks: AssetLocks::new(),
        }
    }

    pub fn layout(&self) -> &AssetLayout {
        &self.layout
    }

    pub fn locks(&self) -> &AssetLocks {
        &self.locks
    }

    /// Create every output directory.
    pub async fn ensure_dirs(&self) -> StorageResult<()> {
        for dir in self.layout.output_dirs() {
            fs::create_dir_all(dir).await?;
        }
        Ok(())
    }

    /// Whether a complete artifact exists at `path`.
    pub async fn exists(&self, path: &Path) -> bool {
        fs::try_exists(path).await.unwrap_or(false)
    }

    /// Load the persisted script.
    ///
    /// Returns `Ok(None)` when no script has been written yet and
    /// [`StorageError::CorruptScript`] when the file exists but does not
    /// parse.
    pub async fn load_script(&self) -> StorageResult<Option<SceneScript>> {
        let path = self.layout.script_path();
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        SceneScript::from_persisted(&raw)
            .map(Some)
            .map_err(|source| StorageError::CorruptScript { path, source })
    }

    /// Persist the script as pretty-printed JSON.
    pub async fn save_script(&self, script: &SceneScript) -> StorageResult<PathBuf> {
        let path = self.layout.script_path();
        let json = script.to_json_pretty()?;
        self.write_atomic(&path, json.as_bytes()).await?;
        info!("Saved scene script ({} scenes) to {}", script.len(), path.display());
        Ok(path)
    }

    /// Write `bytes` to `path` via a staging file and rename.
    pub async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> StorageResult<()> {
        write_atomic(path, bytes).await
    }

    /// Delete an artifact. A missing file is not an error.
    pub async fn remove(&self, path: &Path) -> StorageResult<()> {
        match fs::remove_file(path).await {
            Ok(()) => {
                debug!("Removed {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Base64 encoding of a stored artifact.
    pub async fn read_base64(&self, path: &Path) -> StorageResult<String> {
        match fs::read(path).await {
            Ok(bytes) => Ok(STANDARD.encode(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.to_path_buf()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Muxed clips that exist for `ids`, in ascending numeric id order.
    pub async fn existing_muxed_clips(
        &self,
        ids: impl IntoIterator<Item = SceneId>,
    ) -> Vec<PathBuf> {
        let mut ids: Vec<SceneId> = ids.into_iter().collect();
        ids.sort();
        ids.dedup();

        let mut clips = Vec::with_capacity(ids.len());
        for id in ids {
            let path = self.layout.muxed_path(id);
            if self.exists(&path).await {
                clips.push(path);
            }
        }
        clips
    }
}

/// Write `bytes` to `path` via a hidden staging file, then rename over the
/// destination. Parent directories are created as needed.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let staging = staging_path(path)?;
    if let Err(e) = fs::write(&staging, bytes).await {
        let _ = fs::remove_file(&staging).await;
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&staging, path).await {
        let _ = fs::remove_file(&staging).await;
        return Err(e.into());
    }

    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

/// Hidden sibling used while writing: `history/voice_script.json` ->
/// `history/.voice_script.json.tmp`.
fn staging_path(path: &Path) -> StorageResult<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| StorageError::invalid_key(path.display().to_string()))?;
    Ok(path.with_file_name(format!(".{}.tmp", name.to_string_lossy())))
}
