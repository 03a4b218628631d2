//! Per-artifact async locks.
//!
//! When scenes run concurrently, two tasks may race on the same artifact
//! (a shared character portrait, or a scene processed twice). Holding the
//! artifact's lock across "check exists, generate, write" makes the
//! existence check and the write a single step.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use nreel_models::SceneId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of named async locks, created on first use.
#[derive(Debug, Default)]
pub struct AssetLocks {
    inner: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl AssetLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for an arbitrary artifact key.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let entry = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            map.entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        entry.lock_owned().await
    }

    /// Lock covering every artifact of one scene.
    pub async fn lock_scene(&self, id: SceneId) -> OwnedMutexGuard<()> {
        self.lock(&format!("scene:{}", id)).await
    }

    /// Lock covering one character portrait.
    pub async fn lock_portrait(&self, name: &str) -> OwnedMutexGuard<()> {
        self.lock(&format!("portrait:{}", name)).await
    }

    /// Number of keys seen so far.
    pub fn len(&self) -> usize {
        self.inner.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = Arc::new(AssetLocks::new());
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let locks = locks.clone();
            let active = active.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.lock_portrait("Alice").await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(locks.len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let locks = AssetLocks::new();
        let _a = locks.lock_scene(SceneId::new(1).unwrap()).await;
        let b = tokio::time::timeout(
            Duration::from_secs(1),
            locks.lock_scene(SceneId::new(2).unwrap()),
        )
        .await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }
}
