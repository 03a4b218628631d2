//! Local artifact storage for the NovelReel pipeline.
//!
//! This crate provides:
//! - The deterministic directory layout used as resume checkpoints
//! - Atomic (staged then renamed) artifact writes
//! - Scene script persistence
//! - Per-artifact async locks for concurrent scene processing

pub mod error;
pub mod layout;
pub mod locks;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use layout::{AssetLayout, SCRIPT_FILE_NAME};
pub use locks::AssetLocks;
pub use store::{write_atomic, AssetStore};
