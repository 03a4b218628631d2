//! Character portraits.
//!
//! One portrait per character name, written once to
//! `<character_dir>/<name>.png` and never regenerated while the file exists.
//! Portraits are attached to frame requests as conditioning references.

use std::collections::BTreeSet;

use nreel_ai_client::{GenerationClient, ReferenceImage};
use nreel_models::ImageSize;
use nreel_storage::AssetStore;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, StageResult};
use crate::logging::RunLogger;
use crate::writer::SceneWriter;

/// What the portrait stage did with each character.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortraitSummary {
    pub generated: Vec<String>,
    pub existing: Vec<String>,
    pub failed: Vec<String>,
}

/// Generate a portrait for every character that does not have one yet.
///
/// A failure for one character is logged and skipped; frames for scenes
/// with that character are then generated without its reference.
pub async fn generate_missing_portraits(
    writer: &SceneWriter,
    generator: &GenerationClient,
    store: &AssetStore,
    characters: &BTreeSet<String>,
    chapter: &str,
    logger: &RunLogger,
) -> PortraitSummary {
    let mut summary = PortraitSummary::default();
    logger.log_start(&format!(
        "{} unique characters: {}",
        characters.len(),
        characters.iter().cloned().collect::<Vec<_>>().join(", ")
    ));

    for name in characters {
        let _guard = store.locks().lock_portrait(name).await;
        let path = store.layout().portrait_path(name);
        if store.exists(&path).await {
            info!(character = %name, "Portrait already exists, skipping");
            summary.existing.push(name.clone());
            continue;
        }

        match generate_portrait(writer, generator, store, name, chapter).await {
            Ok(()) => {
                info!(character = %name, path = %path.display(), "Portrait generated");
                summary.generated.push(name.clone());
            }
            Err(e) => {
                logger.log_warning(&format!("Skipping portrait: {}", e));
                summary.failed.push(name.clone());
            }
        }
    }

    logger.log_completion(&format!(
        "{} generated, {} existing, {} failed",
        summary.generated.len(),
        summary.existing.len(),
        summary.failed.len()
    ));
    summary
}

async fn generate_portrait(
    writer: &SceneWriter,
    generator: &GenerationClient,
    store: &AssetStore,
    name: &str,
    chapter: &str,
) -> StageResult<()> {
    let features = writer
        .appearance(name, chapter)
        .await
        .map_err(|e| PipelineError::portrait(name, e))?;
    debug!(character = %name, features = %features, "Extracted appearance");

    let prompt = writer
        .portrait_prompt(name, &features)
        .await
        .map_err(|e| PipelineError::portrait(name, e))?;

    let path = store.layout().portrait_path(name);
    generator
        .generate_image(&prompt, ImageSize::Portrait, &[], Some(&path))
        .await
        .map_err(|e| PipelineError::portrait(name, e))?;
    Ok(())
}

/// Portraits on disk for `characters`, in the order given, without repeats.
///
/// Characters without a readable portrait are left out.
pub async fn load_references(store: &AssetStore, characters: &[String]) -> Vec<ReferenceImage> {
    let mut seen = BTreeSet::new();
    let mut references = Vec::new();

    for name in characters.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
        if !seen.insert(name) {
            continue;
        }
        let path = store.layout().portrait_path(name);
        if !store.exists(&path).await {
            debug!(character = %name, "No portrait to reference");
            continue;
        }
        match store.read_base64(&path).await {
            Ok(data) => references.push(ReferenceImage::png(name, &data)),
            Err(e) => warn!(character = %name, "Could not read portrait: {}", e),
        }
    }
    references
}
