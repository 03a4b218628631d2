//! Scene script: the ordered narration units extracted from a chapter.
//!
//! The script is persisted as a single JSON object mapping scene id strings
//! (`"1"`, `"2"`, ...) to scene records:
//!
//! ```json
//! {
//!   "1": { "content": "narration text", "character": ["Alice"] },
//!   "2": { "content": "narration text", "character": [] }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::error::{ModelError, ModelResult};

/// Identifier of a scene (1-based).
///
/// Serialized as a JSON map key string; ordering is numeric, so `2 < 10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneId(u32);

impl SceneId {
    /// Create a scene id. Returns `None` for zero.
    pub fn new(n: u32) -> Option<Self> {
        (n > 0).then_some(Self(n))
    }

    /// Numeric value of the id.
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SceneId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .ok()
            .and_then(SceneId::new)
            .ok_or_else(|| ModelError::InvalidSceneId(s.to_string()))
    }
}

/// One narrated scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    /// Narration text
    pub content: String,
    /// Characters appearing in the scene (may be empty)
    #[serde(default)]
    pub character: Vec<String>,
}

impl Scene {
    pub fn new(content: impl Into<String>, characters: Vec<String>) -> Self {
        Self {
            content: content.into(),
            character: characters,
        }
    }
}

/// Ordered mapping of scene id to scene.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneScript {
    scenes: BTreeMap<SceneId, Scene>,
}

impl SceneScript {
    /// Parse and validate a freshly generated script.
    ///
    /// The document must be a non-empty object whose keys are exactly
    /// `1..=N`.
    pub fn parse(json: &str) -> ModelResult<Self> {
        let script: SceneScript = serde_json::from_str(json)?;
        script.validate()?;
        Ok(script)
    }

    /// Deserialize a previously persisted script without re-validating it.
    pub fn from_persisted(json: &str) -> ModelResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Check that ids are dense `1..=N` and the script is non-empty.
    pub fn validate(&self) -> ModelResult<()> {
        if self.scenes.is_empty() {
            return Err(ModelError::EmptyScript);
        }
        for (expected, id) in (1u32..).zip(self.scenes.keys()) {
            if id.get() != expected {
                return Err(ModelError::NonContiguousIds {
                    expected,
                    found: id.get(),
                });
            }
        }
        Ok(())
    }

    /// Pretty-printed JSON with keys in numeric order.
    pub fn to_json_pretty(&self) -> ModelResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn get(&self, id: SceneId) -> Option<&Scene> {
        self.scenes.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SceneId, &Scene)> {
        self.scenes.iter().map(|(id, scene)| (*id, scene))
    }

    pub fn insert(&mut self, id: SceneId, scene: Scene) {
        self.scenes.insert(id, scene);
    }

    /// Every distinct character name referenced anywhere in the script.
    ///
    /// Always scans the whole script, regardless of any scene limit.
    pub fn character_names(&self) -> BTreeSet<String> {
        self.scenes
            .values()
            .flat_map(|scene| scene.character.iter())
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Number of scenes to process given an optional limit.
    pub fn scene_count(&self, limit: Option<usize>) -> usize {
        match limit {
            Some(limit) => self.len().min(limit),
            None => self.len(),
        }
    }

    /// Ids `1..=scene_count(limit)` that are present in the script, in order.
    pub fn processed_ids(&self, limit: Option<usize>) -> Vec<SceneId> {
        let count = self.scene_count(limit) as u32;
        (1..=count)
            .filter_map(SceneId::new)
            .filter(|id| self.scenes.contains_key(id))
            .collect()
    }
}

impl FromIterator<(SceneId, Scene)> for SceneScript {
    fn from_iter<T: IntoIterator<Item = (SceneId, Scene)>>(iter: T) -> Self {
        Self {
            scenes: iter.into_iter().collect(),
        }
    }
}
