//! Story file parsing.
//!
//! A story file is a JSON array of scene records. Each record is parsed on
//! its own so one broken scene never takes the rest of the story down.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::models::{Choice, Ending, Scene, SceneEffect};
use crate::{error::ContentLoadError, models::InventoryItem};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawScene {
    id: String,
    prompt: String,
    #[serde(default)]
    health_change: i32,
    #[serde(default)]
    choices: Vec<RawChoice>,
    #[serde(default)]
    add_item: Option<InventoryItem>,
    #[serde(default)]
    threat_level: Option<i32>,
    #[serde(default)]
    fight_number: Option<u32>,
    #[serde(default)]
    bitten: bool,
    #[serde(default)]
    new_key_item: Option<String>,
    #[serde(default)]
    ending: Option<String>,
    #[serde(default)]
    effects: Vec<SceneEffect>,
    #[serde(default)]
    use_antidote: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawChoice {
    label: String,
    #[serde(default)]
    image_path: Option<String>,
    #[serde(default)]
    next_id: Option<String>,
    // Older stories spell the target `id`.
    #[serde(default, rename = "id")]
    legacy_id: Option<String>,
    #[serde(default)]
    health_effect: i32,
}

impl RawScene {
    fn into_scene(self) -> Result<Scene, String> {
        let id = self.id.trim().to_string();
        if id.is_empty() {
            return Err("scene id is empty".to_string());
        }

        let mut effects = self.effects;
        for effect in &effects {
            let SceneEffect::DecrementKeyItem { name, amount, .. } = effect;
            if name.trim().is_empty() {
                return Err("decrementKeyItem effect has no item name".to_string());
            }
            if *amount <= 0 {
                return Err(format!("decrementKeyItem amount must be positive, got {amount}"));
            }
        }
        if self.use_antidote && !effects.contains(&SceneEffect::use_antidote()) {
            effects.push(SceneEffect::use_antidote());
        }

        let choices = self
            .choices
            .into_iter()
            .map(|choice| Choice {
                label: choice.label,
                image_path: choice.image_path.filter(|path| !path.is_empty()),
                next_id: choice
                    .next_id
                    .or(choice.legacy_id)
                    .map(|target| target.trim().to_string())
                    .filter(|target| !target.is_empty()),
                health_effect: choice.health_effect,
                scene_id: id.clone(),
            })
            .collect();

        Ok(Scene {
            id,
            prompt: self.prompt,
            health_change: self.health_change,
            choices,
            add_item: self.add_item,
            threat_level: self.threat_level.filter(|threat| *threat >= 0),
            fight_number: self.fight_number.unwrap_or(1),
            bitten: self.bitten,
            new_key_item: self
                .new_key_item
                .map(|reference| reference.trim().to_string())
                .filter(|reference| !reference.is_empty()),
            ending: Ending::parse(self.ending.as_deref()),
            effects,
        })
    }
}

/// Id-indexed collection of scenes from one story file.
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    scenes: HashMap<String, Scene>,
    order: Vec<String>,
    source: Option<PathBuf>,
    load_errors: Vec<ContentLoadError>,
}

impl SceneGraph {
    /// Load a story file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read story {}", path.display()))?;
        let mut graph = Self::from_json_str(&content)
            .with_context(|| format!("failed to parse story {}", path.display()))?;
        graph.source = Some(path.to_path_buf());
        debug!("Loaded {} scenes from {}", graph.len(), path.display());
        Ok(graph)
    }

    /// Parse a story from JSON text.
    ///
    /// Fails only when the document is not an array; malformed records are
    /// skipped and listed in [`SceneGraph::load_errors`].
    pub fn from_json_str(content: &str) -> Result<Self> {
        let records: Vec<Value> =
            serde_json::from_str(content).context("story must be a JSON array of scenes")?;
        Ok(Self::from_records(records))
    }

    /// Build a graph from already-parsed records.
    pub fn from_records(records: Vec<Value>) -> Self {
        let mut graph = Self::default();
        for (index, record) in records.into_iter().enumerate() {
            let scene_id = record
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string);
            let parsed = serde_json::from_value::<RawScene>(record)
                .map_err(|err| err.to_string())
                .and_then(RawScene::into_scene);

            match parsed {
                Ok(scene) if graph.scenes.contains_key(&scene.id) => {
                    graph.skip(ContentLoadError {
                        index,
                        scene_id: Some(scene.id),
                        reason: "duplicate scene id".to_string(),
                    });
                }
                Ok(scene) => {
                    graph.order.push(scene.id.clone());
                    graph.scenes.insert(scene.id.clone(), scene);
                }
                Err(reason) => graph.skip(ContentLoadError {
                    index,
                    scene_id,
                    reason,
                }),
            }
        }
        graph
    }

    fn skip(&mut self, error: ContentLoadError) {
        warn!("Skipping {error}");
        self.load_errors.push(error);
    }

    /// Look up a scene. Absence is an ordinary outcome.
    pub fn get(&self, id: &str) -> Option<&Scene> {
        self.scenes.get(id)
    }

    /// Whether the story has a scene with this id.
    pub fn contains(&self, id: &str) -> bool {
        self.scenes.contains_key(id)
    }

    /// Number of loaded scenes.
    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    /// Whether no scene was loaded.
    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Scenes in file order.
    pub fn scenes(&self) -> impl Iterator<Item = &Scene> {
        self.order.iter().filter_map(|id| self.scenes.get(id))
    }

    /// Ids of all `WIN` scenes, in file order.
    pub fn win_scene_ids(&self) -> Vec<String> {
        self.scenes()
            .filter(|scene| scene.is_win())
            .map(|scene| scene.id.clone())
            .collect()
    }

    /// Records skipped while loading.
    pub fn load_errors(&self) -> &[ContentLoadError] {
        &self.load_errors
    }

    /// File the story was loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Choices whose target scene does not exist, as `(scene id, target)` pairs.
    pub fn dangling_references(&self) -> Vec<(String, String)> {
        self.scenes()
            .flat_map(|scene| scene.choices.iter())
            .filter_map(|choice| {
                let target = choice.next_id.as_ref()?;
                (!self.contains(target)).then(|| (choice.scene_id.clone(), target.clone()))
            })
            .collect()
    }
}
