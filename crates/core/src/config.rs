//! Application configuration.
//!
//! Values are layered: built-in defaults, then an optional TOML file in the
//! user's config directory, then `SURVIVE_*` environment variables.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::save::{SaveManager, DEFAULT_SLOT_COUNT};

/// Directory under the user's config directory holding `config.toml`.
pub const CONFIG_DIR: &str = "survive";

const DEFAULT_CONFIG: &str = r#"# Survival story configuration.
# Relative paths are resolved against the working directory.

# Directory containing story JSON files and an optional titles.json.
story_dir = "data/stories"

# Directory containing inventory templates (default_inventory.json, ...).
inventory_dir = "data/inventory"

# Directory containing key item definitions referenced by newKeyItem.
item_dir = "data/items"

# Number of save slots.
slot_count = 3

# Scene where every run begins after the inventory is chosen.
start_scene_id = "start"

# Scene whose choices select a starting inventory template.
inventory_scene_id = "inventory_choice"

# save_dir defaults to the saves directory next to this file.
"#;

/// Runtime settings for the engine and frontend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory scanned for story files.
    pub story_dir: PathBuf,
    /// Directory holding inventory templates.
    pub inventory_dir: PathBuf,
    /// Directory holding key item definitions.
    pub item_dir: PathBuf,
    /// Directory holding save slot files.
    pub save_dir: PathBuf,
    /// Number of save slots.
    pub slot_count: u8,
    /// Scene where a run begins.
    pub start_scene_id: String,
    /// Scene that picks the starting inventory.
    pub inventory_scene_id: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            story_dir: PathBuf::from("data/stories"),
            inventory_dir: PathBuf::from("data/inventory"),
            item_dir: PathBuf::from("data/items"),
            save_dir: SaveManager::default_root(),
            slot_count: DEFAULT_SLOT_COUNT,
            start_scene_id: "start".to_string(),
            inventory_scene_id: "inventory_choice".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file location and environment.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load configuration from a specific file (which may be absent) and environment.
    pub fn load_from(path: &Path) -> Result<Self> {
        let defaults = Self::default();
        let settings = Config::builder()
            .set_default("story_dir", path_value(&defaults.story_dir))?
            .set_default("inventory_dir", path_value(&defaults.inventory_dir))?
            .set_default("item_dir", path_value(&defaults.item_dir))?
            .set_default("save_dir", path_value(&defaults.save_dir))?
            .set_default("slot_count", i64::from(defaults.slot_count))?
            .set_default("start_scene_id", defaults.start_scene_id)?
            .set_default("inventory_scene_id", defaults.inventory_scene_id)?
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix("SURVIVE"))
            .build()
            .with_context(|| format!("failed to read config {}", path.display()))?;

        let config: AppConfig = settings
            .try_deserialize()
            .context("invalid configuration values")?;
        Ok(config)
    }
}

fn path_value(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Location of the user's config file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR)
        .join("config.toml")
}

/// Write the default config file if none exists. Returns its path.
pub fn ensure_default_config() -> Result<PathBuf> {
    let path = config_path();
    write_default_config(&path)?;
    Ok(path)
}

fn write_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!("Wrote default config to {}", path.display());
    Ok(())
}
