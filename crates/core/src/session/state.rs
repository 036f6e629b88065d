//! Player state, scene-entry markers and the session mode.

use std::{collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};

use crate::{inventory::Inventory, models::Health};

/// Per-run bookkeeping that keeps scene entry idempotent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMarkers {
    /// Scene whose entry effects and health delta were applied last.
    #[serde(default)]
    last_health_applied_scene_id: Option<String>,
    /// Scenes whose item grants have been handled this run.
    #[serde(default, alias = "addItemProcessedScenes")]
    processed_scenes: BTreeSet<String>,
}

impl SessionMarkers {
    /// Whether entering `scene_id` starts a new visit.
    pub fn is_fresh_visit(&self, scene_id: &str) -> bool {
        self.last_health_applied_scene_id.as_deref() != Some(scene_id)
    }

    /// Remember that `scene_id`'s health delta has been applied.
    pub fn mark_health_applied(&mut self, scene_id: &str) {
        self.last_health_applied_scene_id = Some(scene_id.to_string());
    }

    /// Scene whose health delta was applied last.
    pub fn last_health_applied(&self) -> Option<&str> {
        self.last_health_applied_scene_id.as_deref()
    }

    /// Whether `scene_id`'s item grant has been handled.
    pub fn is_processed(&self, scene_id: &str) -> bool {
        self.processed_scenes.contains(scene_id)
    }

    /// Remember that `scene_id`'s item grant has been handled.
    pub fn mark_processed(&mut self, scene_id: &str) {
        self.processed_scenes.insert(scene_id.to_string());
    }

    /// Scenes whose item grants have been handled.
    pub fn processed_scenes(&self) -> impl Iterator<Item = &str> {
        self.processed_scenes.iter().map(String::as_str)
    }

    /// Forget everything.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Mutable player data for the current run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerState {
    /// Current health.
    pub health: Health,
    /// Presentation preference, carried for persistence.
    pub dark_mode: bool,
    /// Held items.
    pub inventory: Inventory,
    /// Set once the antidote has been used up.
    pub antidote_used: bool,
}

impl PlayerState {
    /// A fresh player holding `inventory`.
    pub fn new(inventory: Inventory) -> Self {
        Self {
            inventory,
            ..Self::default()
        }
    }

    /// Use a consumable by name, restoring health.
    ///
    /// Returns `false` when no consumable of that name is held.
    pub fn consume(&mut self, name: &str) -> bool {
        match self.inventory.take_consumable(name) {
            Some(item) => {
                self.health.adjust(item.health_restore());
                true
            }
            None => false,
        }
    }

    /// Start a new run with `inventory`, keeping presentation preferences.
    pub fn reset_run(&mut self, inventory: Inventory) {
        *self = Self {
            dark_mode: self.dark_mode,
            ..Self::new(inventory)
        };
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndingKind {
    /// Reached a `WIN` scene.
    Won {
        /// The winning scene.
        scene_id: String,
    },
    /// Health reached zero.
    Lost,
    /// The story ran out of scenes.
    Finished,
}

/// Top-level mode of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Title screen.
    Title,
    /// Instructions screen.
    Instructions,
    /// Choosing a story.
    StorySelect,
    /// Showing the inventory setup scene.
    InventorySetup,
    /// Playing a scene.
    InScene,
    /// A run has ended and waits for acknowledgment.
    Ending(EndingKind),
    /// Browsing a slot's winning endings.
    PhotoAlbum {
        /// Slot being browsed.
        slot: u8,
    },
}

impl Mode {
    /// Whether a scene is being shown and accepts choices.
    pub fn is_playing(&self) -> bool {
        matches!(self, Mode::InScene | Mode::InventorySetup)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Title => f.write_str("title"),
            Mode::Instructions => f.write_str("instructions"),
            Mode::StorySelect => f.write_str("story select"),
            Mode::InventorySetup => f.write_str("inventory setup"),
            Mode::InScene => f.write_str("scene"),
            Mode::Ending(EndingKind::Won { .. }) => f.write_str("winning ending"),
            Mode::Ending(EndingKind::Lost) => f.write_str("game over"),
            Mode::Ending(EndingKind::Finished) => f.write_str("ending"),
            Mode::PhotoAlbum { slot } => write!(f, "photo album (slot {slot})"),
        }
    }
}
