//! Shared domain models.

use std::{fmt, fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Item categories, each with its own carrying capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemCategory {
    /// Used in combat; loses durability per fight.
    Weapon,
    /// Single-use health restoration.
    Consumable,
    /// Narrative-critical item such as an antidote.
    KeyItem,
}

impl ItemCategory {
    /// All categories in display order.
    pub const ALL: [ItemCategory; 3] = [Self::Weapon, Self::Consumable, Self::KeyItem];

    /// Maximum number of items of this category a player may hold.
    pub fn capacity(self) -> usize {
        match self {
            ItemCategory::Weapon => 2,
            ItemCategory::Consumable => 3,
            ItemCategory::KeyItem => 1,
        }
    }

    /// Heading used when listing the inventory.
    pub fn label(self) -> &'static str {
        match self {
            ItemCategory::Weapon => "Weapons",
            ItemCategory::Consumable => "Consumables",
            ItemCategory::KeyItem => "Key item",
        }
    }
}

impl fmt::Display for ItemCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn default_durability() -> i32 {
    1
}

/// Category-specific item attributes, tagged by the `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemKind {
    /// A weapon with an attack power and remaining uses.
    Weapon {
        /// Highest threat level this weapon can beat.
        #[serde(default)]
        power: i32,
        /// Remaining durability; the weapon breaks at zero.
        #[serde(default = "default_durability")]
        durability: i32,
    },
    /// A consumable that restores health when used.
    Consumable {
        /// Health restored on consumption.
        #[serde(rename = "healthRestore", default)]
        health_restore: i32,
    },
    /// A single-slot story item.
    KeyItem {
        /// Remaining uses, decremented by scene effects.
        #[serde(default = "default_durability")]
        durability: i32,
    },
}

impl ItemKind {
    /// Category this kind belongs to.
    pub fn category(&self) -> ItemCategory {
        match self {
            ItemKind::Weapon { .. } => ItemCategory::Weapon,
            ItemKind::Consumable { .. } => ItemCategory::Consumable,
            ItemKind::KeyItem { .. } => ItemCategory::KeyItem,
        }
    }
}

/// An item as described by story and template files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    /// Display name, also used for lookups.
    pub name: String,
    /// Category and its attributes.
    #[serde(flatten)]
    pub kind: ItemKind,
}

impl InventoryItem {
    /// Build a weapon.
    pub fn weapon(name: impl Into<String>, power: i32, durability: i32) -> Self {
        Self {
            name: name.into(),
            kind: ItemKind::Weapon { power, durability },
        }
    }

    /// Build a consumable.
    pub fn consumable(name: impl Into<String>, health_restore: i32) -> Self {
        Self {
            name: name.into(),
            kind: ItemKind::Consumable { health_restore },
        }
    }

    /// Build a key item.
    pub fn key_item(name: impl Into<String>, durability: i32) -> Self {
        Self {
            name: name.into(),
            kind: ItemKind::KeyItem { durability },
        }
    }

    /// Load a single item definition from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read item {}", path.display()))?;
        let item = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse item {}", path.display()))?;
        Ok(item)
    }

    /// Category of this item.
    pub fn category(&self) -> ItemCategory {
        self.kind.category()
    }

    /// Attack power; zero for anything but weapons.
    pub fn power(&self) -> i32 {
        match self.kind {
            ItemKind::Weapon { power, .. } => power,
            _ => 0,
        }
    }

    /// Remaining durability; consumables report zero.
    pub fn durability(&self) -> i32 {
        match self.kind {
            ItemKind::Weapon { durability, .. } | ItemKind::KeyItem { durability } => durability,
            ItemKind::Consumable { .. } => 0,
        }
    }

    /// Health restored on use; zero for anything but consumables.
    pub fn health_restore(&self) -> i32 {
        match self.kind {
            ItemKind::Consumable { health_restore } => health_restore,
            _ => 0,
        }
    }

    /// Reduce durability, never going below zero. Returns the remaining value.
    ///
    /// Consumables have no durability and are left untouched.
    pub fn wear(&mut self, amount: i32) -> i32 {
        match &mut self.kind {
            ItemKind::Weapon { durability, .. } | ItemKind::KeyItem { durability } => {
                *durability = (*durability - amount).max(0);
                *durability
            }
            ItemKind::Consumable { .. } => 0,
        }
    }

    /// Case-insensitive name comparison.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name.trim())
    }
}

/// Player health, always clamped to `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub struct Health(i32);

impl Health {
    /// Upper bound.
    pub const MAX: i32 = 100;
    /// A fresh player.
    pub const FULL: Health = Health(Self::MAX);
    /// Scene delta value that zeroes health instead of subtracting one.
    pub const ZERO_SENTINEL: i32 = -1;

    /// Create a health value, clamping into range.
    pub fn new(value: i32) -> Self {
        Self(value.clamp(0, Self::MAX))
    }

    /// Current value.
    pub fn value(self) -> i32 {
        self.0
    }

    /// Add a signed delta, clamping the result.
    pub fn adjust(&mut self, delta: i32) {
        *self = Self::new(self.0.saturating_add(delta));
    }

    /// Apply a scene's `healthChange`, honouring the `-1` sentinel.
    pub fn apply_scene_delta(&mut self, delta: i32) {
        if delta == Self::ZERO_SENTINEL {
            self.0 = 0;
        } else {
            self.adjust(delta);
        }
    }

    /// Whether the player has died.
    pub fn is_depleted(self) -> bool {
        self.0 == 0
    }
}

impl Default for Health {
    fn default() -> Self {
        Self::FULL
    }
}

impl From<i32> for Health {
    fn from(value: i32) -> Self {
        Self::new(value)
    }
}

impl From<Health> for i32 {
    fn from(value: Health) -> Self {
        value.0
    }
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0, Self::MAX)
    }
}
