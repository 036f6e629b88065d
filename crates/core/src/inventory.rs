//! Capacity-aware inventory.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    models::{InventoryItem, ItemCategory},
    ports::DecisionPort,
};

/// Why an item was not added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The category is already at capacity.
    CategoryFull,
    /// The player kept the key item they already hold.
    SwapDeclined,
    /// The same key item is already held.
    AlreadyHeld,
}

/// Result of offering an item to the inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// The item was stored.
    Added,
    /// The item replaced the previously held key item.
    Swapped {
        /// Key item that was given up.
        previous: InventoryItem,
    },
    /// Nothing changed.
    Rejected(Rejection),
}

impl AddOutcome {
    /// Whether the item ended up in the inventory.
    pub fn is_accepted(&self) -> bool {
        !matches!(self, AddOutcome::Rejected(_))
    }
}

/// Items held by the player, grouped by category in pickup order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<ItemCategory, Vec<InventoryItem>>",
    into = "BTreeMap<ItemCategory, Vec<InventoryItem>>"
)]
pub struct Inventory {
    slots: BTreeMap<ItemCategory, Vec<InventoryItem>>,
}

impl Inventory {
    /// Create an empty inventory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an inventory from template items, dropping whatever does not fit.
    pub fn from_items(items: impl IntoIterator<Item = InventoryItem>) -> Self {
        let mut inventory = Self::new();
        for item in items {
            let name = item.name.clone();
            if let AddOutcome::Rejected(reason) = inventory.try_add(item) {
                warn!("Template item {name} not added: {reason:?}");
            }
        }
        inventory
    }

    /// Items of one category in pickup order.
    pub fn items(&self, category: ItemCategory) -> &[InventoryItem] {
        self.slots.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Held weapons in pickup order.
    pub fn weapons(&self) -> &[InventoryItem] {
        self.items(ItemCategory::Weapon)
    }

    /// The key item, if one is held.
    pub fn key_item(&self) -> Option<&InventoryItem> {
        self.items(ItemCategory::KeyItem).first()
    }

    /// Whether the held key item has the given name.
    pub fn holds_key_item(&self, name: &str) -> bool {
        self.key_item().map(|item| item.is_named(name)).unwrap_or(false)
    }

    /// Number of items in a category.
    pub fn count(&self, category: ItemCategory) -> usize {
        self.items(category).len()
    }

    /// Whether a category has reached its capacity.
    pub fn is_full(&self, category: ItemCategory) -> bool {
        self.count(category) >= category.capacity()
    }

    /// Total number of items held.
    pub fn len(&self) -> usize {
        self.slots.values().map(Vec::len).sum()
    }

    /// Whether nothing is held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over every held item, grouped by category.
    pub fn iter(&self) -> impl Iterator<Item = &InventoryItem> {
        self.slots.values().flatten()
    }

    /// Add an item without asking anyone.
    ///
    /// A key item is only accepted when the key slot is empty.
    pub fn try_add(&mut self, item: InventoryItem) -> AddOutcome {
        let category = item.category();
        if category == ItemCategory::KeyItem {
            if let Some(held) = self.key_item() {
                return AddOutcome::Rejected(if held.is_named(&item.name) {
                    Rejection::AlreadyHeld
                } else {
                    Rejection::CategoryFull
                });
            }
        }
        if self.is_full(category) {
            return AddOutcome::Rejected(Rejection::CategoryFull);
        }
        self.slots.entry(category).or_default().push(item);
        AddOutcome::Added
    }

    /// Add an item, asking the player before replacing a different key item.
    ///
    /// Weapons and consumables beyond capacity are rejected outright; an
    /// existing weapon is never evicted here.
    pub fn add(&mut self, item: InventoryItem, decisions: &mut dyn DecisionPort) -> AddOutcome {
        if item.category() != ItemCategory::KeyItem {
            return self.try_add(item);
        }

        let held_name = match self.key_item() {
            None => return self.try_add(item),
            Some(held) if held.is_named(&item.name) => {
                return AddOutcome::Rejected(Rejection::AlreadyHeld)
            }
            Some(held) => held.name.clone(),
        };

        let question = format!(
            "You can only carry one key item. Drop {held_name} and take {}?",
            item.name
        );
        if !decisions.confirm(&question) {
            debug!("Kept key item {held_name}; declined {}", item.name);
            return AddOutcome::Rejected(Rejection::SwapDeclined);
        }

        let slot = self.slots.entry(ItemCategory::KeyItem).or_default();
        let previous = std::mem::replace(slot, vec![item]);
        match previous.into_iter().next() {
            Some(previous) => AddOutcome::Swapped { previous },
            None => AddOutcome::Added,
        }
    }

    /// Remove the weapon at `index`.
    pub fn remove_weapon(&mut self, index: usize) -> Option<InventoryItem> {
        let weapons = self.slots.get_mut(&ItemCategory::Weapon)?;
        let removed = (index < weapons.len()).then(|| weapons.remove(index));
        self.prune();
        removed
    }

    /// Remove and return a consumable by name. Other categories are left alone.
    pub fn take_consumable(&mut self, name: &str) -> Option<InventoryItem> {
        let consumables = self.slots.get_mut(&ItemCategory::Consumable)?;
        let position = consumables.iter().position(|item| item.is_named(name))?;
        let item = consumables.remove(position);
        self.prune();
        Some(item)
    }

    /// Wear down the weapon at `index`. Returns the remaining durability.
    pub fn wear_weapon(&mut self, index: usize, amount: i32) -> Option<i32> {
        self.slots
            .get_mut(&ItemCategory::Weapon)
            .and_then(|weapons| weapons.get_mut(index))
            .map(|weapon| weapon.wear(amount))
    }

    /// Drop every weapon whose durability has reached zero.
    pub fn remove_broken_weapons(&mut self) -> Vec<InventoryItem> {
        let Some(weapons) = self.slots.get_mut(&ItemCategory::Weapon) else {
            return Vec::new();
        };
        let (broken, intact): (Vec<_>, Vec<_>) = std::mem::take(weapons)
            .into_iter()
            .partition(|weapon| weapon.durability() <= 0);
        *weapons = intact;
        self.prune();
        broken
    }

    /// Wear down the named key item.
    ///
    /// Returns the remaining durability, or `None` when that key item is not held.
    /// With `remove_on_zero` an exhausted item leaves the inventory.
    pub fn decrement_key_item(&mut self, name: &str, amount: i32, remove_on_zero: bool) -> Option<i32> {
        let slot = self.slots.get_mut(&ItemCategory::KeyItem)?;
        let position = slot.iter().position(|item| item.is_named(name))?;
        let remaining = slot[position].wear(amount);
        if remaining == 0 && remove_on_zero {
            slot.remove(position);
            self.prune();
        }
        Some(remaining)
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    // Empty categories are never stored, so equal contents compare equal.
    fn prune(&mut self) {
        self.slots.retain(|_, items| !items.is_empty());
    }
}

impl From<BTreeMap<ItemCategory, Vec<InventoryItem>>> for Inventory {
    fn from(slots: BTreeMap<ItemCategory, Vec<InventoryItem>>) -> Self {
        // Re-file every item so hand-edited saves cannot break capacity rules.
        Self::from_items(slots.into_values().flatten())
    }
}

impl From<Inventory> for BTreeMap<ItemCategory, Vec<InventoryItem>> {
    fn from(inventory: Inventory) -> Self {
        inventory.slots
    }
}

/// Named starting inventories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryTemplate {
    /// Used when a story starts and after every reset.
    Default,
    /// Mostly consumables.
    HealthHeavy,
    /// Mostly weapons.
    AttackHeavy,
    /// A mix of both.
    Balanced,
}

impl InventoryTemplate {
    /// Match a setup-scene choice label, ignoring case.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "health heavy" => Some(Self::HealthHeavy),
            "attack heavy" => Some(Self::AttackHeavy),
            "balanced" => Some(Self::Balanced),
            "default" => Some(Self::Default),
            _ => None,
        }
    }

    /// Template file name inside the inventory directory.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Default => "default_inventory.json",
            Self::HealthHeavy => "health_inventory.json",
            Self::AttackHeavy => "attack_inventory.json",
            Self::Balanced => "balanced_inventory.json",
        }
    }

    /// Full path of the template inside `dir`.
    pub fn path_in(self, dir: impl AsRef<Path>) -> PathBuf {
        dir.as_ref().join(self.file_name())
    }

    /// Load this template from `dir` and build an inventory from it.
    ///
    /// A missing or broken template yields an empty inventory.
    pub fn build(self, dir: impl AsRef<Path>) -> Inventory {
        let path = self.path_in(dir);
        match load_items(&path) {
            Ok(items) => Inventory::from_items(items),
            Err(err) => {
                warn!("Using empty inventory: {err:#}");
                Inventory::new()
            }
        }
    }
}

/// Read an array of item records.
pub fn load_items(path: impl AsRef<Path>) -> Result<Vec<InventoryItem>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read inventory {}", path.display()))?;
    let items = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse inventory {}", path.display()))?;
    Ok(items)
}
