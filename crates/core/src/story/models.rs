//! Validated scenes and choices.

use serde::{Deserialize, Serialize};

use crate::{combat::FIGHT_RESULT_PREFIX, models::InventoryItem};

/// How reaching a scene affects the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Ending {
    /// A successful ending: persisted, then the run resets.
    Win,
    /// Any other scene.
    #[default]
    Neutral,
}

impl Ending {
    /// Classify a raw `ending` value; anything but `WIN` is neutral.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some(value) if value.trim().eq_ignore_ascii_case("win") => Ending::Win,
            _ => Ending::Neutral,
        }
    }
}

/// Side effects declared on a scene and applied on entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SceneEffect {
    /// Wear down a held key item, e.g. using up the antidote.
    DecrementKeyItem {
        /// Key item name, matched case-insensitively.
        name: String,
        /// Durability to remove.
        #[serde(default = "default_amount")]
        amount: i32,
        /// Drop the item once it reaches zero.
        #[serde(rename = "removeOnZero", default = "default_remove_on_zero")]
        remove_on_zero: bool,
    },
}

fn default_amount() -> i32 {
    1
}

fn default_remove_on_zero() -> bool {
    true
}

impl SceneEffect {
    /// The effect the legacy `useAntidote` flag stands for.
    pub fn use_antidote() -> Self {
        SceneEffect::DecrementKeyItem {
            name: "Antidote".to_string(),
            amount: 1,
            remove_on_zero: true,
        }
    }
}

/// A labelled edge to another scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    /// Text shown to the player.
    pub label: String,
    /// Illustration, presentation only.
    pub image_path: Option<String>,
    /// Target scene; `None` ends the story.
    pub next_id: Option<String>,
    /// Health change applied when the choice is taken.
    pub health_effect: i32,
    /// Scene this choice belongs to.
    pub scene_id: String,
}

/// One node of the story graph. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scene {
    /// Unique id within the story.
    pub id: String,
    /// Narrative text.
    pub prompt: String,
    /// Applied once per visit; `-1` zeroes health.
    pub health_change: i32,
    /// Outgoing choices in display order.
    pub choices: Vec<Choice>,
    /// Item granted once per run.
    pub add_item: Option<InventoryItem>,
    /// Combat difficulty, when the scene holds a fight.
    pub threat_level: Option<i32>,
    /// Selects the numbered result scenes for this fight.
    pub fight_number: u32,
    /// Entering this scene triggers the infection branch.
    pub bitten: bool,
    /// Key item definition installed on entry.
    pub new_key_item: Option<String>,
    /// Ending classification.
    pub ending: Ending,
    /// Entry effects, applied in order.
    pub effects: Vec<SceneEffect>,
}

impl Scene {
    /// Whether this scene is a successful ending.
    pub fn is_win(&self) -> bool {
        self.ending == Ending::Win
    }

    /// Combat result scenes have their health already charged by the fight.
    pub fn is_fight_result(&self) -> bool {
        self.id.starts_with(FIGHT_RESULT_PREFIX)
    }
}
