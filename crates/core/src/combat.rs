//! Combat resolution.
//!
//! [`resolve`] is pure: it inspects the weapons and reports what should
//! happen. The caller applies the wear and health change, then strips
//! broken weapons.

use crate::models::InventoryItem;

/// Power of the implicit unarmed attack.
pub const FIST_POWER: i32 = 2;

/// Health lost when a fight is won, armed or not.
pub const WIN_HEALTH_PENALTY: i32 = 0;

/// Prefix shared by every combat result scene id.
pub const FIGHT_RESULT_PREFIX: &str = "fight_result";

/// Fight number used when a story has no numbered result scene.
pub const GENERIC_FIGHT_NUMBER: u32 = 1;

/// Whether the player came out on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FightResult {
    /// Threat defeated.
    Win,
    /// Player overpowered.
    Lose,
}

impl FightResult {
    fn slug(self) -> &'static str {
        match self {
            FightResult::Win => "win",
            FightResult::Lose => "lose",
        }
    }
}

/// What the player fought with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attacker {
    /// The weapon at `index` in the weapon list.
    Weapon {
        /// Position in the weapon list passed to [`resolve`].
        index: usize,
        /// Weapon name, for logging.
        name: String,
    },
    /// No weapon qualified.
    Fists,
}

/// Outcome of a single fight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombatOutcome {
    /// Win or lose.
    pub result: FightResult,
    /// Weapon used, if any.
    pub attacker: Attacker,
    /// Durability to take off the weapon used.
    pub durability_loss: i32,
    /// Signed change to apply to player health.
    pub health_delta: i32,
    /// Result scene for this fight number.
    pub next_scene_id: String,
}

impl CombatOutcome {
    /// Result scene used when the numbered one does not exist.
    pub fn generic_scene_id(&self) -> String {
        result_scene_id(self.result, GENERIC_FIGHT_NUMBER)
    }
}

/// Durability a weapon loses for beating the given threat.
pub fn durability_cost(threat: i32) -> i32 {
    if threat >= 5 {
        2
    } else {
        1
    }
}

/// Health lost when the unarmed attack fails.
pub fn lose_health_penalty(threat: i32) -> i32 {
    threat.saturating_mul(2).saturating_add(25)
}

/// Scene id for a fight result, e.g. `fight_result_lose_3`.
pub fn result_scene_id(result: FightResult, fight_number: u32) -> String {
    format!("{FIGHT_RESULT_PREFIX}_{}_{fight_number}", result.slug())
}

/// Resolve a fight against `threat` with the given weapons.
///
/// The weakest weapon that can still beat the threat is spent; ties go to
/// the earliest weapon in the list. Without one the player fights unarmed.
pub fn resolve(threat: i32, weapons: &[InventoryItem], fight_number: u32) -> CombatOutcome {
    let chosen = weapons
        .iter()
        .enumerate()
        .filter(|(_, weapon)| weapon.power() >= threat && weapon.durability() > 0)
        .min_by_key(|(_, weapon)| weapon.power());

    if let Some((index, weapon)) = chosen {
        return CombatOutcome {
            result: FightResult::Win,
            attacker: Attacker::Weapon {
                index,
                name: weapon.name.clone(),
            },
            durability_loss: durability_cost(threat),
            health_delta: -WIN_HEALTH_PENALTY,
            next_scene_id: result_scene_id(FightResult::Win, fight_number),
        };
    }

    let (result, penalty) = if FIST_POWER >= threat {
        (FightResult::Win, WIN_HEALTH_PENALTY)
    } else {
        (FightResult::Lose, lose_health_penalty(threat))
    };
    CombatOutcome {
        result,
        attacker: Attacker::Fists,
        durability_loss: 0,
        health_delta: penalty.saturating_neg(),
        next_scene_id: result_scene_id(result, fight_number),
    }
}
