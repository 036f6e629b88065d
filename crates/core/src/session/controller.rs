//! The session state machine that drives title, story play and endings.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use super::state::{EndingKind, Mode, PlayerState, SessionMarkers};
use crate::{
    catalog::{PhotoAlbum, StoryCatalog, StoryEntry},
    combat::{self, Attacker},
    config::AppConfig,
    error::{SaveError, SceneNotFound, SessionError},
    inventory::{Inventory, InventoryTemplate},
    models::{InventoryItem, ItemCategory},
    ports::DecisionPort,
    save::{SaveManager, SaveSlot},
    story::{Choice, Scene, SceneEffect, SceneGraph},
};

/// Key item that unlocks the infection branch.
const ANTIDOTE: &str = "Antidote";

/// Scene a bite leads to while the antidote is held.
const INFECTION_CHOICE_SCENE: &str = "infection_choice";

/// Scene a bite leads to otherwise.
const GAME_OVER_INFECTION_SCENE: &str = "game_over_infection";

/// Times the weapon discard chooser is reopened before the pickup is abandoned.
const MAX_DISCARD_ROUNDS: usize = 5;

static FIGHT_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*fight\b").expect("invalid fight label regex"));
static ANTIDOTE_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(use|administer)\s+antidote\b").expect("invalid antidote label regex")
});

/// Scene ids and content directories the controller needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Scene every run starts at once the inventory is chosen.
    pub start_scene_id: String,
    /// Scene whose choices pick an inventory template.
    pub inventory_scene_id: String,
    /// Directory of inventory templates.
    pub inventory_dir: PathBuf,
    /// Directory of key item definitions.
    pub item_dir: PathBuf,
}

impl From<&AppConfig> for SessionSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            start_scene_id: config.start_scene_id.clone(),
            inventory_scene_id: config.inventory_scene_id.clone(),
            inventory_dir: config.inventory_dir.clone(),
            item_dir: config.item_dir.clone(),
        }
    }
}

/// The slot a game was started or loaded from.
#[derive(Debug, Clone)]
struct Profile {
    slot: u8,
    player_name: String,
    completed_win_scene_ids: Vec<String>,
}

/// Drives a play session from the title screen through every scene.
///
/// Every event runs to completion before returning. Questions for the player
/// go through the [`DecisionPort`] and block the event until answered.
pub struct SessionController<D> {
    settings: SessionSettings,
    saves: SaveManager,
    catalog: StoryCatalog,
    decisions: D,
    mode: Mode,
    player: PlayerState,
    markers: SessionMarkers,
    graph: Option<SceneGraph>,
    story_path: Option<PathBuf>,
    current_scene: Option<String>,
    profile: Option<Profile>,
}

impl<D: DecisionPort> SessionController<D> {
    /// Build a controller from application configuration.
    pub fn new(config: &AppConfig, decisions: D) -> Self {
        Self::with_parts(
            SessionSettings::from(config),
            SaveManager::new(&config.save_dir, config.slot_count),
            StoryCatalog::new(&config.story_dir),
            decisions,
        )
    }

    /// Build a controller from already constructed collaborators.
    pub fn with_parts(
        settings: SessionSettings,
        saves: SaveManager,
        catalog: StoryCatalog,
        decisions: D,
    ) -> Self {
        Self {
            settings,
            saves,
            catalog,
            decisions,
            mode: Mode::Title,
            player: PlayerState::default(),
            markers: SessionMarkers::default(),
            graph: None,
            story_path: None,
            current_scene: None,
            profile: None,
        }
    }

    /// Current top-level mode.
    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    /// Player state of the current run.
    pub fn player(&self) -> &PlayerState {
        &self.player
    }

    /// Idempotency markers of the current run.
    pub fn markers(&self) -> &SessionMarkers {
        &self.markers
    }

    /// Scene being shown, if any.
    pub fn current_scene(&self) -> Option<&Scene> {
        let id = self.current_scene.as_deref()?;
        self.graph.as_ref()?.get(id)
    }

    /// Slot claimed by the current game.
    pub fn slot(&self) -> Option<u8> {
        self.profile.as_ref().map(|profile| profile.slot)
    }

    /// Name of the current player.
    pub fn player_name(&self) -> Option<&str> {
        self.profile.as_ref().map(|profile| profile.player_name.as_str())
    }

    /// Win scenes the current slot has reached.
    pub fn completed_win_scene_ids(&self) -> &[String] {
        self.profile
            .as_ref()
            .map(|profile| profile.completed_win_scene_ids.as_slice())
            .unwrap_or_default()
    }

    /// Save slot storage.
    pub fn saves(&self) -> &SaveManager {
        &self.saves
    }

    /// Decision port, e.g. to queue scripted answers.
    pub fn decisions_mut(&mut self) -> &mut D {
        &mut self.decisions
    }

    /// Whether `choice` can be taken right now.
    ///
    /// Antidote choices need the antidote in hand, or already used.
    pub fn is_choice_available(&self, choice: &Choice) -> bool {
        if ANTIDOTE_LABEL.is_match(&choice.label) {
            return self.player.antidote_used || self.player.inventory.holds_key_item(ANTIDOTE);
        }
        true
    }

    /// Stories offered on the selection screen.
    pub fn stories(&self) -> Result<Vec<StoryEntry>> {
        self.catalog.stories()
    }

    /// Open the instructions from the title screen.
    pub fn show_instructions(&mut self) -> Result<(), SessionError> {
        self.require(matches!(self.mode, Mode::Title), "instructions")?;
        self.mode = Mode::Instructions;
        Ok(())
    }

    /// Leave the instructions or photo album.
    pub fn back_to_title(&mut self) -> Result<(), SessionError> {
        self.require(
            matches!(self.mode, Mode::Instructions | Mode::PhotoAlbum { .. }),
            "back",
        )?;
        self.mode = Mode::Title;
        Ok(())
    }

    /// Claim `slot` for a new player and move to story selection.
    ///
    /// The slot is overwritten with a baseline record. When that write fails
    /// the session stays on the title screen.
    pub fn start_new_game(&mut self, slot: u8, player_name: &str) -> Result<()> {
        self.require(matches!(self.mode, Mode::Title), "new game")?;
        let player_name = match player_name.trim() {
            "" => "Survivor",
            name => name,
        };

        let mut baseline = SaveSlot::new(player_name);
        baseline.dark_mode = self.player.dark_mode;
        self.saves
            .save(slot, &baseline)
            .with_context(|| format!("failed to start a new game in slot {slot}"))?;
        info!("New game for {player_name} in slot {slot}");

        self.profile = Some(Profile {
            slot,
            player_name: player_name.to_string(),
            completed_win_scene_ids: Vec::new(),
        });
        self.reset_run();
        self.mode = Mode::StorySelect;
        Ok(())
    }

    /// Restore a saved slot. Returns `false` when the slot is empty.
    ///
    /// A slot saved mid-story resumes at its scene; otherwise, or when the
    /// story or scene is gone, the session continues at story selection.
    pub fn load_game(&mut self, slot: u8) -> Result<bool> {
        self.require(matches!(self.mode, Mode::Title), "load game")?;
        let Some(record) = self.saves.load(slot)? else {
            debug!("Slot {slot} is empty");
            return Ok(false);
        };

        self.player = PlayerState {
            health: record.health,
            dark_mode: record.dark_mode,
            inventory: record.inventory,
            antidote_used: record.antidote_used,
        };
        self.markers = record.markers;
        self.profile = Some(Profile {
            slot,
            player_name: record.player_name,
            completed_win_scene_ids: record.completed_win_scene_ids,
        });
        self.story_path = record.story_file_path;
        self.graph = None;
        self.current_scene = None;
        self.mode = Mode::StorySelect;

        if let (Some(path), Some(scene_id)) = (self.story_path.clone(), record.current_scene_id) {
            match SceneGraph::load(&path) {
                Ok(graph) if graph.contains(&scene_id) => {
                    self.mode = self.scene_mode(&scene_id);
                    self.current_scene = Some(scene_id);
                    self.graph = Some(graph);
                }
                Ok(_) => warn!("{}; resuming at story selection", SceneNotFound(scene_id)),
                Err(err) => warn!("Cannot resume saved story: {err:#}"),
            }
        }
        info!("Loaded slot {slot} ({})", self.mode);
        Ok(true)
    }

    /// Open the photo album for `slot` from the title screen.
    pub fn open_photo_album(&mut self, slot: u8) -> Result<PhotoAlbum> {
        self.require(matches!(self.mode, Mode::Title), "photo album")?;
        let completed = self
            .saves
            .load(slot)?
            .map(|record| record.completed_win_scene_ids)
            .unwrap_or_default();
        let album = self.catalog.photo_album(&completed)?;
        self.mode = Mode::PhotoAlbum { slot };
        Ok(album)
    }

    /// Start the story stored at `path`.
    ///
    /// The run begins at the inventory setup scene when the story has one,
    /// otherwise at the start scene with the default inventory.
    pub fn select_story(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.require(matches!(self.mode, Mode::StorySelect), "select story")?;
        let path = path.as_ref();
        let graph = SceneGraph::load(path)?;
        for (scene_id, target) in graph.dangling_references() {
            warn!("Scene {scene_id} points at missing scene {target}");
        }

        self.reset_run();
        self.story_path = Some(path.to_path_buf());
        let first = if graph.contains(&self.settings.inventory_scene_id) {
            self.settings.inventory_scene_id.clone()
        } else {
            self.settings.start_scene_id.clone()
        };
        self.graph = Some(graph);
        info!("Starting story {}", path.display());
        self.enter_scene(&first)
    }

    /// Take the choice at `index` on the current scene.
    ///
    /// Unavailable choices are ignored.
    pub fn choose(&mut self, index: usize) -> Result<()> {
        self.require(self.mode.is_playing(), "choose")?;
        let scene = self.current_scene().cloned().ok_or(SessionError::NoActiveScene)?;
        let choice = scene
            .choices
            .get(index)
            .cloned()
            .ok_or_else(|| SessionError::InvalidChoice {
                index,
                scene_id: scene.id.clone(),
            })?;
        if !self.is_choice_available(&choice) {
            info!("Choice '{}' is not available", choice.label);
            return Ok(());
        }

        if scene.id == self.settings.inventory_scene_id {
            self.apply_template(&choice.label);
            let start = self.settings.start_scene_id.clone();
            return self.enter_scene(&start);
        }

        if let Some(threat) = scene.threat_level {
            if FIGHT_LABEL.is_match(&choice.label) {
                return self.fight(threat, scene.fight_number);
            }
        }

        if choice.health_effect != 0 {
            self.player.health.adjust(choice.health_effect);
            debug!("'{}' changed health to {}", choice.label, self.player.health);
            if self.player.health.is_depleted() {
                info!("Health depleted by '{}'", choice.label);
                self.mode = Mode::Ending(EndingKind::Lost);
                return Ok(());
            }
        }

        match choice.next_id {
            Some(next) => self.enter_scene(&next),
            None => {
                warn!("Choice '{}' on {} leads nowhere", choice.label, scene.id);
                self.finish();
                Ok(())
            }
        }
    }

    /// Use a consumable by name. Returns `false` when none is held.
    pub fn consume(&mut self, item_name: &str) -> Result<bool, SessionError> {
        self.require(self.mode.is_playing(), "use item")?;
        let consumed = self.player.consume(item_name);
        if consumed {
            info!("Used {item_name}; health {}", self.player.health);
        }
        Ok(consumed)
    }

    /// Flip the dark mode preference.
    pub fn toggle_dark_mode(&mut self) -> bool {
        self.player.dark_mode = !self.player.dark_mode;
        self.player.dark_mode
    }

    /// Ask to abandon the run and return to the title screen.
    ///
    /// Returns whether the player agreed. Declining changes nothing.
    pub fn request_reset(&mut self) -> bool {
        if !self
            .decisions
            .confirm("Return to the title screen? Progress in this story will be lost.")
        {
            return false;
        }
        self.reset_run();
        self.profile = None;
        self.mode = Mode::Title;
        info!("Returned to title");
        true
    }

    /// Abandon the current story without saving and pick another.
    pub fn choose_another_story(&mut self) -> Result<(), SessionError> {
        self.require(self.mode.is_playing(), "choose another story")?;
        self.reset_run();
        self.mode = Mode::StorySelect;
        Ok(())
    }

    /// Dismiss an ending. The run resets and story selection opens.
    pub fn acknowledge_ending(&mut self) -> Result<(), SessionError> {
        self.require(matches!(self.mode, Mode::Ending(_)), "acknowledge ending")?;
        self.reset_run();
        self.mode = Mode::StorySelect;
        Ok(())
    }

    fn require(&self, allowed: bool, event: &'static str) -> Result<(), SessionError> {
        if allowed {
            Ok(())
        } else {
            Err(SessionError::WrongMode {
                event,
                mode: self.mode.to_string(),
            })
        }
    }

    fn scene_mode(&self, scene_id: &str) -> Mode {
        if scene_id == self.settings.inventory_scene_id {
            Mode::InventorySetup
        } else {
            Mode::InScene
        }
    }

    fn lookup(&self, id: &str) -> Option<Scene> {
        self.graph.as_ref()?.get(id).cloned()
    }

    fn reset_run(&mut self) {
        self.markers.reset();
        self.player
            .reset_run(InventoryTemplate::Default.build(&self.settings.inventory_dir));
        self.graph = None;
        self.story_path = None;
        self.current_scene = None;
    }

    // A run that runs out of scenes with no health left is still a loss.
    fn finish(&mut self) {
        self.current_scene = None;
        let kind = if self.player.health.is_depleted() {
            EndingKind::Lost
        } else {
            EndingKind::Finished
        };
        self.mode = Mode::Ending(kind);
    }

    fn enter_scene(&mut self, id: &str) -> Result<()> {
        let Some(mut scene) = self.lookup(id) else {
            warn!("{}; ending the story", SceneNotFound(id.to_string()));
            self.finish();
            return Ok(());
        };

        if scene.bitten {
            let target = if self.player.inventory.holds_key_item(ANTIDOTE) {
                INFECTION_CHOICE_SCENE
            } else {
                GAME_OVER_INFECTION_SCENE
            };
            info!("Bitten in {}; continuing at {target}", scene.id);
            match self.lookup(target) {
                Some(substitute) => scene = substitute,
                None => {
                    warn!("{}; ending the story", SceneNotFound(target.to_string()));
                    self.finish();
                    return Ok(());
                }
            }
        }

        if self.markers.is_fresh_visit(&scene.id) {
            for effect in &scene.effects {
                self.apply_effect(effect);
            }
            if scene.is_fight_result() {
                debug!("Health for {} was settled by the fight", scene.id);
            } else if scene.health_change != 0 {
                self.player.health.apply_scene_delta(scene.health_change);
                debug!("Entered {}; health {}", scene.id, self.player.health);
            }
            self.markers.mark_health_applied(&scene.id);
        }

        if !self.markers.is_processed(&scene.id) {
            if let Some(item) = scene.add_item.clone() {
                self.grant_item(item);
            }
            if let Some(reference) = scene.new_key_item.as_deref() {
                self.install_key_item(reference);
            }
            self.markers.mark_processed(&scene.id);
        }

        self.mode = self.scene_mode(&scene.id);
        self.current_scene = Some(scene.id.clone());

        if self.player.health.is_depleted() {
            info!("Health depleted in {}", scene.id);
            self.mode = Mode::Ending(EndingKind::Lost);
            return Ok(());
        }
        if scene.is_win() {
            self.mode = Mode::Ending(EndingKind::Won {
                scene_id: scene.id.clone(),
            });
            self.save_win(&scene.id)
                .with_context(|| format!("failed to record win at {}", scene.id))?;
        }
        Ok(())
    }

    fn apply_effect(&mut self, effect: &SceneEffect) {
        let SceneEffect::DecrementKeyItem {
            name,
            amount,
            remove_on_zero,
        } = effect;
        match self
            .player
            .inventory
            .decrement_key_item(name, *amount, *remove_on_zero)
        {
            Some(remaining) => {
                if name.eq_ignore_ascii_case(ANTIDOTE) {
                    self.player.antidote_used = true;
                }
                info!("{name} durability now {remaining}");
            }
            None => debug!("No {name} held; effect skipped"),
        }
    }

    fn grant_item(&mut self, item: InventoryItem) {
        if item.category() == ItemCategory::Weapon
            && self.player.inventory.is_full(ItemCategory::Weapon)
        {
            self.offer_weapon_swap(item);
            return;
        }
        let name = item.name.clone();
        let outcome = self.player.inventory.add(item, &mut self.decisions);
        if outcome.is_accepted() {
            info!("Picked up {name}");
        } else {
            debug!("Did not pick up {name}: {outcome:?}");
        }
    }

    fn offer_weapon_swap(&mut self, item: InventoryItem) {
        let prompt = format!(
            "Your weapon slots are full. Choose a weapon to drop for {} (power {}).",
            item.name,
            item.power()
        );
        for _ in 0..MAX_DISCARD_ROUNDS {
            let options: Vec<String> = self
                .player
                .inventory
                .weapons()
                .iter()
                .map(|weapon| {
                    format!(
                        "{} (power {}, durability {})",
                        weapon.name,
                        weapon.power(),
                        weapon.durability()
                    )
                })
                .collect();
            let Some(index) = self.decisions.choose_one(&prompt, &options) else {
                info!("Left {} behind", item.name);
                return;
            };
            let Some(held) = self.player.inventory.weapons().get(index) else {
                warn!("Weapon selection {index} is out of range");
                continue;
            };
            let question = format!("Drop {}? This cannot be undone.", held.name);
            if !self.decisions.confirm(&question) {
                continue;
            }

            if let Some(dropped) = self.player.inventory.remove_weapon(index) {
                info!("Dropped {} for {}", dropped.name, item.name);
            }
            let name = item.name.clone();
            let outcome = self.player.inventory.try_add(item);
            debug!("Picked up {name}: {outcome:?}");
            return;
        }
        info!("No weapon dropped; left {} behind", item.name);
    }

    fn install_key_item(&mut self, reference: &str) {
        let mut path = self.settings.item_dir.join(reference);
        if path.extension().is_none() {
            path.set_extension("json");
        }
        let item = match InventoryItem::load(&path) {
            Ok(item) => item,
            Err(err) => {
                warn!("Skipping key item {reference}: {err:#}");
                return;
            }
        };
        if item.category() != ItemCategory::KeyItem {
            warn!("{} is a {}, not a key item", item.name, item.category());
            return;
        }
        let name = item.name.clone();
        let outcome = self.player.inventory.add(item, &mut self.decisions);
        if outcome.is_accepted() {
            info!("Now carrying key item {name}");
        } else {
            debug!("Key item {name} not taken: {outcome:?}");
        }
    }

    fn apply_template(&mut self, label: &str) {
        self.player.inventory = match InventoryTemplate::from_label(label) {
            Some(template) => template.build(&self.settings.inventory_dir),
            None => {
                warn!("No inventory template matches '{label}'");
                Inventory::new()
            }
        };
        info!("Starting with the {label} inventory");
    }

    fn fight(&mut self, threat: i32, fight_number: u32) -> Result<()> {
        let outcome = combat::resolve(threat, self.player.inventory.weapons(), fight_number);
        match &outcome.attacker {
            Attacker::Weapon { index, name } => {
                let remaining = self
                    .player
                    .inventory
                    .wear_weapon(*index, outcome.durability_loss)
                    .unwrap_or_default();
                info!("Fought threat {threat} with {name}; durability {remaining}");
            }
            Attacker::Fists => info!("Fought threat {threat} unarmed"),
        }
        self.player.health.adjust(outcome.health_delta);
        for broken in self.player.inventory.remove_broken_weapons() {
            info!("{} broke", broken.name);
        }
        info!("Fight {:?}; health {}", outcome.result, self.player.health);

        let has_numbered = self
            .graph
            .as_ref()
            .is_some_and(|graph| graph.contains(&outcome.next_scene_id));
        let next = if has_numbered {
            outcome.next_scene_id
        } else {
            outcome.generic_scene_id()
        };
        self.enter_scene(&next)
    }

    fn save_win(&mut self, scene_id: &str) -> Result<(), SaveError> {
        let Some(profile) = self.profile.as_mut() else {
            debug!("No slot claimed; win at {scene_id} not saved");
            return Ok(());
        };
        let slot = profile.slot;
        let mut record = SaveSlot {
            player_name: profile.player_name.clone(),
            story_file_path: self.story_path.clone(),
            current_scene_id: None,
            health: self.player.health,
            dark_mode: self.player.dark_mode,
            markers: self.markers.clone(),
            inventory: self.player.inventory.clone(),
            antidote_used: self.player.antidote_used,
            completed_win_scene_ids: std::mem::take(&mut profile.completed_win_scene_ids),
            last_updated: Utc::now(),
        };
        if !record.record_win(scene_id) {
            debug!("{scene_id} was already in slot {slot}'s album");
        }
        profile.completed_win_scene_ids = record.completed_win_scene_ids.clone();
        self.saves.save(slot, &record)?;
        info!("Saved win at {scene_id} to slot {slot}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::Health, ports::testing::Scripted};
    use std::fs;
    use tempfile::{tempdir, TempDir};

    const STORY: &str = r#"[
        {"id": "inventory_choice", "prompt": "Pick your gear.", "choices": [
            {"label": "Health Heavy"}, {"label": "Attack Heavy"}, {"label": "Balanced"}
        ]},
        {"id": "start", "prompt": "You wake up.", "healthChange": -10, "choices": [
            {"label": "Hallway", "nextId": "hall"},
            {"label": "Stairs", "nextId": "stairs"},
            {"label": "Basement", "nextId": "basement"},
            {"label": "Jump", "nextId": "start", "healthEffect": -100},
            {"label": "Wait", "nextId": "start"},
            {"label": "Alley", "id": "alley"},
            {"label": "Closet", "nextId": "bite"}
        ]},
        {"id": "hall", "prompt": "A zombie!", "threatLevel": 3, "fightNumber": 2,
         "addItem": {"name": "Crowbar", "type": "WEAPON", "power": 4, "durability": 2},
         "choices": [{"label": "Fight", "nextId": "hall"}, {"label": "Run", "nextId": "start"}]},
        {"id": "alley", "prompt": "A big one.", "threatLevel": 5, "fightNumber": 3,
         "choices": [{"label": "Fight it"}]},
        {"id": "fight_result_win_2", "prompt": "You win.", "healthChange": -50,
         "choices": [{"label": "Onward", "nextId": "pharmacy"}]},
        {"id": "fight_result_lose_1", "prompt": "You lose.", "choices": [{"label": "Crawl", "nextId": "start"}]},
        {"id": "pharmacy", "prompt": "Shelves.", "newKeyItem": "antidote",
         "addItem": {"name": "Pills", "type": "CONSUMABLE", "healthRestore": 15},
         "choices": [{"label": "Leave", "nextId": "bite"}]},
        {"id": "bite", "prompt": "Teeth.", "bitten": true, "healthChange": -20},
        {"id": "infection_choice", "prompt": "Use it?", "choices": [
            {"label": "Use antidote", "nextId": "cured"},
            {"label": "Wait it out", "nextId": "game_over_infection"}
        ]},
        {"id": "cured", "prompt": "Better.", "useAntidote": true,
         "choices": [{"label": "Escape", "nextId": "rooftop_win"}]},
        {"id": "game_over_infection", "prompt": "You turn.", "healthChange": -1},
        {"id": "rooftop_win", "prompt": "Helicopter!", "ending": "WIN"},
        {"id": "stairs", "prompt": "Gas.", "healthChange": -1}
    ]"#;

    struct Fixture {
        dir: TempDir,
        story: PathBuf,
    }

    impl Fixture {
        fn new() -> anyhow::Result<Self> {
            let dir = tempdir()?;
            let root = dir.path();
            for sub in ["stories", "inventory", "items", "saves"] {
                fs::create_dir_all(root.join(sub))?;
            }
            let story = root.join("stories").join("hospital.json");
            fs::write(&story, STORY)?;

            let bat = r#"{"name": "Bat", "type": "WEAPON", "power": 3, "durability": 5}"#;
            let axe = r#"{"name": "Axe", "type": "WEAPON", "power": 6, "durability": 1}"#;
            let bandage = r#"{"name": "Bandage", "type": "CONSUMABLE", "healthRestore": 20}"#;
            let templates = [
                ("default_inventory.json", format!("[{bat}, {bandage}]")),
                ("attack_inventory.json", format!("[{bat}, {axe}, {bandage}]")),
                ("health_inventory.json", format!("[{bandage}, {bandage}]")),
                ("balanced_inventory.json", format!("[{bat}, {bandage}]")),
            ];
            for (name, contents) in templates {
                fs::write(root.join("inventory").join(name), contents)?;
            }
            fs::write(
                root.join("items").join("antidote.json"),
                r#"{"name": "Antidote", "type": "KEY_ITEM", "durability": 1}"#,
            )?;
            Ok(Self { dir, story })
        }

        fn root(&self) -> &Path {
            self.dir.path()
        }

        fn controller(&self) -> SessionController<Scripted> {
            let root = self.root();
            SessionController::with_parts(
                SessionSettings {
                    start_scene_id: "start".to_string(),
                    inventory_scene_id: "inventory_choice".to_string(),
                    inventory_dir: root.join("inventory"),
                    item_dir: root.join("items"),
                },
                SaveManager::new(root.join("saves"), 3),
                StoryCatalog::new(root.join("stories")),
                Scripted::new(),
            )
        }

        /// A controller sitting on the start scene with the given template.
        fn started(&self, template: usize) -> anyhow::Result<SessionController<Scripted>> {
            let mut session = self.controller();
            session.start_new_game(1, "Riley")?;
            session.select_story(&self.story)?;
            session.choose(template)?;
            Ok(session)
        }
    }

    fn scene_id<D: DecisionPort>(session: &SessionController<D>) -> Option<&str> {
        session.current_scene().map(|scene| scene.id.as_str())
    }

    fn weapon_names<D: DecisionPort>(session: &SessionController<D>) -> Vec<&str> {
        session
            .player()
            .inventory
            .weapons()
            .iter()
            .map(|weapon| weapon.name.as_str())
            .collect()
    }

    fn choose_label<D: DecisionPort>(
        session: &mut SessionController<D>,
        label: &str,
    ) -> anyhow::Result<()> {
        let index = session
            .current_scene()
            .and_then(|scene| scene.choices.iter().position(|choice| choice.label == label))
            .with_context(|| format!("no choice labelled {label}"))?;
        session.choose(index)
    }

    #[test]
    fn new_game_writes_baseline_and_opens_story_select() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let mut session = fixture.controller();
        session.start_new_game(2, "  Riley ")?;

        assert_eq!(session.mode(), &Mode::StorySelect);
        assert_eq!(session.player_name(), Some("Riley"));
        let saved = session.saves().load(2)?.context("baseline save")?;
        assert_eq!(saved.player_name, "Riley");
        assert_eq!(saved.current_scene_id, None);
        assert!(saved.completed_win_scene_ids.is_empty());

        let stories = session.stories()?;
        assert_eq!(stories.len(), 1);
        assert_eq!(stories[0].title, "hospital");
        Ok(())
    }

    #[test]
    fn story_starts_at_inventory_setup_with_default_items() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let mut session = fixture.controller();
        session.start_new_game(1, "Riley")?;
        session.select_story(&fixture.story)?;

        assert_eq!(session.mode(), &Mode::InventorySetup);
        assert_eq!(scene_id(&session), Some("inventory_choice"));
        assert_eq!(session.player().health, Health::FULL);
        assert_eq!(weapon_names(&session), ["Bat"]);
        Ok(())
    }

    #[test]
    fn template_choice_applies_items_and_enters_start() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let session = fixture.started(1)?;

        assert_eq!(session.mode(), &Mode::InScene);
        assert_eq!(scene_id(&session), Some("start"));
        assert_eq!(session.player().health.value(), 90);
        assert_eq!(weapon_names(&session), ["Bat", "Axe"]);
        Ok(())
    }

    #[test]
    fn revisiting_the_current_scene_applies_nothing_twice() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let mut session = fixture.started(0)?;
        choose_label(&mut session, "Wait")?;
        choose_label(&mut session, "Wait")?;

        assert_eq!(scene_id(&session), Some("start"));
        assert_eq!(session.player().health.value(), 90);
        Ok(())
    }

    #[test]
    fn full_weapon_slots_offer_a_confirmed_swap() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let mut session = fixture.started(1)?;
        session.decisions_mut().push_pick(Some(0));
        session.decisions_mut().push_confirm(false);
        session.decisions_mut().push_pick(Some(0));
        session.decisions_mut().push_confirm(true);

        choose_label(&mut session, "Hallway")?;
        assert_eq!(weapon_names(&session), ["Axe", "Crowbar"]);
        assert_eq!(session.decisions_mut().asked.len(), 4);
        Ok(())
    }

    #[test]
    fn declined_pickup_is_not_offered_again() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let mut session = fixture.started(1)?;
        session.decisions_mut().push_pick(None);

        choose_label(&mut session, "Hallway")?;
        assert_eq!(weapon_names(&session), ["Bat", "Axe"]);
        assert!(session.markers().is_processed("hall"));

        choose_label(&mut session, "Run")?;
        choose_label(&mut session, "Hallway")?;
        assert_eq!(weapon_names(&session), ["Bat", "Axe"]);
        assert_eq!(session.decisions_mut().asked.len(), 1);
        Ok(())
    }

    #[test]
    fn endless_refusals_give_up_after_bounded_rounds() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let mut session = fixture.started(1)?;
        for _ in 0..10 {
            session.decisions_mut().push_pick(Some(1));
            session.decisions_mut().push_confirm(false);
        }

        choose_label(&mut session, "Hallway")?;
        assert_eq!(weapon_names(&session), ["Bat", "Axe"]);
        assert_eq!(session.decisions_mut().asked.len(), 2 * MAX_DISCARD_ROUNDS);
        Ok(())
    }

    #[test]
    fn fight_spends_weakest_weapon_and_skips_result_health() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let mut session = fixture.started(1)?;
        session.decisions_mut().push_pick(Some(0));
        session.decisions_mut().push_confirm(true);
        choose_label(&mut session, "Hallway")?;

        choose_label(&mut session, "Fight")?;
        assert_eq!(scene_id(&session), Some("fight_result_win_2"));
        assert_eq!(session.player().health.value(), 90);
        let crowbar = &session.player().inventory.weapons()[1];
        assert_eq!((crowbar.name.as_str(), crowbar.durability()), ("Crowbar", 1));
        Ok(())
    }

    #[test]
    fn lost_fight_falls_back_to_generic_result_scene() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let mut session = fixture.started(0)?;
        choose_label(&mut session, "Alley")?;
        choose_label(&mut session, "Fight it")?;

        assert_eq!(scene_id(&session), Some("fight_result_lose_1"));
        assert_eq!(session.player().health.value(), 90 - 35);
        assert!(weapon_names(&session).is_empty());
        Ok(())
    }

    #[test]
    fn broken_weapon_is_dropped_and_missing_result_ends_story() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let mut session = fixture.started(1)?;
        session.decisions_mut().push_pick(Some(0));
        session.decisions_mut().push_confirm(true);
        choose_label(&mut session, "Hallway")?;
        choose_label(&mut session, "Run")?;
        choose_label(&mut session, "Alley")?;
        choose_label(&mut session, "Fight it")?;

        assert_eq!(weapon_names(&session), ["Crowbar"]);
        assert_eq!(session.mode(), &Mode::Ending(EndingKind::Finished));
        Ok(())
    }

    #[test]
    fn antidote_run_reaches_a_saved_win() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let mut session = fixture.started(1)?;
        session.decisions_mut().push_pick(Some(0));
        session.decisions_mut().push_confirm(true);
        choose_label(&mut session, "Hallway")?;
        choose_label(&mut session, "Fight")?;
        choose_label(&mut session, "Onward")?;

        assert!(session.player().inventory.holds_key_item("Antidote"));
        assert_eq!(session.player().inventory.count(ItemCategory::Consumable), 2);

        choose_label(&mut session, "Leave")?;
        assert_eq!(scene_id(&session), Some("infection_choice"));
        assert_eq!(session.player().health.value(), 90);
        let use_antidote = session
            .current_scene()
            .map(|scene| scene.choices[0].clone())
            .context("infection scene")?;
        assert!(session.is_choice_available(&use_antidote));

        choose_label(&mut session, "Use antidote")?;
        assert!(!session.player().inventory.holds_key_item("Antidote"));
        assert!(session.player().antidote_used);

        choose_label(&mut session, "Escape")?;
        assert_eq!(
            session.mode(),
            &Mode::Ending(EndingKind::Won {
                scene_id: "rooftop_win".to_string()
            })
        );
        let saved = session.saves().load(1)?.context("win save")?;
        assert_eq!(saved.completed_win_scene_ids, vec!["rooftop_win"]);
        assert_eq!(saved.current_scene_id, None);

        session.acknowledge_ending()?;
        assert_eq!(session.mode(), &Mode::StorySelect);
        assert_eq!(session.player().health, Health::FULL);
        assert!(!session.player().antidote_used);
        assert_eq!(session.completed_win_scene_ids(), ["rooftop_win"]);
        Ok(())
    }

    #[test]
    fn repeated_wins_are_recorded_once() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let story = fixture.root().join("stories").join("short.json");
        fs::write(
            &story,
            r#"[{"id": "start", "prompt": "Go", "choices": [{"label": "Out", "nextId": "exit_win"}]},
                {"id": "exit_win", "prompt": "Free", "ending": "WIN"}]"#,
        )?;
        let mut session = fixture.controller();
        session.start_new_game(3, "Sam")?;
        for _ in 0..2 {
            session.select_story(&story)?;
            session.choose(0)?;
            session.acknowledge_ending()?;
        }

        let saved = session.saves().load(3)?.context("win save")?;
        assert_eq!(saved.completed_win_scene_ids, vec!["exit_win"]);
        Ok(())
    }

    #[test]
    fn bite_without_antidote_is_fatal() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let mut session = fixture.started(0)?;
        choose_label(&mut session, "Closet")?;

        assert_eq!(scene_id(&session), Some("game_over_infection"));
        assert_eq!(session.player().health.value(), 0);
        assert_eq!(session.mode(), &Mode::Ending(EndingKind::Lost));

        session.acknowledge_ending()?;
        assert_eq!(session.mode(), &Mode::StorySelect);
        let saved = session.saves().load(1)?.context("baseline save")?;
        assert!(saved.completed_win_scene_ids.is_empty());
        Ok(())
    }

    #[test]
    fn zeroing_scene_and_lethal_choice_end_the_run() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let mut session = fixture.started(0)?;
        choose_label(&mut session, "Stairs")?;
        assert_eq!(session.mode(), &Mode::Ending(EndingKind::Lost));

        let mut session = fixture.started(0)?;
        choose_label(&mut session, "Jump")?;
        assert_eq!(session.mode(), &Mode::Ending(EndingKind::Lost));
        assert_eq!(session.player().health.value(), 0);
        Ok(())
    }

    #[test]
    fn missing_scene_degrades_to_an_ending() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let mut session = fixture.started(0)?;
        choose_label(&mut session, "Basement")?;

        assert_eq!(session.mode(), &Mode::Ending(EndingKind::Finished));
        assert!(session.current_scene().is_none());
        Ok(())
    }

    #[test]
    fn lethal_fight_without_result_scenes_is_a_loss() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let story = fixture.root().join("stories").join("ambush.json");
        fs::write(
            &story,
            r#"[{"id": "start", "prompt": "A horde.", "threatLevel": 40,
                 "choices": [{"label": "Fight"}]}]"#,
        )?;
        let mut session = fixture.controller();
        session.start_new_game(2, "Jo")?;
        session.select_story(&story)?;
        choose_label(&mut session, "Fight")?;

        assert_eq!(session.player().health.value(), 0);
        assert_eq!(session.mode(), &Mode::Ending(EndingKind::Lost));
        assert!(session.current_scene().is_none());
        Ok(())
    }

    #[test]
    fn antidote_choices_need_the_antidote() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let session = fixture.started(0)?;
        let choice = Choice {
            label: "Administer antidote to her".to_string(),
            image_path: None,
            next_id: Some("cured".to_string()),
            health_effect: 0,
            scene_id: "start".to_string(),
        };
        assert!(!session.is_choice_available(&choice));
        assert!(session.is_choice_available(&Choice {
            label: "Hallway".to_string(),
            ..choice
        }));
        Ok(())
    }

    #[test]
    fn consuming_restores_health_only_in_a_scene() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let mut session = fixture.controller();
        assert!(session.consume("Bandage").is_err());

        let mut session = fixture.started(1)?;
        assert!(session.consume("bandage")?);
        assert_eq!(session.player().health, Health::FULL);
        assert!(!session.consume("Bandage")?);
        assert!(!session.consume("Bat")?);
        Ok(())
    }

    #[test]
    fn declined_reset_changes_nothing() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let mut session = fixture.started(1)?;
        let before = session.player().clone();

        assert!(!session.request_reset());
        assert_eq!(session.player(), &before);
        assert_eq!(scene_id(&session), Some("start"));

        session.decisions_mut().push_confirm(true);
        session.toggle_dark_mode();
        assert!(session.request_reset());
        assert_eq!(session.mode(), &Mode::Title);
        assert_eq!(session.player().health, Health::FULL);
        assert!(session.player().dark_mode);
        assert!(session.markers().processed_scenes().next().is_none());
        Ok(())
    }

    #[test]
    fn choosing_another_story_drops_the_run() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let mut session = fixture.started(1)?;
        session.choose_another_story()?;

        assert_eq!(session.mode(), &Mode::StorySelect);
        assert!(session.current_scene().is_none());
        assert_eq!(weapon_names(&session), ["Bat"]);
        assert_eq!(session.player().health, Health::FULL);
        Ok(())
    }

    #[test]
    fn loading_resumes_saved_scene_without_replaying_it() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let saves = SaveManager::new(fixture.root().join("saves"), 3);
        let mut record = SaveSlot::new("Tyler");
        record.story_file_path = Some(fixture.story.clone());
        record.current_scene_id = Some("hall".to_string());
        record.health = Health::new(42);
        record.markers.mark_health_applied("hall");
        record.markers.mark_processed("hall");
        record.record_win("rooftop_win");
        saves.save(2, &record)?;

        let mut session = fixture.controller();
        assert!(!session.load_game(1)?);
        assert!(session.load_game(2)?);
        assert_eq!(session.mode(), &Mode::InScene);
        assert_eq!(scene_id(&session), Some("hall"));
        assert_eq!(session.player().health.value(), 42);
        assert_eq!(session.player_name(), Some("Tyler"));
        assert_eq!(session.completed_win_scene_ids(), ["rooftop_win"]);

        choose_label(&mut session, "Run")?;
        assert_eq!(session.player().health.value(), 32);
        assert!(session.decisions_mut().asked.is_empty());
        Ok(())
    }

    #[test]
    fn loading_without_a_scene_routes_to_story_select() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let saves = SaveManager::new(fixture.root().join("saves"), 3);
        let mut record = SaveSlot::new("Tyler");
        record.story_file_path = Some(fixture.story.clone());
        record.current_scene_id = Some("demolished_wing".to_string());
        saves.save(1, &record)?;

        let mut session = fixture.controller();
        assert!(session.load_game(1)?);
        assert_eq!(session.mode(), &Mode::StorySelect);
        assert!(session.current_scene().is_none());
        Ok(())
    }

    #[test]
    fn failed_new_game_save_stays_on_title() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let blocked = fixture.root().join("blocked");
        fs::write(&blocked, "not a directory")?;
        let mut session = SessionController::with_parts(
            fixture.controller().settings.clone(),
            SaveManager::new(&blocked, 3),
            StoryCatalog::new(fixture.root().join("stories")),
            Scripted::new(),
        );

        assert!(session.start_new_game(1, "Riley").is_err());
        assert_eq!(session.mode(), &Mode::Title);
        assert_eq!(session.slot(), None);
        Ok(())
    }

    #[test]
    fn failed_win_save_keeps_the_ending_state() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let story = fixture.root().join("stories").join("short.json");
        fs::write(
            &story,
            r#"[{"id": "start", "prompt": "Go", "choices": [{"label": "Out", "nextId": "exit_win"}]},
                {"id": "exit_win", "prompt": "Free", "ending": "WIN"}]"#,
        )?;
        let mut session = fixture.controller();
        session.start_new_game(1, "Sam")?;
        session.select_story(&story)?;

        let saves = fixture.root().join("saves");
        fs::remove_dir_all(&saves)?;
        fs::write(&saves, "not a directory")?;

        assert!(session.choose(0).is_err());
        assert_eq!(
            session.mode(),
            &Mode::Ending(EndingKind::Won {
                scene_id: "exit_win".to_string()
            })
        );
        assert_eq!(session.player().health, Health::FULL);
        Ok(())
    }

    #[test]
    fn photo_album_and_instructions_are_title_screens() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let mut session = fixture.controller();

        session.show_instructions()?;
        assert_eq!(session.mode(), &Mode::Instructions);
        assert!(session.show_instructions().is_err());
        session.back_to_title()?;

        let album = session.open_photo_album(1)?;
        assert_eq!(session.mode(), &Mode::PhotoAlbum { slot: 1 });
        assert!(album.unlocked.is_empty());
        assert_eq!(album.locked.len(), 1);
        session.back_to_title()?;
        assert_eq!(session.mode(), &Mode::Title);
        Ok(())
    }

    #[test]
    fn choices_outside_a_scene_are_rejected() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let mut session = fixture.controller();
        assert!(session.choose(0).is_err());

        let mut session = fixture.started(0)?;
        let err = session.choose(42).unwrap_err();
        assert!(err.to_string().contains("choice 42"));
        Ok(())
    }
}
