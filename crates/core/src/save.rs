//! Save-slot persistence.
//!
//! Each slot is one JSON file holding a complete [`SaveSlot`]. Writes always
//! replace the whole file.

use std::{
    fs,
    io::Write,
    ops::RangeInclusive,
    path::{Path, PathBuf},
};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::{error::SaveError, inventory::Inventory, models::Health, session::SessionMarkers};

/// Directory under the user's config directory used for save files.
pub const DEFAULT_SAVE_DIR: &str = "survive/saves";

/// Number of slots offered unless configured otherwise.
pub const DEFAULT_SLOT_COUNT: u8 = 3;

/// Everything persisted for one save slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSlot {
    /// Name entered when the slot was claimed.
    pub player_name: String,
    /// Story being played, if one was chosen.
    #[serde(default)]
    pub story_file_path: Option<PathBuf>,
    /// Scene to resume at; `None` resumes at story selection.
    #[serde(default)]
    pub current_scene_id: Option<String>,
    /// Player health.
    #[serde(default)]
    pub health: Health,
    /// Presentation preference.
    #[serde(default)]
    pub dark_mode: bool,
    /// Idempotency markers of the saved run.
    #[serde(flatten)]
    pub markers: SessionMarkers,
    /// Held items.
    #[serde(default)]
    pub inventory: Inventory,
    /// Whether the antidote has been used this run.
    #[serde(default)]
    pub antidote_used: bool,
    /// Every win scene this slot has reached, without duplicates.
    #[serde(default)]
    pub completed_win_scene_ids: Vec<String>,
    /// Time of the last write.
    #[serde(
        default,
        alias = "lastUpdatedEpochMillis",
        deserialize_with = "deserialize_timestamp"
    )]
    pub last_updated: DateTime<Utc>,
}

impl SaveSlot {
    /// Baseline record written when a new game claims a slot.
    pub fn new(player_name: impl Into<String>) -> Self {
        Self {
            player_name: player_name.into(),
            story_file_path: None,
            current_scene_id: None,
            health: Health::FULL,
            dark_mode: false,
            markers: SessionMarkers::default(),
            inventory: Inventory::new(),
            antidote_used: false,
            completed_win_scene_ids: Vec::new(),
            last_updated: Utc::now(),
        }
    }

    /// Record a win. Returns `false` when the scene was already completed.
    pub fn record_win(&mut self, scene_id: &str) -> bool {
        if self.has_completed(scene_id) {
            return false;
        }
        self.completed_win_scene_ids.push(scene_id.to_string());
        true
    }

    /// Whether this slot has reached the given win scene.
    pub fn has_completed(&self, scene_id: &str) -> bool {
        self.completed_win_scene_ids.iter().any(|id| id == scene_id)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Text(DateTime<Utc>),
    Millis(i64),
    Other(serde_json::Value),
}

// Older saves stored epoch milliseconds.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawTimestamp::deserialize(deserializer)? {
        RawTimestamp::Text(value) => value,
        RawTimestamp::Millis(millis) => Utc
            .timestamp_millis_opt(millis)
            .single()
            .unwrap_or_default(),
        RawTimestamp::Other(_) => DateTime::<Utc>::default(),
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SlotPeek {
    player_name: String,
    #[serde(default, alias = "lastUpdatedEpochMillis", deserialize_with = "deserialize_timestamp")]
    last_updated: DateTime<Utc>,
}

/// Title-screen summary of a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSummary {
    /// Slot number.
    pub slot: u8,
    /// Player name, if the slot is in use.
    pub player_name: Option<String>,
    /// Last write, if the slot is in use.
    pub last_updated: Option<DateTime<Utc>>,
}

/// Manager responsible for loading and writing save slots.
#[derive(Debug, Clone)]
pub struct SaveManager {
    root: PathBuf,
    slot_count: u8,
}

impl SaveManager {
    /// Create a new manager rooted at the provided directory.
    pub fn new(root: impl Into<PathBuf>, slot_count: u8) -> Self {
        Self {
            root: root.into(),
            slot_count: slot_count.max(1),
        }
    }

    /// Default location under the user's config directory.
    pub fn default_root() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_SAVE_DIR)
    }

    /// Directory holding the slot files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Valid slot numbers.
    pub fn slots(&self) -> RangeInclusive<u8> {
        1..=self.slot_count
    }

    /// File backing the given slot.
    pub fn path_for_slot(&self, slot: u8) -> Result<PathBuf, SaveError> {
        if !self.slots().contains(&slot) {
            return Err(SaveError::SlotOutOfRange {
                slot,
                max: self.slot_count,
            });
        }
        Ok(self.root.join(format!("slot{slot}.json")))
    }

    /// Whether the slot has a save file.
    pub fn exists(&self, slot: u8) -> Result<bool, SaveError> {
        Ok(self.path_for_slot(slot)?.is_file())
    }

    /// Load a slot. An untouched slot yields `Ok(None)`.
    pub fn load(&self, slot: u8) -> Result<Option<SaveSlot>, SaveError> {
        let path = self.path_for_slot(slot)?;
        let Some(content) = read_if_exists(&path)? else {
            return Ok(None);
        };
        let record = serde_json::from_str(&content)
            .map_err(|source| SaveError::Format { path, source })?;
        Ok(Some(record))
    }

    /// Read only the player name of a slot.
    pub fn peek_player_name(&self, slot: u8) -> Result<Option<String>, SaveError> {
        Ok(self.peek(slot)?.map(|peek| peek.player_name))
    }

    fn peek(&self, slot: u8) -> Result<Option<SlotPeek>, SaveError> {
        let path = self.path_for_slot(slot)?;
        let Some(content) = read_if_exists(&path)? else {
            return Ok(None);
        };
        let peek = serde_json::from_str(&content)
            .map_err(|source| SaveError::Format { path, source })?;
        Ok(Some(peek))
    }

    /// Overwrite a slot with `record`.
    ///
    /// The record is written to a temporary file first and moved into place,
    /// so a failed write leaves the previous file intact.
    pub fn save(&self, slot: u8, record: &SaveSlot) -> Result<(), SaveError> {
        let path = self.path_for_slot(slot)?;
        let io_error = |source: std::io::Error| SaveError::Io {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&self.root).map_err(io_error)?;
        let serialised = serde_json::to_vec_pretty(record).map_err(|source| SaveError::Format {
            path: path.clone(),
            source,
        })?;

        let mut file = NamedTempFile::new_in(&self.root).map_err(io_error)?;
        file.write_all(&serialised).map_err(io_error)?;
        file.persist(&path).map_err(|err| io_error(err.error))?;
        debug!("Saved slot {slot} to {}", path.display());
        Ok(())
    }

    /// Delete a slot. Returns whether a file was removed.
    pub fn delete(&self, slot: u8) -> Result<bool, SaveError> {
        let path = self.path_for_slot(slot)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(SaveError::Io { path, source }),
        }
    }

    /// Summaries of every slot; unreadable slots are reported as empty.
    pub fn summaries(&self) -> Vec<SlotSummary> {
        self.slots()
            .map(|slot| match self.peek(slot) {
                Ok(peek) => SlotSummary {
                    slot,
                    player_name: peek.as_ref().map(|peek| peek.player_name.clone()),
                    last_updated: peek.map(|peek| peek.last_updated),
                },
                Err(err) => {
                    warn!("Failed to read save slot {slot}: {err}");
                    SlotSummary {
                        slot,
                        player_name: None,
                        last_updated: None,
                    }
                }
            })
            .collect()
    }
}

fn read_if_exists(path: &Path) -> Result<Option<String>, SaveError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(SaveError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
