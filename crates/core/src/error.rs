//! Error taxonomy shared across the engine.
//!
//! Inventory rejections are deliberately absent: a full category or a
//! declined swap is reported through [`crate::inventory::AddOutcome`].

use std::path::PathBuf;

use thiserror::Error;

/// A single scene record that could not be turned into a [`crate::Scene`].
///
/// The loader skips the record and keeps going.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("scene record #{index}{}: {reason}", .scene_id.as_deref().map(|id| format!(" ({id})")).unwrap_or_default())]
pub struct ContentLoadError {
    /// Position of the record inside the story array.
    pub index: usize,
    /// Scene id, when the record got far enough to expose one.
    pub scene_id: Option<String>,
    /// Human readable description of the problem.
    pub reason: String,
}

/// A referenced scene id is absent from the loaded story.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("scene `{0}` not found")]
pub struct SceneNotFound(pub String);

/// Failures raised while reading or writing save slots.
#[derive(Debug, Error)]
pub enum SaveError {
    /// The slot number lies outside the configured range.
    #[error("save slot {slot} is out of range (1..={max})")]
    SlotOutOfRange {
        /// Requested slot.
        slot: u8,
        /// Highest valid slot.
        max: u8,
    },
    /// The slot file could not be read or written.
    #[error("failed to access save file {}", .path.display())]
    Io {
        /// Slot file involved in the failure.
        path: PathBuf,
        /// Underlying filesystem error.
        #[source]
        source: std::io::Error,
    },
    /// The slot file exists but does not hold a valid record.
    #[error("save file {} is corrupt", .path.display())]
    Format {
        /// Slot file involved in the failure.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
}

/// Events delivered to the session controller in a mode that cannot handle them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// A scene-only event arrived while no scene is showing.
    #[error("no scene is active")]
    NoActiveScene,
    /// The choice index does not exist on the current scene.
    #[error("choice {index} does not exist on scene `{scene_id}`")]
    InvalidChoice {
        /// Offending index.
        index: usize,
        /// Scene that was showing.
        scene_id: String,
    },
    /// The event is not valid in the current top-level mode.
    #[error("`{event}` is not available while in {mode}")]
    WrongMode {
        /// Name of the rejected event.
        event: &'static str,
        /// Description of the current mode.
        mode: String,
    },
}
