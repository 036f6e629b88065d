#![warn(clippy::all, missing_docs)]

//! Core engine for the survival story game.
//!
//! This crate hosts the story content library, the inventory and combat
//! rules, save-slot persistence, and the session state machine that ties
//! them together. Frontends drive it through discrete events and answer
//! confirmation prompts through [`DecisionPort`].

pub mod catalog;
pub mod combat;
pub mod config;
pub mod error;
pub mod inventory;
pub mod manifest;
pub mod models;
pub mod ports;
pub mod save;
pub mod session;
pub mod story;

pub use catalog::{PhotoAlbum, StoryCatalog, StoryEntry};
pub use config::AppConfig;
pub use error::{ContentLoadError, SaveError, SceneNotFound, SessionError};
pub use inventory::{AddOutcome, Inventory, InventoryTemplate, Rejection};
pub use models::{Health, InventoryItem, ItemCategory, ItemKind};
pub use ports::DecisionPort;
pub use save::{SaveManager, SaveSlot};
pub use session::{
    EndingKind, Mode, PlayerState, SessionController, SessionMarkers, SessionSettings,
};
pub use story::{Choice, Ending, Scene, SceneEffect, SceneGraph};
