//! Session state machine and per-run player state.

mod controller;
mod state;

pub use controller::{SessionController, SessionSettings};
pub use state::{EndingKind, Mode, PlayerState, SessionMarkers};
