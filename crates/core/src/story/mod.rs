//! Story content: scenes, choices and the id-indexed scene graph.

pub mod loader;
mod models;

pub use loader::SceneGraph;
pub use models::{Choice, Ending, Scene, SceneEffect};
