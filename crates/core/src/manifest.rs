//! Story titles manifest stored alongside the story files.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;

/// File name of the manifest inside the story directory.
pub const TITLES_FILE: &str = "titles.json";

/// Display titles keyed by story file name.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct StoryTitles {
    titles: BTreeMap<String, Option<String>>,
}

impl StoryTitles {
    /// Load the manifest from the given path, returning `None` if it does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read titles {}", path.display()))?;
        let titles = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse titles {}", path.display()))?;
        Ok(Some(titles))
    }

    /// Title for a story file name. Null and blank entries count as absent.
    pub fn title_for(&self, file_name: &str) -> Option<&str> {
        self.titles
            .get(file_name)
            .and_then(|title| title.as_deref())
            .map(str::trim)
            .filter(|title| !title.is_empty())
    }
}

/// Helper to compute the manifest path inside a story directory.
pub fn titles_path(story_dir: impl AsRef<Path>) -> PathBuf {
    story_dir.as_ref().join(TITLES_FILE)
}
