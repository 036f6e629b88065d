//! Story discovery and the winning photo album.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use anyhow::Result;
use tracing::warn;
use walkdir::WalkDir;

use crate::{
    manifest::{self, StoryTitles, TITLES_FILE},
    story::SceneGraph,
};

/// A playable story file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryEntry {
    /// Path to the story JSON.
    pub path: PathBuf,
    /// Display title.
    pub title: String,
}

/// One winning scene in the photo album.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumEntry {
    /// Title of the story the scene belongs to.
    pub story_title: String,
    /// Winning scene id.
    pub scene_id: String,
}

/// Winning scenes split by whether the slot has reached them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhotoAlbum {
    /// Endings the slot has completed.
    pub unlocked: Vec<AlbumEntry>,
    /// Endings still to be found.
    pub locked: Vec<AlbumEntry>,
}

/// Discovers story files beneath a directory.
#[derive(Debug, Clone)]
pub struct StoryCatalog {
    root: PathBuf,
}

impl StoryCatalog {
    /// Create a catalog rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory being scanned.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All story files, sorted by path. A missing directory yields an empty list.
    pub fn stories(&self) -> Result<Vec<StoryEntry>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let titles = StoryTitles::load(manifest::titles_path(&self.root))?.unwrap_or_default();
        let mut stories = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Skipping unreadable story entry: {err}");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().to_string();
            if file_name == TITLES_FILE {
                continue;
            }

            let title = titles
                .title_for(&file_name)
                .map(str::to_string)
                .unwrap_or_else(|| default_title(path));
            stories.push(StoryEntry {
                path: path.to_path_buf(),
                title,
            });
        }

        stories.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(stories)
    }

    /// Build the photo album for a slot's completed wins.
    ///
    /// Stories that fail to load are skipped.
    pub fn photo_album(&self, completed_win_scene_ids: &[String]) -> Result<PhotoAlbum> {
        let completed: HashSet<&str> = completed_win_scene_ids.iter().map(String::as_str).collect();
        let mut album = PhotoAlbum::default();

        for story in self.stories()? {
            let graph = match SceneGraph::load(&story.path) {
                Ok(graph) => graph,
                Err(err) => {
                    warn!("Skipping {} in photo album: {err:#}", story.path.display());
                    continue;
                }
            };
            for scene_id in graph.win_scene_ids() {
                let unlocked = completed.contains(scene_id.as_str());
                let entry = AlbumEntry {
                    story_title: story.title.clone(),
                    scene_id,
                };
                if unlocked {
                    album.unlocked.push(entry);
                } else {
                    album.locked.push(entry);
                }
            }
        }

        Ok(album)
    }
}

fn default_title(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().replace('_', " "))
        .unwrap_or_else(|| "Untitled story".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_story(dir: &Path, name: &str, wins: &[&str]) -> Result<()> {
        let mut scenes = vec![serde_json::json!({
            "id": "start",
            "prompt": "Begin",
            "choices": []
        })];
        for win in wins {
            scenes.push(serde_json::json!({"id": win, "prompt": "Saved", "ending": "WIN"}));
        }
        fs::write(dir.join(name), serde_json::to_string(&scenes)?)?;
        Ok(())
    }

    #[test]
    fn discovers_story_files_with_titles() -> Result<()> {
        let dir = tempdir()?;
        write_story(dir.path(), "walk_story.json", &[])?;
        write_story(dir.path(), "drive_story.json", &[])?;
        fs::write(dir.path().join("notes.txt"), "not a story")?;
        fs::write(
            manifest::titles_path(dir.path()),
            r#"{"drive_story.json": "The Drive"}"#,
        )?;

        let stories = StoryCatalog::new(dir.path()).stories()?;
        let titles: Vec<_> = stories.iter().map(|story| story.title.as_str()).collect();
        assert_eq!(titles, ["The Drive", "walk story"]);
        Ok(())
    }

    #[test]
    fn missing_directory_has_no_stories() -> Result<()> {
        let dir = tempdir()?;
        let catalog = StoryCatalog::new(dir.path().join("absent"));
        assert!(catalog.stories()?.is_empty());
        Ok(())
    }

    #[test]
    fn photo_album_splits_locked_and_unlocked() -> Result<()> {
        let dir = tempdir()?;
        write_story(dir.path(), "drive_story.json", &["zombie_woman_win", "fight_result_win_4"])?;
        write_story(dir.path(), "walk_story.json", &["win_infection_cured"])?;
        fs::write(dir.path().join("broken.json"), "{ nope")?;

        let album = StoryCatalog::new(dir.path())
            .photo_album(&["fight_result_win_4".to_string(), "not_a_scene".to_string()])?;

        let unlocked: Vec<_> = album.unlocked.iter().map(|e| e.scene_id.as_str()).collect();
        let locked: Vec<_> = album.locked.iter().map(|e| e.scene_id.as_str()).collect();
        assert_eq!(unlocked, ["fight_result_win_4"]);
        assert_eq!(locked, ["zombie_woman_win", "win_infection_cured"]);
        Ok(())
    }

    #[test]
    fn bundled_stories_load_cleanly() -> Result<()> {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../data/stories");
        let stories = StoryCatalog::new(&root).stories()?;
        assert_eq!(stories.len(), 2);

        for story in stories {
            let graph = SceneGraph::load(&story.path)?;
            assert!(graph.load_errors().is_empty(), "{}", story.title);
            assert!(graph.dangling_references().is_empty(), "{}", story.title);
            assert!(graph.contains("start"));
            assert!(!graph.win_scene_ids().is_empty());
        }
        Ok(())
    }
}
