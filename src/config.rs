use std::path::PathBuf;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// Application configuration settings.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Root directory for persisted state (notes, catalogs)
    pub data_dir: PathBuf,

    /// Directory for backup archives
    pub backup_dir: PathBuf,

    /// Maximum number of backup archives to keep (0 keeps all)
    pub max_backups: u32,

    /// Whether to watch the notes directory for external edits and keep
    /// the in-memory cache in sync
    pub watch_files: bool,
}

impl Config {
    /// Builds a configuration rooted at the platform data directory,
    /// falling back to `./notekeep-data` when none is available.
    pub fn default_paths() -> Self {
        let root = ProjectDirs::from("", "", "notekeep")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("notekeep-data"));

        Self::with_data_dir(root)
    }

    /// Builds a configuration rooted at the given directory.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        let backup_dir = data_dir.join("backups");

        Self {
            data_dir,
            backup_dir,
            max_backups: 10,
            watch_files: false,
        }
    }

    /// Directory holding the per-note JSON files.
    pub fn notes_dir(&self) -> PathBuf {
        self.data_dir.join("notes")
    }

    /// Path of the area catalog file.
    pub fn areas_path(&self) -> PathBuf {
        self.data_dir.join("areas.json")
    }

    /// Path of the tag catalog file.
    pub fn tags_path(&self) -> PathBuf {
        self.data_dir.join("tags.json")
    }

    /// Path of the settings file.
    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_hang_off_data_dir() {
        let config = Config::with_data_dir("/tmp/nk");
        assert_eq!(config.notes_dir(), PathBuf::from("/tmp/nk/notes"));
        assert_eq!(config.areas_path(), PathBuf::from("/tmp/nk/areas.json"));
        assert_eq!(config.backup_dir, PathBuf::from("/tmp/nk/backups"));
        assert!(!config.watch_files);
    }
}
