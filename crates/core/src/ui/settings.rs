//! User settings persistence.
//!
//! Preferences survive between sessions as JSON in the user's config
//! directory (e.g. `~/.config/mask-shot/settings.json` on Linux).

use crate::compositor::OverlayStyle;
use crate::error::Result;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Colors and sizes of the selection and mask overlay.
    #[serde(default)]
    pub overlay: OverlayStyle,
    /// Directory of the last opened image, used as the dialog start.
    #[serde(default)]
    pub last_dir: Option<PathBuf>,
    /// Engine program taking precedence over the environment on next launch.
    #[serde(default)]
    pub engine_override: String,
}

impl Settings {
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "mask-shot", "mask-shot").map(|dirs| {
            let config_dir = dirs.config_dir();
            if !config_dir.exists() {
                let _ = fs::create_dir_all(config_dir);
            }
            config_dir.join("settings.json")
        })
    }

    /// Loads settings from the user config directory, falling back to defaults.
    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Missing or corrupt files yield defaults.
    pub fn load_from(path: &Path) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default()
    }

    pub fn save(&self) -> Result<()> {
        if let Some(path) = Self::config_path() {
            self.save_to(&path)?;
        }
        Ok(())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn engine_override(&self) -> Option<&str> {
        let engine = self.engine_override.trim();
        (!engine.is_empty()).then_some(engine)
    }

    /// Remembers the directory containing `opened`.
    pub fn remember_dir(&mut self, opened: &Path) {
        if let Some(parent) = opened.parent() {
            self.last_dir = Some(parent.to_path_buf());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_survive_a_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut settings = Settings::default();
        settings.overlay.mask_opacity = 0.6;
        settings.engine_override = "/opt/sam/run".into();
        settings.remember_dir(Path::new("/data/photos/cat.png"));
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path);
        assert_eq!(loaded, settings);
        assert_eq!(loaded.last_dir.as_deref(), Some(Path::new("/data/photos")));
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
        assert_eq!(Settings::load_from(&dir.path().join("missing.json")), Settings::default());
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"engine_override": "  "}"#).unwrap();

        let loaded = Settings::load_from(&path);
        assert_eq!(loaded.overlay, OverlayStyle::default());
        assert_eq!(loaded.engine_override(), None);
    }
}
