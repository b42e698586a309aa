//! Defaults and persisted compositor settings.
//!
//! Settings file location priority:
//! 1. `--settings FILE` on the command line
//! 2. `NESTCOMP_CONFIG` environment variable
//! 3. Platform config directory from dirs-next (`~/.config/nestcomp/settings.json` on Linux)

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_FPS: f64 = 30.0;
pub const DEFAULT_DIM: (u32, u32) = (1280, 720);
pub const SETTINGS_FILE: &str = "settings.json";
pub const CONFIG_ENV: &str = "NESTCOMP_CONFIG";

/// Global compositor switches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposeSettings {
    /// Run shader-capable effects; off leaves them as no-ops
    pub shaders_enabled: bool,
    /// Request audio while the viewer is scrubbing
    pub enable_audio_scrubbing: bool,
    /// Final-quality output (clips open at full quality)
    pub rendering: bool,
    /// Autoscale flag given to newly created clips
    pub default_autoscale: bool,
    pub playback_speed: f64,
}

impl Default for ComposeSettings {
    fn default() -> Self {
        Self {
            shaders_enabled: true,
            enable_audio_scrubbing: true,
            rendering: false,
            default_autoscale: true,
            playback_speed: 1.0,
        }
    }
}

impl ComposeSettings {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        let settings = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse settings: {}", path.display()))?;
        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Load `path` if it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            info!("No settings at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create settings directory: {}", dir.display()))?;
        }
        let text = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, text).with_context(|| format!("Failed to write settings: {}", path.display()))
    }
}

/// Resolve the settings file path
pub fn settings_path(cli: Option<PathBuf>) -> PathBuf {
    // Priority 1: CLI
    if let Some(path) = cli {
        return path;
    }

    // Priority 2: ENV
    if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(path);
    }

    // Priority 3: platform config directory
    if let Some(dir) = dirs_next::config_dir() {
        return dir.join("nestcomp").join(SETTINGS_FILE);
    }

    // Fallback: current directory
    PathBuf::from(SETTINGS_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Missing keys take their defaults
    #[test]
    fn test_partial_settings() {
        let settings: ComposeSettings = serde_json::from_str(r#"{"shaders_enabled": false}"#).unwrap();
        assert!(!settings.shaders_enabled);
        assert!(settings.enable_audio_scrubbing);
        assert_eq!(settings.playback_speed, 1.0);
    }

    /// Save then load gives back the same settings
    #[test]
    fn test_save_load() {
        let dir = std::env::temp_dir().join(format!("nestcomp-{}", uuid::Uuid::new_v4()));
        let path = dir.join(SETTINGS_FILE);
        let settings = ComposeSettings {
            rendering: true,
            playback_speed: 2.0,
            ..Default::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(ComposeSettings::load_or_default(&path).unwrap(), settings);
        let _ = std::fs::remove_dir_all(&dir);
    }

    /// A missing file is not an error for load_or_default
    #[test]
    fn test_missing_file_defaults() {
        let path = std::env::temp_dir().join(format!("nestcomp-missing-{}.json", uuid::Uuid::new_v4()));
        assert_eq!(ComposeSettings::load_or_default(&path).unwrap(), ComposeSettings::default());
        assert!(ComposeSettings::load(&path).is_err());
    }

    /// An explicit CLI path always wins
    #[test]
    fn test_settings_path_cli() {
        let cli = PathBuf::from("/tmp/custom.json");
        assert_eq!(settings_path(Some(cli.clone())), cli);
    }
}
