//! Daemon settings

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use hfp_hf::HfConfig;
use serde::{Deserialize, Serialize};

/// Daemon settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// RFCOMM TTY bound to the phone's HFP channel
    #[serde(default = "default_device")]
    pub device: String,
    /// Baud rate for the TTY
    #[serde(default = "default_baud")]
    pub baud_rate: u32,
    /// Hands-Free connection settings
    #[serde(default)]
    pub hf: HfConfig,
}

fn default_device() -> String {
    "/dev/rfcomm0".to_string()
}

fn default_baud() -> u32 {
    115200
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device: default_device(),
            baud_rate: default_baud(),
            hf: HfConfig::default(),
        }
    }
}

impl Settings {
    /// Get the XDG config directory for hfp-hf
    /// Uses $XDG_CONFIG_HOME/hfp-hf, falls back to ~/.config/hfp-hf
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("hfp-hf"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("hfp-hf"))
    }

    /// Default settings file path
    pub fn default_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings, falling back to defaults if the file does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("invalid settings in {}", path.display()))
    }

    /// Save settings, creating the parent directory if needed
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(self).context("failed to serialize settings")?;
        std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
    }
}
