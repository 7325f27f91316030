//! Persisted defaults

use std::path::PathBuf;

use rfd_modem::ScannerConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Defaults applied when the matching command-line option is absent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Response timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,
    /// Port name patterns skipped during discovery
    #[serde(default = "default_skip_patterns")]
    pub skip_patterns: Vec<String>,
    /// Only probe USB serial ports during discovery
    #[serde(default)]
    pub usb_only: bool,
}

fn default_baud_rate() -> u32 {
    rfd_protocol::DEFAULT_BAUD_RATE
}

fn default_timeout_secs() -> f64 {
    1.0
}

fn default_skip_patterns() -> Vec<String> {
    vec!["Bluetooth".to_string(), "debug".to_string()]
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            baud_rate: default_baud_rate(),
            timeout_secs: default_timeout_secs(),
            skip_patterns: default_skip_patterns(),
            usb_only: false,
        }
    }
}

impl Settings {
    /// Get the XDG config directory for rfd-config
    /// Uses $XDG_CONFIG_HOME/rfd-config, falls back to ~/.config/rfd-config
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("rfd-config"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("rfd-config"))
    }

    /// Get the settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else {
            return Self::default();
        };
        let Ok(text) = std::fs::read_to_string(&path) else {
            debug!("No settings at {}", path.display());
            return Self::default();
        };
        Self::from_json(&text).unwrap_or_else(|e| {
            warn!("Ignoring unreadable settings {}: {}", path.display(), e);
            Self::default()
        })
    }

    /// Parse settings JSON; missing fields take their defaults
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<PathBuf, String> {
        let path =
            Self::settings_path().ok_or_else(|| "Could not determine settings path".to_string())?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create settings directory: {}", e))?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;

        std::fs::write(&path, json).map_err(|e| format!("Failed to write settings: {}", e))?;

        Ok(path)
    }

    /// Port scanner configuration derived from these settings
    pub fn scanner_config(&self) -> ScannerConfig {
        ScannerConfig {
            skip_patterns: self.skip_patterns.clone(),
            usb_only: self.usb_only,
        }
    }
}
