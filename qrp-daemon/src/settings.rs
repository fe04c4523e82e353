//! Daemon settings

use std::path::PathBuf;

use anyhow::Context;
use qrp_link::BridgeConfig;
use serde::{Deserialize, Serialize};

/// Daemon settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Serial port path; `None` scans for a likely radio port
    #[serde(default)]
    pub port: Option<String>,
    /// Serial baud rate
    #[serde(default = "default_baud")]
    pub baud_rate: u32,
    /// Address the TCP listener binds; clients speak raw CAT frames
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Serve a simulated transceiver instead of hardware
    #[serde(default)]
    pub simulate: bool,
    /// Bridge actor configuration
    #[serde(default)]
    pub bridge: BridgeConfig,
}

fn default_baud() -> u32 {
    38_400
}

fn default_listen_addr() -> String {
    "127.0.0.1:4520".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: default_baud(),
            listen_addr: default_listen_addr(),
            simulate: false,
            bridge: BridgeConfig::default(),
        }
    }
}

impl Settings {
    /// Config directory per XDG conventions, `~/.config/qrplink` by default
    fn config_dir() -> Option<PathBuf> {
        // XDG requires XDG_CONFIG_HOME to be absolute; ignore it otherwise
        match std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from) {
            Some(base) if base.is_absolute() => Some(base.join("qrplink")),
            _ => dirs::home_dir().map(|home| home.join(".config").join("qrplink")),
        }
    }

    /// Path of the settings file
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("settings.json"))
    }

    /// Load settings, falling back to defaults when missing or unreadable
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else {
            return Self::default();
        };
        match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    /// Persist settings, creating the config directory if needed
    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::settings_path().context("could not determine the settings path")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("could not create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(self).context("could not serialize settings")?;
        std::fs::write(&path, json).with_context(|| format!("could not write {}", path.display()))
    }
}
