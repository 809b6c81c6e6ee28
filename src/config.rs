// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Serial number sent to portals when none is configured.
pub const DEFAULT_SERIAL_NUMBER: &str = "BEDACD4569BAF";

pub const STB_USER_AGENT: &str = "Mozilla/5.0 (QtEmbedded; U; Linux; C) AppleWebKit/533.3 (KHTML, like Gecko) MAG200 stbapp ver: 2 rev: 250 Safari/533.3";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub portals: Vec<PortalConfig>,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub epg: EpgConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    pub name: Option<String>,
    pub url: String,
    pub mac_address: String,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub device_id1: Option<String>,
    #[serde(default)]
    pub device_id2: Option<String>,
    #[serde(default)]
    pub signature1: Option<String>,
    #[serde(default)]
    pub signature2: Option<String>,
}

impl PortalConfig {
    pub fn new(url: impl Into<String>, mac_address: impl Into<String>) -> Self {
        Self {
            name: None,
            url: url.into(),
            mac_address: mac_address.into(),
            serial_number: None,
            device_id1: None,
            device_id2: None,
            signature1: None,
            signature2: None,
        }
    }

    /// Full portals need a handshake before any content call.
    pub fn is_full_portal(&self) -> bool {
        self.url.contains("/stalker_portal/") || self.url.contains("/server/load.php")
    }

    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{}@{}", self.mac_address, self.url))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
    pub x_user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            user_agent: STB_USER_AGENT.to_string(),
            x_user_agent: "Model: MAG250; Link: WiFi".to_string(),
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EpgConfig {
    /// Preview requests issued together.
    pub batch_size: usize,
    /// Pause between two preview batches.
    pub batch_delay_ms: u64,
    pub preview_size: usize,
    pub page_size: usize,
}

impl Default for EpgConfig {
    fn default() -> Self {
        Self {
            batch_size: 3,
            batch_delay_ms: 150,
            preview_size: 1,
            page_size: 10,
        }
    }
}

impl EpgConfig {
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;

        Ok(config)
    }

    /// Like `load`, but a missing file gives the default config.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Config> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).with_context(|| "Failed to serialize config to TOML")?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .map(|p| p.join("iptv-portal").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Find a portal by name, case-insensitively.
    pub fn find_portal(&self, name: &str) -> Option<&PortalConfig> {
        let wanted = name.to_lowercase();
        self.portals.iter().find(|p| {
            p.name
                .as_ref()
                .map(|n| n.to_lowercase() == wanted)
                .unwrap_or(false)
        })
    }
}
