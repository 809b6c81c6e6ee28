// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::Select;
use std::time::Duration;

use iptv_portal::config::{Config, PortalConfig};
use iptv_portal::{ContentKind, Portal};

pub mod browse;
pub mod epg;
pub mod play;

pub use browse::{CategoriesCommand, ListCommand, SeasonsCommand};
pub use epg::{EpgCommand, PreviewsCommand};
pub use play::LinkCommand;

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => anyhow::bail!("Invalid format: {}. Use 'text' or 'json'", s),
        }
    }
}

pub fn parse_kind(s: &str) -> Result<ContentKind> {
    s.parse::<ContentKind>().map_err(|e| anyhow::anyhow!(e))
}

/// Context for command execution with portal selection
pub struct CommandContext {
    pub config: Config,
    pub selected_portal: Option<String>,
}

impl CommandContext {
    pub fn new(config: Config, selected_portal: Option<String>) -> Self {
        Self {
            config,
            selected_portal,
        }
    }

    /// Connect to the named portal, the only configured one, or a prompted choice
    pub fn connect(&self) -> Result<(Portal, String)> {
        let portal_config = self.select_portal()?;
        let name = portal_config.display_name();

        let portal = Portal::connect(
            portal_config.clone(),
            &self.config.client,
            self.config.epg.clone(),
        )?;

        Ok((portal, name))
    }

    fn select_portal(&self) -> Result<&PortalConfig> {
        let portals = &self.config.portals;
        if portals.is_empty() {
            anyhow::bail!(
                "No portals configured. Please add portal details to {}",
                Config::config_path().display()
            );
        }

        if let Some(name) = &self.selected_portal {
            return self
                .config
                .find_portal(name)
                .ok_or_else(|| anyhow::anyhow!("Portal '{}' not found", name));
        }

        if portals.len() == 1 {
            return Ok(&portals[0]);
        }

        let names: Vec<String> = portals.iter().map(PortalConfig::display_name).collect();
        let selection = Select::new("Select portal:", names).prompt()?;

        portals
            .iter()
            .find(|p| p.display_name() == selection)
            .ok_or_else(|| anyhow::anyhow!("Portal not found"))
    }
}

pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠁", "⠂", "⠄", "⡀", "⢀", "⠠", "⠐", "⠈"]),
    );
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}
