// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use super::{CommandContext, OutputFormat, spinner};
use anyhow::Result;

use iptv_portal::{ContentKind, PageQuery};

pub struct EpgCommand {
    pub channel: String,
    pub size: usize,
    pub format: OutputFormat,
}

impl EpgCommand {
    pub async fn execute(self, context: CommandContext) -> Result<()> {
        let (portal, portal_name) = context.connect()?;
        eprintln!("Using portal: {}", portal_name);

        let pb = spinner(format!("Fetching EPG for channel {}...", self.channel));
        let programs = portal.fetch_channel_epg(&self.channel, self.size).await;
        pb.finish_and_clear();
        let programs = programs?;

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&programs)?),
            OutputFormat::Text => {
                if programs.is_empty() {
                    println!("No EPG data for channel {}", self.channel);
                }
                for program in programs {
                    println!("{} - {} | {}", program.start, program.end, program.title);
                }
            }
        }

        Ok(())
    }
}

/// Load the first page of a live category and show what is on now.
pub struct PreviewsCommand {
    pub category: String,
    pub format: OutputFormat,
}

impl PreviewsCommand {
    pub async fn execute(self, context: CommandContext) -> Result<()> {
        let (portal, portal_name) = context.connect()?;
        eprintln!("Using portal: {}", portal_name);

        let pb = spinner("Loading channels...");
        let channels = portal
            .get_page(&PageQuery::first(ContentKind::Itv, self.category.clone()))
            .await;
        pb.finish_and_clear();
        let channels = channels?;

        let ids: Vec<String> = channels.iter().map(|c| c.id.clone()).collect();
        let pb = spinner(format!("Loading previews for {} channels...", ids.len()));
        let run = portal.spawn_previews(ids).await;
        pb.finish_and_clear();
        let run = run?;
        tracing::debug!(
            batches = run.batches,
            "Loaded {} of {} previews",
            run.loaded,
            run.requested
        );

        let previews = portal.previews().previews().await;

        match self.format {
            OutputFormat::Json => {
                let rows: Vec<_> = channels
                    .iter()
                    .map(|c| {
                        serde_json::json!({
                            "id": c.id,
                            "name": c.title(),
                            "preview": previews.get(&c.id),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            }
            OutputFormat::Text => {
                for channel in &channels {
                    let now = match previews.get(&channel.id) {
                        Some(preview) => match preview.progress {
                            Some(progress) => format!("{} ({:.0}%)", preview.title, progress),
                            None => preview.title.clone(),
                        },
                        None => "-".to_string(),
                    };
                    println!("{:>8} | {:<30} | {}", channel.id, channel.title(), now);
                }
            }
        }

        Ok(())
    }
}
