// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use super::{CommandContext, OutputFormat, spinner};
use anyhow::Result;
use serde_json::json;

use iptv_portal::{ContentItem, ContentKind, PageQuery};

pub struct CategoriesCommand {
    pub kind: ContentKind,
    pub format: OutputFormat,
}

impl CategoriesCommand {
    pub async fn execute(self, context: CommandContext) -> Result<()> {
        let (portal, portal_name) = context.connect()?;
        eprintln!("Using portal: {}", portal_name);

        let pb = spinner(format!("Fetching {} categories...", self.kind));
        let categories = portal.get_categories(self.kind).await;
        pb.finish_and_clear();
        let categories = categories?;

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&categories)?),
            OutputFormat::Text => {
                if categories.is_empty() {
                    println!("No {} categories found", self.kind);
                }
                for category in categories {
                    println!("{:>8} | {}", category.category_id, category.category_name);
                }
            }
        }

        Ok(())
    }
}

pub struct ListCommand {
    pub kind: ContentKind,
    pub category: String,
    pub search: Option<String>,
    pub pages: usize,
    pub format: OutputFormat,
}

impl ListCommand {
    pub async fn execute(self, context: CommandContext) -> Result<()> {
        let (portal, portal_name) = context.connect()?;
        eprintln!("Using portal: {}", portal_name);

        let query = PageQuery::first(self.kind, self.category.clone())
            .with_search(self.search.clone().unwrap_or_default());

        let pb = spinner(format!("Loading page 1 of {}...", self.kind));
        let result = portal.get_page(&query).await;
        pb.finish_and_clear();
        result?;

        for page in 2..=self.pages.max(1) {
            if !portal.content().has_more().await {
                break;
            }
            let pb = spinner(format!("Loading page {}...", page));
            let result = portal.load_more().await;
            pb.finish_and_clear();
            result?;
        }

        let items = portal.content().items().await;
        let cursor = portal.content().cursor().await;
        let category_name = portal
            .selected_category_name(self.kind, &self.category)
            .await;

        match self.format {
            OutputFormat::Json => {
                let output = json!({
                    "kind": self.kind,
                    "category_id": cursor.category_id,
                    "category_name": category_name,
                    "page": cursor.page,
                    "total_items": cursor.total_items,
                    "total_pages": cursor.total_pages(portal.page_size()),
                    "has_more": cursor.has_more,
                    "items": items,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Text => {
                if items.is_empty() {
                    println!("No {} found", self.kind);
                    return Ok(());
                }
                if !category_name.is_empty() {
                    println!("{}:", category_name);
                }
                for item in &items {
                    print_item(item);
                }
                println!(
                    "\n{} of {} items{}",
                    items.len(),
                    cursor.total_items,
                    if cursor.has_more { ", more available" } else { "" }
                );
            }
        }

        Ok(())
    }
}

fn print_item(item: &ContentItem) {
    let marker = if item.has_series() { " [series]" } else { "" };
    match &item.number {
        Some(number) => println!("{:>8} | {:>4} | {}{}", item.id, number, item.title(), marker),
        None => println!("{:>8} | {}{}", item.id, item.title(), marker),
    }
}

pub struct SeasonsCommand {
    pub id: String,
    /// VOD item flagged as a series rather than a regular series.
    pub vod: bool,
    pub format: OutputFormat,
}

impl SeasonsCommand {
    pub async fn execute(self, context: CommandContext) -> Result<()> {
        let (portal, portal_name) = context.connect()?;
        eprintln!("Using portal: {}", portal_name);

        let pb = spinner("Fetching seasons...");
        let output = if self.vod {
            let seasons = portal.vod_series_seasons(&self.id).await;
            pb.finish_and_clear();
            let seasons = seasons?;
            if let OutputFormat::Text = self.format {
                for season in &seasons {
                    let number = season
                        .season_number
                        .map(|n| n.to_string())
                        .unwrap_or_default();
                    println!("{:>8} | {:>3} | {}", season.id, number, season.name);
                }
            }
            serde_json::to_value(&seasons)?
        } else {
            let seasons = portal.series_seasons(&self.id).await;
            pb.finish_and_clear();
            let seasons = seasons?;
            if let OutputFormat::Text = self.format {
                for season in &seasons {
                    println!("{:>8} | {} ({} episodes)", season.id, season.name, season.series.len());
                }
            }
            serde_json::to_value(&seasons)?
        };

        if let OutputFormat::Json = self.format {
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Ok(())
    }
}
