// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use anyhow::{Context, Result};
use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Parser, Subcommand};
use std::fs::File;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use iptv_portal::Config;

mod cli;
use cli::{
    CategoriesCommand, CommandContext, EpgCommand, LinkCommand, ListCommand, OutputFormat,
    PreviewsCommand, SeasonsCommand, parse_kind,
};

fn cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Green.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Cyan.on_default())
}

#[derive(Parser)]
#[command(name = "iptv-portal")]
#[command(about = "Browse Stalker middleware portals from the command line")]
#[command(version)]
#[command(styles = cargo_style())]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging to file (iptv_portal_debug.log)
    #[arg(long, global = true)]
    debug_log: bool,

    /// Portal name to use (case-insensitive, or set IPTV_PORTAL env var)
    #[arg(short, long, global = true)]
    portal: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List categories of a content kind
    Categories {
        /// Content kind (live, vod, series)
        #[arg(short, long, default_value = "live")]
        kind: String,
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List the content of a category, page by page
    List {
        /// Content kind (live, vod, series)
        #[arg(short, long, default_value = "live")]
        kind: String,
        /// Category id, "*" for all categories
        #[arg(short, long)]
        category: String,
        /// Search phrase
        #[arg(short, long)]
        search: Option<String>,
        /// Number of pages to load
        #[arg(long, default_value_t = 1)]
        pages: usize,
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show the short EPG of a live channel
    Epg {
        /// Channel id
        #[arg(short, long)]
        channel: String,
        /// Number of programs
        #[arg(long, default_value_t = 10)]
        size: usize,
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show what is on now for the channels of a live category
    Previews {
        /// Category id, "*" for all categories
        #[arg(short, long)]
        category: String,
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Resolve a playable stream URL
    Link {
        /// Content kind (live, vod, series)
        #[arg(short, long, default_value = "live")]
        kind: String,
        /// Item command as returned by the portal
        #[arg(long)]
        cmd: String,
        /// Episode number for VOD series
        #[arg(short, long)]
        episode: Option<u32>,
    },

    /// List the seasons of a series
    Seasons {
        /// Series id
        id: String,
        /// Treat the id as a VOD item flagged as a series
        #[arg(long)]
        vod: bool,
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

fn init_logging(cli: &Cli) -> Result<()> {
    if cli.debug_log {
        let file = File::create("iptv_portal_debug.log")
            .context("Failed to create iptv_portal_debug.log")?;
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_level(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(file_layer)
            .with(
                EnvFilter::from_default_env()
                    .add_directive("iptv_portal=debug".parse()?)
                    .add_directive("hyper_util=error".parse()?),
            )
            .init();
    } else if cli.verbose {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                EnvFilter::from_default_env()
                    .add_directive(tracing::Level::DEBUG.into())
                    .add_directive("hyper_util=error".parse()?),
            )
            .init();
    } else if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                EnvFilter::from_default_env().add_directive("hyper_util=error".parse()?),
            )
            .init();
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let config = Config::load_or_default(Config::config_path())?;

    let selected_portal = cli
        .portal
        .clone()
        .or_else(|| std::env::var("IPTV_PORTAL").ok());
    let context = CommandContext::new(config, selected_portal);

    match cli.command {
        Commands::Categories { kind, format } => {
            let cmd = CategoriesCommand {
                kind: parse_kind(&kind)?,
                format: OutputFormat::from_str(&format)?,
            };
            cmd.execute(context).await?;
        }

        Commands::List {
            kind,
            category,
            search,
            pages,
            format,
        } => {
            let cmd = ListCommand {
                kind: parse_kind(&kind)?,
                category,
                search,
                pages,
                format: OutputFormat::from_str(&format)?,
            };
            cmd.execute(context).await?;
        }

        Commands::Epg {
            channel,
            size,
            format,
        } => {
            let cmd = EpgCommand {
                channel,
                size,
                format: OutputFormat::from_str(&format)?,
            };
            cmd.execute(context).await?;
        }

        Commands::Previews { category, format } => {
            let cmd = PreviewsCommand {
                category,
                format: OutputFormat::from_str(&format)?,
            };
            cmd.execute(context).await?;
        }

        Commands::Link { kind, cmd, episode } => {
            let cmd = LinkCommand {
                kind: parse_kind(&kind)?,
                cmd,
                episode,
            };
            cmd.execute(context).await?;
        }

        Commands::Seasons { id, vod, format } => {
            let cmd = SeasonsCommand {
                id,
                vod,
                format: OutputFormat::from_str(&format)?,
            };
            cmd.execute(context).await?;
        }
    }

    Ok(())
}
