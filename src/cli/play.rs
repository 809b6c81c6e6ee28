// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use super::{CommandContext, spinner};
use anyhow::{Context, Result};

use iptv_portal::{ContentKind, PortalError};

pub struct LinkCommand {
    pub kind: ContentKind,
    pub cmd: String,
    pub episode: Option<u32>,
}

impl LinkCommand {
    pub async fn execute(self, context: CommandContext) -> Result<()> {
        let (portal, portal_name) = context.connect()?;
        eprintln!("Using portal: {}", portal_name);

        let pb = spinner("Resolving stream link...");
        let link = portal.create_link(self.kind, &self.cmd, self.episode).await;
        pb.finish_and_clear();

        match link {
            Ok(url) => {
                println!("{}", url);
                Ok(())
            }
            Err(PortalError::NothingToPlay) => {
                eprintln!("Nothing to play: the portal returned no stream for this item");
                Ok(())
            }
            Err(e) => Err(e).context("Failed to resolve stream link"),
        }
    }
}
