// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use crate::auth::AuthenticatedClient;
use crate::config::EpgConfig;
use crate::error::Result;
use crate::models::{EpgPreview, EpgProgram};
use crate::transport::QueryParams;
use async_trait::async_trait;
use chrono::Utc;
use futures_util::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

/// Short EPG for one live channel.
pub async fn fetch_channel_epg(
    client: &AuthenticatedClient,
    channel_id: &str,
    size: usize,
) -> Result<Vec<EpgProgram>> {
    let params = QueryParams::action("get_short_epg")
        .with("type", "itv")
        .with("ch_id", channel_id)
        .with("size", size);

    let response = client.execute(&params).await?;
    let programs = EpgProgram::list_from_value(&response, channel_id);
    debug!(channel = channel_id, "Fetched {} EPG entries", programs.len());
    Ok(programs)
}

#[async_trait]
pub trait EpgSource: Send + Sync {
    async fn fetch_channel_epg(&self, channel_id: &str, size: usize) -> Result<Vec<EpgProgram>>;
}

#[async_trait]
impl EpgSource for AuthenticatedClient {
    async fn fetch_channel_epg(&self, channel_id: &str, size: usize) -> Result<Vec<EpgProgram>> {
        fetch_channel_epg(self, channel_id, size).await
    }
}

/// Outcome of one `load_previews` run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreviewRun {
    pub requested: usize,
    pub batches: usize,
    pub loaded: usize,
}

#[derive(Debug, Default)]
struct PreviewState {
    previews: HashMap<String, EpgPreview>,
    requested: HashSet<String>,
    generation: u64,
}

/// Now-playing previews for the channels of the current category.
#[derive(Debug)]
pub struct EpgPreviews {
    config: EpgConfig,
    state: Mutex<PreviewState>,
}

impl EpgPreviews {
    pub fn new(config: EpgConfig) -> Self {
        Self {
            config,
            state: Mutex::new(PreviewState::default()),
        }
    }

    /// Fetch previews for channels not requested since the last `clear`.
    ///
    /// Requests run `batch_size` at a time with `batch_delay` between batches.
    /// A channel whose fetch fails is left without a preview.
    pub async fn load_previews(&self, source: &dyn EpgSource, channel_ids: &[String]) -> PreviewRun {
        let (pending, generation) = {
            let mut state = self.state.lock().await;
            let mut pending = Vec::new();
            for id in channel_ids {
                let id = id.trim();
                if !id.is_empty() && state.requested.insert(id.to_string()) {
                    pending.push(id.to_string());
                }
            }
            (pending, state.generation)
        };

        let mut run = PreviewRun {
            requested: pending.len(),
            ..Default::default()
        };
        if pending.is_empty() {
            return run;
        }

        let batch_size = self.config.batch_size.max(1);
        let batch_count = pending.len().div_ceil(batch_size);

        for (index, batch) in pending.chunks(batch_size).enumerate() {
            if self.state.lock().await.generation != generation {
                debug!("Category changed, stopping preview load");
                break;
            }

            debug!(batch = index + 1, of = batch_count, "Loading {} previews", batch.len());
            run.batches += 1;

            let results = join_all(batch.iter().map(|id| self.load_single(source, id))).await;

            let mut state = self.state.lock().await;
            if state.generation != generation {
                debug!("Category changed, dropping preview batch");
                break;
            }
            for preview in results.into_iter().flatten() {
                state.previews.insert(preview.channel_id.clone(), preview);
                run.loaded += 1;
            }
            drop(state);

            if index + 1 < batch_count {
                tokio::time::sleep(self.config.batch_delay()).await;
            }
        }

        run
    }

    /// Run `load_previews` in the background.
    pub fn spawn_load(
        self: &Arc<Self>,
        source: Arc<dyn EpgSource>,
        channel_ids: Vec<String>,
    ) -> JoinHandle<PreviewRun> {
        let previews = Arc::clone(self);
        tokio::spawn(async move { previews.load_previews(source.as_ref(), &channel_ids).await })
    }

    async fn load_single(&self, source: &dyn EpgSource, channel_id: &str) -> Option<EpgPreview> {
        match source
            .fetch_channel_epg(channel_id, self.config.preview_size)
            .await
        {
            Ok(programs) => programs
                .first()
                .map(|program| EpgPreview::from_program(channel_id, program, Utc::now())),
            Err(e) => {
                debug!(channel = channel_id, "Preview fetch failed: {}", e);
                None
            }
        }
    }

    pub async fn preview(&self, channel_id: &str) -> Option<EpgPreview> {
        self.state.lock().await.previews.get(channel_id).cloned()
    }

    pub async fn previews(&self) -> HashMap<String, EpgPreview> {
        self.state.lock().await.previews.clone()
    }

    pub async fn was_requested(&self, channel_id: &str) -> bool {
        self.state.lock().await.requested.contains(channel_id)
    }

    /// Drop all previews and the requested set, e.g. when the category changes.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.previews.clear();
        state.requested.clear();
        state.generation += 1;
    }
}
