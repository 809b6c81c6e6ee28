// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use crate::auth::AuthenticatedClient;
use crate::categories::CategoryCache;
use crate::config::{ClientConfig, EpgConfig, PortalConfig};
use crate::content::{ContentResource, PageQuery};
use crate::epg::{self, EpgPreviews, EpgSource, PreviewRun};
use crate::error::Result;
use crate::link;
use crate::models::{
    ALL_CATEGORY_ID, Category, ContentItem, ContentKind, EpgProgram, Season, VodEpisode, VodSeason,
};
use crate::series;
use crate::session::{AccountInfo, SessionProvider};
use crate::transport::{HttpTransport, Transport};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Everything held for one connected portal.
///
/// Caches live as long as the `Portal`; `reset` discards them when switching
/// to another portal.
#[derive(Debug)]
pub struct Portal {
    config: PortalConfig,
    client: AuthenticatedClient,
    categories: CategoryCache,
    content: ContentResource,
    previews: Arc<EpgPreviews>,
    epg: EpgConfig,
}

impl Portal {
    pub fn connect(config: PortalConfig, client: &ClientConfig, epg: EpgConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(&config, client)?);
        Ok(Self::with_transport(config, transport, epg))
    }

    pub fn with_transport(config: PortalConfig, transport: Arc<dyn Transport>, epg: EpgConfig) -> Self {
        info!(
            full = config.is_full_portal(),
            "Connecting to portal {}",
            config.display_name()
        );
        let session = Arc::new(SessionProvider::new(config.clone(), transport.clone()));
        Self {
            client: AuthenticatedClient::new(transport, session),
            categories: CategoryCache::new(),
            content: ContentResource::new(),
            previews: Arc::new(EpgPreviews::new(epg.clone())),
            config,
            epg,
        }
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    pub fn client(&self) -> &AuthenticatedClient {
        &self.client
    }

    pub fn content(&self) -> &ContentResource {
        &self.content
    }

    pub fn previews(&self) -> &Arc<EpgPreviews> {
        &self.previews
    }

    pub async fn account_info(&self) -> Option<AccountInfo> {
        self.client.session().account_info().await
    }

    pub async fn get_categories(&self, kind: ContentKind) -> Result<Vec<Category>> {
        self.categories.get_categories(&self.client, kind).await
    }

    pub async fn selected_category_name(&self, kind: ContentKind, category_id: &str) -> String {
        self.categories
            .selected_category_name(kind, category_id)
            .await
    }

    /// Fetch a page of the list described by `query` and merge it.
    ///
    /// Switching the live category drops the EPG previews of the old one.
    pub async fn get_page(&self, query: &PageQuery) -> Result<Vec<ContentItem>> {
        let category_id = query.category_id.as_deref().unwrap_or_default().trim();

        if query.kind == ContentKind::Itv && query.page == 1 {
            let cursor = self.content.cursor().await;
            if cursor.kind != Some(ContentKind::Itv) || cursor.category_id != category_id {
                debug!(category = category_id, "Live category changed, clearing previews");
                self.previews.clear().await;
            }
        }

        let real_categories = if category_id == ALL_CATEGORY_ID {
            self.get_categories(query.kind).await?;
            self.categories.real_category_count(query.kind).await
        } else {
            self.categories.real_category_count(query.kind).await
        };

        self.content
            .get_page(&self.client, &self.config.url, query, real_categories)
            .await
    }

    /// Fetch the page after the last one loaded. Empty when the list is complete.
    pub async fn load_more(&self) -> Result<Vec<ContentItem>> {
        match self.content.next_page().await {
            Some(query) => self.get_page(&query).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn fetch_channel_epg(&self, channel_id: &str, size: usize) -> Result<Vec<EpgProgram>> {
        epg::fetch_channel_epg(&self.client, channel_id, size).await
    }

    pub async fn load_previews(&self, channel_ids: &[String]) -> PreviewRun {
        self.previews.load_previews(&self.client, channel_ids).await
    }

    /// Load previews in the background; results land in `previews()`.
    pub fn spawn_previews(&self, channel_ids: Vec<String>) -> JoinHandle<PreviewRun> {
        let source: Arc<dyn EpgSource> = Arc::new(self.client.clone());
        self.previews.spawn_load(source, channel_ids)
    }

    pub async fn create_link(&self, kind: ContentKind, cmd: &str, series: Option<u32>) -> Result<String> {
        link::create_link(&self.client, &self.config.url, kind, cmd, series).await
    }

    pub async fn movie_file_id(&self, movie_id: &str) -> Result<Option<String>> {
        link::fetch_movie_file_id(&self.client, movie_id).await
    }

    pub async fn series_seasons(&self, series_id: &str) -> Result<Vec<Season>> {
        series::get_series_seasons(&self.client, series_id).await
    }

    pub async fn vod_series_seasons(&self, movie_id: &str) -> Result<Vec<VodSeason>> {
        series::get_vod_series_seasons(&self.client, movie_id).await
    }

    pub async fn vod_series_episodes(&self, video_id: &str, season_id: &str) -> Result<Vec<VodEpisode>> {
        series::get_vod_series_episodes(&self.client, video_id, season_id).await
    }

    /// Forget categories, the current list, previews and the session token.
    pub async fn reset(&self) {
        info!("Resetting state for {}", self.config.display_name());
        self.categories.reset_categories().await;
        self.content.reset().await;
        self.previews.clear().await;
        self.client.session().invalidate().await;
    }

    pub fn page_size(&self) -> usize {
        self.epg.page_size
    }
}
