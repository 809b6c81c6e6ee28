// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

//! Paged catalog lists with accumulation across pages.
//!
//! One cursor tracks the list currently on screen. Page 1 replaces the
//! accumulated items, later pages append. A request that completes after the
//! cursor moved on (different kind, category or search, or a newer page 1) is
//! dropped instead of being merged into the wrong list.

use crate::auth::AuthenticatedClient;
use crate::error::Result;
use crate::models::{ALL_CATEGORY_ID, ContentItem, ContentKind, ContentPageResponse};
use crate::transport::QueryParams;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Parameters of one `get_ordered_list` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub kind: ContentKind,
    pub category_id: Option<String>,
    pub search: String,
    /// 1-based.
    pub page: usize,
}

impl PageQuery {
    pub fn first(kind: ContentKind, category_id: impl Into<String>) -> Self {
        Self {
            kind,
            category_id: Some(category_id.into()),
            search: String::new(),
            page: 1,
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    pub fn with_page(mut self, page: usize) -> Self {
        self.page = page.max(1);
        self
    }

    fn selected_category(&self) -> Option<&str> {
        self.category_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    fn to_params(&self, category_id: &str) -> QueryParams {
        let mut params = QueryParams::action("get_ordered_list")
            .with("type", self.kind.as_str())
            .with("sortby", "added");

        let search = self.search.trim();
        if !search.is_empty() {
            params.set("search", search);
        }

        match self.kind {
            ContentKind::Vod => {
                params.set("genre", 0);
                params.set("category", category_id);
            }
            ContentKind::Series => {
                params.set("category", category_id);
            }
            // Portals disagree on which one filters live channels.
            ContentKind::Itv => {
                params.set("category", category_id);
                params.set("genre", category_id);
            }
        }

        params.with("p", self.page)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageCursor {
    pub kind: Option<ContentKind>,
    pub category_id: String,
    pub search: String,
    /// Last page merged into the accumulated list, 0 when nothing is loaded.
    pub page: usize,
    pub total_items: usize,
    pub has_more: bool,
}

impl PageCursor {
    fn for_query(kind: ContentKind, category_id: &str, search: &str) -> Self {
        Self {
            kind: Some(kind),
            category_id: category_id.to_string(),
            search: search.trim().to_string(),
            ..Default::default()
        }
    }

    fn matches(&self, kind: ContentKind, category_id: &str, search: &str) -> bool {
        self.kind == Some(kind) && self.category_id == category_id && self.search == search.trim()
    }

    pub fn total_pages(&self, limit: usize) -> usize {
        if limit == 0 {
            return 0;
        }
        self.total_items.div_ceil(limit)
    }
}

#[derive(Debug, Default)]
struct ListState {
    cursor: PageCursor,
    items: Vec<ContentItem>,
    generation: u64,
}

impl ListState {
    fn restart(&mut self, cursor: PageCursor) {
        self.cursor = cursor;
        self.items.clear();
        self.generation += 1;
    }
}

#[derive(Debug, Default)]
pub struct ContentResource {
    state: Mutex<ListState>,
}

impl ContentResource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch one page and merge it into the accumulated list.
    ///
    /// Returns the items of this page only. `real_categories` is the number of
    /// categories the portal reported for `query.kind`, excluding "all".
    pub async fn get_page(
        &self,
        client: &AuthenticatedClient,
        portal_url: &str,
        query: &PageQuery,
        real_categories: usize,
    ) -> Result<Vec<ContentItem>> {
        let Some(category_id) = query.selected_category() else {
            debug!(kind = %query.kind, "No category selected");
            self.state.lock().await.restart(PageCursor::default());
            return Ok(Vec::new());
        };

        if category_id == ALL_CATEGORY_ID
            && matches!(query.kind, ContentKind::Vod | ContentKind::Series)
            && real_categories == 0
        {
            debug!(kind = %query.kind, "Portal has no categories, nothing to list");
            let mut state = self.state.lock().await;
            state.restart(PageCursor::for_query(query.kind, category_id, &query.search));
            return Ok(Vec::new());
        }

        let generation = {
            let mut state = self.state.lock().await;
            if query.page == 1 {
                // Supersede in-flight pages; the list itself is replaced on success.
                state.generation += 1;
            } else if !state.cursor.matches(query.kind, category_id, &query.search) {
                debug!(
                    kind = %query.kind,
                    category = category_id,
                    page = query.page,
                    "Page requested for a list that is no longer active"
                );
                return Ok(Vec::new());
            }
            state.generation
        };

        let response = client.execute(&query.to_params(category_id)).await?;

        let page = match ContentPageResponse::from_value(&response) {
            ContentPageResponse::Page(page) => page,
            ContentPageResponse::Malformed => {
                warn!(
                    kind = %query.kind,
                    category = category_id,
                    page = query.page,
                    "Invalid content response, keeping current list"
                );
                return Ok(Vec::new());
            }
        };

        let items: Vec<ContentItem> = page
            .items
            .into_iter()
            .map(|item| item.normalize(portal_url))
            .collect();

        let mut state = self.state.lock().await;
        let expected_page = if query.page == 1 {
            1
        } else {
            state.cursor.page + 1
        };
        let current = query.page == 1
            || state
                .cursor
                .matches(query.kind, category_id, &query.search);
        if state.generation != generation || query.page != expected_page || !current {
            debug!(
                kind = %query.kind,
                category = category_id,
                page = query.page,
                expected_page,
                "Discarding stale page"
            );
            return Ok(Vec::new());
        }

        if query.page == 1 {
            state.cursor = PageCursor::for_query(query.kind, category_id, &query.search);
            state.items = items.clone();
        } else {
            state.items.extend(items.iter().cloned());
        }
        state.cursor.page = query.page;
        state.cursor.total_items = page.total_items;
        state.cursor.has_more = state.items.len() < page.total_items;

        debug!(
            kind = %query.kind,
            category = category_id,
            page = query.page,
            "Loaded {} items ({} of {})",
            items.len(),
            state.items.len(),
            page.total_items
        );

        Ok(items)
    }

    /// Query for the page after the last one merged, if the portal reported more.
    pub async fn next_page(&self) -> Option<PageQuery> {
        let state = self.state.lock().await;
        let cursor = &state.cursor;
        let kind = cursor.kind?;
        if !cursor.has_more || cursor.page == 0 {
            return None;
        }
        Some(
            PageQuery::first(kind, cursor.category_id.clone())
                .with_search(cursor.search.clone())
                .with_page(cursor.page + 1),
        )
    }

    pub async fn items(&self) -> Vec<ContentItem> {
        self.state.lock().await.items.clone()
    }

    pub async fn cursor(&self) -> PageCursor {
        self.state.lock().await.cursor.clone()
    }

    pub async fn has_more(&self) -> bool {
        self.state.lock().await.cursor.has_more
    }

    pub async fn total_pages(&self, limit: usize) -> usize {
        self.state.lock().await.cursor.total_pages(limit)
    }

    pub async fn reset(&self) {
        self.state.lock().await.restart(PageCursor::default());
    }
}
