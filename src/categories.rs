// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use crate::auth::AuthenticatedClient;
use crate::error::Result;
use crate::models::{Category, CategoryListResponse, ContentKind};
use crate::transport::QueryParams;
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct CacheState {
    lists: HashMap<ContentKind, Vec<Category>>,
    generation: u64,
}

/// Per-kind category lists, fetched once and reused until reset.
#[derive(Debug, Default)]
pub struct CategoryCache {
    state: Mutex<CacheState>,
}

impl CategoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_categories(
        &self,
        client: &AuthenticatedClient,
        kind: ContentKind,
    ) -> Result<Vec<Category>> {
        let generation = {
            let state = self.state.lock().await;
            if let Some(cached) = state.lists.get(&kind) {
                debug!(%kind, "Using {} cached categories", cached.len());
                return Ok(cached.clone());
            }
            state.generation
        };

        let params = QueryParams::action(kind.category_action()).with("type", kind.as_str());
        let response = client.execute(&params).await?;

        let raw = match CategoryListResponse::from_value(&response) {
            CategoryListResponse::Categories(raw) => raw,
            CategoryListResponse::Malformed => {
                warn!(%kind, "Invalid categories response: {}", truncate(&response.to_string()));
                return Ok(Vec::new());
            }
        };

        let categories = with_all_entry(raw.into_iter().map(Category::from).collect());

        let mut state = self.state.lock().await;
        if state.generation == generation {
            state.lists.insert(kind, categories.clone());
        } else {
            debug!(%kind, "Categories were reset during fetch, not caching");
        }

        Ok(categories)
    }

    pub async fn cached(&self, kind: ContentKind) -> Option<Vec<Category>> {
        self.state.lock().await.lists.get(&kind).cloned()
    }

    pub async fn set_categories(&self, kind: ContentKind, categories: Vec<Category>) {
        self.state.lock().await.lists.insert(kind, categories);
    }

    /// Number of cached categories excluding the "all" entry.
    pub async fn real_category_count(&self, kind: ContentKind) -> usize {
        self.state
            .lock()
            .await
            .lists
            .get(&kind)
            .map(|list| list.iter().filter(|c| !c.is_all()).count())
            .unwrap_or(0)
    }

    pub async fn selected_category_name(&self, kind: ContentKind, category_id: &str) -> String {
        if category_id.is_empty() {
            return String::new();
        }
        self.state
            .lock()
            .await
            .lists
            .get(&kind)
            .and_then(|list| list.iter().find(|c| c.category_id == category_id))
            .map(|c| c.category_name.clone())
            .unwrap_or_default()
    }

    /// Forget every kind. Fetches still in flight will not repopulate the cache.
    pub async fn reset_categories(&self) {
        let mut state = self.state.lock().await;
        state.lists.clear();
        state.generation += 1;
    }
}

/// Sort by name and put the synthetic "all" entry first when the portal lacks one.
fn with_all_entry(mut categories: Vec<Category>) -> Vec<Category> {
    categories.sort_by(|a, b| collate(&a.category_name, &b.category_name));

    if !categories.is_empty() && !categories.iter().any(Category::is_all) {
        categories.insert(0, Category::all());
    }
    categories
}

/// Case-insensitive first, then lower case before upper case.
fn collate(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| b.cmp(a))
}

fn truncate(text: &str) -> &str {
    let end = text
        .char_indices()
        .nth(200)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    &text[..end]
}
