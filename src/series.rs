// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

//! Seasons and episodes.
//!
//! Regular series list their seasons under `type=series`. VOD items flagged
//! `is_series` (Ministra plugin) list seasons and episodes under `type=vod`.

use crate::auth::AuthenticatedClient;
use crate::error::Result;
use crate::models::{Season, VodEpisode, VodSeason, data_entries};
use crate::transport::QueryParams;
use tracing::{debug, warn};

pub async fn get_series_seasons(
    client: &AuthenticatedClient,
    series_id: &str,
) -> Result<Vec<Season>> {
    let movie_id = to_movie_id(series_id);
    if movie_id.is_empty() {
        return Ok(Vec::new());
    }

    let params = QueryParams::action("get_ordered_list")
        .with("type", "series")
        .with("movie_id", movie_id);
    let response = client.execute(&params).await?;

    let Some(mut seasons) = data_entries::<Season>(&response) else {
        warn!(series = movie_id, "Invalid seasons response");
        return Ok(Vec::new());
    };

    seasons.sort_by_key(|s| extract_numeric_value(&s.name));
    Ok(seasons)
}

pub async fn get_vod_series_seasons(
    client: &AuthenticatedClient,
    movie_id: &str,
) -> Result<Vec<VodSeason>> {
    let params = QueryParams::action("get_ordered_list")
        .with("type", "vod")
        .with("movie_id", movie_id)
        .with("p", 1);
    let response = client.execute(&params).await?;

    let Some(entries) = data_entries::<VodSeason>(&response) else {
        debug!(movie = movie_id, "No VOD series seasons");
        return Ok(Vec::new());
    };

    let mut seasons: Vec<_> = entries.into_iter().filter(|s| s.is_season).collect();
    seasons.sort_by_key(|s| s.season_number.unwrap_or(0));
    Ok(seasons)
}

pub async fn get_vod_series_episodes(
    client: &AuthenticatedClient,
    video_id: &str,
    season_id: &str,
) -> Result<Vec<VodEpisode>> {
    let params = QueryParams::action("get_ordered_list")
        .with("type", "vod")
        .with("movie_id", video_id)
        .with("season_id", season_id)
        .with("p", 1);
    let response = client.execute(&params).await?;

    let Some(entries) = data_entries::<VodEpisode>(&response) else {
        return Ok(Vec::new());
    };

    let mut episodes: Vec<_> = entries.into_iter().filter(|e| e.is_episode).collect();
    episodes.sort_by_key(|e| e.series_number.unwrap_or(0));
    Ok(episodes)
}

/// Series ids may carry a `:<suffix>`; the portal only wants the leading part.
fn to_movie_id(series_id: &str) -> &str {
    series_id.split(':').next().unwrap_or_default().trim()
}

/// First run of digits in `text`, or 0.
pub fn extract_numeric_value(text: &str) -> u64 {
    text.split(|c: char| !c.is_ascii_digit())
        .find(|part| !part.is_empty())
        .and_then(|digits| digits.parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PortalConfig;
    use crate::session::SessionProvider;
    use crate::testing::ScriptedTransport;
    use serde_json::{Value, json};
    use std::sync::Arc;

    fn client(response: Value) -> (AuthenticatedClient, Arc<ScriptedTransport>) {
        let transport = Arc::new(ScriptedTransport::new(move |_, _| Ok(response.clone())));
        let portal = PortalConfig::new("http://portal.example/c/", "00:1A:79:00:00:01");
        let session = Arc::new(SessionProvider::new(portal, transport.clone()));
        (AuthenticatedClient::new(transport.clone(), session), transport)
    }

    #[test]
    fn numeric_value_is_first_digit_run() {
        assert_eq!(extract_numeric_value("Season 10"), 10);
        assert_eq!(extract_numeric_value("S2 E4"), 2);
        assert_eq!(extract_numeric_value("Specials"), 0);
    }

    #[tokio::test]
    async fn seasons_sort_numerically_and_strip_suffix() {
        let (client, transport) = client(json!({ "js": { "data": [
            { "id": "12:3", "name": "Season 10" },
            { "id": "12:1", "name": "Season 2" },
            { "id": "12:2", "name": "Season 1", "series": [1, 2, 3] }
        ]}}));

        let seasons = get_series_seasons(&client, "12:abc").await.unwrap();

        let names: Vec<_> = seasons.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["Season 1", "Season 2", "Season 10"]);
        assert_eq!(seasons[0].series.len(), 3);

        let params = &transport.calls()[0].params;
        assert_eq!(params.get("type"), Some("series"));
        assert_eq!(params.get("movie_id"), Some("12"));
    }

    #[tokio::test]
    async fn malformed_seasons_response_is_empty() {
        let (client, _) = client(json!({ "js": [] }));
        assert!(get_series_seasons(&client, "12").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn vod_series_keeps_only_flagged_entries() {
        let (client, _) = client(json!({ "js": { "data": [
            { "id": 3, "name": "Season 3", "season_number": "3", "is_season": true },
            { "id": 9, "name": "Trailer", "is_season": false },
            { "id": 1, "name": "Season 1", "season_number": 1, "is_season": 1 }
        ]}}));

        let seasons = get_vod_series_seasons(&client, "40").await.unwrap();
        let ids: Vec<_> = seasons.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["1", "3"]);
    }

    #[tokio::test]
    async fn vod_episodes_sort_by_series_number() {
        let (client, transport) = client(json!({ "js": { "data": [
            { "id": 12, "name": "Ep 10", "series_number": "10", "is_episode": true },
            { "id": 11, "name": "Ep 2", "series_number": 2, "is_episode": true },
            { "id": 10, "name": "Season", "is_episode": false }
        ]}}));

        let episodes = get_vod_series_episodes(&client, "40", "1").await.unwrap();
        let names: Vec<_> = episodes.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Ep 2", "Ep 10"]);
        assert_eq!(transport.calls()[0].params.get("season_id"), Some("1"));
    }
}
