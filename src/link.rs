// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use crate::auth::AuthenticatedClient;
use crate::error::{PortalError, Result};
use crate::models::{ContentKind, normalize_entity_id};
use crate::transport::QueryParams;
use serde_json::Value;
use tracing::{debug, error};
use url::Url;

/// Ask the portal for a playable URL for `cmd`.
///
/// Episodes of a VOD series pass their episode number as `series` and are
/// always requested as `vod`.
pub async fn create_link(
    client: &AuthenticatedClient,
    portal_url: &str,
    kind: ContentKind,
    cmd: &str,
    series: Option<u32>,
) -> Result<String> {
    let link_type = if series.is_some() {
        ContentKind::Vod
    } else {
        kind
    };

    let mut params = QueryParams::action("create_link")
        .with("cmd", cmd)
        .with("type", link_type.as_str())
        .with("disable_ad", 0)
        .with("download", 0)
        .with("JsHttpRequest", "1-xml");
    if let Some(series) = series {
        params.set("series", series);
    }

    let response = client.execute(&params).await?;
    let js = response.get("js");

    if let Some(message) = js
        .and_then(|js| js.get("error"))
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
    {
        error!("Portal refused link: {}", message);
        return Err(PortalError::Server(message.to_string()));
    }

    let link = js
        .and_then(|js| js.get("cmd"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    if link.is_empty() {
        return Err(PortalError::NothingToPlay);
    }

    let resolved = resolve_stream_url(portal_url, cmd, strip_player_prefix(link));
    debug!(%kind, "Resolved stream link {}", resolved);
    Ok(resolved)
}

/// Id of the playable file behind a VOD item.
pub async fn fetch_movie_file_id(
    client: &AuthenticatedClient,
    movie_id: &str,
) -> Result<Option<String>> {
    let params = QueryParams::action("get_ordered_list")
        .with("type", "vod")
        .with("movie_id", movie_id)
        .with("p", 1);

    let response = client.execute(&params).await?;
    let id = response
        .pointer("/js/data/0/id")
        .map(normalize_entity_id)
        .filter(|id| !id.is_empty());
    Ok(id)
}

/// Links of the form `ffmpeg http://...` carry the player name first.
fn strip_player_prefix(link: &str) -> &str {
    match link.strip_prefix("ffmpeg") {
        Some(rest) => rest.split_whitespace().next().unwrap_or_default(),
        None => link,
    }
}

/// Complete links that came back as a bare query or a root-relative path.
fn resolve_stream_url(portal_url: &str, cmd: &str, link: &str) -> String {
    if link.is_empty() || link.starts_with("http://") || link.starts_with("https://") {
        return link.to_string();
    }

    let Ok(portal) = Url::parse(portal_url) else {
        return link.to_string();
    };
    let origin = portal.origin().ascii_serialization();
    let base_path = portal_base_path(&portal);

    if link.starts_with('?') {
        format!("{}{}{}{}", origin, base_path, cmd, link)
    } else if link.starts_with('/') {
        format!("{}{}{}", origin, base_path, link)
    } else {
        link.to_string()
    }
}

/// Path up to and including the first `stalker_portal`, `c` or `portal` segment.
fn portal_base_path(portal: &Url) -> String {
    let Some(segments) = portal.path_segments() else {
        return String::new();
    };

    let mut base = String::new();
    for segment in segments {
        base.push('/');
        base.push_str(segment);
        if matches!(segment, "stalker_portal" | "c" | "portal") {
            return base;
        }
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PortalConfig;
    use crate::session::SessionProvider;
    use crate::testing::ScriptedTransport;
    use serde_json::json;
    use std::sync::Arc;

    const PORTAL_URL: &str = "http://portal.example:8080/c/";

    fn client(response: Value) -> (AuthenticatedClient, Arc<ScriptedTransport>) {
        let transport = Arc::new(ScriptedTransport::new(move |_, _| Ok(response.clone())));
        let portal = PortalConfig::new(PORTAL_URL, "00:1A:79:00:00:01");
        let session = Arc::new(SessionProvider::new(portal, transport.clone()));
        (AuthenticatedClient::new(transport.clone(), session), transport)
    }

    #[test]
    fn relative_links_resolve_against_portal_base() {
        let full = "http://portal.example/stalker_portal/server/load.php";
        assert_eq!(
            resolve_stream_url(full, "/media/123.mpg", "?token=abc"),
            "http://portal.example/stalker_portal/media/123.mpg?token=abc"
        );
        assert_eq!(
            resolve_stream_url(full, "", "/media/9.mpg"),
            "http://portal.example/stalker_portal/media/9.mpg"
        );
        assert_eq!(
            resolve_stream_url("http://p.example/other/load.php", "", "/live/1.ts"),
            "http://p.example/live/1.ts"
        );
        assert_eq!(
            resolve_stream_url(full, "", "https://cdn.example/1.m3u8"),
            "https://cdn.example/1.m3u8"
        );
    }

    #[test]
    fn ffmpeg_prefix_is_stripped() {
        assert_eq!(strip_player_prefix("ffmpeg http://s/1.ts"), "http://s/1.ts");
        assert_eq!(strip_player_prefix("http://s/1.ts"), "http://s/1.ts");
    }

    #[tokio::test]
    async fn episode_links_are_requested_as_vod() {
        let (client, transport) = client(json!({ "js": { "cmd": "ffmpeg http://stream.example/ep.mkv" } }));

        let link = create_link(&client, PORTAL_URL, ContentKind::Series, "eyJ0eXBlIjoic2VyaWVzIn0=", Some(3))
            .await
            .unwrap();

        assert_eq!(link, "http://stream.example/ep.mkv");
        let params = &transport.calls()[0].params;
        assert_eq!(params.get("action"), Some("create_link"));
        assert_eq!(params.get("type"), Some("vod"));
        assert_eq!(params.get("series"), Some("3"));
        assert_eq!(params.get("disable_ad"), Some("0"));
    }

    #[tokio::test]
    async fn portal_errors_and_empty_links_fail() {
        let (refused, _) = client(json!({ "js": { "error": "Movie not found", "cmd": "" } }));
        let err = create_link(&refused, PORTAL_URL, ContentKind::Vod, "/media/1.mpg", None)
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::Server(ref m) if m == "Movie not found"));

        let (empty, _) = client(json!({ "js": { "cmd": "" } }));
        let err = create_link(&empty, PORTAL_URL, ContentKind::Itv, "ffrt http:///ch/1", None)
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::NothingToPlay));
    }

    #[tokio::test]
    async fn movie_file_id_reads_first_entry() {
        let (lookup, transport) = client(json!({ "js": { "data": [{ "id": 5521 }] } }));
        let id = fetch_movie_file_id(&lookup, "77").await.unwrap();
        assert_eq!(id.as_deref(), Some("5521"));
        assert_eq!(transport.calls()[0].params.get("movie_id"), Some("77"));

        let (no_files, _) = client(json!({ "js": { "data": [] } }));
        assert!(fetch_movie_file_id(&no_files, "77").await.unwrap().is_none());
    }
}
