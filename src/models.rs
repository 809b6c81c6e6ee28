// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

//! Portal records and the response envelopes they arrive in.
//!
//! Portals return loosely typed JSON: ids may be strings or numbers, flags may
//! be `true`, `1` or `"1"`, and list payloads sometimes come back without the
//! expected array. Everything is narrowed here so the rest of the crate only
//! sees well-formed values or an explicit `Malformed` marker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Pseudo category id selecting every item of a kind.
pub const ALL_CATEGORY_ID: &str = "*";
pub const ALL_CATEGORIES_NAME: &str = "All categories";

fn deserialize_number_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value: Value = Deserialize::deserialize(deserializer)?;

    match value {
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(D::Error::custom("Expected string or number")),
    }
}

fn deserialize_optional_number_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Value = Deserialize::deserialize(deserializer)?;

    Ok(match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn deserialize_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Value = Deserialize::deserialize(deserializer)?;

    Ok(match value {
        Value::String(s) if !s.is_empty() => Some(s),
        _ => None,
    })
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Value = Deserialize::deserialize(deserializer)?;
    Ok(is_truthy_flag(&value))
}

fn deserialize_lenient_number<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Value = Deserialize::deserialize(deserializer)?;
    Ok(lenient_number(&value))
}

fn is_truthy_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64() == Some(1),
        Value::String(s) => s == "1",
        _ => false,
    }
}

fn lenient_number(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Trimmed string form of an id that may arrive as a number.
pub fn normalize_entity_id(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string().trim().to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Itv,
    Vod,
    Series,
}

impl ContentKind {
    pub const ALL: [ContentKind; 3] = [ContentKind::Itv, ContentKind::Vod, ContentKind::Series];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Itv => "itv",
            Self::Vod => "vod",
            Self::Series => "series",
        }
    }

    /// Live channels are grouped by genre, everything else by category.
    pub fn category_action(&self) -> &'static str {
        match self {
            Self::Itv => "get_genres",
            Self::Vod | Self::Series => "get_categories",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "itv" | "live" => Ok(Self::Itv),
            "vod" | "movie" | "movies" => Ok(Self::Vod),
            "series" | "tv" => Ok(Self::Series),
            _ => Err(format!("Invalid kind: {}. Use 'live', 'vod', or 'series'", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub category_id: String,
    pub category_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl Category {
    pub fn all() -> Self {
        Self {
            category_id: ALL_CATEGORY_ID.to_string(),
            category_name: ALL_CATEGORIES_NAME.to_string(),
            parent_id: None,
        }
    }

    pub fn is_all(&self) -> bool {
        self.category_id == ALL_CATEGORY_ID
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.category_name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawCategory {
    #[serde(deserialize_with = "deserialize_number_as_string")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub parent_id: Option<String>,
}

impl From<RawCategory> for Category {
    fn from(raw: RawCategory) -> Self {
        Self {
            category_id: raw.id,
            category_name: raw.title,
            parent_id: raw.parent_id,
        }
    }
}

/// One catalog entry (channel, movie or series) as returned by `get_ordered_list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    #[serde(deserialize_with = "deserialize_number_as_string")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub o_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub category_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub screenshot_uri: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub logo: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub cmd: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub number: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub is_series: bool,
    #[serde(default)]
    pub cover: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContentItem {
    pub fn title(&self) -> &str {
        if self.name.is_empty() {
            self.o_name.as_deref().unwrap_or_default()
        } else {
            &self.name
        }
    }

    /// Resolve relative artwork paths against the portal and fill `cover`.
    pub fn normalize(mut self, portal_url: &str) -> Self {
        if let Some(uri) = self.screenshot_uri.take() {
            self.screenshot_uri = Some(make_absolute_url(portal_url, &uri));
        }
        if let Some(logo) = self.logo.take() {
            self.logo = Some(make_absolute_url(portal_url, &logo));
        }
        if self.cover.is_none() {
            self.cover = self.screenshot_uri.clone();
        }
        self
    }

    /// Series flag as the Ministra plugin reports it, or a non-empty `series` list.
    pub fn has_series(&self) -> bool {
        self.is_series
            || self
                .extra
                .get("series")
                .and_then(Value::as_array)
                .is_some_and(|s| !s.is_empty())
    }
}

/// Join a relative path onto the portal origin. Absolute URLs pass through.
pub fn make_absolute_url(base_url: &str, relative_path: &str) -> String {
    if relative_path.is_empty()
        || relative_path.starts_with("http://")
        || relative_path.starts_with("https://")
    {
        return relative_path.to_string();
    }

    match url::Url::parse(base_url) {
        Ok(url) => {
            let origin = url.origin().ascii_serialization();
            if relative_path.starts_with('/') {
                format!("{}{}", origin, relative_path)
            } else {
                format!("{}/{}", origin, relative_path)
            }
        }
        Err(_) => relative_path.to_string(),
    }
}

/// Category list narrowed at the boundary.
#[derive(Debug)]
pub enum CategoryListResponse {
    Categories(Vec<RawCategory>),
    Malformed,
}

impl CategoryListResponse {
    /// Expects `{ "js": [ ... ] }`.
    pub fn from_value(value: &Value) -> Self {
        let Some(entries) = value.get("js").and_then(Value::as_array) else {
            return Self::Malformed;
        };

        let categories = entries
            .iter()
            .filter_map(|entry| match RawCategory::deserialize(entry) {
                Ok(category) => Some(category),
                Err(e) => {
                    warn!("Skipping malformed category entry: {}", e);
                    None
                }
            })
            .collect();

        Self::Categories(categories)
    }
}

#[derive(Debug, Clone)]
pub struct ContentPage {
    pub items: Vec<ContentItem>,
    pub total_items: usize,
}

/// Content page narrowed at the boundary.
#[derive(Debug)]
pub enum ContentPageResponse {
    Page(ContentPage),
    Malformed,
}

impl ContentPageResponse {
    /// Expects `{ "js": { "data": [ ... ], "total_items": n } }`.
    pub fn from_value(value: &Value) -> Self {
        let Some(js) = value.get("js") else {
            return Self::Malformed;
        };
        let Some(data) = js.get("data").and_then(Value::as_array) else {
            return Self::Malformed;
        };

        let total_items = js
            .get("total_items")
            .and_then(lenient_number)
            .map(|n| n.max(0) as usize)
            .unwrap_or(0);

        let items = data
            .iter()
            .filter_map(|entry| match ContentItem::deserialize(entry) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!("Skipping malformed content entry: {}", e);
                    None
                }
            })
            .collect();

        Self::Page(ContentPage { items, total_items })
    }
}

/// Raw `get_short_epg` record.
#[derive(Debug, Clone, Deserialize)]
struct RawEpgItem {
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    descr: Option<String>,
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    time_to: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    ch_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_number")]
    start_timestamp: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_lenient_number")]
    stop_timestamp: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpgProgram {
    pub id: String,
    pub title: String,
    pub description: String,
    pub start: String,
    pub end: String,
    pub channel_id: String,
    pub start_timestamp: Option<i64>,
    pub stop_timestamp: Option<i64>,
}

impl EpgProgram {
    /// Accepts `js.data` or a bare `js` array; anything else yields no programs.
    pub fn list_from_value(value: &Value, channel_id: &str) -> Vec<EpgProgram> {
        let js = value.get("js");
        let entries = js
            .and_then(|js| js.get("data"))
            .and_then(Value::as_array)
            .or_else(|| js.and_then(Value::as_array));

        let Some(entries) = entries else {
            return Vec::new();
        };

        entries
            .iter()
            .filter_map(|entry| RawEpgItem::deserialize(entry).ok())
            .map(|raw| EpgProgram {
                id: raw.id.unwrap_or_default(),
                title: raw.name.unwrap_or_default(),
                description: raw.descr.unwrap_or_default(),
                start: raw.time.unwrap_or_default(),
                end: raw.time_to.unwrap_or_default(),
                channel_id: raw.ch_id.unwrap_or_else(|| channel_id.to_string()),
                start_timestamp: raw.start_timestamp,
                stop_timestamp: raw.stop_timestamp,
            })
            .collect()
    }
}

/// "Now playing" summary for one channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpgPreview {
    pub channel_id: String,
    pub title: String,
    /// Percent elapsed, present only while the program is airing.
    pub progress: Option<f64>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl EpgPreview {
    pub fn from_program(channel_id: &str, program: &EpgProgram, now: DateTime<Utc>) -> Self {
        let mut preview = Self {
            channel_id: channel_id.to_string(),
            title: program.title.clone(),
            progress: None,
            start: None,
            end: None,
        };

        let (Some(start), Some(end)) = (program.start_timestamp, program.stop_timestamp) else {
            return preview;
        };
        if start <= 0 || end <= start {
            return preview;
        }

        let now_secs = now.timestamp_millis() as f64 / 1000.0;
        if now_secs >= start as f64 && now_secs <= end as f64 {
            preview.progress = Some((now_secs - start as f64) / (end - start) as f64 * 100.0);
            preview.start = DateTime::from_timestamp(start, 0);
            preview.end = DateTime::from_timestamp(end, 0);
        }

        preview
    }
}

/// Season of a regular series (`type=series`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Season {
    #[serde(deserialize_with = "deserialize_number_as_string")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub cmd: Option<String>,
    #[serde(default)]
    pub series: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Season of a VOD item flagged `is_series`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VodSeason {
    #[serde(deserialize_with = "deserialize_number_as_string")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_optional_number_as_string")]
    pub video_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_number")]
    pub season_number: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub is_season: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VodEpisode {
    #[serde(deserialize_with = "deserialize_number_as_string")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_lenient_number")]
    pub series_number: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub is_episode: bool,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub cmd: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Entries of `js.data`, each deserialized leniently. `None` when the payload is malformed.
pub fn data_entries<T>(value: &Value) -> Option<Vec<T>>
where
    T: for<'de> Deserialize<'de>,
{
    let data = value.get("js")?.get("data")?.as_array()?;
    Some(
        data.iter()
            .filter_map(|entry| T::deserialize(entry).ok())
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn category_ids_accept_numbers_and_strings() {
        let response = json!({ "js": [
            { "id": 5, "title": "Sports" },
            { "id": "7", "title": "News", "parent_id": 2 },
            { "title": "No id" }
        ]});

        let CategoryListResponse::Categories(categories) =
            CategoryListResponse::from_value(&response)
        else {
            panic!("expected categories");
        };

        assert_eq!(categories.len(), 2);
        assert_eq!(categories[0].id, "5");
        assert_eq!(categories[1].parent_id.as_deref(), Some("2"));
    }

    #[test]
    fn category_response_without_array_is_malformed() {
        assert!(matches!(
            CategoryListResponse::from_value(&json!({ "js": { "data": [] } })),
            CategoryListResponse::Malformed
        ));
        assert!(matches!(
            CategoryListResponse::from_value(&json!(null)),
            CategoryListResponse::Malformed
        ));
    }

    #[test]
    fn content_page_reads_total_as_string_or_number() {
        let response = json!({ "js": { "data": [{ "id": 1, "name": "A" }], "total_items": "50" } });
        let ContentPageResponse::Page(page) = ContentPageResponse::from_value(&response) else {
            panic!("expected page");
        };
        assert_eq!(page.total_items, 50);
        assert_eq!(page.items[0].id, "1");

        assert!(matches!(
            ContentPageResponse::from_value(&json!({ "js": { "total_items": 3 } })),
            ContentPageResponse::Malformed
        ));
    }

    #[test]
    fn normalize_resolves_relative_artwork() {
        let item: ContentItem = serde_json::from_value(json!({
            "id": "9",
            "name": "Movie",
            "screenshot_uri": "/stalker_portal/screenshots/9.jpg",
            "logo": "",
            "is_series": "1"
        }))
        .unwrap();

        let item = item.normalize("http://portal.example:8080/stalker_portal/server/load.php");
        assert_eq!(
            item.cover.as_deref(),
            Some("http://portal.example:8080/stalker_portal/screenshots/9.jpg")
        );
        assert!(item.logo.is_none());
        assert!(item.has_series());
    }

    #[test]
    fn preview_has_progress_only_while_airing() {
        let now = DateTime::from_timestamp(1_000_500, 0).unwrap();
        let mut program = EpgProgram {
            id: "1".into(),
            title: "Evening News".into(),
            description: String::new(),
            start: String::new(),
            end: String::new(),
            channel_id: "42".into(),
            start_timestamp: Some(1_000_000),
            stop_timestamp: Some(1_001_000),
        };

        let airing = EpgPreview::from_program("42", &program, now);
        assert_eq!(airing.progress, Some(50.0));
        assert!(airing.start.is_some() && airing.end.is_some());

        program.start_timestamp = Some(1_000_600);
        program.stop_timestamp = Some(1_001_000);
        let upcoming = EpgPreview::from_program("42", &program, now);
        assert_eq!(upcoming.title, "Evening News");
        assert!(upcoming.progress.is_none());
        assert!(upcoming.start.is_none());
    }

    #[test]
    fn epg_accepts_bare_js_array() {
        let response = json!({ "js": [
            { "id": 3, "name": "Film", "start_timestamp": "100", "stop_timestamp": 200 }
        ]});
        let programs = EpgProgram::list_from_value(&response, "11");
        assert_eq!(programs.len(), 1);
        assert_eq!(programs[0].channel_id, "11");
        assert_eq!(programs[0].start_timestamp, Some(100));
        assert_eq!(programs[0].stop_timestamp, Some(200));
    }

    #[test]
    fn kind_parses_aliases() {
        assert_eq!("live".parse::<ContentKind>().unwrap(), ContentKind::Itv);
        assert_eq!("movie".parse::<ContentKind>().unwrap(), ContentKind::Vod);
        assert_eq!(ContentKind::Itv.category_action(), "get_genres");
        assert!("radio".parse::<ContentKind>().is_err());
    }
}
