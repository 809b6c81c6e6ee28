// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use crate::config::{ClientConfig, PortalConfig};
use crate::error::{PortalError, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, COOKIE, HeaderMap, HeaderValue};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

/// Ordered query parameters of one portal call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn action(action: &str) -> Self {
        Self::new().with("action", action)
    }

    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.set(key, value);
        self
    }

    /// Replace an existing key or append a new one.
    pub fn set(&mut self, key: &str, value: impl ToString) {
        let value = value.to_string();
        match self.0.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key.to_string(), value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Issues a single call against the portal.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, params: &QueryParams, token: Option<&str>) -> Result<Value>;
}

impl std::fmt::Debug for dyn Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Transport")
    }
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    portal_url: Url,
    mac_address: String,
}

impl HttpTransport {
    pub fn new(portal: &PortalConfig, settings: &ClientConfig) -> Result<Self> {
        let portal_url = Url::parse(&portal.url)?;

        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&settings.x_user_agent) {
            headers.insert("X-User-Agent", value);
        }

        let client = Client::builder()
            .timeout(settings.timeout())
            .user_agent(settings.user_agent.clone())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            portal_url,
            mac_address: portal.mac_address.clone(),
        })
    }

    fn request_url(&self, params: &QueryParams) -> Url {
        let mut url = self.portal_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params.iter() {
                pairs.append_pair(key, value);
            }
        }
        url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, params: &QueryParams, token: Option<&str>) -> Result<Value> {
        let url = self.request_url(params);
        debug!(
            action = params.get("action").unwrap_or_default(),
            authenticated = token.is_some(),
            "Requesting {}",
            self.portal_url
        );

        let mut request = self
            .client
            .get(url)
            .header(COOKIE, format!("mac={}", self.mac_address));
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let message = status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| status.to_string());
            return Err(PortalError::from_status(status.as_u16(), message));
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            warn!("Empty response from portal");
            return Ok(Value::Null);
        }

        // Some portals answer rejected sessions with plain text.
        match serde_json::from_str(&body) {
            Ok(json) => Ok(json),
            Err(e) => {
                warn!("Portal returned non-JSON body: {}", e);
                Ok(Value::String(body))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport(server: &MockServer) -> HttpTransport {
        let portal = PortalConfig::new(
            format!("{}/stalker_portal/server/load.php", server.uri()),
            "00:1A:79:AA:BB:CC",
        );
        HttpTransport::new(&portal, &ClientConfig::default()).unwrap()
    }

    #[test]
    fn set_replaces_existing_keys() {
        let mut params = QueryParams::action("get_ordered_list").with("p", 1);
        params.set("p", 2);
        params.set("type", "vod");
        assert_eq!(params.get("p"), Some("2"));
        assert_eq!(params.iter().count(), 3);
    }

    #[tokio::test]
    async fn sends_mac_cookie_token_and_params() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/stalker_portal/server/load.php"))
            .and(query_param("action", "get_genres"))
            .and(query_param("type", "itv"))
            .and(header("cookie", "mac=00:1A:79:AA:BB:CC"))
            .and(header("authorization", "Bearer abc123"))
            .and(header("x-user-agent", "Model: MAG250; Link: WiFi"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "js": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let params = QueryParams::action("get_genres").with("type", "itv");
        let response = transport(&server)
            .send(&params, Some("abc123"))
            .await
            .unwrap();

        assert_eq!(response, json!({ "js": [] }));
    }

    #[tokio::test]
    async fn client_errors_become_http_errors() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = transport(&server)
            .send(&QueryParams::action("get_categories"), None)
            .await
            .unwrap_err();

        assert!(matches!(err, PortalError::Http { status: 401, .. }));
        assert!(err.is_authorization_error());
    }

    #[tokio::test]
    async fn plain_text_and_empty_bodies_are_preserved() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("action", "text"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Authorization failed."))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("action", "empty"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let transport = transport(&server);
        let text = transport
            .send(&QueryParams::action("text"), None)
            .await
            .unwrap();
        assert_eq!(text, Value::String("Authorization failed.".into()));

        let empty = transport
            .send(&QueryParams::action("empty"), None)
            .await
            .unwrap();
        assert_eq!(empty, Value::Null);
    }
}
