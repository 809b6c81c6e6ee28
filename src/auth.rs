// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use crate::error::{PortalError, Result, is_auth_message};
use crate::session::{SessionProvider, token_prefix};
use crate::transport::{QueryParams, Transport};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

enum Attempt {
    Done(Value),
    Rejected { token: String, error: PortalError },
    Failed(PortalError),
}

/// Runs portal calls with the session token, refreshing it once on rejection.
///
/// Simple portals go straight to the transport.
#[derive(Debug, Clone)]
pub struct AuthenticatedClient {
    transport: Arc<dyn Transport>,
    session: Arc<SessionProvider>,
}

impl AuthenticatedClient {
    pub fn new(transport: Arc<dyn Transport>, session: Arc<SessionProvider>) -> Self {
        Self { transport, session }
    }

    pub fn session(&self) -> &Arc<SessionProvider> {
        &self.session
    }

    pub async fn execute(&self, params: &QueryParams) -> Result<Value> {
        if !self.session.requires_token() {
            return self.transport.send(params, None).await;
        }

        let action = params.get("action").unwrap_or_default();
        match self.attempt(params).await {
            Attempt::Done(value) => Ok(value),
            Attempt::Failed(error) => Err(error),
            Attempt::Rejected { token, error } => {
                warn!(
                    action,
                    "Token {}... rejected ({}), retrying with fresh authentication",
                    token_prefix(&token),
                    error
                );
                self.session.invalidate_if(&token).await;

                match self.attempt(params).await {
                    Attempt::Done(value) => Ok(value),
                    Attempt::Failed(error) | Attempt::Rejected { error, .. } => {
                        warn!(action, "Request failed after re-authentication: {}", error);
                        Err(error)
                    }
                }
            }
        }
    }

    async fn attempt(&self, params: &QueryParams) -> Attempt {
        let token = match self.session.ensure().await {
            Ok(Some(session)) => session.token,
            Ok(None) => String::new(),
            Err(error) => return Attempt::Failed(error),
        };

        debug!(
            action = params.get("action").unwrap_or_default(),
            "Sending authenticated request"
        );

        let token_arg = (!token.is_empty()).then_some(token.as_str());
        match self.transport.send(params, token_arg).await {
            Ok(value) => match authorization_failure(&value) {
                Some(message) => Attempt::Rejected {
                    token,
                    error: PortalError::Authorization(message),
                },
                None => Attempt::Done(value),
            },
            Err(error) if error.is_authorization_error() => Attempt::Rejected { token, error },
            Err(error) => Attempt::Failed(error),
        }
    }
}

/// Detect a rejected session inside an otherwise successful response.
///
/// An empty body counts: expired sessions on some portals answer with nothing.
pub fn authorization_failure(response: &Value) -> Option<String> {
    match response {
        Value::Null => return Some("Empty response".to_string()),
        Value::String(text) => {
            return mentions_failed_authorization(text).then(|| text.trim().to_string());
        }
        _ => {}
    }

    let serialized = response.to_string();
    if mentions_failed_authorization(&serialized) {
        return Some("Authorization failed".to_string());
    }

    let js = response.get("js");
    let message = response
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| js.and_then(|js| js.get("error")).and_then(Value::as_str))
        .or_else(|| js.and_then(|js| js.get("msg")).and_then(Value::as_str));
    if let Some(message) = message.filter(|m| is_auth_message(m)) {
        return Some(message.to_string());
    }

    if response.get("status").and_then(Value::as_i64) == Some(401) {
        return Some("Status 401".to_string());
    }

    None
}

/// Matches "authorization failed", with any spacing between the words.
fn mentions_failed_authorization(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.match_indices("authorization").any(|(i, word)| {
        lower[i + word.len()..]
            .trim_start()
            .starts_with("failed")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PortalConfig;
    use crate::testing::ScriptedTransport;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const FULL_URL: &str = "http://portal.example/stalker_portal/server/load.php";

    fn client(transport: Arc<ScriptedTransport>, url: &str) -> AuthenticatedClient {
        let portal = PortalConfig::new(url, "00:1A:79:00:00:01");
        let session = Arc::new(SessionProvider::new(portal, transport.clone()));
        AuthenticatedClient::new(transport, session)
    }

    /// Handshakes hand out TOKEN-1, TOKEN-2, ...; content calls go to `content`.
    fn portal_transport<F>(content: F) -> Arc<ScriptedTransport>
    where
        F: Fn(&QueryParams, Option<&str>) -> Result<Value> + Send + Sync + 'static,
    {
        let handshakes = AtomicUsize::new(0);
        Arc::new(ScriptedTransport::new(move |params, token| {
            match params.get("action") {
                Some("handshake") => {
                    let n = handshakes.fetch_add(1, Ordering::SeqCst) + 1;
                    Ok(json!({ "js": { "token": format!("TOKEN-{}", n), "random": "abc" } }))
                }
                Some("get_profile") => Ok(json!({ "js": { "id": 1 } })),
                _ => content(params, token),
            }
        }))
    }

    #[test]
    fn detects_authorization_signals() {
        assert!(authorization_failure(&json!("Authorization failed. 75")).is_some());
        assert!(authorization_failure(&json!({ "js": { "error": "Invalid token" } })).is_some());
        assert!(authorization_failure(&json!({ "js": { "msg": "AUTHORIZATION  FAILED" } })).is_some());
        assert!(authorization_failure(&json!({ "status": 401 })).is_some());
        assert!(authorization_failure(&Value::Null).is_some());

        assert!(authorization_failure(&json!({ "js": { "data": [], "total_items": 0 } })).is_none());
        assert!(authorization_failure(&json!({ "js": { "error": "Movie not found" } })).is_none());
        assert!(authorization_failure(&json!("plain text")).is_none());
    }

    #[tokio::test]
    async fn simple_portal_skips_authentication() {
        let transport = portal_transport(|_, _| Ok(json!({ "js": [] })));
        let client = client(transport.clone(), "http://portal.example/c/");

        client
            .execute(&QueryParams::action("get_genres"))
            .await
            .unwrap();

        assert!(transport.calls_for("handshake").is_empty());
        assert_eq!(transport.calls()[0].token, None);
    }

    #[tokio::test]
    async fn rejected_token_is_refreshed_and_retried_once() {
        let transport = portal_transport(|_, token| {
            if token == Some("TOKEN-1") {
                Ok(json!({ "js": { "error": "Authorization failed" } }))
            } else {
                Ok(json!({ "js": { "data": [1], "total_items": 1 } }))
            }
        });
        let client = client(transport.clone(), FULL_URL);

        let value = client
            .execute(&QueryParams::action("get_ordered_list"))
            .await
            .unwrap();

        assert_eq!(value["js"]["total_items"], 1);
        let content = transport.calls_for("get_ordered_list");
        assert_eq!(content.len(), 2);
        assert_eq!(content[0].token.as_deref(), Some("TOKEN-1"));
        assert_eq!(content[1].token.as_deref(), Some("TOKEN-2"));
        assert_eq!(transport.calls_for("handshake").len(), 2);
    }

    #[tokio::test]
    async fn second_failure_surfaces_the_retry_error() {
        let transport = portal_transport(|_, token| match token {
            Some("TOKEN-1") => Err(PortalError::from_status(401, "Unauthorized")),
            _ => Err(PortalError::from_status(503, "Service Unavailable")),
        });
        let client = client(transport.clone(), FULL_URL);

        let err = client
            .execute(&QueryParams::action("get_ordered_list"))
            .await
            .unwrap_err();

        assert!(matches!(err, PortalError::Http { status: 503, .. }));
        assert_eq!(transport.calls_for("get_ordered_list").len(), 2);
    }

    #[tokio::test]
    async fn persistent_rejection_stops_after_one_retry() {
        let transport = portal_transport(|_, _| Ok(json!("Authorization failed.")));
        let client = client(transport.clone(), FULL_URL);

        let err = client
            .execute(&QueryParams::action("get_categories"))
            .await
            .unwrap_err();

        assert!(matches!(err, PortalError::Authorization(_)));
        assert_eq!(transport.calls_for("get_categories").len(), 2);
        assert_eq!(transport.calls_for("handshake").len(), 2);
    }

    #[tokio::test]
    async fn non_auth_failures_are_not_retried() {
        let transport = portal_transport(|_, _| Err(PortalError::from_status(500, "Boom")));
        let client = client(transport.clone(), FULL_URL);

        let err = client
            .execute(&QueryParams::action("get_categories"))
            .await
            .unwrap_err();

        assert!(matches!(err, PortalError::Http { status: 500, .. }));
        assert_eq!(transport.calls_for("get_categories").len(), 1);
    }

    #[tokio::test]
    async fn cached_token_is_reused_across_calls() {
        let transport = portal_transport(|_, _| Ok(json!({ "js": [] })));
        let client = client(transport.clone(), FULL_URL);

        for _ in 0..3 {
            client
                .execute(&QueryParams::action("get_genres"))
                .await
                .unwrap();
        }

        assert_eq!(transport.calls_for("handshake").len(), 1);
        assert!(
            transport
                .calls_for("get_genres")
                .iter()
                .all(|c| c.token.as_deref() == Some("TOKEN-1"))
        );
    }
}
