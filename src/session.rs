// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

//! Session tokens for full Stalker portals.
//!
//! A full portal (`/stalker_portal/...` or `/server/load.php`) hands out a
//! token on `handshake`, which only becomes usable after a `get_profile` call
//! carrying the handshake's `random`. Simple portals accept the MAC cookie
//! alone and never need a token.

use crate::config::{DEFAULT_SERIAL_NUMBER, PortalConfig};
use crate::error::{PortalError, Result};
use crate::transport::{QueryParams, Transport};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha1::{Digest, Sha1};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";
const HEX_RANDOM: &[u8; 16] = b"abcdef0123456789";

/// Token plus the serial number it was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    pub token: String,
    pub serial_number: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountInfo {
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub expire_date: Option<Value>,
    #[serde(default)]
    pub tariff_plan_name: Option<String>,
    #[serde(default)]
    pub status: Option<Value>,
}

#[derive(Debug, Clone)]
struct Handshake {
    token: String,
    random: String,
}

pub struct SessionProvider {
    portal: PortalConfig,
    transport: Arc<dyn Transport>,
    // Held across authentication so concurrent callers share one handshake.
    token: Mutex<Option<String>>,
    account_info: Mutex<Option<AccountInfo>>,
}

impl std::fmt::Debug for SessionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionProvider")
            .field("portal", &self.portal.url)
            .finish_non_exhaustive()
    }
}

impl SessionProvider {
    pub fn new(portal: PortalConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            portal,
            transport,
            token: Mutex::new(None),
            account_info: Mutex::new(None),
        }
    }

    pub fn requires_token(&self) -> bool {
        self.portal.is_full_portal()
    }

    pub fn serial_number(&self) -> &str {
        self.portal
            .serial_number
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_SERIAL_NUMBER)
    }

    /// Return the cached token, authenticating first when there is none.
    ///
    /// Simple portals yield `None`.
    pub async fn ensure(&self) -> Result<Option<SessionToken>> {
        if !self.requires_token() {
            return Ok(None);
        }

        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(Some(self.session_token(token.clone())));
        }

        if self.portal.url.is_empty() || self.portal.mac_address.is_empty() {
            return Err(PortalError::MissingCredentials);
        }

        info!("No cached token, authenticating with {}", self.portal.url);
        let (token, account_info) = self.authenticate().await?;
        *cached = Some(token.clone());
        *self.account_info.lock().await = account_info;

        Ok(Some(self.session_token(token)))
    }

    /// Drop the cached token unconditionally.
    pub async fn invalidate(&self) {
        *self.token.lock().await = None;
    }

    /// Drop the cached token only if it is still the one that was rejected.
    ///
    /// Another caller may already have refreshed it while the failing request
    /// was in flight.
    pub async fn invalidate_if(&self, rejected: &str) -> bool {
        let mut cached = self.token.lock().await;
        if cached.as_deref() == Some(rejected) {
            *cached = None;
            true
        } else {
            false
        }
    }

    pub async fn cached_token(&self) -> Option<String> {
        self.token.lock().await.clone()
    }

    pub async fn account_info(&self) -> Option<AccountInfo> {
        self.account_info.lock().await.clone()
    }

    fn session_token(&self, token: String) -> SessionToken {
        SessionToken {
            token,
            serial_number: self.serial_number().to_string(),
        }
    }

    /// Handshake followed by `get_profile`, which activates the token.
    async fn authenticate(&self) -> Result<(String, Option<AccountInfo>)> {
        let handshake = self.handshake().await?;
        debug!("Handshake complete, token {}...", token_prefix(&handshake.token));

        let profile = self.get_profile(&handshake).await?;
        let js = profile.get("js");

        let error_message = ["msg", "block_msg"].iter().find_map(|key| {
            js.and_then(|js| js.get(*key))
                .and_then(Value::as_str)
                .filter(|msg| !msg.is_empty())
        });
        if let Some(message) = error_message {
            warn!("Portal rejected profile: {}", message);
            return Err(PortalError::Profile(message.to_string()));
        }

        let account_info = js
            .and_then(|js| js.get("account_info"))
            .and_then(|info| AccountInfo::deserialize(info).ok());

        info!("Authenticated with {}", self.portal.url);
        Ok((handshake.token, account_info))
    }

    async fn handshake(&self) -> Result<Handshake> {
        let params = QueryParams::new()
            .with("type", "stb")
            .with("action", "handshake")
            .with("token", "")
            .with("prehash", prehash(&self.portal.mac_address))
            .with("JsHttpRequest", "1-xml");

        let response = self.transport.send(&params, None).await?;
        let js = response.get("js");

        let token = js
            .and_then(|js| js.get("token"))
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| PortalError::Handshake("No token received".to_string()))?;

        let random = js
            .and_then(|js| js.get("random"))
            .and_then(Value::as_str)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .unwrap_or_else(random_hex);

        Ok(Handshake {
            token: token.to_string(),
            random,
        })
    }

    async fn get_profile(&self, handshake: &Handshake) -> Result<Value> {
        let portal = &self.portal;
        let serial_number = self.serial_number();

        let device_id1 = non_blank(&portal.device_id1)
            .map(str::to_string)
            .unwrap_or_else(|| generate_device_id(&portal.mac_address));
        let device_id2 = non_blank(&portal.device_id2)
            .map(str::to_string)
            .unwrap_or_else(|| device_id1.clone());

        let metrics = json!({
            "mac": portal.mac_address,
            "model": "MAG250",
            "type": "STB",
            "random": handshake.random,
            "sn": serial_number,
        });

        let mut params = QueryParams::new()
            .with("type", "stb")
            .with("action", "get_profile")
            .with("hd", "1")
            .with("not_valid_token", "0")
            .with("video_out", "hdmi")
            .with("auth_second_step", "1")
            .with("num_banks", "2")
            .with("metrics", metrics)
            .with("sn", serial_number)
            .with("device_id", &device_id1)
            .with("device_id2", &device_id2)
            .with("signature", non_blank(&portal.signature1).unwrap_or_default());
        if let Some(signature2) = non_blank(&portal.signature2) {
            params.set("signature2", signature2);
        }
        params.set("prehash", prehash(&portal.mac_address));
        params.set("stb_type", "");
        params.set("JsHttpRequest", "1-xml");

        self.transport.send(&params, Some(&handshake.token)).await
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

pub(crate) fn token_prefix(token: &str) -> &str {
    let end = token
        .char_indices()
        .nth(10)
        .map(|(i, _)| i)
        .unwrap_or(token.len());
    &token[..end]
}

/// Upper-case SHA1 of the upper-cased MAC, as STB firmware sends it.
pub fn prehash(mac_address: &str) -> String {
    let digest = Sha1::digest(mac_address.to_uppercase().as_bytes());
    hex::encode_upper(digest)
}

/// Deterministic 64-character device id derived from the MAC.
///
/// The second step runs in f64 and is then truncated to 32 bits, so ids match
/// those produced by browser-based STB clients for the same MAC.
pub fn generate_device_id(mac_address: &str) -> String {
    let normalized = mac_address.to_uppercase().replace(':', "");

    let mut seed: u32 = 0;
    for unit in normalized.encode_utf16() {
        seed = seed.wrapping_mul(31).wrapping_add(unit as u32);
    }

    (0..64)
        .map(|_| {
            let next = (seed as f64) * 1_103_515_245.0 + 12_345.0;
            seed = next.rem_euclid(4_294_967_296.0) as u32;
            HEX_UPPER[(seed % 16) as usize] as char
        })
        .collect()
}

fn random_hex() -> String {
    let mut rng = rand::rng();
    (0..40)
        .map(|_| HEX_RANDOM[rng.random_range(0..HEX_RANDOM.len())] as char)
        .collect()
}
