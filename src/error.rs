// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PortalError>;

/// Phrases a portal uses when it rejects a session token.
const AUTH_PHRASES: [&str; 4] = [
    "authorization failed",
    "unauthorized",
    "auth failed",
    "invalid token",
];

#[derive(Error, Debug)]
pub enum PortalError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Profile error: {0}")]
    Profile(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid portal URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Portal URL and MAC address are required")]
    MissingCredentials,

    #[error("Portal error: {0}")]
    Server(String),

    #[error("Nothing to play")]
    NothingToPlay,
}

impl PortalError {
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// True when the failure means the session token was rejected.
    pub fn is_authorization_error(&self) -> bool {
        match self {
            Self::Authorization(_) => true,
            Self::Http { status, message } => *status == 401 || is_auth_message(message),
            Self::Server(message) => is_auth_message(message),
            _ => false,
        }
    }
}

pub(crate) fn is_auth_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    AUTH_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_401_is_an_authorization_error() {
        assert!(PortalError::from_status(401, "Unauthorized").is_authorization_error());
        assert!(PortalError::from_status(403, "Invalid token supplied").is_authorization_error());
        assert!(!PortalError::from_status(404, "Not Found").is_authorization_error());
    }

    #[test]
    fn other_failures_are_not_authorization_errors() {
        assert!(!PortalError::NothingToPlay.is_authorization_error());
        assert!(!PortalError::Handshake("no token".into()).is_authorization_error());
        assert!(PortalError::Server("Authorization failed. 75".into()).is_authorization_error());
    }

    #[test]
    fn mentioning_authorization_alone_is_not_an_auth_failure() {
        assert!(!PortalError::Server("Missing authorization header for premium".into())
            .is_authorization_error());
        assert!(!PortalError::from_status(400, "authorization required for adult channels")
            .is_authorization_error());
        assert!(PortalError::Server("AUTHORIZATION FAILED".into()).is_authorization_error());
    }
}
