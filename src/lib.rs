// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

pub mod auth;
pub mod categories;
pub mod config;
pub mod content;
pub mod epg;
pub mod error;
pub mod link;
pub mod models;
pub mod portal;
pub mod series;
pub mod session;
pub mod transport;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use content::PageQuery;
pub use error::{PortalError, Result};
pub use models::{Category, ContentItem, ContentKind};
pub use portal::Portal;
