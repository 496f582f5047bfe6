//! Steam integration: Workshop catalog API, community endpoints, and the
//! browser session used to create collections.

pub mod browser;
pub mod community;
pub mod populate;
pub mod rest;
pub mod webdriver;

pub use browser::{parse_collection_id, BrowserSession};
pub use community::CommunityClient;
pub use populate::{CatalogFetcher, FetchStats};
pub use rest::{CatalogSource, QueryPage, WorkshopApi};
pub use webdriver::{Locator, WebDriver};

use crate::mods::ModRecord;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Errors raised by the Steam layer that callers may want to match on
#[derive(Debug, Error)]
pub enum SteamError {
    #[error("Steam API key not set (use `settings set steam_api_key <key>` or the STEAM_API_KEY environment variable)")]
    MissingApiKey,

    #[error("Steam session cookie '{0}' not set (use `settings set {0} <value>`)")]
    MissingSession(&'static str),

    #[error("Not logged in to Steam in the browser profile; {}", login_hint(.headless))]
    NotLoggedIn { headless: bool },

    #[error("WebDriver error '{code}': {message}")]
    WebDriver { code: String, message: String },

    #[error("Collection creation failed: {0}")]
    CollectionCreation(String),
}

fn login_hint(headless: &bool) -> &'static str {
    if *headless {
        "disable headless mode (`settings set headless false`) for the first sign-in"
    } else {
        "sign in in the opened browser window and run the command again"
    }
}

impl SteamError {
    /// The WebDriver "element not found" condition, which waits poll through
    pub fn is_no_such_element(&self) -> bool {
        matches!(self, SteamError::WebDriver { code, .. } if code == "no such element")
    }
}

/// A Workshop item as returned by the catalog endpoints.
///
/// Fields the toolkit does not interpret are kept in `extra` so the raw dump
/// stays complete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkshopItem {
    #[serde(deserialize_with = "string_or_number")]
    pub publishedfileid: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default)]
    pub tags: Vec<WorkshopTag>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A tag entry: `{"tag": "..."}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkshopTag {
    pub tag: String,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl From<&WorkshopItem> for ModRecord {
    fn from(item: &WorkshopItem) -> Self {
        ModRecord {
            id: item.publishedfileid.clone(),
            tags: item.tags.iter().map(|t| t.tag.clone()).collect(),
        }
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}
