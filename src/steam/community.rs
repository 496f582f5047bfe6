//! steamcommunity.com AJAX client for adding mods to a collection

use crate::collections::ModAdder;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE, REFERER, USER_AGENT};
use std::time::Duration;

const ADD_URL: &str = "https://steamcommunity.com/sharedfiles/ajaxaddtocollections";
const FILE_DETAILS_URL: &str = "https://steamcommunity.com/sharedfiles/filedetails/";

/// Adds mods with the session cookies of a logged-in browser
#[derive(Clone)]
pub struct CommunityClient {
    client: reqwest::Client,
    session_id: String,
}

impl CommunityClient {
    pub fn new(session_id: &str, secure_login: &str) -> Result<Self> {
        if session_id.trim().is_empty() || secure_login.trim().is_empty() {
            bail!("Both session_id and secure_login are required");
        }

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("Mozilla/5.0"));
        headers.insert(
            "X-Requested-With",
            HeaderValue::from_static("XMLHttpRequest"),
        );
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&session_cookie(session_id, secure_login))
                .context("Session cookies contain invalid characters")?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(20))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            session_id: session_id.trim().to_string(),
        })
    }
}

fn session_cookie(session_id: &str, secure_login: &str) -> String {
    format!(
        "sessionid={}; steamLoginSecure={}",
        session_id.trim(),
        secure_login.trim()
    )
}

fn add_form(session_id: &str, mod_id: &str, collection_id: &str, title: &str) -> Vec<(String, String)> {
    vec![
        ("sessionID".to_string(), session_id.to_string()),
        ("publishedfileid".to_string(), mod_id.to_string()),
        (format!("collections[{}][add]", collection_id), "true".to_string()),
        (format!("collections[{}][title]", collection_id), title.to_string()),
    ]
}

fn is_success(body: &serde_json::Value) -> bool {
    body.get("success").and_then(serde_json::Value::as_i64) == Some(1)
}

#[async_trait]
impl ModAdder for CommunityClient {
    async fn add_mod(&self, mod_id: &str, collection_id: &str, title: &str) -> Result<bool> {
        let form = add_form(&self.session_id, mod_id, collection_id, title);

        let body: serde_json::Value = self
            .client
            .post(ADD_URL)
            .header(REFERER, format!("{}?id={}", FILE_DETAILS_URL, mod_id))
            .form(&form)
            .send()
            .await
            .with_context(|| format!("Add request for {} failed", mod_id))?
            .json()
            .await
            .with_context(|| format!("Unexpected add response for {}", mod_id))?;

        let ok = is_success(&body);
        if !ok {
            tracing::debug!("Steam refused {} -> {}: {}", mod_id, collection_id, body);
        }
        Ok(ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn form_targets_the_collection() {
        let form = add_form("sess", "42", "CID1", "RimWorld_Mod_1");
        assert!(form.contains(&("collections[CID1][add]".to_string(), "true".to_string())));
        assert!(form.contains(&(
            "collections[CID1][title]".to_string(),
            "RimWorld_Mod_1".to_string()
        )));
        assert_eq!(form[0], ("sessionID".to_string(), "sess".to_string()));
    }

    #[test]
    fn only_success_one_counts() {
        assert!(is_success(&json!({"success": 1})));
        assert!(!is_success(&json!({"success": 2})));
        assert!(!is_success(&json!({})));
    }

    #[test]
    fn cookie_carries_both_values() {
        assert_eq!(
            session_cookie(" abc ", "xyz"),
            "sessionid=abc; steamLoginSecure=xyz"
        );
        assert!(CommunityClient::new("", "xyz").is_err());
    }
}
