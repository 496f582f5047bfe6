//! Steam Web API client for the Workshop catalog

use super::WorkshopItem;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

const QUERY_URL: &str = "https://api.steampowered.com/IPublishedFileService/QueryFiles/v1/";
const DETAILS_URL: &str =
    "https://api.steampowered.com/ISteamRemoteStorage/GetPublishedFileDetails/v1/";
const APP_DETAILS_URL: &str = "https://store.steampowered.com/api/appdetails";

/// The details endpoint accepts at most this many ids per call
pub const MAX_DETAILS_PER_CALL: usize = 100;

const MAX_RETRIES: u32 = 5;
const BASE_RETRY_DELAY_MS: u64 = 2000;
const MAX_RETRY_DELAY_MS: u64 = 60000;

/// One page of catalog query results
#[derive(Debug, Clone, Default)]
pub struct QueryPage {
    pub total: u64,
    pub items: Vec<WorkshopItem>,
}

/// Source of Workshop catalog data
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch one page (1-based) of the game's Workshop items
    async fn query_page(&self, app_id: u32, page: u32, per_page: u32) -> Result<QueryPage>;

    /// Full records for up to [`MAX_DETAILS_PER_CALL`] ids
    async fn fetch_details(&self, ids: &[String]) -> Result<Vec<WorkshopItem>>;
}

/// HTTP client for the Steam Web API
#[derive(Clone)]
pub struct WorkshopApi {
    client: Arc<reqwest::Client>,
    api_key: String,
}

impl WorkshopApi {
    /// Create a new catalog client
    pub fn new(api_key: &str) -> Result<Self> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            bail!(super::SteamError::MissingApiKey);
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("workshopkit/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client: Arc::new(client),
            api_key: api_key.to_string(),
        })
    }

    /// Look up a game's store name; `None` when Steam does not know the id.
    pub async fn fetch_game_name(&self, app_id: u32) -> Result<Option<String>> {
        fetch_game_name_with(&self.client, app_id).await
    }

    /// Send a request, retrying on rate limiting and server errors
    async fn send_json<T, F>(&self, what: &str, build: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let response = build()
                .send()
                .await
                .with_context(|| format!("Failed to send {} request", what))?;
            let status = response.status();

            // Handle rate limiting (429)
            if status == 429 {
                if attempt >= MAX_RETRIES {
                    bail!("Rate limited after {} retries", MAX_RETRIES);
                }

                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|h| h.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .map(|secs| secs * 1000)
                    .unwrap_or_else(|| backoff_delay(attempt));

                tracing::warn!(
                    "Rate limited (attempt {}/{}), retrying in {}ms",
                    attempt,
                    MAX_RETRIES,
                    retry_after
                );

                sleep(Duration::from_millis(retry_after)).await;
                continue;
            }

            // Handle server errors (5xx) with retry
            if status.is_server_error() {
                if attempt >= MAX_RETRIES {
                    bail!("Server error after {} retries: {}", MAX_RETRIES, status);
                }

                let delay = backoff_delay(attempt);
                tracing::warn!(
                    "Server error {} (attempt {}/{}), retrying in {}ms",
                    status,
                    attempt,
                    MAX_RETRIES,
                    delay
                );

                sleep(Duration::from_millis(delay)).await;
                continue;
            }

            // Client errors (4xx) are not retried; 403 usually means a bad key
            if status.is_client_error() {
                let error_text = response.text().await.unwrap_or_default();
                bail!("{} request rejected ({}): {}", what, status, error_text);
            }

            let body = response
                .text()
                .await
                .context("Failed to read response body")?;
            return serde_json::from_str(&body)
                .with_context(|| format!("Failed to parse {} response: {}", what, body));
        }
    }
}

#[derive(Deserialize)]
struct Envelope<T> {
    response: T,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    total: u64,
    #[serde(default)]
    publishedfiledetails: Vec<WorkshopItem>,
}

#[derive(Deserialize)]
struct DetailsResponse {
    #[serde(default)]
    publishedfiledetails: Vec<WorkshopItem>,
}

#[async_trait]
impl CatalogSource for WorkshopApi {
    async fn query_page(&self, app_id: u32, page: u32, per_page: u32) -> Result<QueryPage> {
        let params = [
            ("key", self.api_key.clone()),
            ("appid", app_id.to_string()),
            ("numperpage", per_page.to_string()),
            ("page", page.to_string()),
            ("return_details", "true".to_string()),
            ("return_tags", "true".to_string()),
        ];

        let envelope: Envelope<QueryResponse> = self
            .send_json("QueryFiles", || self.client.get(QUERY_URL).query(&params))
            .await?;

        tracing::debug!(
            "Fetched page {} with {} items out of {} total",
            page,
            envelope.response.publishedfiledetails.len(),
            envelope.response.total
        );

        Ok(QueryPage {
            total: envelope.response.total,
            items: envelope.response.publishedfiledetails,
        })
    }

    async fn fetch_details(&self, ids: &[String]) -> Result<Vec<WorkshopItem>> {
        if ids.len() > MAX_DETAILS_PER_CALL {
            bail!(
                "At most {} ids per details call, got {}",
                MAX_DETAILS_PER_CALL,
                ids.len()
            );
        }

        let mut form = vec![("itemcount".to_string(), ids.len().to_string())];
        form.extend(
            ids.iter()
                .enumerate()
                .map(|(i, id)| (format!("publishedfileids[{}]", i), id.clone())),
        );

        let envelope: Envelope<DetailsResponse> = self
            .send_json("GetPublishedFileDetails", || {
                self.client.post(DETAILS_URL).form(&form)
            })
            .await?;

        Ok(envelope.response.publishedfiledetails)
    }
}

/// Store lookup that needs no API key
pub async fn fetch_game_name(app_id: u32) -> Result<Option<String>> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("workshopkit/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .build()
        .context("Failed to create HTTP client")?;
    fetch_game_name_with(&client, app_id).await
}

async fn fetch_game_name_with(client: &reqwest::Client, app_id: u32) -> Result<Option<String>> {
    let body: serde_json::Value = client
        .get(APP_DETAILS_URL)
        .query(&[("appids", app_id.to_string())])
        .send()
        .await
        .context("Failed to query store app details")?
        .error_for_status()
        .context("Store app details request failed")?
        .json()
        .await
        .context("Failed to parse store app details")?;

    Ok(parse_app_name(&body, app_id))
}

fn parse_app_name(body: &serde_json::Value, app_id: u32) -> Option<String> {
    body.get(app_id.to_string())?
        .get("data")?
        .get("name")?
        .as_str()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

/// Exponential backoff with 85-115% jitter, capped
fn backoff_delay(attempt: u32) -> u64 {
    let base_delay = BASE_RETRY_DELAY_MS.saturating_mul(1 << (attempt.saturating_sub(1)).min(16));
    let jitter = rand::random::<f64>() * 0.3 + 0.85;
    ((base_delay as f64 * jitter) as u64).min(MAX_RETRY_DELAY_MS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_name_is_read_from_store_payload() {
        let body = serde_json::json!({
            "294100": {"success": true, "data": {"name": "RimWorld"}}
        });
        assert_eq!(parse_app_name(&body, 294100).as_deref(), Some("RimWorld"));
        assert_eq!(parse_app_name(&body, 1), None);

        let failed = serde_json::json!({"7": {"success": false}});
        assert_eq!(parse_app_name(&failed, 7), None);
    }

    #[test]
    fn query_response_tolerates_missing_fields() {
        let envelope: Envelope<QueryResponse> =
            serde_json::from_str(r#"{"response": {}}"#).unwrap();
        assert_eq!(envelope.response.total, 0);
        assert!(envelope.response.publishedfiledetails.is_empty());
    }

    #[test]
    fn backoff_is_capped() {
        for attempt in 1..=MAX_RETRIES {
            let delay = backoff_delay(attempt);
            assert!(delay <= MAX_RETRY_DELAY_MS);
            assert!(delay >= BASE_RETRY_DELAY_MS * 84 / 100);
        }
        assert_eq!(backoff_delay(30), MAX_RETRY_DELAY_MS);
    }

    #[test]
    fn empty_key_is_rejected() {
        assert!(WorkshopApi::new("  ").is_err());
    }
}
