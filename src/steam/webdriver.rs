//! Minimal W3C WebDriver client (chromedriver) over HTTP

use super::SteamError;
use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Key the W3C protocol uses for element references
const ELEMENT_KEY: &str = "element-6066-11e4-a5d8-1b3b3f5e0ddd";

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// How to find an element
#[derive(Debug, Clone, Copy)]
pub enum Locator<'a> {
    Css(&'a str),
    XPath(&'a str),
    Id(&'a str),
}

impl Locator<'_> {
    fn to_json(self) -> Value {
        match self {
            Locator::Css(selector) => json!({"using": "css selector", "value": selector}),
            Locator::XPath(path) => json!({"using": "xpath", "value": path}),
            Locator::Id(id) => json!({"using": "css selector", "value": format!("#{}", id)}),
        }
    }
}

/// Reference to an element in the current page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element(String);

/// An open WebDriver session
pub struct WebDriver {
    client: reqwest::Client,
    session_url: String,
}

impl WebDriver {
    /// Start a new browser session with the given capabilities
    pub async fn connect(endpoint: &str, capabilities: Value) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .no_proxy()
            .build()
            .context("Failed to create HTTP client")?;

        let endpoint = endpoint.trim_end_matches('/');
        let response: Value = client
            .post(format!("{}/session", endpoint))
            .json(&json!({"capabilities": {"alwaysMatch": capabilities}}))
            .send()
            .await
            .with_context(|| format!("Failed to reach WebDriver at {} (is chromedriver running?)", endpoint))?
            .json()
            .await
            .context("Failed to parse WebDriver session response")?;

        let value = unwrap_value(response)?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .context("WebDriver response carried no session id")?;

        tracing::debug!("Started WebDriver session {}", session_id);

        Ok(Self {
            client,
            session_url: format!("{}/session/{}", endpoint, session_id),
        })
    }

    async fn command(&self, method: reqwest::Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = format!("{}{}", self.session_url, path);
        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response: Value = request
            .send()
            .await
            .with_context(|| format!("WebDriver request {} failed", path))?
            .json()
            .await
            .with_context(|| format!("Failed to parse WebDriver response for {}", path))?;

        Ok(unwrap_value(response)?)
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        self.command(reqwest::Method::POST, path, Some(body)).await
    }

    async fn get(&self, path: &str) -> Result<Value> {
        self.command(reqwest::Method::GET, path, None).await
    }

    /// Navigate and wait for the page load
    pub async fn goto(&self, url: &str) -> Result<()> {
        self.post("/url", json!({"url": url})).await?;
        Ok(())
    }

    pub async fn current_url(&self) -> Result<String> {
        let value = self.get("/url").await?;
        value
            .as_str()
            .map(str::to_string)
            .context("WebDriver returned a non-string URL")
    }

    pub async fn find(&self, locator: Locator<'_>) -> Result<Element> {
        let value = self.post("/element", locator.to_json()).await?;
        element_from(&value)
    }

    pub async fn find_all(&self, locator: Locator<'_>) -> Result<Vec<Element>> {
        let value = self.post("/elements", locator.to_json()).await?;
        value
            .as_array()
            .context("WebDriver returned a non-array element list")?
            .iter()
            .map(element_from)
            .collect()
    }

    /// Poll until the element exists and is displayed
    pub async fn wait_for(&self, locator: Locator<'_>, timeout: Duration) -> Result<Element> {
        let deadline = Instant::now() + timeout;

        loop {
            match self.find(locator).await {
                Ok(element) => {
                    if self.is_displayed(&element).await.unwrap_or(false) {
                        return Ok(element);
                    }
                }
                Err(e) if is_no_such_element(&e) => {}
                Err(e) => return Err(e),
            }

            if Instant::now() >= deadline {
                anyhow::bail!("Timed out after {:?} waiting for {:?}", timeout, locator);
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Poll until at least one matching element exists
    pub async fn wait_for_all(&self, locator: Locator<'_>, timeout: Duration) -> Result<Vec<Element>> {
        let deadline = Instant::now() + timeout;

        loop {
            let found = self.find_all(locator).await?;
            if !found.is_empty() {
                return Ok(found);
            }
            if Instant::now() >= deadline {
                anyhow::bail!("Timed out after {:?} waiting for {:?}", timeout, locator);
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Poll until the current URL differs from `from`
    pub async fn wait_for_url_change(&self, from: &str, timeout: Duration) -> Result<String> {
        let deadline = Instant::now() + timeout;

        loop {
            let current = self.current_url().await?;
            if current != from {
                return Ok(current);
            }
            if Instant::now() >= deadline {
                anyhow::bail!("Page did not navigate away from {} within {:?}", from, timeout);
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    pub async fn click(&self, element: &Element) -> Result<()> {
        self.post(&format!("/element/{}/click", element.0), json!({}))
            .await?;
        Ok(())
    }

    pub async fn send_keys(&self, element: &Element, text: &str) -> Result<()> {
        self.post(&format!("/element/{}/value", element.0), json!({"text": text}))
            .await?;
        Ok(())
    }

    pub async fn attribute(&self, element: &Element, name: &str) -> Result<Option<String>> {
        let value = self
            .get(&format!("/element/{}/attribute/{}", element.0, name))
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    pub async fn is_displayed(&self, element: &Element) -> Result<bool> {
        let value = self.get(&format!("/element/{}/displayed", element.0)).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    /// Run a script with elements passed as `arguments[i]`
    pub async fn execute(&self, script: &str, args: &[&Element]) -> Result<Value> {
        let args: Vec<Value> = args.iter().map(|e| element_json(e)).collect();
        self.post("/execute/sync", json!({"script": script, "args": args}))
            .await
    }

    /// End the session and close the browser
    pub async fn quit(&self) -> Result<()> {
        self.command(reqwest::Method::DELETE, "", None).await?;
        Ok(())
    }
}

/// Split a W3C response into its value or a typed error
fn unwrap_value(mut response: Value) -> Result<Value, SteamError> {
    let value = response
        .get_mut("value")
        .map(Value::take)
        .unwrap_or(Value::Null);

    if let Some(code) = value.get("error").and_then(Value::as_str) {
        return Err(SteamError::WebDriver {
            code: code.to_string(),
            message: value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        });
    }

    Ok(value)
}

fn element_json(element: &Element) -> Value {
    let mut map = serde_json::Map::new();
    map.insert(ELEMENT_KEY.to_string(), Value::String(element.0.clone()));
    Value::Object(map)
}

fn element_from(value: &Value) -> Result<Element> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(|id| Element(id.to_string()))
        .context("WebDriver returned a malformed element reference")
}

fn is_no_such_element(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<SteamError>()
        .map(SteamError::is_no_such_element)
        .unwrap_or(false)
}
