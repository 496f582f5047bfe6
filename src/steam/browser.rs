//! Browser-driven Steam session: login check, collection creation, and the
//! click-through add flow.

use super::webdriver::{Locator, WebDriver};
use super::SteamError;
use crate::collections::{CollectionCreator, ModAdder, NewCollection};
use crate::config::Config;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

const COMMUNITY_URL: &str = "https://steamcommunity.com/";
const EDIT_COLLECTION_URL: &str = "https://steamcommunity.com/workshop/editcollection/";
const FILE_DETAILS_URL: &str = "https://steamcommunity.com/sharedfiles/filedetails/";

const SHORT_WAIT: Duration = Duration::from_secs(5);
const SAVE_WAIT: Duration = Duration::from_secs(10);

const SAVE_BUTTON_XPATH: &str =
    "//a[contains(@class,'saveCollection') or contains(text(),'Enregistrer') or contains(text(),'Save')]";
const OK_BUTTON_XPATH: &str =
    "//div[contains(@class,'btn_green_steamui') and contains(@class,'btn_medium')]/span[contains(text(),'OK')]";

/// A Chrome session using the persistent profile that holds the Steam login
pub struct BrowserSession {
    driver: WebDriver,
    app_id: u32,
    headless: bool,
}

impl BrowserSession {
    /// Start Chrome through the configured WebDriver endpoint
    pub async fn launch(config: &Config, app_id: u32) -> Result<Self> {
        let profile = config.browser_profile();
        std::fs::create_dir_all(&profile).with_context(|| {
            format!("Failed to create browser profile directory {}", profile.display())
        })?;

        let args = chrome_args(&profile.to_string_lossy(), config.headless);
        tracing::info!(
            "Launching Chrome via {} (headless: {})",
            config.webdriver_url,
            config.headless
        );

        let capabilities = json!({
            "browserName": "chrome",
            "goog:chromeOptions": { "args": args },
        });
        let driver = WebDriver::connect(&config.webdriver_url, capabilities).await?;

        Ok(Self {
            driver,
            app_id,
            headless: config.headless,
        })
    }

    /// Whether the profile is signed in to steamcommunity.com
    pub async fn is_logged_in(&self) -> Result<bool> {
        self.driver.goto(COMMUNITY_URL).await?;
        match self
            .driver
            .wait_for(Locator::Css("a.user_avatar"), SHORT_WAIT)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::debug!("Login check failed: {:#}", e);
                Ok(false)
            }
        }
    }

    /// Fail with a login hint unless the profile is signed in
    pub async fn ensure_logged_in(&self) -> Result<()> {
        if self.is_logged_in().await? {
            Ok(())
        } else {
            Err(SteamError::NotLoggedIn {
                headless: self.headless,
            }
            .into())
        }
    }

    pub async fn quit(self) -> Result<()> {
        self.driver.quit().await
    }

    async fn fill_collection_form(&self, request: &NewCollection) -> Result<()> {
        let title = self
            .driver
            .wait_for(Locator::Id("title"), SHORT_WAIT)
            .await
            .context("Collection editor did not load")?;
        self.driver.send_keys(&title, &request.name).await?;

        if let Some(image) = &request.image_path {
            let image = std::fs::canonicalize(image)
                .with_context(|| format!("Preview image {} not found", image.display()))?;
            let input = self.driver.find(Locator::Css("input[type='file']")).await?;
            self.driver
                .send_keys(&input, &image.to_string_lossy())
                .await?;
        }

        let description = self.driver.find(Locator::Id("description")).await?;
        self.driver
            .send_keys(&description, &request.description)
            .await?;

        let wanted = request.category.trim().to_lowercase();
        for tag in self
            .driver
            .find_all(Locator::Css("input[name='tags[]']"))
            .await?
        {
            let value = self.driver.attribute(&tag, "value").await?;
            if value.map(|v| v.trim().to_lowercase()) == Some(wanted.clone()) {
                self.driver
                    .execute("arguments[0].scrollIntoView();", &[&tag])
                    .await?;
                self.driver.click(&tag).await?;
                break;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl CollectionCreator for BrowserSession {
    async fn create_collection(&self, request: &NewCollection) -> Result<String> {
        let url = format!("{}?appid={}", EDIT_COLLECTION_URL, self.app_id);
        self.driver.goto(&url).await?;

        self.fill_collection_form(request).await?;

        let save = self.driver.find(Locator::XPath(SAVE_BUTTON_XPATH)).await?;
        self.driver.click(&save).await?;

        // Click may return after the navigation, so compare against the editor URL
        let landed = self
            .driver
            .wait_for_url_change(&url, SAVE_WAIT)
            .await
            .map_err(|e| SteamError::CollectionCreation(format!("{:#}", e)))?;

        let id = parse_collection_id(&landed).ok_or_else(|| {
            SteamError::CollectionCreation(format!("no collection id in {}", landed))
        })?;

        tracing::info!("Created collection '{}' ({})", request.name, id);
        Ok(id)
    }
}

#[async_trait]
impl ModAdder for BrowserSession {
    async fn add_mod(&self, mod_id: &str, _collection_id: &str, title: &str) -> Result<bool> {
        self.driver
            .goto(&format!("{}?id={}", FILE_DETAILS_URL, mod_id))
            .await?;

        let Ok(button) = self
            .driver
            .wait_for(Locator::Id("AddToCollectionBtn"), SHORT_WAIT)
            .await
        else {
            tracing::info!("No AddToCollection button for {}", mod_id);
            return Ok(false);
        };
        self.driver.click(&button).await?;

        let Ok(boxes) = self
            .driver
            .wait_for_all(
                Locator::Css("input.add_to_collection_dialog_checkbox"),
                SHORT_WAIT,
            )
            .await
        else {
            tracing::info!("Collection popup not found for {}", mod_id);
            return Ok(false);
        };

        let wanted = title.trim().to_lowercase();
        for checkbox in &boxes {
            let data_title = self.driver.attribute(checkbox, "data-title").await?;
            if data_title.map(|t| t.trim().to_lowercase()) == Some(wanted.clone()) {
                self.driver.click(checkbox).await?;
                break;
            }
        }

        match self
            .driver
            .wait_for(Locator::XPath(OK_BUTTON_XPATH), SHORT_WAIT)
            .await
        {
            Ok(ok) => self.driver.click(&ok).await?,
            Err(_) => tracing::warn!("OK button not found for {}, assuming it was added", mod_id),
        }

        Ok(true)
    }
}

fn chrome_args(profile_dir: &str, headless: bool) -> Vec<String> {
    let mut args = vec![
        format!("--user-data-dir={}", profile_dir),
        "--profile-directory=Default".to_string(),
        "--disable-gpu".to_string(),
    ];
    if headless {
        args.push("--headless".to_string());
    }
    args.extend(
        ["--no-sandbox", "--disable-dev-shm-usage", "--window-size=1920,1080"]
            .map(String::from),
    );
    args
}

/// Extract the `id` query parameter of a collection page URL
pub fn parse_collection_id(location: &str) -> Option<String> {
    let url = url::Url::parse(location).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "id")
        .map(|(_, value)| value.trim().to_string())
        .filter(|id| !id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// Enough of chromedriver for the collection editor. Clicking the save
    /// button navigates before the click command returns, as Chrome does.
    async fn fake_chromedriver(landing: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        let current = Arc::new(Mutex::new(String::new()));

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let current = Arc::clone(&current);
                tokio::spawn(async move {
                    let Some((method, path, body)) = read_request(&mut stream).await else {
                        return;
                    };
                    let value = respond(&method, &path, &body, &current, landing);
                    let body = json!({ "value": value }).to_string();
                    let reply = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = stream.write_all(reply.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        endpoint
    }

    async fn read_request(stream: &mut TcpStream) -> Option<(String, String, String)> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let header_end = loop {
            let n = stream.read(&mut chunk).await.ok()?;
            if n == 0 {
                return None;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(key, _)| key.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        while buf.len() < header_end + length {
            let n = stream.read(&mut chunk).await.ok()?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }

        let mut request_line = head.lines().next()?.split_whitespace();
        let method = request_line.next()?.to_string();
        let path = request_line.next()?.to_string();
        let body = String::from_utf8_lossy(&buf[header_end..]).to_string();
        Some((method, path, body))
    }

    fn respond(method: &str, path: &str, body: &str, current: &Mutex<String>, landing: &str) -> Value {
        let mut current = current.lock().unwrap();
        match (method, path) {
            ("POST", "/session") => json!({ "sessionId": "s1", "capabilities": {} }),
            ("POST", "/session/s1/url") => {
                let body: Value = serde_json::from_str(body).unwrap_or_default();
                *current = body["url"].as_str().unwrap_or_default().to_string();
                Value::Null
            }
            ("GET", "/session/s1/url") => Value::String(current.clone()),
            ("POST", "/session/s1/element") => {
                let id = if body.contains("xpath") { "save" } else { "field" };
                json!({ "element-6066-11e4-a5d8-1b3b3f5e0ddd": id })
            }
            ("POST", "/session/s1/elements") => json!([]),
            ("POST", "/session/s1/element/save/click") => {
                *current = landing.to_string();
                Value::Null
            }
            ("GET", p) if p.ends_with("/displayed") => Value::Bool(true),
            _ => Value::Null,
        }
    }

    #[tokio::test]
    async fn collection_id_is_read_when_save_navigates_during_click() {
        let endpoint =
            fake_chromedriver("https://steamcommunity.com/sharedfiles/filedetails/?id=123").await;
        let session = BrowserSession {
            driver: WebDriver::connect(&endpoint, json!({})).await.unwrap(),
            app_id: 294100,
            headless: true,
        };
        let request = NewCollection {
            name: "RimWorld_Mod_1".to_string(),
            description: "RimWorld_Mod_1".to_string(),
            image_path: None,
            category: "Mod".to_string(),
        };

        let id = tokio::time::timeout(Duration::from_secs(5), session.create_collection(&request))
            .await
            .expect("collection creation waited for a second navigation")
            .unwrap();
        assert_eq!(id, "123");
    }

    #[test]
    fn collection_id_is_read_from_query() {
        assert_eq!(
            parse_collection_id("https://steamcommunity.com/sharedfiles/filedetails/?id=3141592653")
                .as_deref(),
            Some("3141592653")
        );
        assert_eq!(
            parse_collection_id("https://steamcommunity.com/sharedfiles/managecollection/?id=77&appid=294100")
                .as_deref(),
            Some("77")
        );
        assert_eq!(
            parse_collection_id("https://steamcommunity.com/workshop/editcollection/?appid=294100"),
            None
        );
        assert_eq!(parse_collection_id("not a url"), None);
    }

    #[test]
    fn headless_flag_controls_chrome_args() {
        let args = chrome_args("/tmp/profile", true);
        assert_eq!(args[0], "--user-data-dir=/tmp/profile");
        assert!(args.contains(&"--headless".to_string()));
        assert!(args.contains(&"--window-size=1920,1080".to_string()));

        assert!(!chrome_args("/tmp/profile", false).contains(&"--headless".to_string()));
    }
}
