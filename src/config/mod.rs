//! Configuration management for workshopkit
//!
//! Uses XDG-compliant paths:
//! - Config: ~/.config/workshopkit/config.toml
//! - Data: ~/.local/share/workshopkit/

mod paths;

pub use paths::Paths;

use crate::games::Game;
use crate::steam::SteamError;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Environment variable that takes precedence over `steam_api_key`.
pub const API_KEY_ENV: &str = "STEAM_API_KEY";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Steam Web API key used for catalog queries
    pub steam_api_key: Option<String>,

    /// Catalog page size
    pub mods_per_page: u32,

    /// Maximum number of mod ids per CSV shard
    pub mods_per_csv: usize,

    /// Override for the data root (per-game folders live below it)
    pub data_dir: Option<String>,

    /// Chrome profile directory holding the Steam login
    pub browser_profile_dir: Option<String>,

    /// Run the browser without a window
    pub headless: bool,

    /// Preview image uploaded with every new collection
    pub image_path: Option<String>,

    /// Minimum seconds spent per mod when adding through the browser
    pub min_time_per_mod: f64,

    /// Minimum seconds between two add requests
    pub request_delay: f64,

    /// `sessionid` cookie of a logged-in steamcommunity.com session
    pub session_id: Option<String>,

    /// `steamLoginSecure` cookie of the same session
    pub secure_login: Option<String>,

    /// WebDriver endpoint (chromedriver)
    pub webdriver_url: String,

    /// How mods are added to collections
    pub add_mode: AddMode,

    /// Game the commands operate on
    pub active_game: Option<Game>,

    /// Paths configuration
    #[serde(skip)]
    pub paths: Paths,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            steam_api_key: None,
            mods_per_page: 100,
            mods_per_csv: 750,
            data_dir: None,
            browser_profile_dir: None,
            headless: true,
            image_path: None,
            min_time_per_mod: 3.0,
            request_delay: 1.0,
            session_id: None,
            secure_login: None,
            webdriver_url: "http://localhost:9515".to_string(),
            add_mode: AddMode::Request,
            active_game: None,
            paths: Paths::new(),
        }
    }
}

/// Strategy used to add mods to a collection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AddMode {
    /// Direct AJAX request with the session cookie
    #[default]
    Request,
    /// Click through the Workshop page in the browser
    Browser,
}

impl AddMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddMode::Request => "request",
            AddMode::Browser => "browser",
        }
    }

    pub fn from_cli(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "request" | "hybrid" => Ok(AddMode::Request),
            "browser" | "selenium" => Ok(AddMode::Browser),
            other => bail!(
                "Invalid add mode '{}'. Valid values: request, browser",
                other
            ),
        }
    }
}

/// Keys accepted by `settings set`
pub const SETTING_KEYS: &[&str] = &[
    "steam_api_key",
    "mods_per_page",
    "mods_per_csv",
    "data_dir",
    "browser_profile_dir",
    "headless",
    "image_path",
    "min_time_per_mod",
    "request_delay",
    "session_id",
    "secure_login",
    "webdriver_url",
    "add_mode",
];

impl Config {
    /// Resolve the data root (override or default XDG path)
    pub fn data_root(&self) -> PathBuf {
        self.data_dir
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.paths.data_dir())
    }

    /// Known games history file
    pub fn known_games_file(&self) -> PathBuf {
        self.data_root().join("known_games.json")
    }

    /// Application log file
    pub fn log_file(&self) -> PathBuf {
        self.data_root().join("workshopkit.log")
    }

    /// Resolve the Chrome profile directory (override or default XDG path)
    pub fn browser_profile(&self) -> PathBuf {
        self.browser_profile_dir
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.paths.browser_profile_dir())
    }

    /// API key from the environment, falling back to the config file.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .or_else(|| self.steam_api_key.clone())
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }

    pub fn require_api_key(&self) -> Result<String, SteamError> {
        self.api_key().ok_or(SteamError::MissingApiKey)
    }

    /// Both session cookies, or an error naming the missing setting.
    pub fn require_session(&self) -> Result<(String, String), SteamError> {
        let session = non_empty(self.session_id.as_deref())
            .ok_or(SteamError::MissingSession("session_id"))?;
        let secure = non_empty(self.secure_login.as_deref())
            .ok_or(SteamError::MissingSession("secure_login"))?;
        Ok((session.to_string(), secure.to_string()))
    }

    pub fn request_delay(&self) -> Duration {
        secs(self.request_delay)
    }

    pub fn min_time_per_mod(&self) -> Duration {
        secs(self.min_time_per_mod)
    }

    /// Validate values that would make later stages misbehave
    pub fn validate(&self) -> Result<()> {
        if self.mods_per_csv == 0 {
            bail!("mods_per_csv must be at least 1");
        }
        if self.mods_per_page == 0 {
            bail!("mods_per_page must be at least 1");
        }
        Ok(())
    }

    /// Update a single setting from its textual value
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "steam_api_key" => self.steam_api_key = optional(value),
            "mods_per_page" => {
                self.mods_per_page = value
                    .parse()
                    .with_context(|| format!("'{}' is not a valid page size", value))?
            }
            "mods_per_csv" => {
                self.mods_per_csv = value
                    .parse()
                    .with_context(|| format!("'{}' is not a valid shard size", value))?
            }
            "data_dir" => self.data_dir = optional(value),
            "browser_profile_dir" => self.browser_profile_dir = optional(value),
            "headless" => self.headless = parse_bool(value)?,
            "image_path" => self.image_path = optional(value),
            "min_time_per_mod" => self.min_time_per_mod = parse_secs(value)?,
            "request_delay" => self.request_delay = parse_secs(value)?,
            "session_id" => self.session_id = optional(value),
            "secure_login" => self.secure_login = optional(value),
            "webdriver_url" => {
                url::Url::parse(value)
                    .with_context(|| format!("'{}' is not a valid URL", value))?;
                self.webdriver_url = value.to_string();
            }
            "add_mode" => self.add_mode = AddMode::from_cli(value)?,
            other => bail!(
                "Unknown setting '{}'. Valid keys: {}",
                other,
                SETTING_KEYS.join(", ")
            ),
        }
        self.validate()
    }

    /// Restore defaults while keeping the resolved paths
    pub fn reset(&mut self) {
        let paths = self.paths.clone();
        *self = Config {
            paths,
            ..Config::default()
        };
    }

    /// Load configuration from disk or create default
    pub async fn load() -> Result<Self> {
        let paths = Paths::new();
        let mut config = Self::load_from(&paths.config_file()).await?;
        config.paths = paths;
        Ok(config)
    }

    /// Load configuration from an explicit file, creating it when missing
    pub async fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = fs::read_to_string(config_path)
                .await
                .context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")
        } else {
            let config = Config::default();
            config.save_to(config_path).await?;
            Ok(config)
        }
    }

    /// Save configuration to disk
    pub async fn save(&self) -> Result<()> {
        self.save_to(&self.paths.config_file()).await
    }

    pub async fn save_to(&self, config_path: &Path) -> Result<()> {
        // Ensure config directory exists
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(config_path, content)
            .await
            .context("Failed to write config file")?;

        Ok(())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn optional(value: &str) -> Option<String> {
    non_empty(Some(value)).map(str::to_string)
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" | "on" => Ok(true),
        "false" | "no" | "n" | "0" | "off" => Ok(false),
        other => bail!("'{}' is not a boolean (use true/false)", other),
    }
}

fn parse_secs(value: &str) -> Result<f64> {
    let secs: f64 = value
        .parse()
        .with_context(|| format!("'{}' is not a number of seconds", value))?;
    if !secs.is_finite() || secs < 0.0 {
        bail!("Delay must be a non-negative number of seconds");
    }
    Ok(secs)
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_shipped_settings() {
        let config = Config::default();
        assert_eq!(config.mods_per_page, 100);
        assert_eq!(config.mods_per_csv, 750);
        assert!(config.headless);
        assert_eq!(config.request_delay(), Duration::from_secs(1));
        assert_eq!(config.min_time_per_mod(), Duration::from_secs(3));
        assert_eq!(config.add_mode, AddMode::Request);
    }

    #[test]
    fn set_value_parses_and_validates() {
        let mut config = Config::default();
        config.set_value("mods_per_csv", "250").unwrap();
        assert_eq!(config.mods_per_csv, 250);

        config.set_value("headless", "no").unwrap();
        assert!(!config.headless);

        config.set_value("request_delay", "0.5").unwrap();
        assert_eq!(config.request_delay(), Duration::from_millis(500));

        config.set_value("add_mode", "browser").unwrap();
        assert_eq!(config.add_mode, AddMode::Browser);

        config.set_value("session_id", "  ").unwrap();
        assert!(config.session_id.is_none());

        assert!(config.set_value("mods_per_csv", "0").is_err());
        assert!(config.set_value("request_delay", "-1").is_err());
        assert!(config.set_value("webdriver_url", "not a url").is_err());
        assert!(config.set_value("unknown_key", "1").is_err());
    }

    #[test]
    fn require_session_names_missing_cookie() {
        let mut config = Config::default();
        config.session_id = Some("abc".to_string());
        match config.require_session() {
            Err(SteamError::MissingSession(key)) => assert_eq!(key, "secure_login"),
            other => panic!("unexpected result: {:?}", other),
        }

        config.secure_login = Some("def".to_string());
        assert_eq!(
            config.require_session().unwrap(),
            ("abc".to_string(), "def".to_string())
        );
    }

    #[test]
    fn reset_restores_defaults() {
        let mut config = Config::default();
        config.mods_per_csv = 5;
        config.session_id = Some("abc".to_string());
        config.reset();
        assert_eq!(config.mods_per_csv, 750);
        assert!(config.session_id.is_none());
    }

    #[tokio::test]
    async fn load_from_creates_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let created = Config::load_from(&path).await.unwrap();
        assert!(path.exists());
        assert_eq!(created.mods_per_csv, 750);

        let mut changed = created.clone();
        changed.mods_per_csv = 42;
        changed.active_game = Some(Game::new(294100, "RimWorld"));
        changed.save_to(&path).await.unwrap();

        let loaded = Config::load_from(&path).await.unwrap();
        assert_eq!(loaded.mods_per_csv, 42);
        assert_eq!(loaded.active_game.unwrap().app_id, 294100);
    }
}
