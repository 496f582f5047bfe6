//! XDG-compliant path management

use directories::ProjectDirs;
use std::path::PathBuf;

/// Manages all application paths using XDG base directory specification
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directories from XDG
    dirs: ProjectDirs,
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

impl Paths {
    /// Create a new Paths instance
    pub fn new() -> Self {
        let dirs = ProjectDirs::from("", "", "workshopkit")
            .expect("Failed to determine project directories");
        Self { dirs }
    }

    // ========== Config Paths ==========

    /// Config directory: ~/.config/workshopkit/
    pub fn config_dir(&self) -> PathBuf {
        self.dirs.config_dir().to_path_buf()
    }

    /// Main config file: ~/.config/workshopkit/config.toml
    pub fn config_file(&self) -> PathBuf {
        self.config_dir().join("config.toml")
    }

    // ========== Data Paths ==========

    /// Data directory: ~/.local/share/workshopkit/
    pub fn data_dir(&self) -> PathBuf {
        self.dirs.data_dir().to_path_buf()
    }

    /// Chrome profile used by the WebDriver session: ~/.local/share/workshopkit/chrome-profile/
    pub fn browser_profile_dir(&self) -> PathBuf {
        self.data_dir().join("chrome-profile")
    }

    /// Ensure all required directories exist
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.config_dir())?;
        std::fs::create_dir_all(self.data_dir())?;
        Ok(())
    }
}
