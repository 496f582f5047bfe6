//! Application state and orchestration

mod actions;
pub mod prompt;

pub use prompt::ConsolePrompter;

use crate::config::Config;
use crate::games::{Game, GameFiles, GameHistory};
use crate::mods::CategoryMap;
use crate::progress::ConsoleProgress;
use crate::store;

use anyhow::{bail, Context, Result};

/// Main application struct that orchestrates all components
pub struct App {
    /// Application configuration
    pub config: Config,

    /// Recently used games
    pub history: GameHistory,

    progress: ConsoleProgress,
}

impl App {
    /// Create a new App instance
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        config
            .paths
            .ensure_dirs()
            .context("Failed to create directories")?;

        let data_root = config.data_root();
        std::fs::create_dir_all(&data_root).with_context(|| {
            format!("Failed to create data directory {}", data_root.display())
        })?;

        let history = GameHistory::load(&config.known_games_file());

        Ok(Self {
            config,
            history,
            progress: ConsoleProgress::new(),
        })
    }

    /// The selected game, or an error telling the user how to select one
    pub fn active_game(&self) -> Result<&Game> {
        match &self.config.active_game {
            Some(game) => Ok(game),
            None => bail!("No game selected. Use 'workshopkit game select <app_id>' first."),
        }
    }

    /// Selected game and its data layout
    pub fn game_files(&self) -> Result<(Game, GameFiles)> {
        let game = self.active_game()?.clone();
        let files = game.files(&self.config.data_root());
        Ok((game, files))
    }

    /// Make `game` the active game and remember it
    pub async fn set_active_game(&mut self, game: Game) -> Result<()> {
        self.history.add(game.clone())?;

        let files = game.files(&self.config.data_root());
        std::fs::create_dir_all(files.base_dir())
            .with_context(|| format!("Failed to create {}", files.base_dir().display()))?;

        self.config.active_game = Some(game);
        self.config.save().await
    }

    /// The saved category map; an error when nothing was fetched yet
    fn load_categories(&self, files: &GameFiles) -> Result<CategoryMap> {
        match store::load_json::<CategoryMap>(&files.categories_file())? {
            Some(map) if !map.is_empty() => Ok(map),
            _ => bail!("No categories available. Run 'workshopkit fetch' first."),
        }
    }
}
