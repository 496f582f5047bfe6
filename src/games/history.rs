//! Recently used games

use super::Game;
use crate::store;
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Number of games remembered
pub const MAX_KNOWN_GAMES: usize = 20;

/// Most-recent-first list of games stored in known_games.json
pub struct GameHistory {
    path: PathBuf,
    games: Vec<Game>,
}

impl GameHistory {
    /// Load the history; an unreadable file starts an empty history.
    pub fn load(path: &Path) -> Self {
        let games = match store::load_json::<Vec<Game>>(path) {
            Ok(games) => games.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Ignoring unreadable game history: {:#}", e);
                Vec::new()
            }
        };

        Self {
            path: path.to_path_buf(),
            games,
        }
    }

    pub fn games(&self) -> &[Game] {
        &self.games
    }

    pub fn find(&self, app_id: u32) -> Option<&Game> {
        self.games.iter().find(|g| g.app_id == app_id)
    }

    /// Record a game; already known games keep their position.
    pub fn add(&mut self, game: Game) -> Result<()> {
        if self.find(game.app_id).is_some() {
            return Ok(());
        }

        self.games.insert(0, game);
        self.games.truncate(MAX_KNOWN_GAMES);
        store::save_json(&self.path, &self.games)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_deduplicates_and_caps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("known_games.json");

        let mut history = GameHistory::load(&path);
        for app_id in 0..25 {
            history.add(Game::new(app_id, &format!("Game {}", app_id))).unwrap();
        }
        history.add(Game::new(24, "Renamed")).unwrap();

        let reloaded = GameHistory::load(&path);
        assert_eq!(reloaded.games().len(), MAX_KNOWN_GAMES);
        assert_eq!(reloaded.games()[0].app_id, 24);
        assert_eq!(reloaded.games()[0].name, "Game_24");
        assert!(reloaded.find(4).is_none());
        assert!(reloaded.find(5).is_some());
    }

    #[test]
    fn corrupt_history_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("known_games.json");
        std::fs::write(&path, "[{").unwrap();
        assert!(GameHistory::load(&path).games().is_empty());
    }
}
