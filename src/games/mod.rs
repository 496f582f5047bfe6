//! Game identity and per-game data layout

mod history;

pub use history::{GameHistory, MAX_KNOWN_GAMES};

use crate::store;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A Steam game the toolkit works on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    /// Steam App ID
    pub app_id: u32,
    /// Store name with spaces replaced by underscores
    pub name: String,
}

impl Game {
    pub fn new(app_id: u32, name: &str) -> Self {
        Self {
            app_id,
            name: normalize_name(name),
        }
    }

    /// File layout for this game below the data root
    pub fn files(&self, data_root: &Path) -> GameFiles {
        GameFiles::new(data_root.join(format!("{}_{}", self.app_id, self.name)))
    }
}

/// Store names end up in directory and shard names.
pub fn normalize_name(name: &str) -> String {
    store::path_component(&name.trim().replace(' ', "_"))
}

/// All files and directories owned by one game
#[derive(Debug, Clone)]
pub struct GameFiles {
    base: PathBuf,
}

impl GameFiles {
    pub fn new(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base
    }

    /// Raw catalog records: mods_raw.json
    pub fn raw_file(&self) -> PathBuf {
        self.base.join("mods_raw.json")
    }

    /// Sorted tag list: tags_list.json
    pub fn tags_file(&self) -> PathBuf {
        self.base.join("tags_list.json")
    }

    /// Category map: mods_by_category.json
    pub fn categories_file(&self) -> PathBuf {
        self.base.join("mods_by_category.json")
    }

    /// Root of all shard directories
    pub fn csv_root(&self) -> PathBuf {
        self.base.join("csv")
    }

    /// Shard directory for one category
    pub fn category_csv_dir(&self, category: &str) -> PathBuf {
        self.csv_root().join(store::path_component(category))
    }

    /// Processing ledger: collections_processed.json
    pub fn ledger_file(&self) -> PathBuf {
        self.base.join("collections_processed.json")
    }

    /// Resolved failure shards end up here
    pub fn archive_dir(&self) -> PathBuf {
        self.base.join("archived_csv")
    }

    /// Append-only processing log: log/processing.log
    pub fn processing_log(&self) -> PathBuf {
        self.base.join("log").join("processing.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_normalized() {
        let game = Game::new(294100, " Total War WARHAMMER ");
        assert_eq!(game.name, "Total_War_WARHAMMER");
    }

    #[test]
    fn files_live_under_app_id_and_name() {
        let game = Game::new(294100, "RimWorld");
        let files = game.files(Path::new("/data"));
        assert_eq!(files.base_dir(), Path::new("/data/294100_RimWorld"));
        assert_eq!(
            files.category_csv_dir("Mod"),
            PathBuf::from("/data/294100_RimWorld/csv/Mod")
        );
        assert_eq!(
            files.processing_log(),
            PathBuf::from("/data/294100_RimWorld/log/processing.log")
        );
        assert_eq!(
            files.ledger_file(),
            PathBuf::from("/data/294100_RimWorld/collections_processed.json")
        );
    }
}
