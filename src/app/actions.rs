//! CLI command action handlers

use super::prompt::{self, ConsolePrompter};
use super::App;
use crate::collections::processor::build_work_map;
use crate::collections::{
    BulkAddOptions, CollectionProcessor, Ledger, ModAdder, ProcessMode, ProcessSummary, WorkItem,
};
use crate::config::AddMode;
use crate::games::{Game, GameFiles, GameHistory};
use crate::mods::{build_by_category, extract_tags, CategoryMap, ModRecord};
use crate::progress::ProgressObserver;
use crate::shards::{list_shards, ShardWriter};
use crate::steam::{rest, BrowserSession, CatalogFetcher, CommunityClient, WorkshopApi};
use crate::store;
use anyhow::{bail, Context, Result};
use std::path::PathBuf;

impl App {
    // ========== Game Commands ==========

    pub async fn cmd_game_list(&self) -> Result<()> {
        let games = self.history.games();
        if games.is_empty() {
            println!("No known games. Run 'workshopkit game select <app_id>' to add one.");
            return Ok(());
        }

        let active = self.config.active_game.as_ref().map(|g| g.app_id);

        println!("Known Games:");
        println!("{:-<60}", "");
        for (i, game) in games.iter().enumerate() {
            let marker = if Some(game.app_id) == active {
                " [active]"
            } else {
                ""
            };
            println!("{:>3}. {} ({}){}", i + 1, game.name, game.app_id, marker);
        }
        Ok(())
    }

    /// Select a game by App ID, resolving its name from history or the store
    pub async fn cmd_game_select(&mut self, app_id: u32, name: Option<&str>) -> Result<()> {
        let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None => match self.history.find(app_id) {
                Some(known) => known.name.clone(),
                None => {
                    println!("Looking up App ID {} on the Steam store...", app_id);
                    match rest::fetch_game_name(app_id).await? {
                        Some(name) => name,
                        None => bail!(
                            "App ID {} is not a known Steam game. Pass --name to set it manually.",
                            app_id
                        ),
                    }
                }
            },
        };

        let game = Game::new(app_id, &name);
        println!("Selected: {} ({})", game.name, game.app_id);
        self.set_active_game(game).await
    }

    pub async fn cmd_game_info(&self) -> Result<()> {
        let (game, files) = self.game_files()?;

        println!("Game Information");
        println!("{:-<40}", "");
        println!("Name:        {}", game.name);
        println!("App ID:      {}", game.app_id);
        println!("Data Path:   {}", files.base_dir().display());

        let fetched = files.raw_file().exists();
        println!("Catalog:     {}", if fetched { "downloaded" } else { "not fetched" });

        if let Ok(Some(map)) = store::load_json::<CategoryMap>(&files.categories_file()) {
            println!("Categories:  {}", map.len());

            let mut shards = 0;
            let mut failures = 0;
            for category in map.iter() {
                for shard in list_shards(&files.category_csv_dir(&category.name))? {
                    if shard.failed {
                        failures += 1;
                    } else {
                        shards += 1;
                    }
                }
            }
            println!("CSV shards:  {} ({} failure shards)", shards, failures);
        }

        let ledger = Ledger::load(&files.ledger_file())?;
        let submitted: usize = ledger.categories().map(|(_, c)| c.collections.len()).sum();
        let archived: usize = ledger.categories().map(|(_, c)| c.failed_done.len()).sum();
        println!("Collections: {} submitted, {} failure shards resolved", submitted, archived);
        Ok(())
    }

    // ========== Catalog Commands ==========

    /// Download the catalog, then write the raw dump, tag list and category map
    pub async fn cmd_fetch(&self) -> Result<()> {
        let (game, files) = self.game_files()?;
        let api_key = self.config.require_api_key()?;
        let api = WorkshopApi::new(&api_key)?;

        println!("Fetching Workshop catalog for {} ({})...", game.name, game.app_id);
        let fetcher = CatalogFetcher::new(&api, self.config.mods_per_page)?
            .with_page_delay(self.config.request_delay());
        let (items, stats) = fetcher.fetch_all(game.app_id, &self.progress).await?;

        store::save_json(&files.raw_file(), &items)?;

        let records: Vec<ModRecord> = items.iter().map(ModRecord::from).collect();
        let tags = extract_tags(&records);
        store::save_json(&files.tags_file(), &tags)?;

        let categories = build_by_category(&records);
        store::save_json(&files.categories_file(), &categories)?;

        println!(
            "Fetched {} mods ({} ids listed, {} failed detail batches) into {} categories.",
            stats.mods_fetched,
            stats.ids_listed,
            stats.detail_batches_failed,
            categories.len()
        );
        Ok(())
    }

    pub async fn cmd_categories(&self) -> Result<()> {
        let (game, files) = self.game_files()?;
        let map = self.load_categories(&files)?;

        println!("Categories for {}:", game.name);
        println!("{:-<60}", "");
        for (i, category) in map.iter().enumerate() {
            println!("{:>3}. {} ({} mods)", i + 1, category.name, category.mods.len());
        }
        Ok(())
    }

    /// Resolve a category selection, asking when none was given
    fn select_categories(
        &self,
        map: &CategoryMap,
        selection: Option<&str>,
        all: bool,
    ) -> Result<Vec<usize>> {
        if all {
            return Ok((0..map.len()).collect());
        }

        let answer = match selection {
            Some(selection) => selection.to_string(),
            None => {
                println!("\nCategories:");
                println!("  0 - All");
                for (i, category) in map.iter().enumerate() {
                    println!("  {} - {}", i + 1, category.name);
                }
                prompt::read_line("Select (ex: 1,3 or 0): ")?
            }
        };

        let indices = prompt::parse_selection(&answer, map.len());
        if indices.is_empty() {
            bail!("No valid category selected");
        }
        Ok(indices)
    }

    /// Write CSV shards for the selected categories
    pub async fn cmd_csv(&self, selection: Option<&str>, all: bool, overwrite: bool) -> Result<()> {
        let (game, files) = self.game_files()?;
        let map = self.load_categories(&files)?;
        let indices = self.select_categories(&map, selection, all)?;
        let writer = ShardWriter::new(self.config.mods_per_csv)?;

        let selected = map.select(&indices);
        let total = selected.len() as u64;
        let mut written = 0;

        for (i, category) in selected.into_iter().enumerate() {
            self.progress.on_progress(
                i as u64 + 1,
                total,
                &format!("Generating CSV for '{}'", category.name),
            );
            let paths = writer.write_category(
                &files.category_csv_dir(&category.name),
                &game.name,
                &category.name,
                &category.mods,
                !overwrite,
            )?;
            written += paths.len();
        }
        self.progress.finish();

        println!(
            "CSV generation completed for {} category(ies): {} new shard(s).",
            total, written
        );
        Ok(())
    }

    // ========== Collection Commands ==========

    /// Create collections from shards and fill them
    pub async fn cmd_collections(
        &self,
        selection: Option<&str>,
        all: bool,
        mode: Option<&str>,
        assume_yes: bool,
    ) -> Result<()> {
        let (game, files) = self.game_files()?;
        let map = self.load_categories(&files)?;

        let categories: Vec<String> = if selection.is_none() && (all || assume_yes) {
            map.names().into_iter().map(str::to_string).collect()
        } else {
            map.select(&self.select_categories(&map, selection, all)?)
                .into_iter()
                .map(|c| c.name.clone())
                .collect()
        };

        let prompter = ConsolePrompter::new(assume_yes);
        let mode = match mode {
            Some(mode) => ProcessMode::from_cli(mode)?,
            None => prompter.ask_mode()?,
        };

        let work = build_work_map(&files, &categories)?;
        if work.is_empty() {
            println!("No CSV found. Run 'workshopkit csv' first.");
            return Ok(());
        }

        // Credentials and inputs are checked before the browser starts
        let community = match self.config.add_mode {
            AddMode::Request => {
                let (session_id, secure_login) = self.config.require_session()?;
                Some(CommunityClient::new(&session_id, &secure_login)?)
            }
            AddMode::Browser => None,
        };
        let image_path = self.config.image_path.as_deref().map(PathBuf::from);
        if let Some(image) = &image_path {
            if !image.is_file() {
                bail!("Collection image {} does not exist", image.display());
            }
        }

        let browser = BrowserSession::launch(&self.config, game.app_id).await?;
        let result = self
            .process_with_browser(
                &browser,
                community.as_ref(),
                files.clone(),
                image_path,
                mode,
                &work,
                &prompter,
            )
            .await;

        if let Err(e) = browser.quit().await {
            tracing::warn!("Failed to close the browser: {:#}", e);
        }

        let summary = result?;
        println!("\n{}", summary);
        println!("Details in {}", files.processing_log().display());
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_with_browser(
        &self,
        browser: &BrowserSession,
        community: Option<&CommunityClient>,
        files: GameFiles,
        image_path: Option<PathBuf>,
        mode: ProcessMode,
        work: &[WorkItem],
        prompter: &ConsolePrompter,
    ) -> Result<ProcessSummary> {
        browser.ensure_logged_in().await?;

        let adder: &dyn ModAdder = match community {
            Some(client) => client,
            None => browser,
        };
        let min_interval = match self.config.add_mode {
            AddMode::Request => self.config.request_delay(),
            AddMode::Browser => self.config.min_time_per_mod(),
        };
        let options = BulkAddOptions {
            min_interval,
            ..BulkAddOptions::default()
        };

        CollectionProcessor::new(files, browser, adder, &self.progress)
            .with_options(options)
            .with_image(image_path)
            .run(mode, work, prompter)
            .await
    }

    // ========== Settings Commands ==========

    pub async fn cmd_settings_show(&self) -> Result<()> {
        let config = &self.config;
        let show = |value: Option<&str>| value.unwrap_or("(not set)").to_string();

        println!("Settings ({})", config.paths.config_file().display());
        println!("{:-<60}", "");
        let rows = [
            ("steam_api_key", mask(config.api_key().as_deref())),
            ("mods_per_page", config.mods_per_page.to_string()),
            ("mods_per_csv", config.mods_per_csv.to_string()),
            ("data_dir", config.data_root().display().to_string()),
            ("browser_profile_dir", config.browser_profile().display().to_string()),
            ("headless", config.headless.to_string()),
            ("image_path", show(config.image_path.as_deref())),
            ("min_time_per_mod", config.min_time_per_mod.to_string()),
            ("request_delay", config.request_delay.to_string()),
            ("session_id", mask(config.session_id.as_deref())),
            ("secure_login", mask(config.secure_login.as_deref())),
            ("webdriver_url", config.webdriver_url.clone()),
            ("add_mode", config.add_mode.as_str().to_string()),
        ];
        for (key, value) in rows {
            println!("  {:<20} {}", key, value);
        }
        Ok(())
    }

    pub async fn cmd_settings_set(&mut self, key: &str, value: &str) -> Result<()> {
        self.config.set_value(key, value)?;
        self.config.save().await?;
        println!("Set {}", key);
        Ok(())
    }

    pub async fn cmd_settings_reset(&mut self) -> Result<()> {
        self.config.reset();
        self.config.save().await?;
        println!("Settings reset to defaults.");
        Ok(())
    }

    /// Delete every game's data and reset the settings
    pub async fn cmd_clear(&mut self, assume_yes: bool) -> Result<()> {
        if !assume_yes && !prompt::confirm("Delete all game data and reset settings?") {
            println!("Aborted.");
            return Ok(());
        }

        let data_root = self.config.data_root();
        let mut removed = 0;
        if data_root.is_dir() {
            for entry in std::fs::read_dir(&data_root)
                .with_context(|| format!("Failed to list {}", data_root.display()))?
            {
                let entry = entry?;
                let name = entry.file_name();
                if entry.file_type()?.is_dir() && is_game_dir(&name.to_string_lossy()) {
                    std::fs::remove_dir_all(entry.path())
                        .with_context(|| format!("Failed to remove {}", entry.path().display()))?;
                    removed += 1;
                }
            }
        }

        let known_games = self.config.known_games_file();
        if known_games.exists() {
            std::fs::remove_file(&known_games)
                .with_context(|| format!("Failed to remove {}", known_games.display()))?;
        }
        self.history = GameHistory::load(&known_games);

        self.config.reset();
        self.config.save().await?;

        println!("Removed data of {} game(s) and reset settings.", removed);
        Ok(())
    }
}

/// `<app_id>_<Name>` directories created per game
fn is_game_dir(name: &str) -> bool {
    name.split_once('_')
        .map(|(id, rest)| !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) && !rest.is_empty())
        .unwrap_or(false)
}

fn mask(secret: Option<&str>) -> String {
    match secret {
        Some(s) if s.chars().count() > 4 => format!("{}…", s.chars().take(4).collect::<String>()),
        Some(_) => "****".to_string(),
        None => "(not set)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn game_dirs_are_recognized() {
        assert!(is_game_dir("294100_RimWorld"));
        assert!(is_game_dir("1_X"));
        assert!(!is_game_dir("chrome-profile"));
        assert!(!is_game_dir("_x"));
        assert!(!is_game_dir("294100_"));
    }

    #[test]
    fn secrets_are_masked() {
        assert_eq!(mask(Some("ABCDEFGH")), "ABCD…");
        assert_eq!(mask(Some("ab")), "****");
        assert_eq!(mask(None), "(not set)");
    }
}
