//! Reconciles a game's shards against the processing ledger
//!
//! Categories are handled one at a time and shards one at a time. A failing
//! shard is logged and skipped; only an unusable ledger stops a run.

use super::bulk::{BulkAddOptions, BulkAdder};
use super::ledger::Ledger;
use super::log::{archive_shard, ProcessingLog};
use super::{CollectionCreator, ModAdder, NewCollection, ProcessMode, Prompter};
use crate::games::GameFiles;
use crate::progress::ProgressObserver;
use crate::shards::{failure_shard_path, list_shards, read_shard_ids, ShardFile};
use anyhow::Result;
use std::fmt;
use std::path::PathBuf;

/// Shards of one category queued for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub category: String,
    pub shards: Vec<ShardFile>,
}

impl WorkItem {
    pub fn failure_shards(&self) -> usize {
        self.shards.iter().filter(|s| s.failed).count()
    }
}

/// Totals of a processing run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessSummary {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub archived: usize,
    pub mods_added: usize,
    pub mods_failed: usize,
}

impl fmt::Display for ProcessSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} shards processed, {} skipped, {} failed, {} archived; {} mods added, {} mods failed",
            self.processed,
            self.skipped,
            self.failed,
            self.archived,
            self.mods_added,
            self.mods_failed
        )
    }
}

/// Every category that has at least one shard on disk, in the given order
pub fn build_work_map(files: &GameFiles, categories: &[String]) -> Result<Vec<WorkItem>> {
    let mut work = Vec::new();
    for category in categories {
        let shards = list_shards(&files.category_csv_dir(category))?;
        if shards.is_empty() {
            continue;
        }
        work.push(WorkItem {
            category: category.clone(),
            shards,
        });
    }
    Ok(work)
}

pub struct CollectionProcessor<'a> {
    files: GameFiles,
    creator: &'a dyn CollectionCreator,
    adder: &'a dyn ModAdder,
    progress: &'a dyn ProgressObserver,
    options: BulkAddOptions,
    image_path: Option<PathBuf>,
    log: ProcessingLog,
}

impl<'a> CollectionProcessor<'a> {
    pub fn new(
        files: GameFiles,
        creator: &'a dyn CollectionCreator,
        adder: &'a dyn ModAdder,
        progress: &'a dyn ProgressObserver,
    ) -> Self {
        let log = ProcessingLog::new(files.processing_log());
        Self {
            files,
            creator,
            adder,
            progress,
            options: BulkAddOptions::default(),
            image_path: None,
            log,
        }
    }

    pub fn with_options(mut self, options: BulkAddOptions) -> Self {
        self.options = options;
        self
    }

    /// Preview image for newly created collections
    pub fn with_image(mut self, image_path: Option<PathBuf>) -> Self {
        self.image_path = image_path;
        self
    }

    /// Process `work` in `mode` after the prompter confirms it
    pub async fn run(
        &self,
        mode: ProcessMode,
        work: &[WorkItem],
        prompter: &dyn Prompter,
    ) -> Result<ProcessSummary> {
        let mut summary = ProcessSummary::default();

        if work.is_empty() {
            tracing::info!("No shards to process");
            return Ok(summary);
        }
        if !prompter.confirm(work) {
            tracing::info!("Processing cancelled");
            return Ok(summary);
        }

        let ledger_path = self.files.ledger_file();
        let mut ledger = Ledger::load(&ledger_path)?;

        self.log.log(&format!(
            "Starting {} run over {} categories",
            mode,
            work.len()
        ));

        for item in work {
            self.process_category(mode, item, &mut ledger, prompter, &mut summary)
                .await;
            ledger.save(&ledger_path)?;
        }

        self.log.log(&format!("Run finished: {}", summary));
        Ok(summary)
    }

    async fn process_category(
        &self,
        mode: ProcessMode,
        item: &WorkItem,
        ledger: &mut Ledger,
        prompter: &dyn Prompter,
        summary: &mut ProcessSummary,
    ) {
        let category = item.category.as_str();
        let eligible = self.select(mode, item, ledger, prompter, summary);

        tracing::info!(
            "Category '{}': {} of {} shards eligible",
            category,
            eligible.len(),
            item.shards.len()
        );

        for shard in eligible {
            let result = if shard.failed {
                self.process_failure_shard(category, shard, ledger, summary)
                    .await
            } else {
                self.process_normal_shard(category, shard, ledger, summary)
                    .await
            };

            if let Err(e) = result {
                summary.failed += 1;
                self.log
                    .error(&format!("[{}] {} failed: {:#}", category, shard.name, e));
            }
        }
    }

    /// Shards of `item` that `mode` picks up
    fn select<'w>(
        &self,
        mode: ProcessMode,
        item: &'w WorkItem,
        ledger: &Ledger,
        prompter: &dyn Prompter,
        summary: &mut ProcessSummary,
    ) -> Vec<&'w ShardFile> {
        let category = item.category.as_str();
        let (failures, normals): (Vec<&ShardFile>, Vec<&ShardFile>) =
            item.shards.iter().partition(|s| s.failed);

        match mode {
            ProcessMode::FailedOnly => {
                for shard in &normals {
                    tracing::debug!("[{}] {} is not a failure shard, skipped", category, shard.name);
                }
                summary.skipped += normals.len();
                failures
            }
            ProcessMode::All => normals,
            ProcessMode::NewOnly => {
                let (done, fresh): (Vec<&ShardFile>, Vec<&ShardFile>) = normals
                    .into_iter()
                    .partition(|s| ledger.is_recorded(category, &s.name));
                for shard in &done {
                    tracing::info!("[{}] {} already has a collection, skipped", category, shard.name);
                }
                summary.skipped += done.len();
                fresh
            }
            ProcessMode::Manual => {
                if normals.is_empty() {
                    return Vec::new();
                }
                let offered: Vec<ShardFile> = normals.iter().map(|s| (*s).clone()).collect();
                let mut chosen = prompter.select_shards(category, &offered);
                chosen.sort_unstable();
                chosen.dedup();

                let picked: Vec<&ShardFile> = chosen
                    .into_iter()
                    .filter_map(|i| normals.get(i).copied())
                    .collect();
                summary.skipped += normals.len() - picked.len();
                picked
            }
        }
    }

    async fn process_normal_shard(
        &self,
        category: &str,
        shard: &ShardFile,
        ledger: &mut Ledger,
        summary: &mut ProcessSummary,
    ) -> Result<()> {
        let ids = read_shard_ids(&shard.path)?;
        if ids.is_empty() {
            self.log
                .log(&format!("[{}] {} has no mods, skipped", category, shard.name));
            summary.skipped += 1;
            return Ok(());
        }

        let title = shard.stem().to_string();
        let collection_id = self
            .creator
            .create_collection(&NewCollection {
                name: title.clone(),
                description: title.clone(),
                image_path: self.image_path.clone(),
                category: category.to_string(),
            })
            .await?;
        self.log.log(&format!(
            "[{}] Created collection {} for {}",
            category, collection_id, shard.name
        ));

        let report = BulkAdder::new(self.adder, self.options.clone())
            .add_ids(
                &ids,
                &failure_shard_path(&shard.path),
                &collection_id,
                &title,
                self.progress,
            )
            .await?;

        ledger.record_shard(
            category,
            &shard.name,
            Some(collection_id),
            report.added.clone(),
        );
        ledger.save(&self.files.ledger_file())?;

        summary.processed += 1;
        summary.mods_added += report.succeeded;
        summary.mods_failed += report.failed;
        self.log.log(&format!(
            "[{}] {}: {} added, {} failed",
            category, shard.name, report.succeeded, report.failed
        ));
        Ok(())
    }

    async fn process_failure_shard(
        &self,
        category: &str,
        shard: &ShardFile,
        ledger: &mut Ledger,
        summary: &mut ProcessSummary,
    ) -> Result<()> {
        let parent = shard.parent_name();
        let Some(parent_record) = ledger.shard(category, &parent).cloned() else {
            summary.failed += 1;
            self.log.error(&format!(
                "[{}] {}: parent shard {} was never processed, left untouched",
                category, shard.name, parent
            ));
            return Ok(());
        };

        let ids = read_shard_ids(&shard.path)?;

        let (collection_id, title, into_parent) = match parent_record.collection_id {
            Some(id) => {
                let title = parent.trim_end_matches(".csv").to_string();
                (id, title, true)
            }
            None => {
                let title = shard.stem().to_string();
                let id = self
                    .creator
                    .create_collection(&NewCollection {
                        name: title.clone(),
                        description: title.clone(),
                        image_path: self.image_path.clone(),
                        category: category.to_string(),
                    })
                    .await?;
                self.log.log(&format!(
                    "[{}] {} has no recorded collection, created {} for {}",
                    category, parent, id, shard.name
                ));
                (id, title, false)
            }
        };

        let report = BulkAdder::new(self.adder, self.options.clone())
            .add_ids(
                &ids,
                &failure_shard_path(&shard.path),
                &collection_id,
                &title,
                self.progress,
            )
            .await?;

        if into_parent {
            ledger.merge_added(category, &parent, &report.added);
        }
        summary.processed += 1;
        summary.mods_added += report.succeeded;
        summary.mods_failed += report.failed;

        if report.is_complete() {
            let archived = archive_shard(&self.files.archive_dir(), &shard.path)?;
            ledger.mark_failed_done(category, &shard.name);
            summary.archived += 1;
            self.log.log(&format!(
                "[{}] {} resolved, archived to {}",
                category,
                shard.name,
                archived.display()
            ));
        } else {
            self.log.log(&format!(
                "[{}] {}: {} mods still failing, kept for another retry",
                category, shard.name, report.failed
            ));
        }

        ledger.save(&self.files.ledger_file())?;
        Ok(())
    }
}
