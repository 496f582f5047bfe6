//! Collection building: bulk-adding shards, the processing ledger, and the
//! per-mode reconciliation of shards against it.

pub mod bulk;
pub mod ledger;
pub mod log;
pub mod processor;

pub use bulk::{BulkAddOptions, BulkAddReport, BulkAdder};
pub use ledger::{CategoryRecord, Ledger, LedgerError, ShardRecord};
pub use log::{archive_shard, ProcessingLog};
pub use processor::{CollectionProcessor, ProcessSummary, WorkItem};

use crate::shards::ShardFile;
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;

/// Which shards a processing run picks up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessMode {
    /// Every normal shard
    All,
    /// Normal shards not yet in the ledger
    NewOnly,
    /// Normal shards chosen interactively, once per category
    Manual,
    /// Failure shards only
    FailedOnly,
}

impl ProcessMode {
    pub const ALL_MODES: [ProcessMode; 4] = [
        ProcessMode::All,
        ProcessMode::NewOnly,
        ProcessMode::Manual,
        ProcessMode::FailedOnly,
    ];

    pub fn from_cli(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().replace('-', "_").as_str() {
            "all" | "1" => Ok(ProcessMode::All),
            "new" | "new_only" | "2" => Ok(ProcessMode::NewOnly),
            "manual" | "3" => Ok(ProcessMode::Manual),
            "failed" | "failed_only" | "4" => Ok(ProcessMode::FailedOnly),
            other => bail!(
                "Invalid mode '{}'. Valid modes: all, new, manual, failed",
                other
            ),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ProcessMode::All => "Process all CSV shards",
            ProcessMode::NewOnly => "Process only shards without a collection",
            ProcessMode::Manual => "Choose shards per category",
            ProcessMode::FailedOnly => "Retry failure shards",
        }
    }
}

impl fmt::Display for ProcessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessMode::All => "all",
            ProcessMode::NewOnly => "new",
            ProcessMode::Manual => "manual",
            ProcessMode::FailedOnly => "failed",
        };
        f.write_str(name)
    }
}

/// What a new collection is created with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCollection {
    pub name: String,
    pub description: String,
    pub image_path: Option<PathBuf>,
    pub category: String,
}

/// Adds a single mod to a collection
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModAdder: Send + Sync {
    /// `Ok(false)` when Steam refused the addition
    async fn add_mod(&self, mod_id: &str, collection_id: &str, title: &str) -> Result<bool>;
}

/// Creates a collection and returns its id
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CollectionCreator: Send + Sync {
    async fn create_collection(&self, request: &NewCollection) -> Result<String>;
}

/// Interactive decisions taken during a processing run
#[cfg_attr(test, mockall::automock)]
pub trait Prompter {
    /// Confirm the work map before anything is submitted
    fn confirm(&self, work: &[WorkItem]) -> bool;

    /// Indices into `shards` that should be processed
    fn select_shards(&self, category: &str, shards: &[ShardFile]) -> Vec<usize>;
}
