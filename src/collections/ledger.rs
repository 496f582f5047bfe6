//! Processing ledger (`collections_processed.json`)
//!
//! Records, per category, which shards were submitted and into which
//! collection, and which failure shards were resolved and archived.

use crate::store::{self, OrderedMap};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Ledger files that cannot be used at all
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger {} is not valid JSON: {source}", path.display())]
    InvalidJson {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Ledger {} must contain a JSON object", path.display())]
    NotAnObject { path: PathBuf },
}

/// A submitted shard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardRecord {
    pub collection_id: Option<String>,
    pub added_mods: Vec<String>,
}

/// Ledger entry of one category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryRecord {
    /// Shard file name -> submission record
    pub collections: OrderedMap<ShardRecord>,
    /// Failure shards that were fully retried and archived
    pub failed_done: Vec<String>,
}

impl CategoryRecord {
    pub fn is_recorded(&self, shard_name: &str) -> bool {
        self.collections.contains_key(shard_name)
    }

    pub fn is_failed_done(&self, shard_name: &str) -> bool {
        self.failed_done.iter().any(|s| s == shard_name)
    }

    fn dedup_failed_done(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.failed_done.retain(|name| seen.insert(name.clone()));
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    categories: OrderedMap<CategoryRecord>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the ledger; a missing file is an empty ledger.
    ///
    /// Category entries of the wrong shape are reset to empty with a
    /// warning. A file that is not a JSON object is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read ledger {}", path.display()))?;
        let value: Value =
            serde_json::from_str(&content).map_err(|source| LedgerError::InvalidJson {
                path: path.to_path_buf(),
                source,
            })?;

        if !value.is_object() {
            return Err(LedgerError::NotAnObject {
                path: path.to_path_buf(),
            }
            .into());
        }

        // second pass keeps the key order of the file
        let entries: OrderedMap<Value> =
            serde_json::from_str(&content).map_err(|source| LedgerError::InvalidJson {
                path: path.to_path_buf(),
                source,
            })?;

        let mut categories = OrderedMap::new();
        for (name, entry) in entries {
            let record = match serde_json::from_value::<CategoryRecord>(entry) {
                Ok(mut record) => {
                    record.dedup_failed_done();
                    record
                }
                Err(e) => {
                    tracing::warn!("Resetting malformed ledger entry '{}': {}", name, e);
                    CategoryRecord::default()
                }
            };
            categories.insert(name, record);
        }

        Ok(Self { categories })
    }

    /// Rewrite the whole ledger
    pub fn save(&self, path: &Path) -> Result<()> {
        store::save_json(path, self)
    }

    pub fn category(&self, name: &str) -> Option<&CategoryRecord> {
        self.categories.get(name)
    }

    /// Entry for a category, created on first use
    pub fn category_mut(&mut self, name: &str) -> &mut CategoryRecord {
        self.categories.get_or_default(name)
    }

    pub fn categories(&self) -> impl Iterator<Item = (&str, &CategoryRecord)> {
        self.categories.iter()
    }

    pub fn is_recorded(&self, category: &str, shard_name: &str) -> bool {
        self.category(category)
            .map(|c| c.is_recorded(shard_name))
            .unwrap_or(false)
    }

    pub fn shard(&self, category: &str, shard_name: &str) -> Option<&ShardRecord> {
        self.category(category)?.collections.get(shard_name)
    }

    /// Record a submitted shard, replacing any earlier record
    pub fn record_shard(
        &mut self,
        category: &str,
        shard_name: &str,
        collection_id: Option<String>,
        added_mods: Vec<String>,
    ) {
        self.category_mut(category).collections.insert(
            shard_name.to_string(),
            ShardRecord {
                collection_id,
                added_mods,
            },
        );
    }

    /// Append ids to a recorded shard, skipping ones already listed
    pub fn merge_added(&mut self, category: &str, shard_name: &str, ids: &[String]) {
        if let Some(record) = self
            .category_mut(category)
            .collections
            .get_mut(shard_name)
        {
            for id in ids {
                if !record.added_mods.contains(id) {
                    record.added_mods.push(id.clone());
                }
            }
        }
    }

    /// Remember an archived failure shard
    pub fn mark_failed_done(&mut self, category: &str, shard_name: &str) {
        let record = self.category_mut(category);
        if !record.is_failed_done(shard_name) {
            record.failed_done.push(shard_name.to_string());
        }
    }
}
