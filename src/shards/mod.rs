//! CSV shards: size-bounded files of bare mod ids, one per line
//!
//! Normal shards are named `<game>_<category>_<index>.csv`. A shard whose
//! additions partly failed gets a sibling `<stem>_FAILED.csv`.

pub mod writer;

pub use writer::ShardWriter;

use crate::store;
use anyhow::{Context, Result};
use regex_lite::Regex;
use std::cmp::Ordering;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Marker appended to the stem of a failure shard
pub const FAILED_SUFFIX: &str = "_FAILED";

const CSV_EXTENSION: &str = "csv";

fn shard_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)_(\d+)(_failed)?\.csv$").expect("shard name pattern is valid")
    })
}

/// File name of the `index`-th shard of a category
pub fn shard_file_name(game: &str, category: &str, index: u32) -> String {
    format!(
        "{}_{}_{}.{}",
        store::path_component(game),
        store::path_component(category),
        index,
        CSV_EXTENSION
    )
}

/// Whether a shard file name carries the failure marker
pub fn is_failure_name(name: &str) -> bool {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|stem| stem.to_ascii_uppercase().ends_with(FAILED_SUFFIX))
        .unwrap_or(false)
}

/// Name of the normal shard a failure shard was produced from
pub fn parent_shard_name(failure_name: &str) -> String {
    let stem = failure_name
        .strip_suffix(".csv")
        .or_else(|| failure_name.strip_suffix(".CSV"))
        .unwrap_or(failure_name);

    let base = if stem.to_ascii_uppercase().ends_with(FAILED_SUFFIX) {
        &stem[..stem.len() - FAILED_SUFFIX.len()]
    } else {
        stem
    };

    format!("{}.{}", base, CSV_EXTENSION)
}

/// Where the failures of processing `shard` are written.
///
/// A failure shard maps onto itself so a retry rewrites the ids that are
/// still failing instead of producing `_FAILED_FAILED`.
pub fn failure_shard_path(shard: &Path) -> PathBuf {
    let name = shard
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    if is_failure_name(name) {
        return shard.to_path_buf();
    }

    let stem = shard
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    shard.with_file_name(format!("{}{}.{}", stem, FAILED_SUFFIX, CSV_EXTENSION))
}

/// A shard file discovered on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardFile {
    pub path: PathBuf,
    pub name: String,
    /// Shard index; for failure shards, the index of the parent shard
    pub index: Option<u32>,
    pub failed: bool,
}

impl ShardFile {
    /// Classify a path; returns `None` for anything that is not a `.csv` file.
    pub fn from_path(path: &Path) -> Option<Self> {
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(CSV_EXTENSION))
            .unwrap_or(false);
        if !is_csv {
            return None;
        }

        let name = path.file_name()?.to_str()?.to_string();
        let index = shard_name_pattern()
            .captures(&name)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok());

        Some(Self {
            path: path.to_path_buf(),
            failed: is_failure_name(&name),
            name,
            index,
        })
    }

    /// Index that counts towards the next free shard number
    pub fn normal_index(&self) -> Option<u32> {
        if self.failed {
            None
        } else {
            self.index
        }
    }

    pub fn stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
    }

    pub fn parent_name(&self) -> String {
        parent_shard_name(&self.name)
    }
}

fn shard_order(a: &ShardFile, b: &ShardFile) -> Ordering {
    a.index
        .unwrap_or(u32::MAX)
        .cmp(&b.index.unwrap_or(u32::MAX))
        .then(a.failed.cmp(&b.failed))
        .then_with(|| a.name.cmp(&b.name))
}

/// Every shard in `dir`, ordered by index with failure shards after their
/// parent. A missing directory has no shards.
pub fn list_shards(dir: &Path) -> Result<Vec<ShardFile>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut shards = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list shards in {}", dir.display()))?
    {
        let entry = entry.context("Failed to read directory entry")?;
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        if let Some(shard) = ShardFile::from_path(&entry.path()) {
            shards.push(shard);
        }
    }

    shards.sort_by(shard_order);
    Ok(shards)
}

/// Read the ids of a shard in file order
pub fn read_shard_ids(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read shard {}", path.display()))?;

    Ok(content
        .lines()
        .map(|line| line.trim().trim_matches('"').trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Write ids one per line, no header
pub fn write_shard(path: &Path, ids: &[String]) -> Result<()> {
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create shard {}", path.display()))?;
    for id in ids {
        writeln!(file, "{}", id)
            .with_context(|| format!("Failed to write shard {}", path.display()))?;
    }
    file.flush()
        .with_context(|| format!("Failed to flush shard {}", path.display()))
}
