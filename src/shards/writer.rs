//! Category -> CSV shard export

use super::{list_shards, read_shard_ids, shard_file_name, write_shard};
use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Default cap on ids per shard
pub const DEFAULT_MODS_PER_CSV: usize = 750;

/// Writes a category's mod ids into size-bounded shards
#[derive(Debug, Clone)]
pub struct ShardWriter {
    max_per_shard: usize,
}

impl Default for ShardWriter {
    fn default() -> Self {
        Self {
            max_per_shard: DEFAULT_MODS_PER_CSV,
        }
    }
}

impl ShardWriter {
    pub fn new(max_per_shard: usize) -> Result<Self> {
        if max_per_shard == 0 {
            bail!("mods_per_csv must be at least 1");
        }
        Ok(Self { max_per_shard })
    }

    /// Write `mods` for `category` into `dir`.
    ///
    /// In append mode ids already present in any existing shard are skipped
    /// and numbering continues after the highest existing index. Otherwise
    /// every existing shard in `dir` is deleted first. Returns the shards
    /// written; an empty delta writes nothing.
    pub fn write_category(
        &self,
        dir: &Path,
        game: &str,
        category: &str,
        mods: &[String],
        append: bool,
    ) -> Result<Vec<PathBuf>> {
        let mut present: HashSet<String> = HashSet::new();
        let mut next_index: u32 = 1;

        if append {
            for shard in list_shards(dir)? {
                present.extend(read_shard_ids(&shard.path)?);
                if let Some(index) = shard.normal_index() {
                    let after = index.checked_add(1).with_context(|| {
                        format!("Shard index of {} is too large", shard.path.display())
                    })?;
                    next_index = next_index.max(after);
                }
            }
        } else {
            self.clear(dir)?;
        }

        let new_mods: Vec<String> = mods
            .iter()
            .filter(|id| present.insert((*id).clone()))
            .cloned()
            .collect();

        if new_mods.is_empty() {
            tracing::info!("No new mods for category '{}'", category);
            return Ok(Vec::new());
        }

        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let mut written = Vec::new();
        for (offset, chunk) in new_mods.chunks(self.max_per_shard).enumerate() {
            let index = u32::try_from(offset)
                .ok()
                .and_then(|offset| next_index.checked_add(offset))
                .context("Shard numbering overflowed")?;
            let path = dir.join(shard_file_name(game, category, index));
            write_shard(&path, chunk)?;
            tracing::debug!("Wrote {} ids to {}", chunk.len(), path.display());
            written.push(path);
        }

        tracing::info!(
            "Category '{}': {} new mods in {} shard(s)",
            category,
            new_mods.len(),
            written.len()
        );

        Ok(written)
    }

    /// Remove every shard of a category before regenerating it
    fn clear(&self, dir: &Path) -> Result<()> {
        for shard in list_shards(dir)? {
            std::fs::remove_file(&shard.path)
                .with_context(|| format!("Failed to remove {}", shard.path.display()))?;
        }
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shards::ShardFile;
    use std::collections::HashMap;

    fn ids(values: &[u32]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn shard_contents(dir: &Path) -> HashMap<String, Vec<String>> {
        list_shards(dir)
            .unwrap()
            .into_iter()
            .map(|s| (s.name.clone(), read_shard_ids(&s.path).unwrap()))
            .collect()
    }

    #[test]
    fn overwrite_splits_into_bounded_shards() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ShardWriter::new(2).unwrap();

        let written = writer
            .write_category(dir.path(), "X", "weapons", &ids(&[1, 2, 3, 4]), false)
            .unwrap();

        assert_eq!(written.len(), 2);
        let shards = shard_contents(dir.path());
        assert_eq!(shards["X_weapons_1.csv"], ids(&[1, 2]));
        assert_eq!(shards["X_weapons_2.csv"], ids(&[3, 4]));
    }

    #[test]
    fn append_only_writes_new_ids() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ShardWriter::new(2).unwrap();
        writer
            .write_category(dir.path(), "X", "weapons", &ids(&[1, 2, 3, 4]), false)
            .unwrap();

        let written = writer
            .write_category(dir.path(), "X", "weapons", &ids(&[3, 4, 5]), true)
            .unwrap();

        assert_eq!(written, vec![dir.path().join("X_weapons_3.csv")]);
        assert_eq!(shard_contents(dir.path())["X_weapons_3.csv"], ids(&[5]));
    }

    #[test]
    fn append_with_empty_delta_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ShardWriter::new(3).unwrap();
        writer
            .write_category(dir.path(), "X", "maps", &ids(&[1, 2, 3, 4]), false)
            .unwrap();

        let written = writer
            .write_category(dir.path(), "X", "maps", &ids(&[4, 2]), true)
            .unwrap();

        assert!(written.is_empty());
        assert_eq!(list_shards(dir.path()).unwrap().len(), 2);
    }

    #[test]
    fn append_never_duplicates_ids() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ShardWriter::new(3).unwrap();
        let runs: [&[u32]; 4] = [&[1, 2, 3, 4], &[3, 4, 5, 6, 7], &[1, 7, 8, 8, 9], &[9, 10]];

        for run in runs {
            writer
                .write_category(dir.path(), "X", "maps", &ids(run), true)
                .unwrap();
        }

        let mut all: Vec<String> = shard_contents(dir.path()).into_values().flatten().collect();
        let total = all.len();
        all.sort();
        all.dedup();
        assert_eq!(total, all.len());
        assert_eq!(total, 10);
        assert!(shard_contents(dir.path()).values().all(|s| s.len() <= 3));
    }

    #[test]
    fn overwrite_removes_previous_shards() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ShardWriter::new(1).unwrap();
        writer
            .write_category(dir.path(), "X", "maps", &ids(&[1, 2, 3]), false)
            .unwrap();
        std::fs::write(dir.path().join("X_maps_2_FAILED.csv"), "2\n").unwrap();

        writer
            .write_category(dir.path(), "X", "maps", &ids(&[9]), false)
            .unwrap();

        let shards = shard_contents(dir.path());
        assert_eq!(shards.len(), 1);
        assert_eq!(shards["X_maps_1.csv"], ids(&[9]));
    }

    #[test]
    fn numbering_ignores_failure_shards() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("X_maps_4_FAILED.csv"), "40\n").unwrap();
        std::fs::write(dir.path().join("X_maps_2.csv"), "20\n").unwrap();

        let written = ShardWriter::new(5)
            .unwrap()
            .write_category(dir.path(), "X", "maps", &ids(&[20, 40, 50]), true)
            .unwrap();

        assert_eq!(written, vec![dir.path().join("X_maps_3.csv")]);
        let shard = ShardFile::from_path(&written[0]).unwrap();
        assert_eq!(read_shard_ids(&shard.path).unwrap(), ids(&[50]));
    }

    #[test]
    fn zero_sized_shards_are_rejected() {
        assert!(ShardWriter::new(0).is_err());
    }

    #[test]
    fn slash_in_category_stays_one_directory() {
        let data = tempfile::tempdir().unwrap();
        let files = crate::games::Game::new(1, "X").files(data.path());
        let dir = files.category_csv_dir("Skins/Textures");
        assert_eq!(dir.parent().unwrap(), files.csv_root());

        let written = ShardWriter::default()
            .write_category(&dir, "X", "Skins/Textures", &ids(&[1]), false)
            .unwrap();

        assert_eq!(written, vec![dir.join("X_Skins_Textures_1.csv")]);
        assert_eq!(read_shard_ids(&written[0]).unwrap(), ids(&[1]));
    }

    #[test]
    fn dot_dot_category_cannot_leave_csv_root() {
        let data = tempfile::tempdir().unwrap();
        let files = crate::games::Game::new(1, "X").files(data.path());
        let dir = files.category_csv_dir("..");
        assert_eq!(dir.parent().unwrap(), files.csv_root());
    }

    #[test]
    fn stray_maximum_index_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_shard(&dir.path().join("X_weapons_4294967295.csv"), &ids(&[1])).unwrap();

        let result = ShardWriter::default().write_category(
            dir.path(),
            "X",
            "weapons",
            &ids(&[2]),
            true,
        );

        assert!(result.is_err());
    }
}
