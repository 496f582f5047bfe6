//! Adds every id of a shard to a collection, one at a time

use super::ModAdder;
use crate::progress::ProgressObserver;
use crate::shards::{failure_shard_path, read_shard_ids, write_shard};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Retry and throttle settings
#[derive(Debug, Clone)]
pub struct BulkAddOptions {
    /// Attempts per id
    pub max_retries: u32,
    /// Pause after a failed attempt
    pub retry_delay: Duration,
    /// Minimum time per id, measured from its first attempt
    pub min_interval: Duration,
}

impl Default for BulkAddOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
            min_interval: Duration::from_secs(1),
        }
    }
}

/// Outcome of a bulk add
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkAddReport {
    pub succeeded: usize,
    pub failed: usize,
    pub added: Vec<String>,
    pub failed_ids: Vec<String>,
    /// Written only when something failed
    pub failure_shard: Option<PathBuf>,
}

impl BulkAddReport {
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

pub struct BulkAdder<'a> {
    adder: &'a dyn ModAdder,
    options: BulkAddOptions,
}

impl<'a> BulkAdder<'a> {
    pub fn new(adder: &'a dyn ModAdder, options: BulkAddOptions) -> Self {
        Self { adder, options }
    }

    /// Add a shard's ids; failures go to the shard's `_FAILED` sibling.
    ///
    /// Only an unreadable shard is an error.
    pub async fn add_shard(
        &self,
        shard: &Path,
        collection_id: &str,
        title: &str,
        progress: &dyn ProgressObserver,
    ) -> Result<BulkAddReport> {
        let ids = read_shard_ids(shard)?;
        tracing::info!(
            "Adding {} mods from {} to collection {}",
            ids.len(),
            shard.display(),
            collection_id
        );
        self.add_ids(&ids, &failure_shard_path(shard), collection_id, title, progress)
            .await
    }

    /// Add `ids` in order, writing whatever still fails to `failure_target`
    pub async fn add_ids(
        &self,
        ids: &[String],
        failure_target: &Path,
        collection_id: &str,
        title: &str,
        progress: &dyn ProgressObserver,
    ) -> Result<BulkAddReport> {
        let mut report = BulkAddReport::default();
        let total = ids.len() as u64;
        let started = Instant::now();

        for (i, id) in ids.iter().enumerate() {
            let item_started = Instant::now();

            if self.add_with_retries(id, collection_id, title).await {
                report.succeeded += 1;
                report.added.push(id.clone());
            } else {
                report.failed += 1;
                report.failed_ids.push(id.clone());
                tracing::warn!("Giving up on {} after {} attempts", id, self.options.max_retries);
            }

            let done = i as u64 + 1;
            let eta = estimate_remaining(started.elapsed(), done, total);
            progress.on_progress(
                done,
                total,
                &format!(
                    "OK {} | ERR {} | ETA {}",
                    report.succeeded,
                    report.failed,
                    format_eta(eta)
                ),
            );

            let spent = item_started.elapsed();
            if spent < self.options.min_interval {
                sleep(self.options.min_interval - spent).await;
            }
        }
        progress.finish();

        if !report.failed_ids.is_empty() {
            write_shard(failure_target, &report.failed_ids)?;
            tracing::warn!(
                "{} failed mods saved to {}",
                report.failed,
                failure_target.display()
            );
            report.failure_shard = Some(failure_target.to_path_buf());
        }

        Ok(report)
    }

    async fn add_with_retries(&self, id: &str, collection_id: &str, title: &str) -> bool {
        for attempt in 1..=self.options.max_retries {
            match self.adder.add_mod(id, collection_id, title).await {
                Ok(true) => return true,
                Ok(false) => tracing::debug!("Attempt {} for {} was refused", attempt, id),
                Err(e) => tracing::debug!("Attempt {} for {} failed: {:#}", attempt, id, e),
            }

            if attempt < self.options.max_retries && !self.options.retry_delay.is_zero() {
                sleep(self.options.retry_delay).await;
            }
        }
        false
    }
}

fn estimate_remaining(elapsed: Duration, done: u64, total: u64) -> Duration {
    if done == 0 {
        return Duration::ZERO;
    }
    let per_item = elapsed.as_secs_f64() / done as f64;
    Duration::from_secs_f64(per_item * total.saturating_sub(done) as f64)
}

fn format_eta(eta: Duration) -> String {
    let secs = eta.as_secs();
    format!("{}m {:02}s", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::MockModAdder;
    use crate::progress::{NoProgress, RecordingProgress};
    use anyhow::anyhow;
    use mockall::predicate::eq;

    fn fast() -> BulkAddOptions {
        BulkAddOptions {
            max_retries: 3,
            retry_delay: Duration::ZERO,
            min_interval: Duration::ZERO,
        }
    }

    fn shard_with(dir: &Path, name: &str, ids: &[&str]) -> PathBuf {
        let path = dir.join(name);
        let ids: Vec<String> = ids.iter().map(|s| s.to_string()).collect();
        write_shard(&path, &ids).unwrap();
        path
    }

    #[tokio::test]
    async fn exhausted_retries_write_failure_shard() {
        let dir = tempfile::tempdir().unwrap();
        let shard = shard_with(dir.path(), "weapons_1.csv", &["1", "2"]);

        let mut adder = MockModAdder::new();
        adder
            .expect_add_mod()
            .with(eq("1"), eq("CID1"), eq("weapons_1"))
            .times(1)
            .returning(|_, _, _| Ok(true));
        adder
            .expect_add_mod()
            .with(eq("2"), eq("CID1"), eq("weapons_1"))
            .times(3)
            .returning(|_, _, _| Ok(false));

        let progress = RecordingProgress::default();
        let report = BulkAdder::new(&adder, fast())
            .add_shard(&shard, "CID1", "weapons_1", &progress)
            .await
            .unwrap();

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.added, vec!["1"]);

        let failure = dir.path().join("weapons_1_FAILED.csv");
        assert_eq!(report.failure_shard.as_deref(), Some(failure.as_path()));
        assert_eq!(std::fs::read_to_string(failure).unwrap(), "2\n");

        let updates = progress.updates.lock().unwrap();
        assert_eq!(updates.len(), 2);
        assert_eq!((updates[1].0, updates[1].1), (2, 2));
        assert!(updates[1].2.starts_with("OK 1 | ERR 1"));
    }

    #[tokio::test]
    async fn errors_count_as_failed_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let shard = shard_with(dir.path(), "maps_1.csv", &["7"]);

        let mut adder = MockModAdder::new();
        let mut seq = mockall::Sequence::new();
        adder
            .expect_add_mod()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Err(anyhow!("connection reset")));
        adder
            .expect_add_mod()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(true));

        let report = BulkAdder::new(&adder, fast())
            .add_shard(&shard, "CID", "maps_1", &NoProgress)
            .await
            .unwrap();

        assert!(report.is_complete());
        assert_eq!(report.added, vec!["7"]);
    }

    #[tokio::test]
    async fn clean_run_leaves_no_failure_shard() {
        let dir = tempfile::tempdir().unwrap();
        let shard = shard_with(dir.path(), "maps_1.csv", &["1", "2", "3"]);

        let mut adder = MockModAdder::new();
        adder.expect_add_mod().times(3).returning(|_, _, _| Ok(true));

        let report = BulkAdder::new(&adder, fast())
            .add_shard(&shard, "CID", "maps_1", &NoProgress)
            .await
            .unwrap();

        assert_eq!(report.succeeded, 3);
        assert!(report.failure_shard.is_none());
        assert!(!dir.path().join("maps_1_FAILED.csv").exists());
    }

    #[tokio::test]
    async fn retrying_a_failure_shard_rewrites_it() {
        let dir = tempfile::tempdir().unwrap();
        let shard = shard_with(dir.path(), "maps_1_FAILED.csv", &["4", "5"]);

        let mut adder = MockModAdder::new();
        adder
            .expect_add_mod()
            .returning(|id, _, _| Ok(id == "4"));

        let report = BulkAdder::new(&adder, fast())
            .add_shard(&shard, "CID", "maps_1", &NoProgress)
            .await
            .unwrap();

        assert_eq!(report.failure_shard.as_deref(), Some(shard.as_path()));
        assert_eq!(std::fs::read_to_string(&shard).unwrap(), "5\n");
        assert!(!dir.path().join("maps_1_FAILED_FAILED.csv").exists());
    }

    #[tokio::test]
    async fn unreadable_shard_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let adder = MockModAdder::new();
        let result = BulkAdder::new(&adder, fast())
            .add_shard(&dir.path().join("absent.csv"), "CID", "x", &NoProgress)
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn eta_extrapolates_average_pace() {
        assert_eq!(
            estimate_remaining(Duration::from_secs(10), 2, 6),
            Duration::from_secs(20)
        );
        assert_eq!(format_eta(Duration::from_secs(125)), "2m 05s");
    }
}
