//! Append-only processing log and failure-shard archival

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// `log/processing.log` of a game, one `[YYYY-MM-DD HH:MM:SS] message` per line
#[derive(Debug, Clone)]
pub struct ProcessingLog {
    path: PathBuf,
}

impl ProcessingLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a line; failures to write are only traced
    pub fn log(&self, message: &str) {
        tracing::info!("{}", message);
        if let Err(e) = self.append(message) {
            tracing::warn!("Could not write {}: {:#}", self.path.display(), e);
        }
    }

    pub fn error(&self, message: &str) {
        tracing::error!("{}", message);
        if let Err(e) = self.append(&format!("ERROR: {}", message)) {
            tracing::warn!("Could not write {}: {:#}", self.path.display(), e);
        }
    }

    fn append(&self, message: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", format_line(&chrono::Local::now(), message))?;
        Ok(())
    }
}

fn format_line<Tz: chrono::TimeZone>(at: &chrono::DateTime<Tz>, message: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("[{}] {}", at.format("%Y-%m-%d %H:%M:%S"), message)
}

/// Move a shard into `archive_dir`, keeping its file name
pub fn archive_shard(archive_dir: &Path, shard: &Path) -> Result<PathBuf> {
    let name = shard
        .file_name()
        .with_context(|| format!("{} has no file name", shard.display()))?;

    std::fs::create_dir_all(archive_dir)
        .with_context(|| format!("Failed to create {}", archive_dir.display()))?;
    let target = archive_dir.join(name);

    // rename fails across filesystems
    if std::fs::rename(shard, &target).is_err() {
        std::fs::copy(shard, &target).with_context(|| {
            format!("Failed to archive {} to {}", shard.display(), target.display())
        })?;
        std::fs::remove_file(shard)
            .with_context(|| format!("Failed to remove {}", shard.display()))?;
    }

    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn lines_are_timestamped() {
        let at = chrono::Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(format_line(&at, "hello"), "[2024-03-09 07:05:01] hello");
    }

    #[test]
    fn log_appends() {
        let dir = tempfile::tempdir().unwrap();
        let log = ProcessingLog::new(dir.path().join("log").join("processing.log"));
        log.log("first");
        log.error("second");

        let text = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("] first"));
        assert!(lines[1].ends_with("] ERROR: second"));
    }

    #[test]
    fn archive_moves_file() {
        let dir = tempfile::tempdir().unwrap();
        let shard = dir.path().join("W_1_FAILED.csv");
        std::fs::write(&shard, "2\n").unwrap();

        let target = archive_shard(&dir.path().join("archived_csv"), &shard).unwrap();
        assert!(!shard.exists());
        assert_eq!(target, dir.path().join("archived_csv").join("W_1_FAILED.csv"));
        assert_eq!(std::fs::read_to_string(target).unwrap(), "2\n");
    }
}
