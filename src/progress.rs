//! Progress reporting
//!
//! Long-running steps report `(current, total, message)` to a
//! [`ProgressObserver`]; the core never talks to a UI directly.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;

/// Receives progress updates from long-running operations
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, current: u64, total: u64, message: &str);

    /// Called once the operation is over
    fn finish(&self) {}
}

/// Discards all updates
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&self, _current: u64, _total: u64, _message: &str) {}
}

/// Terminal progress bar, recreated whenever the total changes
#[derive(Default)]
pub struct ConsoleProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn new_bar(total: u64) -> ProgressBar {
        let bar = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} | {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        bar
    }
}

impl ProgressObserver for ConsoleProgress {
    fn on_progress(&self, current: u64, total: u64, message: &str) {
        if total == 0 {
            return;
        }

        let Ok(mut slot) = self.bar.lock() else {
            return;
        };

        let stale = slot
            .as_ref()
            .map(|bar| bar.length() != Some(total))
            .unwrap_or(true);
        if stale {
            if let Some(old) = slot.take() {
                old.finish();
            }
            *slot = Some(Self::new_bar(total));
        }

        if let Some(bar) = slot.as_ref() {
            bar.set_position(current.min(total));
            if !message.is_empty() {
                bar.set_message(message.to_string());
            }
        }
    }

    fn finish(&self) {
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(bar) = slot.take() {
                bar.finish();
            }
        }
    }
}

/// Records every update; used by tests
#[cfg(test)]
#[derive(Default)]
pub struct RecordingProgress {
    pub updates: Mutex<Vec<(u64, u64, String)>>,
}

#[cfg(test)]
impl ProgressObserver for RecordingProgress {
    fn on_progress(&self, current: u64, total: u64, message: &str) {
        self.updates
            .lock()
            .unwrap()
            .push((current, total, message.to_string()));
    }
}
