//! Console prompts

use crate::collections::{ProcessMode, Prompter, WorkItem};
use crate::shards::ShardFile;
use anyhow::{Context, Result};
use std::io::Write;

/// Print `prompt` and read one trimmed line from stdin
pub fn read_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    std::io::stdout().flush().ok();

    let mut input = String::new();
    std::io::stdin()
        .read_line(&mut input)
        .context("Failed to read from stdin")?;
    Ok(input.trim().to_string())
}

/// Parse a 1-based list such as `1,3,5` into sorted zero-based indices.
///
/// `0` or `all` selects everything. Entries that are not numbers or are out
/// of range are ignored.
pub fn parse_selection(input: &str, len: usize) -> Vec<usize> {
    let input = input.trim();
    if input == "0" || input.eq_ignore_ascii_case("all") {
        return (0..len).collect();
    }

    let mut selected: Vec<usize> = input
        .split(',')
        .filter_map(|part| part.trim().parse::<usize>().ok())
        .filter(|&n| n >= 1 && n <= len)
        .map(|n| n - 1)
        .collect();
    selected.sort_unstable();
    selected.dedup();
    selected
}

/// Ask a yes/no question; anything but `y`/`yes` is a no.
pub fn confirm(question: &str) -> bool {
    read_line(&format!("{} [y/N] ", question))
        .map(|answer| matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"))
        .unwrap_or(false)
}

/// Prompter backed by stdin/stdout
pub struct ConsolePrompter {
    assume_yes: bool,
}

impl ConsolePrompter {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }

    pub fn ask_mode(&self) -> Result<ProcessMode> {
        println!("\nProcessing mode:");
        for (i, mode) in ProcessMode::ALL_MODES.iter().enumerate() {
            println!("  {} - {}", i + 1, mode.description());
        }
        let answer = read_line("Mode [1-4]: ")?;
        ProcessMode::from_cli(&answer)
    }
}

impl Prompter for ConsolePrompter {
    fn confirm(&self, work: &[WorkItem]) -> bool {
        println!("\nShards to process:");
        for item in work {
            let failures = item.failure_shards();
            if failures > 0 {
                println!(
                    "  {:<30} {} CSV ({} failure shards)",
                    item.category,
                    item.shards.len(),
                    failures
                );
            } else {
                println!("  {:<30} {} CSV", item.category, item.shards.len());
            }
        }

        if self.assume_yes {
            return true;
        }
        confirm("Continue?")
    }

    fn select_shards(&self, category: &str, shards: &[ShardFile]) -> Vec<usize> {
        println!("\nCategory '{}':", category);
        for (i, shard) in shards.iter().enumerate() {
            println!("  {} - {}", i + 1, shard.name);
        }

        match read_line("Select shards (ex: 1,3 or 0 for all, empty for none): ") {
            Ok(answer) => parse_selection(&answer, shards.len()),
            Err(e) => {
                tracing::warn!("No shard selection for '{}': {:#}", category, e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_is_one_based_and_filtered() {
        assert_eq!(parse_selection("1,3", 5), vec![0, 2]);
        assert_eq!(parse_selection(" 3 , x, 9, 3,1 ", 4), vec![0, 2]);
        assert_eq!(parse_selection("0", 3), vec![0, 1, 2]);
        assert_eq!(parse_selection("ALL", 2), vec![0, 1]);
        assert!(parse_selection("", 3).is_empty());
    }
}
