//! Shared helper functions for CLI commands.

use console::style;
use serde::Serialize;

use crate::browser::ChromeLauncher;
use crate::config::Settings;
use crate::pipeline::{Pipeline, PipelineOptions};
use crate::storage::{open_store, Store};

/// Open the configured store, creating the data directory if needed.
pub fn store_for(settings: &Settings) -> anyhow::Result<Store> {
    settings.ensure_directories()?;
    Ok(open_store(settings))
}

/// Build a pipeline that drives a real browser.
pub fn pipeline_for(settings: &Settings) -> anyhow::Result<Pipeline<ChromeLauncher>> {
    let store = store_for(settings)?;
    Ok(Pipeline::new(
        ChromeLauncher::new(settings.browser.clone()),
        store,
        PipelineOptions::from(settings),
    ))
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Hint shown when a lookup finds nothing in the store.
pub fn print_empty_store_hint() {
    println!(
        "  {} Run 'tubescrape search <query>' to scrape some playlists",
        style("→").dim()
    );
}

/// Shorten text for table columns, counting characters rather than bytes.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a longer title", 8), "a lon...");
        assert_eq!(truncate("ロファイ音楽です", 5), "ロフ...");
    }
}
