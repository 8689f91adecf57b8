//! Deduplicate command.

use console::style;

use super::helpers::store_for;
use crate::config::Settings;

/// Remove videos that appear in more than one stored playlist.
pub async fn cmd_dedupe(settings: &Settings) -> anyhow::Result<()> {
    let store = store_for(settings)?;
    let report = store.deduplicate_items().await?;

    if report.is_clean() {
        println!("{} No duplicate videos found", style("✓").green());
        return Ok(());
    }

    println!(
        "{} Removed {} duplicate videos",
        style("✓").green(),
        report.removed_count
    );
    for (item_id, count) in &report.per_group {
        println!("  {} {} ({} removed)", style("→").dim(), item_id, count);
    }

    Ok(())
}
