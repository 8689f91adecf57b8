//! Search command.

use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use super::helpers::{pipeline_for, print_json};
use crate::config::Settings;
use crate::models::{RunSummary, SearchLimits};

/// Search for playlists and scrape each result into the store.
pub async fn cmd_search(
    settings: &Settings,
    query: &str,
    limits: SearchLimits,
    json: bool,
) -> anyhow::Result<()> {
    let pipeline = pipeline_for(settings)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n{} Stopping after the current step...", style("!").yellow());
            on_signal.cancel();
        }
    });

    let pb = if json {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed}]")?);
    pb.set_message(format!(
        "Scraping up to {} playlists for '{}'...",
        limits.max_collections, query
    ));
    pb.enable_steady_tick(Duration::from_millis(120));

    let summary = pipeline.search(query, limits, &cancel).await;
    pb.finish_and_clear();
    let summary = summary?;

    if json {
        print_json(&summary)?;
    } else {
        print_summary(settings, &summary);
    }

    if summary.cancelled {
        anyhow::bail!("Search cancelled");
    }
    if !summary.is_success() {
        anyhow::bail!(
            "Search failed: {}",
            summary.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

fn print_summary(settings: &Settings, summary: &RunSummary) {
    let mark = if summary.is_success() {
        style("✓").green()
    } else {
        style("✗").red()
    };
    println!(
        "{} Scraped {} of {} playlists ({} videos) for '{}'",
        mark,
        summary.collections_scraped(),
        summary.collections_found,
        summary.items_scraped,
        summary.query
    );

    for id in &summary.collection_ids {
        println!("  {} {}", style("•").cyan(), id);
    }

    if !summary.failures.is_empty() {
        println!("\n{} Skipped {} playlists:", style("!").yellow(), summary.failures.len());
        for failure in &summary.failures {
            println!("  {} {}: {}", style("✗").red(), failure.collection_id, failure.reason);
        }
    }

    if let Some(error) = &summary.error {
        println!("\n{} {}", style("✗").red(), error);
    }

    println!(
        "\n  {} Data stored in {} ({} layout)",
        style("→").dim(),
        settings.data_dir.display(),
        settings.layout
    );
}
