//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod browse;
mod check_browser;
mod dedupe;
mod helpers;
mod search;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings, StoreLayout};
use crate::models::SortOrder;

#[derive(Parser)]
#[command(name = "tubescrape")]
#[command(about = "Search, scrape and browse video playlists")]
#[command(version)]
pub struct Cli {
    /// Data directory (overrides config file)
    #[arg(long, global = true, env = "TUBESCRAPE_DATA")]
    data: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Search for playlists and scrape each result
    Search {
        /// Search terms
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
        /// Maximum number of playlists to scrape
        #[arg(short = 'n', long)]
        max_collections: Option<usize>,
        /// Maximum number of videos per playlist
        #[arg(short = 'm', long)]
        max_items: Option<usize>,
        /// Playlists scraped at once, one browser each
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,
        /// Result ordering: relevance, upload-date, view-count, rating
        #[arg(short, long, default_value = "relevance")]
        sort: SortOrder,
        /// Storage layout: two-tier or snapshot
        #[arg(long)]
        layout: Option<StoreLayout>,
        /// Show the browser window
        #[arg(long)]
        headed: bool,
        /// Connect to a running browser instead of launching one
        #[arg(long, env = "BROWSER_URL")]
        browser_url: Option<String>,
        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// List stored playlists
    Collections {
        /// Only show playlists whose title contains this text
        filter: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a stored playlist and its videos
    Collection {
        /// Playlist ID
        collection_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a stored video and related videos from the same playlist
    Item {
        /// Video ID or watch/short/embed URL
        item: String,
        /// Number of related videos to list
        #[arg(short, long, default_value_t = crate::storage::DEFAULT_RELATED_LIMIT)]
        related: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove videos that appear in more than one playlist
    Dedupe,

    /// Check that a browser can be found and started
    CheckBrowser,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (settings, _config) = load_settings(cli.data).await;

    match cli.command {
        Commands::Search {
            query,
            max_collections,
            max_items,
            concurrency,
            sort,
            layout,
            headed,
            browser_url,
            json,
        } => {
            let mut settings = settings;
            if let Some(layout) = layout {
                settings.layout = layout;
            }
            if headed {
                settings.browser.headless = false;
            }
            if browser_url.is_some() {
                settings.browser.remote_url = browser_url;
            }
            let mut limits = settings.search_limits();
            limits.sort = sort;
            if let Some(max) = max_collections {
                limits.max_collections = max;
            }
            if let Some(max) = max_items {
                limits.max_items_per_collection = max;
            }
            if let Some(workers) = concurrency {
                limits.concurrency = workers.max(1);
            }
            search::cmd_search(&settings, &query.join(" "), limits, json).await
        }
        Commands::Collections { filter, json } => {
            browse::cmd_collections(&settings, filter.as_deref(), json).await
        }
        Commands::Collection {
            collection_id,
            json,
        } => browse::cmd_collection(&settings, &collection_id, json).await,
        Commands::Item {
            item,
            related,
            json,
        } => browse::cmd_item(&settings, &item, related, json).await,
        Commands::Dedupe => dedupe::cmd_dedupe(&settings).await,
        Commands::CheckBrowser => check_browser::cmd_check_browser(&settings).await,
    }
}
