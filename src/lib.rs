//! tubescrape - video playlist search and scraping pipeline.
//!
//! Drives a headless browser through a search results page and each
//! playlist it links to, extracts playlists and their videos from the
//! rendered markup, and persists them as JSON for later browsing.

pub mod browser;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod models;
pub mod pipeline;
pub mod storage;

pub use error::{Result, ScrapeError};
pub use pipeline::{Pipeline, PipelineOptions};
pub use storage::{open_store, CollectionStore, Store};
