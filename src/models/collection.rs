//! Collection model (a playlist-equivalent).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::extract::normalize;

/// A scraped collection as stored in the index.
///
/// Serialized as `{collection_id, title, url, video_count, thumbnail, created_at}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub collection_id: String,
    pub title: String,
    /// Canonical URL, derived from `collection_id`.
    pub url: String,
    /// Number of items actually extracted. Never taken from page text.
    #[serde(rename = "video_count")]
    pub item_count: u32,
    pub thumbnail: String,
    /// Time of the last successful scrape.
    #[serde(rename = "created_at")]
    pub scraped_at: DateTime<Utc>,
}

impl Collection {
    /// Create a collection record; the title is truncated and the URL derived.
    pub fn new(
        collection_id: &str,
        title: &str,
        thumbnail: String,
        item_count: u32,
        scraped_at: DateTime<Utc>,
    ) -> Self {
        Self {
            collection_id: collection_id.to_string(),
            title: normalize::truncate_chars(title, normalize::MAX_COLLECTION_TITLE),
            url: normalize::collection_url(collection_id),
            item_count,
            thumbnail,
            scraped_at,
        }
    }

    /// Whether the last scrape found no items (kept, but flagged).
    pub fn is_empty(&self) -> bool {
        self.item_count == 0
    }

    /// Case-insensitive title match used by stored-data search.
    pub fn title_matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        query.is_empty() || self.title.to_lowercase().contains(&query)
    }
}

/// A collection reference found on a search results page, before its own
/// page has been visited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionStub {
    pub collection_id: String,
    /// 0-based first-seen order on the results page (effective relevance).
    pub rank: usize,
    /// Anchor `title` attribute or text, used late in the title fallback chain.
    pub title_hint: Option<String>,
    /// Image found inside the anchor, if any.
    pub thumbnail_hint: Option<String>,
}

impl CollectionStub {
    pub fn new(collection_id: impl Into<String>, rank: usize) -> Self {
        Self {
            collection_id: collection_id.into(),
            rank,
            title_hint: None,
            thumbnail_hint: None,
        }
    }

    pub fn url(&self) -> String {
        normalize::collection_url(&self.collection_id)
    }
}
