//! Item model (a single video entry within a collection).

use serde::{Deserialize, Serialize};

use crate::extract::normalize;

/// A scraped item.
///
/// Serialized as `{position, video_id, title, url, thumbnail}` inside the
/// owning collection's item file; the owner is implied by the file and is
/// restored on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// 1-based ordinal within the collection, dense after extraction.
    pub position: u32,
    /// External identifier.
    #[serde(rename = "video_id")]
    pub item_id: String,
    /// Owning collection.
    #[serde(skip)]
    pub collection_id: String,
    pub title: String,
    /// Watch URL, derived from `item_id`.
    pub url: String,
    pub thumbnail: String,
}

impl Item {
    /// Create an item with derived URL and thumbnail.
    pub fn new(collection_id: &str, item_id: &str, title: &str, position: u32) -> Self {
        Self {
            position,
            item_id: item_id.to_string(),
            collection_id: collection_id.to_string(),
            title: normalize::truncate_chars(title, normalize::MAX_ITEM_TITLE),
            url: normalize::watch_url(item_id),
            thumbnail: normalize::thumbnail_url(item_id),
        }
    }

    /// Replace the derived thumbnail with one provided by the markup.
    pub fn with_thumbnail(mut self, thumbnail: Option<String>) -> Self {
        if let Some(thumbnail) = thumbnail {
            self.thumbnail = thumbnail;
        }
        self
    }

    pub fn embed_url(&self) -> String {
        normalize::embed_url(&self.item_id)
    }

    /// Canonical embed URL followed by alternative front-end embeds.
    pub fn embed_urls(&self) -> Vec<String> {
        let mut urls = vec![self.embed_url()];
        urls.extend(normalize::alternate_embed_urls(&self.item_id));
        urls
    }

    /// Thumbnail derived purely from the id, ignoring any markup-provided one.
    pub fn derived_thumbnail(&self) -> String {
        normalize::thumbnail_url(&self.item_id)
    }
}
