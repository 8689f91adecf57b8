//! Extraction engine.
//!
//! Turns rendered markup into [`CollectionStub`]s (search results page) and
//! [`Item`]s plus header details (collection page). Missing elements are never
//! errors here: each field resolves through a fallback chain and rows that
//! cannot yield an id are skipped.

mod collections;
mod items;
pub mod normalize;

use chrono::{DateTime, Utc};

pub use collections::{
    build_collection, extract_collection_header, extract_collections, CollectionHeader,
};
pub use items::extract_items;

use crate::models::{Collection, CollectionStub, Item};

/// Extract everything a collection page offers in one pass.
///
/// Items are capped at `max_items`, deduplicated and numbered 1..=n; the
/// returned collection's `item_count` equals the number of returned items.
pub fn extract_collection_page(
    html: &str,
    stub: &CollectionStub,
    max_items: usize,
    scraped_at: DateTime<Utc>,
) -> (Collection, Vec<Item>) {
    let items = extract_items(html, &stub.collection_id, max_items);
    let header = extract_collection_header(html);
    let collection = build_collection(stub, &header, &items, scraped_at);
    (collection, items)
}
