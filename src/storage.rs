//! Persistence store.
//!
//! Callers see only [`CollectionStore`]; the physical layout (index plus one
//! item file per collection, or a single snapshot document) is chosen at
//! construction from [`Settings`].

mod dedupe;
mod json;
mod locks;
mod snapshot;
mod two_tier;

use std::sync::Arc;

use async_trait::async_trait;

pub use dedupe::DedupReport;
pub use snapshot::SnapshotStore;
pub use two_tier::TwoTierStore;

use crate::config::{Settings, StoreLayout};
use crate::error::Result;
use crate::models::{Collection, Item};

/// Default cap for [`CollectionStore::related_items`].
pub const DEFAULT_RELATED_LIMIT: usize = 10;

/// Shared handle to whichever layout is configured.
pub type Store = Arc<dyn CollectionStore>;

/// Open the store described by `settings`.
pub fn open_store(settings: &Settings) -> Store {
    match settings.layout {
        StoreLayout::TwoTier => Arc::new(TwoTierStore::new(
            settings.index_path(),
            settings.items_dir(),
        )),
        StoreLayout::Snapshot => Arc::new(SnapshotStore::new(settings.snapshot_path())),
    }
}

#[async_trait]
pub trait CollectionStore: Send + Sync {
    /// Replace the whole collection index.
    async fn save_collections(&self, collections: &[Collection]) -> Result<()>;

    /// All indexed collections in index order. Empty when nothing is stored yet.
    async fn load_collections(&self) -> Result<Vec<Collection>>;

    /// Replace one collection's item list.
    async fn save_items(&self, collection_id: &str, items: &[Item]) -> Result<()>;

    /// `None` when the collection was never scraped; `Some(vec![])` when it
    /// was scraped and held no items.
    async fn load_items(&self, collection_id: &str) -> Result<Option<Vec<Item>>>;

    /// Upsert collections into the index: existing ids are replaced in place,
    /// new ids are appended in the given order.
    async fn merge_collections(&self, collections: &[Collection]) -> Result<()>;

    /// Record the query that produced the data. Layouts without a place for
    /// it ignore the call.
    async fn note_search(&self, _query: &str) -> Result<()> {
        Ok(())
    }

    /// Persist a freshly scraped collection: item file first, then index entry.
    async fn save_scraped(&self, collection: &Collection, items: &[Item]) -> Result<()> {
        self.save_items(&collection.collection_id, items).await?;
        self.merge_collections(std::slice::from_ref(collection)).await
    }

    async fn find_collection(&self, collection_id: &str) -> Result<Option<Collection>> {
        Ok(self
            .load_collections()
            .await?
            .into_iter()
            .find(|c| c.collection_id == collection_id))
    }

    /// Find an item and its owning collection by scanning every item file.
    async fn find_item(&self, item_id: &str) -> Result<Option<(Item, Collection)>> {
        for collection in self.load_collections().await? {
            let Some(items) = self.load_items(&collection.collection_id).await? else {
                continue;
            };
            if let Some(item) = items.into_iter().find(|i| i.item_id == item_id) {
                return Ok(Some((item, collection)));
            }
        }
        Ok(None)
    }

    /// Collections whose title contains `query` (case-insensitive). An empty
    /// query returns everything.
    async fn filter_collections(&self, query: &str) -> Result<Vec<Collection>> {
        Ok(self
            .load_collections()
            .await?
            .into_iter()
            .filter(|c| c.title_matches(query))
            .collect())
    }

    /// Other items from the owning collection of `item_id`, in position order.
    async fn related_items(&self, item_id: &str, limit: usize) -> Result<Vec<Item>> {
        let Some((_, collection)) = self.find_item(item_id).await? else {
            return Ok(Vec::new());
        };
        let items = self
            .load_items(&collection.collection_id)
            .await?
            .unwrap_or_default();
        Ok(items
            .into_iter()
            .filter(|i| i.item_id != item_id)
            .take(limit)
            .collect())
    }

    /// Remove duplicate item ids across the whole store, keeping the earliest.
    async fn deduplicate_items(&self) -> Result<DedupReport> {
        dedupe::deduplicate(self).await
    }
}
