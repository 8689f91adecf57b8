//! Collection index plus one item file per collection.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::json::{read_json, write_json_atomic};
use super::locks::WriteLocks;
use super::CollectionStore;
use crate::error::{Result, ScrapeError};
use crate::extract::normalize::is_valid_id;
use crate::models::{Collection, Item};

/// `index_path` holds `[Collection]`; `items_dir/<collection_id>.json` holds
/// that collection's `[Item]`.
#[derive(Debug)]
pub struct TwoTierStore {
    index_path: PathBuf,
    items_dir: PathBuf,
    locks: WriteLocks,
}

impl TwoTierStore {
    pub fn new(index_path: impl Into<PathBuf>, items_dir: impl Into<PathBuf>) -> Self {
        Self {
            index_path: index_path.into(),
            items_dir: items_dir.into(),
            locks: WriteLocks::default(),
        }
    }

    /// Store rooted at `data_dir` with default file names.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(
            data_dir.join(crate::config::DEFAULT_INDEX_FILENAME),
            data_dir.join(crate::config::DEFAULT_ITEMS_DIRNAME),
        )
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Item file for a collection. Ids outside the identifier alphabet never
    /// map to a file, so they cannot escape `items_dir`.
    pub fn items_path(&self, collection_id: &str) -> Option<PathBuf> {
        is_valid_id(collection_id).then(|| self.items_dir.join(format!("{}.json", collection_id)))
    }
}

#[async_trait]
impl CollectionStore for TwoTierStore {
    async fn save_collections(&self, collections: &[Collection]) -> Result<()> {
        let _guard = self.locks.index().await;
        write_json_atomic(&self.index_path, collections).await
    }

    async fn load_collections(&self) -> Result<Vec<Collection>> {
        Ok(read_json(&self.index_path).await?.unwrap_or_default())
    }

    async fn save_items(&self, collection_id: &str, items: &[Item]) -> Result<()> {
        let Some(path) = self.items_path(collection_id) else {
            return Err(ScrapeError::io(
                self.items_dir.join(collection_id),
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "invalid collection id"),
            ));
        };
        let _guard = self.locks.collection(collection_id).await;
        debug!(collection = collection_id, count = items.len(), "Writing item file");
        write_json_atomic(&path, items).await
    }

    async fn load_items(&self, collection_id: &str) -> Result<Option<Vec<Item>>> {
        let Some(path) = self.items_path(collection_id) else {
            return Ok(None);
        };
        let items: Option<Vec<Item>> = read_json(&path).await?;
        Ok(items.map(|items| {
            items
                .into_iter()
                .map(|mut item| {
                    item.collection_id = collection_id.to_string();
                    item
                })
                .collect()
        }))
    }

    async fn merge_collections(&self, collections: &[Collection]) -> Result<()> {
        let _guard = self.locks.index().await;
        let mut index: Vec<Collection> = read_json(&self.index_path).await?.unwrap_or_default();
        merge_into(&mut index, collections);
        write_json_atomic(&self.index_path, &index).await
    }
}

/// Replace entries with matching ids in place; append the rest in order.
pub(crate) fn merge_into(index: &mut Vec<Collection>, updates: &[Collection]) {
    for update in updates {
        match index
            .iter_mut()
            .find(|c| c.collection_id == update.collection_id)
        {
            Some(existing) => *existing = update.clone(),
            None => index.push(update.clone()),
        }
    }
}
