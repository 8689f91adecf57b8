//! Single-document layout:
//! `{search_query, scraped_at, total_playlists, playlists: [{..., videos: [...]}]}`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::json::{read_json, write_json_atomic};
use super::CollectionStore;
use crate::error::Result;
use crate::extract::normalize;
use crate::models::{Collection, Item};

#[derive(Debug, Default, Serialize, Deserialize)]
struct SnapshotDocument {
    #[serde(default)]
    search_query: String,
    #[serde(default)]
    scraped_at: String,
    #[serde(default)]
    total_playlists: usize,
    #[serde(default)]
    playlists: Vec<SnapshotPlaylist>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotPlaylist {
    playlist_id: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    video_count: u32,
    #[serde(default)]
    thumbnail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    videos: Vec<Item>,
    /// Items saved before the collection record; hidden from the index.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pending: bool,
}

impl SnapshotPlaylist {
    fn from_collection(collection: &Collection, videos: Vec<Item>) -> Self {
        Self {
            playlist_id: collection.collection_id.clone(),
            url: collection.url.clone(),
            title: collection.title.clone(),
            video_count: collection.item_count,
            thumbnail: collection.thumbnail.clone(),
            created_at: Some(collection.scraped_at),
            videos,
            pending: false,
        }
    }

    /// Entry for items saved before their collection record.
    fn placeholder(collection_id: &str) -> Self {
        let collection = Collection::new(
            collection_id,
            normalize::UNTITLED,
            normalize::thumbnail_url(collection_id),
            0,
            Utc::now(),
        );
        Self {
            pending: true,
            ..Self::from_collection(&collection, Vec::new())
        }
    }

    fn to_collection(&self, fallback_time: Option<DateTime<Utc>>) -> Collection {
        Collection {
            collection_id: self.playlist_id.clone(),
            title: if self.title.is_empty() {
                normalize::UNTITLED.to_string()
            } else {
                self.title.clone()
            },
            url: if self.url.is_empty() {
                normalize::collection_url(&self.playlist_id)
            } else {
                self.url.clone()
            },
            item_count: self.video_count,
            thumbnail: if self.thumbnail.is_empty() {
                normalize::thumbnail_url(&self.playlist_id)
            } else {
                self.thumbnail.clone()
            },
            scraped_at: self
                .created_at
                .or(fallback_time)
                .unwrap_or_default(),
        }
    }

    fn set_metadata(&mut self, collection: &Collection) {
        let videos = std::mem::take(&mut self.videos);
        *self = Self::from_collection(collection, videos);
    }
}

impl SnapshotDocument {
    fn touch(&mut self) {
        self.total_playlists = self.playlists.iter().filter(|p| !p.pending).count();
        self.scraped_at = Utc::now().to_rfc3339();
    }

    fn entry_mut(&mut self, collection_id: &str) -> &mut SnapshotPlaylist {
        let idx = match self
            .playlists
            .iter()
            .position(|p| p.playlist_id == collection_id)
        {
            Some(idx) => idx,
            None => {
                self.playlists.push(SnapshotPlaylist::placeholder(collection_id));
                self.playlists.len() - 1
            }
        };
        &mut self.playlists[idx]
    }

    fn merge(&mut self, collections: &[Collection]) {
        for collection in collections {
            match self
                .playlists
                .iter()
                .position(|p| p.playlist_id == collection.collection_id)
            {
                Some(idx) if self.playlists[idx].pending => {
                    // The entry takes its place in merge order, not item-save order.
                    let mut entry = self.playlists.remove(idx);
                    entry.set_metadata(collection);
                    self.playlists.push(entry);
                }
                Some(idx) => self.playlists[idx].set_metadata(collection),
                None => self
                    .playlists
                    .push(SnapshotPlaylist::from_collection(collection, Vec::new())),
            }
        }
    }
}

/// Accepts RFC 3339 and offset-less ISO 8601 (read as UTC).
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Everything in one JSON file, rewritten as a whole on every change.
#[derive(Debug)]
pub struct SnapshotStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<SnapshotDocument> {
        Ok(read_json(&self.path).await?.unwrap_or_default())
    }

    /// Read-modify-write under the store's write lock.
    async fn update<F>(&self, apply: F) -> Result<()>
    where
        F: FnOnce(&mut SnapshotDocument) + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read().await?;
        apply(&mut document);
        document.touch();
        write_json_atomic(&self.path, &document).await
    }
}

#[async_trait]
impl CollectionStore for SnapshotStore {
    async fn save_collections(&self, collections: &[Collection]) -> Result<()> {
        self.update(|doc| {
            let mut previous = std::mem::take(&mut doc.playlists);
            doc.playlists = collections
                .iter()
                .map(|collection| {
                    let videos = previous
                        .iter_mut()
                        .find(|p| p.playlist_id == collection.collection_id)
                        .map(|p| std::mem::take(&mut p.videos))
                        .unwrap_or_default();
                    SnapshotPlaylist::from_collection(collection, videos)
                })
                .collect();
            // Items still waiting for their record survive an index rewrite
            doc.playlists.extend(previous.into_iter().filter(|p| {
                p.pending && !collections.iter().any(|c| c.collection_id == p.playlist_id)
            }));
        })
        .await
    }

    async fn load_collections(&self) -> Result<Vec<Collection>> {
        let document = self.read().await?;
        let fallback = parse_timestamp(&document.scraped_at);
        Ok(document
            .playlists
            .iter()
            .filter(|p| !p.pending)
            .map(|p| p.to_collection(fallback))
            .collect())
    }

    async fn save_items(&self, collection_id: &str, items: &[Item]) -> Result<()> {
        self.update(|doc| {
            let entry = doc.entry_mut(collection_id);
            entry.videos = items.to_vec();
            entry.video_count = items.len() as u32;
        })
        .await
    }

    async fn load_items(&self, collection_id: &str) -> Result<Option<Vec<Item>>> {
        let document = self.read().await?;
        Ok(document
            .playlists
            .into_iter()
            .find(|p| p.playlist_id == collection_id)
            .map(|p| {
                p.videos
                    .into_iter()
                    .map(|mut item| {
                        item.collection_id = collection_id.to_string();
                        item
                    })
                    .collect()
            }))
    }

    async fn merge_collections(&self, collections: &[Collection]) -> Result<()> {
        self.update(|doc| doc.merge(collections)).await
    }

    async fn note_search(&self, query: &str) -> Result<()> {
        self.update(|doc| doc.search_query = query.to_string()).await
    }

    async fn save_scraped(&self, collection: &Collection, items: &[Item]) -> Result<()> {
        self.update(|doc| {
            doc.merge(std::slice::from_ref(collection));
            doc.entry_mut(&collection.collection_id).videos = items.to_vec();
        })
        .await
    }
}
