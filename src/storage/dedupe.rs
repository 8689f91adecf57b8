//! Store-wide duplicate item cleanup.

use std::collections::{BTreeMap, HashSet};

use tracing::info;

use super::CollectionStore;
use crate::error::Result;

/// Outcome of [`CollectionStore::deduplicate_items`].
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct DedupReport {
    /// Total item records removed.
    pub removed_count: usize,
    /// Records removed per item id. Ids with no removals are absent.
    pub per_group: BTreeMap<String, usize>,
}

impl DedupReport {
    pub fn is_clean(&self) -> bool {
        self.removed_count == 0
    }
}

/// Keep the earliest record of every item id and remove the rest.
///
/// Records are ordered by their collection's `scraped_at`, then index
/// order, then position. Affected collections are renumbered from 1 and
/// their `item_count` recomputed. A group's sole record is never removed.
pub(crate) async fn deduplicate<S>(store: &S) -> Result<DedupReport>
where
    S: CollectionStore + ?Sized,
{
    let mut collections = store.load_collections().await?;

    let mut order: Vec<usize> = (0..collections.len()).collect();
    order.sort_by_key(|&idx| collections[idx].scraped_at);

    let mut seen: HashSet<String> = HashSet::new();
    let mut report = DedupReport::default();
    let mut changed = Vec::new();

    for idx in order {
        let collection_id = collections[idx].collection_id.clone();
        let Some(mut items) = store.load_items(&collection_id).await? else {
            continue;
        };
        items.sort_by_key(|item| item.position);

        let before = items.len();
        items.retain(|item| {
            if seen.insert(item.item_id.clone()) {
                true
            } else {
                *report.per_group.entry(item.item_id.clone()).or_default() += 1;
                false
            }
        });

        let removed = before - items.len();
        if removed == 0 {
            continue;
        }

        for (pos, item) in items.iter_mut().enumerate() {
            item.position = pos as u32 + 1;
        }
        store.save_items(&collection_id, &items).await?;
        collections[idx].item_count = items.len() as u32;
        changed.push(collections[idx].clone());
        report.removed_count += removed;
        info!(collection = %collection_id, removed, "Removed duplicate items");
    }

    // Only touched entries go back; the index may have grown meanwhile
    if !changed.is_empty() {
        store.merge_collections(&changed).await?;
    }

    Ok(report)
}
