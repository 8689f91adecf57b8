//! Writer serialization for the two-tier layout.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One lock per collection item file plus one for the index.
///
/// Readers never take these locks.
#[derive(Debug, Default)]
pub(crate) struct WriteLocks {
    collections: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    index: Arc<AsyncMutex<()>>,
}

impl WriteLocks {
    pub(crate) async fn collection(&self, collection_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self
                .collections
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            map.entry(collection_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    pub(crate) async fn index(&self) -> OwnedMutexGuard<()> {
        self.index.clone().lock_owned().await
    }
}
