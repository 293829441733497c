//! Serialized read-modify-write of reading progress.

use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::{EntryId, Progress, UserId};
use crate::error::Result;
use crate::store::Store;

/// Applies progress updates one at a time.
///
/// A single lock covers every identity and entry, so concurrent updates of
/// the same record can never lose the high-water mark.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    lock: Mutex<()>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `user_id` opened `page` of `entry_id`.
    ///
    /// The first record starts with `max = page`; later ones keep
    /// `max = max(max, page)`.
    pub async fn record(
        &self,
        store: &dyn Store,
        user_id: UserId,
        entry_id: EntryId,
        page: usize,
    ) -> Result<Progress> {
        let _guard = self.lock.lock().await;

        let progress = match store.get_progress(user_id, entry_id).await? {
            Some(mut existing) => {
                existing.advance(page);
                existing
            }
            None => Progress::start(user_id, entry_id, page),
        };

        store.save_progress(&progress).await?;
        debug!(user_id, entry_id, page, max = progress.max, "Progress recorded");

        Ok(progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CatalogEntry, ContainerKind};
    use crate::store::SqliteStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_concurrent_updates_keep_max() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let user_id = store.get_or_create_user("a@example.com").await.unwrap().id;
        let entry = store
            .upsert_entry(&CatalogEntry::new("x.zip", ContainerKind::Zip))
            .await
            .unwrap();
        let tracker = Arc::new(ProgressTracker::new());

        let mut handles = Vec::new();
        for page in [3usize, 9, 1, 7, 9, 2, 5] {
            let store = Arc::clone(&store);
            let tracker = Arc::clone(&tracker);
            handles.push(tokio::spawn(async move {
                tracker.record(store.as_ref(), user_id, entry, page).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let progress = store.get_progress(user_id, entry).await.unwrap().unwrap();
        assert_eq!(progress.max, 9);
    }
}
