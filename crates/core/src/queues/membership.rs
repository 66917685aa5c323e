use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::warn;

use crate::media::{ItemState, MediaFilter, MediaStore};

use super::QueuedItem;

/// Where a queue's members live.
pub enum Membership {
    /// Items held in process, in arrival order.
    Memory(RwLock<Vec<QueuedItem>>),
    /// Items whose persisted state equals `state`.
    Database {
        state: ItemState,
        media: Arc<dyn MediaStore>,
    },
}

impl Membership {
    pub fn memory() -> Self {
        Membership::Memory(RwLock::new(Vec::new()))
    }

    pub fn database(state: ItemState, media: Arc<dyn MediaStore>) -> Self {
        Membership::Database { state, media }
    }

    pub fn is_memory(&self) -> bool {
        matches!(self, Membership::Memory(_))
    }

    /// Insert or replace the entry for the item.
    pub async fn add(&self, entry: QueuedItem) {
        if let Membership::Memory(items) = self {
            let mut items = items.write().await;
            match items.iter_mut().find(|e| e.item.id == entry.item.id) {
                Some(existing) => *existing = entry,
                None => items.push(entry),
            }
        }
    }

    pub async fn remove(&self, item_id: i64) -> Option<QueuedItem> {
        match self {
            Membership::Memory(items) => {
                let mut items = items.write().await;
                let index = items.iter().position(|e| e.item.id == item_id)?;
                Some(items.remove(index))
            }
            Membership::Database { .. } => None,
        }
    }

    pub async fn contains(&self, item_id: i64) -> bool {
        match self {
            Membership::Memory(items) => items.read().await.iter().any(|e| e.item.id == item_id),
            Membership::Database { state, media } => match media.get(item_id) {
                Ok(item) => item.is_some_and(|i| i.state == *state),
                Err(e) => {
                    warn!(item_id, error = %e, "Membership lookup failed");
                    false
                }
            },
        }
    }

    /// Snapshot of the members. Database queues report their first page.
    pub async fn contents(&self) -> Vec<QueuedItem> {
        match self {
            Membership::Memory(items) => items.read().await.clone(),
            Membership::Database { state, media } => media
                .list(&MediaFilter::new().with_state(*state))
                .map(|items| {
                    items
                        .into_iter()
                        .map(|item| {
                            let entered_at = item.updated_at;
                            QueuedItem::new(item, entered_at)
                        })
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    pub async fn len(&self) -> usize {
        match self {
            Membership::Memory(items) => items.read().await.len(),
            Membership::Database { state, media } => media
                .count(&MediaFilter::new().with_state(*state))
                .map(|n| n as usize)
                .unwrap_or(0),
        }
    }

    /// Patch a held entry in place.
    pub async fn update_entry(&self, item_id: i64, f: impl FnOnce(&mut QueuedItem) + Send) {
        if let Membership::Memory(items) = self {
            if let Some(entry) = items.write().await.iter_mut().find(|e| e.item.id == item_id) {
                f(entry);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::SqliteMediaStore;
    use crate::testing::fixtures;
    use chrono::Utc;

    #[tokio::test]
    async fn test_memory_membership_replaces_duplicates() {
        let queue = Membership::memory();
        queue.add(QueuedItem::new(fixtures::movie(1, "A", 2020), Utc::now())).await;
        queue.add(QueuedItem::new(fixtures::movie(2, "B", 2020), Utc::now())).await;
        let mut again = QueuedItem::new(fixtures::movie(1, "A", 2020), Utc::now());
        again.final_attempt = true;
        queue.add(again).await;

        assert_eq!(queue.len().await, 2);
        assert!(queue.contents().await[0].final_attempt);
        assert!(queue.remove(1).await.is_some());
        assert!(!queue.contains(1).await);
        assert!(queue.remove(1).await.is_none());
    }

    #[tokio::test]
    async fn test_database_membership_follows_state() {
        let store = Arc::new(SqliteMediaStore::in_memory().unwrap());
        let item = store
            .insert(&fixtures::new_movie("A", 2020, "tt0000001", "1080p"))
            .unwrap()
            .unwrap();
        let wanted = Membership::database(ItemState::Wanted, store.clone());
        let collected = Membership::database(ItemState::Collected, store.clone());

        assert!(wanted.contains(item.id).await);
        assert!(!collected.contains(item.id).await);
        assert_eq!(wanted.len().await, 1);

        // Database membership ignores in-memory adds.
        collected.add(QueuedItem::new(item.clone(), Utc::now())).await;
        assert_eq!(collected.len().await, 0);
    }
}
