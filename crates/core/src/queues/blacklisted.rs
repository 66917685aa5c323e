use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use tracing::info;

use crate::media::{ItemState, MediaFilter, MediaStore};

use super::{Membership, Queue, QueueError, QueueManager};

/// Items given up on. Backed by the database.
pub struct BlacklistedQueue {
    membership: Membership,
}

impl BlacklistedQueue {
    pub fn new(media: Arc<dyn MediaStore>) -> Self {
        Self {
            membership: Membership::database(ItemState::Blacklisted, media),
        }
    }
}

#[async_trait]
impl Queue for BlacklistedQueue {
    fn state(&self) -> ItemState {
        ItemState::Blacklisted
    }

    fn membership(&self) -> &Membership {
        &self.membership
    }

    async fn process(&self, manager: &QueueManager) -> Result<(), QueueError> {
        let config = &manager.config().queues;
        if config.auto_unblacklist_days == 0 {
            return Ok(());
        }
        let after = Duration::days(config.auto_unblacklist_days as i64);
        let now = manager.now();

        let items = manager
            .media()
            .list(&MediaFilter::new().with_state(ItemState::Blacklisted).unlimited())?;
        let mut released = 0;
        for item in items {
            let Some(blacklisted_at) = item.blacklisted_at else {
                continue;
            };
            let too_old = config
                .auto_unblacklist_cutoff
                .is_some_and(|cutoff| blacklisted_at.date_naive() < cutoff);
            if now - blacklisted_at < after || too_old {
                continue;
            }
            let mut item = item;
            item.wake_count = 0;
            item.blacklisted_at = None;
            manager.move_to_wanted(item).await?;
            released += 1;
        }
        if released > 0 {
            info!(count = released, "Auto-unblacklisted items");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queues::test_support::{harness, harness_with, test_config};
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_disabled_by_default() {
        let h = harness();
        let item = h.insert_movie("Inception", 2010);
        let item = h.manager.move_to_blacklisted(item).await.unwrap();

        h.clock.advance(Duration::days(365));
        h.process(ItemState::Blacklisted).await;

        assert_eq!(h.reload(item.id).state, ItemState::Blacklisted);
    }

    #[tokio::test]
    async fn test_auto_unblacklist_after_days() {
        let mut config = test_config();
        config.queues.auto_unblacklist_days = 7;
        let h = harness_with(config);
        let mut item = h.insert_movie("Inception", 2010);
        item.wake_count = 24;
        let item = h.manager.move_to_blacklisted(item).await.unwrap();

        h.clock.advance(Duration::days(6));
        h.process(ItemState::Blacklisted).await;
        assert_eq!(h.reload(item.id).state, ItemState::Blacklisted);

        h.clock.advance(Duration::days(2));
        h.process(ItemState::Blacklisted).await;
        let item = h.reload(item.id);
        assert_eq!(item.state, ItemState::Wanted);
        assert_eq!(item.wake_count, 0);
        assert!(item.blacklisted_at.is_none());
    }

    #[tokio::test]
    async fn test_cutoff_keeps_earlier_blacklistings() {
        let mut config = test_config();
        config.queues.auto_unblacklist_days = 1;
        config.queues.auto_unblacklist_cutoff = NaiveDate::from_ymd_opt(2024, 6, 2);
        let h = harness_with(config);

        let old = h.insert_movie("Old", 2010);
        let old = h.manager.move_to_blacklisted(old).await.unwrap();
        h.clock.advance(Duration::days(2));
        let recent = h.insert_movie("Recent", 2023);
        let recent = h.manager.move_to_blacklisted(recent).await.unwrap();

        h.clock.advance(Duration::days(2));
        h.process(ItemState::Blacklisted).await;

        assert_eq!(h.reload(old.id).state, ItemState::Blacklisted);
        assert_eq!(h.reload(recent.id).state, ItemState::Wanted);
    }
}
