//! Database-backed queues for items waiting on a release date, plus Collected.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::media::{ItemState, MediaFilter, MediaStore};

use super::{release_status, Membership, Queue, QueueError, QueueManager, ReleaseStatus};

/// Re-evaluate every item in a release-date queue and move those whose status changed.
async fn reschedule(manager: &QueueManager, state: ItemState) -> Result<(), QueueError> {
    let config = &manager.config().queues;
    let items = manager
        .media()
        .list(&MediaFilter::new().with_state(state).unlimited())?;
    let now = manager.now();

    for item in items {
        let status = release_status(&item, config, manager.version_for(&item), now);
        match (status, state) {
            (ReleaseStatus::Due, _) => {
                info!(item = %item.label(), from = %state, "Release reached, scraping");
                manager.move_to_scraping(item).await?;
            }
            (ReleaseStatus::PreRelease, ItemState::Unreleased) => {
                manager.move_to_pre_release(item).await?;
            }
            (ReleaseStatus::Unreleased, ItemState::PreRelease) => {
                manager.move_to_unreleased(item).await?;
            }
            _ => {}
        }
    }
    Ok(())
}

/// Items whose release is more than the pre-release window away.
pub struct UnreleasedQueue {
    membership: Membership,
}

impl UnreleasedQueue {
    pub fn new(media: Arc<dyn MediaStore>) -> Self {
        Self {
            membership: Membership::database(ItemState::Unreleased, media),
        }
    }
}

#[async_trait]
impl Queue for UnreleasedQueue {
    fn state(&self) -> ItemState {
        ItemState::Unreleased
    }

    fn membership(&self) -> &Membership {
        &self.membership
    }

    async fn process(&self, manager: &QueueManager) -> Result<(), QueueError> {
        reschedule(manager, ItemState::Unreleased).await
    }
}

/// Items releasing within the pre-release window.
pub struct PreReleaseQueue {
    membership: Membership,
}

impl PreReleaseQueue {
    pub fn new(media: Arc<dyn MediaStore>) -> Self {
        Self {
            membership: Membership::database(ItemState::PreRelease, media),
        }
    }
}

#[async_trait]
impl Queue for PreReleaseQueue {
    fn state(&self) -> ItemState {
        ItemState::PreRelease
    }

    fn membership(&self) -> &Membership {
        &self.membership
    }

    async fn process(&self, manager: &QueueManager) -> Result<(), QueueError> {
        reschedule(manager, ItemState::PreRelease).await
    }
}

/// Terminal state. Nothing to advance.
pub struct CollectedQueue {
    membership: Membership,
}

impl CollectedQueue {
    pub fn new(media: Arc<dyn MediaStore>) -> Self {
        Self {
            membership: Membership::database(ItemState::Collected, media),
        }
    }
}

#[async_trait]
impl Queue for CollectedQueue {
    fn state(&self) -> ItemState {
        ItemState::Collected
    }

    fn membership(&self) -> &Membership {
        &self.membership
    }

    async fn process(&self, _manager: &QueueManager) -> Result<(), QueueError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queues::test_support::{harness, harness_with, test_config};
    use chrono::{Duration, NaiveDate};

    #[tokio::test]
    async fn test_unreleased_item_moves_through_pre_release_to_scraping() {
        let h = harness();
        let mut item = h.insert_movie("Upcoming", 2024);
        item.release_date = NaiveDate::from_ymd_opt(2024, 6, 20);
        let item = h.place(item, ItemState::Unreleased).await;

        h.process(ItemState::Unreleased).await;
        assert_eq!(h.reload(item.id).state, ItemState::Unreleased);

        // Due at 2024-06-21 14:00 (19:00 airtime plus 19h offset).
        h.clock.advance(Duration::days(15));
        h.process(ItemState::Unreleased).await;
        assert_eq!(h.reload(item.id).state, ItemState::PreRelease);

        h.clock.advance(Duration::days(5));
        h.process(ItemState::PreRelease).await;
        assert_eq!(h.reload(item.id).state, ItemState::PreRelease);

        h.clock.advance(Duration::days(1));
        h.process(ItemState::PreRelease).await;
        assert_eq!(h.reload(item.id).state, ItemState::Scraping);
        assert!(h.in_queue(ItemState::Scraping, item.id).await);
    }

    #[tokio::test]
    async fn test_pre_release_item_pushed_back_to_unreleased() {
        let h = harness();
        let mut item = h.insert_movie("Delayed", 2024);
        item.release_date = NaiveDate::from_ymd_opt(2024, 9, 1);
        let item = h.place(item, ItemState::PreRelease).await;

        h.process(ItemState::PreRelease).await;

        assert_eq!(h.reload(item.id).state, ItemState::Unreleased);
    }

    #[tokio::test]
    async fn test_physical_release_gate_holds_movie() {
        let mut config = test_config();
        config.versions.get_mut("1080p").unwrap().require_physical_release = true;
        let h = harness_with(config);
        let mut item = h.insert_movie("Streaming Only", 2023);
        item.release_date = NaiveDate::from_ymd_opt(2023, 1, 1);
        let item = h.place(item, ItemState::Unreleased).await;

        h.process(ItemState::Unreleased).await;
        assert_eq!(h.reload(item.id).state, ItemState::Unreleased);

        let mut item = h.reload(item.id);
        item.physical_release_date = NaiveDate::from_ymd_opt(2024, 5, 1);
        h.media.update(&item).unwrap();
        h.process(ItemState::Unreleased).await;
        assert_eq!(h.reload(item.id).state, ItemState::Scraping);
    }
}
