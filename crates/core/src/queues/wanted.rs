use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::media::{ItemState, MediaFilter, MediaItem, MediaStore, MediaType};

use super::{release_status, Membership, Queue, QueueError, QueueManager, ReleaseStatus};

/// Items waiting to be scheduled. Backed by the database.
pub struct WantedQueue {
    membership: Membership,
}

impl WantedQueue {
    pub fn new(media: Arc<dyn MediaStore>) -> Self {
        Self {
            membership: Membership::database(ItemState::Wanted, media),
        }
    }
}

/// Order Wanted items by content source priority, then optionally newest episode first.
fn order_items(items: &mut [MediaItem], priority: &[String], reverse_episodes: bool) {
    let rank = |item: &MediaItem| {
        item.content_source
            .as_ref()
            .and_then(|source| priority.iter().position(|p| p == source))
            .unwrap_or(priority.len())
    };
    if reverse_episodes {
        items.sort_by(|a, b| {
            rank(a).cmp(&rank(b)).then_with(|| match (a.media_type, b.media_type) {
                (MediaType::Episode, MediaType::Episode) => b.release_date.cmp(&a.release_date),
                _ => std::cmp::Ordering::Equal,
            })
        });
    } else {
        items.sort_by_key(|item| rank(item));
    }
}

#[async_trait]
impl Queue for WantedQueue {
    fn state(&self) -> ItemState {
        ItemState::Wanted
    }

    fn membership(&self) -> &Membership {
        &self.membership
    }

    async fn process(&self, manager: &QueueManager) -> Result<(), QueueError> {
        let config = &manager.config().queues;
        let mut items = manager
            .media()
            .list(&MediaFilter::new().with_state(ItemState::Wanted).unlimited())?;
        if items.is_empty() {
            return Ok(());
        }
        order_items(
            &mut items,
            &config.content_source_priority,
            config.enable_reverse_order_scraping,
        );

        let mut slots = if config.wanted_throttle.enabled {
            let scraping = manager.queue(ItemState::Scraping).len().await;
            config.wanted_throttle.scraping_cap.saturating_sub(scraping)
        } else {
            usize::MAX
        };

        let now = manager.now();
        let (mut scheduled, mut deferred) = (0usize, 0usize);
        for item in items {
            let status = release_status(&item, config, manager.version_for(&item), now);
            match status {
                ReleaseStatus::Due if slots == 0 => {
                    deferred += 1;
                    continue;
                }
                ReleaseStatus::Due => {
                    slots -= 1;
                    scheduled += 1;
                    manager.move_to_scraping(item).await?;
                }
                ReleaseStatus::PreRelease => {
                    manager.move_to_pre_release(item).await?;
                }
                ReleaseStatus::Unreleased => {
                    manager.move_to_unreleased(item).await?;
                }
            }
            manager.item_delay().await;
        }

        if deferred > 0 {
            debug!(deferred, "Wanted throttle reached, leaving items for the next tick");
        }
        if scheduled > 0 {
            info!(scheduled, "Moved wanted items to scraping");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queues::test_support::{harness, harness_with, test_config};
    use chrono::NaiveDate;

    #[test]
    fn test_order_items_by_source_priority() {
        let mut a = crate::testing::fixtures::movie(1, "A", 2020);
        a.content_source = Some("list".to_string());
        let mut b = crate::testing::fixtures::movie(2, "B", 2020);
        b.content_source = Some("overseerr".to_string());
        let c = crate::testing::fixtures::movie(3, "C", 2020);

        let mut items = vec![a, b, c];
        order_items(&mut items, &["overseerr".to_string(), "list".to_string()], false);
        let ids: Vec<i64> = items.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn test_reverse_order_puts_newest_episode_first() {
        let mut e1 = crate::testing::fixtures::episode(1, "Show", 1, 1);
        e1.release_date = NaiveDate::from_ymd_opt(2024, 1, 1);
        let mut e2 = crate::testing::fixtures::episode(2, "Show", 1, 2);
        e2.release_date = NaiveDate::from_ymd_opt(2024, 1, 8);

        let mut items = vec![e1.clone(), e2.clone()];
        order_items(&mut items, &[], true);
        assert_eq!(items[0].id, 2);

        let mut items = vec![e1, e2];
        order_items(&mut items, &[], false);
        assert_eq!(items[0].id, 1);
    }

    #[tokio::test]
    async fn test_routes_items_by_release_status() {
        let h = harness();
        let released = h.insert_movie("Released", 2020);

        let mut upcoming = h.insert_movie("Upcoming", 2024);
        upcoming.release_date = NaiveDate::from_ymd_opt(2024, 6, 4);
        let upcoming = h.media.update(&upcoming).unwrap();

        let mut distant = h.insert_movie("Distant", 2025);
        distant.release_date = NaiveDate::from_ymd_opt(2025, 1, 1);
        let distant = h.media.update(&distant).unwrap();

        h.process(ItemState::Wanted).await;

        assert_eq!(h.reload(released.id).state, ItemState::Scraping);
        assert!(h.in_queue(ItemState::Scraping, released.id).await);
        assert_eq!(h.reload(upcoming.id).state, ItemState::PreRelease);
        assert_eq!(h.reload(distant.id).state, ItemState::Unreleased);
    }

    #[tokio::test]
    async fn test_throttle_caps_scraping_queue() {
        let mut config = test_config();
        config.queues.wanted_throttle.enabled = true;
        config.queues.wanted_throttle.scraping_cap = 2;
        let h = harness_with(config);
        let ids: Vec<i64> = (0..4)
            .map(|n| h.insert_movie(&format!("Movie {}", n), 2020).id)
            .collect();

        h.process(ItemState::Wanted).await;
        assert_eq!(h.manager.queue(ItemState::Scraping).len().await, 2);
        assert_eq!(h.reload(ids[0]).state, ItemState::Scraping);
        assert_eq!(h.reload(ids[3]).state, ItemState::Wanted);

        // No free slots until Scraping drains.
        h.process(ItemState::Wanted).await;
        assert_eq!(h.manager.queue(ItemState::Scraping).len().await, 2);
    }
}
