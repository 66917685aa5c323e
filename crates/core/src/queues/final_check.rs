use async_trait::async_trait;
use chrono::Duration;
use tracing::{info, warn};

use crate::media::ItemState;
use crate::scraper::filter_results;

use super::{Membership, Queue, QueueError, QueueManager};

/// Items out of wakes, given one last scrape after a delay before blacklisting.
pub struct FinalCheckQueue {
    membership: Membership,
}

impl FinalCheckQueue {
    pub fn new() -> Self {
        Self {
            membership: Membership::memory(),
        }
    }
}

impl Default for FinalCheckQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Queue for FinalCheckQueue {
    fn state(&self) -> ItemState {
        ItemState::FinalCheck
    }

    fn membership(&self) -> &Membership {
        &self.membership
    }

    async fn process(&self, manager: &QueueManager) -> Result<(), QueueError> {
        let delay = Duration::hours(manager.config().queues.final_check_delay_hours as i64);
        let now = manager.now();

        for entry in self.get_contents().await {
            if now - entry.entered_at < delay {
                continue;
            }
            let item = entry.item;
            let Some(version) = manager.version_for(&item).cloned() else {
                warn!(item_id = item.id, "Item has no configured version, blacklisting");
                manager.move_to_blacklisted(item).await?;
                continue;
            };

            let raw = match manager.scrapers().scrape(&item, &version).await {
                Ok(results) => results,
                Err(e) => {
                    warn!(item_id = item.id, error = %e, "Final scrape failed, retrying next tick");
                    continue;
                }
            };
            let not_wanted = manager.media().not_wanted(item.id)?;
            let results = filter_results(
                &item,
                &version,
                raw,
                &not_wanted,
                manager.config().queues.sort_by_uncached_status,
            );

            if results.is_empty() {
                info!(item = %item.label(), "Final check found nothing, blacklisting");
                manager.move_to_blacklisted(item).await?;
            } else {
                info!(item = %item.label(), results = results.len(), "Final check found results");
                manager.move_to_adding(item, results, true).await?;
            }
            manager.item_delay().await;
        }
        Ok(())
    }
}
