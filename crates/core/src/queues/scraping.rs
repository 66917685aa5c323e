use async_trait::async_trait;
use tracing::{info, warn};

use crate::media::ItemState;
use crate::scraper::filter_results;

use super::{Membership, Queue, QueueError, QueueManager};

/// Items waiting for a scrape. One item per tick.
pub struct ScrapingQueue {
    membership: Membership,
}

impl ScrapingQueue {
    pub fn new() -> Self {
        Self {
            membership: Membership::memory(),
        }
    }
}

impl Default for ScrapingQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Queue for ScrapingQueue {
    fn state(&self) -> ItemState {
        ItemState::Scraping
    }

    fn membership(&self) -> &Membership {
        &self.membership
    }

    async fn process(&self, manager: &QueueManager) -> Result<(), QueueError> {
        let Some(entry) = self.get_contents().await.into_iter().next() else {
            return Ok(());
        };
        let item = entry.item;

        let Some(version) = manager.version_for(&item).cloned() else {
            warn!(item_id = item.id, version = ?item.version, "Item has no configured version, sleeping it");
            manager.move_to_sleeping(item).await?;
            return Ok(());
        };

        let raw = match manager.scrapers().scrape(&item, &version).await {
            Ok(results) => results,
            Err(e) => {
                warn!(item_id = item.id, error = %e, "Scrape failed");
                manager.move_to_sleeping(item).await?;
                return Ok(());
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
            info!(item = %item.label(), "No acceptable results");
            manager.move_to_sleeping(item).await?;
        } else {
            info!(item = %item.label(), results = results.len(), "Scrape found results");
            manager.move_to_adding(item, results, false).await?;
        }
        Ok(())
    }
}
