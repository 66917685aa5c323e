use async_trait::async_trait;
use tracing::{info, warn};

use crate::media::ItemState;
use crate::processor::{ProcessOptions, ProcessOutcome, ProcessorError};
use crate::tracking::trigger;

use super::{Membership, Queue, QueueError, QueueManager};

/// Items with ranked candidates waiting to be added to the debrid account.
pub struct AddingQueue {
    membership: Membership,
}

impl AddingQueue {
    pub fn new() -> Self {
        Self {
            membership: Membership::memory(),
        }
    }
}

impl Default for AddingQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Queue for AddingQueue {
    fn state(&self) -> ItemState {
        ItemState::Adding
    }

    fn membership(&self) -> &Membership {
        &self.membership
    }

    async fn process(&self, manager: &QueueManager) -> Result<(), QueueError> {
        let Some(entry) = self.get_contents().await.into_iter().next() else {
            return Ok(());
        };
        let item = entry.item;

        // Candidates live in memory only; after a restart the item needs a fresh scrape.
        if entry.results.is_empty() {
            info!(item_id = item.id, "No candidates held, rescraping");
            manager.move_to_scraping(item).await?;
            return Ok(());
        }

        let accept_uncached = manager
            .version_for(&item)
            .is_some_and(|v| v.accept_uncached);
        let options = ProcessOptions::for_adding(accept_uncached);

        let outcome = match manager.processor().process(&item, &entry.results, &options).await {
            Ok(outcome) => outcome,
            Err(ProcessorError::Auth(msg)) => return Err(QueueError::Auth(msg)),
            Err(ProcessorError::Unavailable(msg)) => {
                warn!(item_id = item.id, error = %msg, "Debrid provider unavailable, retrying next pass");
                return Ok(());
            }
        };

        match outcome {
            ProcessOutcome::Added(added) => {
                info!(item = %item.label(), torrent = %added.info.filename, cached = added.cached, "Torrent added");
                let item = manager.apply_added(item, &added, trigger::QUEUE_ADD).await;
                manager.move_to_checking(item).await?;
            }
            ProcessOutcome::PendingUncached { magnet, result } => {
                info!(item = %item.label(), "No download slot free, parking uncached release");
                let mut item = item;
                item.filled_by_magnet = Some(magnet);
                item.original_scraped_torrent_title = Some(result.title.clone());
                item.filled_by_score = Some(result.total_score);
                manager.move_to_pending_uncached(item, result).await?;
            }
            ProcessOutcome::Exhausted => {
                warn!(item = %item.label(), candidates = entry.results.len(), "Every candidate failed");
                manager.route_exhausted(item, entry.final_attempt).await?;
            }
        }
        Ok(())
    }
}
