use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::Resolution;
use crate::media::{ItemState, MediaItem};
use crate::processor::{ProcessOptions, ProcessOutcome, ProcessorError};
use crate::scraper::ScrapeResult;
use crate::tracking::trigger;

use super::{Membership, Queue, QueueError, QueueManager, QueuedItem};

/// Uncached releases waiting for a free download slot.
pub struct PendingUncachedQueue {
    membership: Membership,
}

impl PendingUncachedQueue {
    pub fn new() -> Self {
        Self {
            membership: Membership::memory(),
        }
    }

    async fn retry(&self, manager: &QueueManager, entry: QueuedItem) -> Result<(), QueueError> {
        let results = if entry.results.is_empty() {
            rebuild_candidate(&entry.item).into_iter().collect()
        } else {
            entry.results
        };
        let item = entry.item;
        if results.is_empty() {
            info!(item_id = item.id, "Parked release unknown, rescraping");
            manager.move_to_scraping(item).await?;
            return Ok(());
        }

        let options = ProcessOptions {
            trigger_source: trigger::PENDING_UNCACHED.to_string(),
            rationale: "Added once a download slot freed up".to_string(),
            ..ProcessOptions::for_adding(true)
        };
        let outcome = match manager.processor().process(&item, &results, &options).await {
            Ok(outcome) => outcome,
            Err(ProcessorError::Auth(msg)) => return Err(QueueError::Auth(msg)),
            Err(ProcessorError::Unavailable(msg)) => {
                warn!(item_id = item.id, error = %msg, "Debrid provider unavailable, retrying next pass");
                return Ok(());
            }
        };

        match outcome {
            ProcessOutcome::Added(added) => {
                info!(item = %item.label(), torrent = %added.info.filename, "Parked release added");
                let item = manager
                    .apply_added(item, &added, trigger::PENDING_UNCACHED)
                    .await;
                manager.move_to_checking(item).await?;
            }
            ProcessOutcome::PendingUncached { .. } => {
                debug!(item_id = item.id, "Download slots still full");
                let now = manager.now();
                self.membership
                    .update_entry(item.id, |e| {
                        e.last_attempt = Some(now);
                        e.results = results;
                    })
                    .await;
            }
            ProcessOutcome::Exhausted => {
                let mut item = item;
                item.filled_by_magnet = None;
                manager.route_exhausted(item, entry.final_attempt).await?;
            }
        }
        Ok(())
    }
}

impl Default for PendingUncachedQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Recreate the parked candidate from persisted fields after a restart.
fn rebuild_candidate(item: &MediaItem) -> Option<ScrapeResult> {
    let magnet = item.filled_by_magnet.clone()?;
    let title = item
        .original_scraped_torrent_title
        .clone()
        .unwrap_or_else(|| item.title.clone());
    Some(ScrapeResult {
        resolution: Resolution::detect(&title),
        title,
        magnet,
        size_gb: 0.0,
        bitrate_mbps: None,
        seeders: 0,
        is_hdr: false,
        is_anime: item.is_anime,
        scraper: "pending_uncached".to_string(),
        total_score: item.filled_by_score.unwrap_or(0.0),
        score_breakdown: BTreeMap::new(),
        is_cached: Some(false),
    })
}

#[async_trait]
impl Queue for PendingUncachedQueue {
    fn state(&self) -> ItemState {
        ItemState::PendingUncached
    }

    fn membership(&self) -> &Membership {
        &self.membership
    }

    async fn process(&self, manager: &QueueManager) -> Result<(), QueueError> {
        for entry in self.get_contents().await {
            self.retry(manager, entry).await?;
            manager.item_delay().await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debrid::{magnet_from_hash, ActiveDownloads, CacheStatus};
    use crate::queues::test_support::{harness_with, hash, test_config, Harness};
    use crate::tracking::TrackingStore;

    fn harness() -> Harness {
        let mut config = test_config();
        config.versions.get_mut("1080p").unwrap().accept_uncached = true;
        harness_with(config)
    }

    async fn parked(h: &Harness) -> MediaItem {
        h.provider
            .add_uncached_torrent(&hash(4), "Inception.2010.1080p", &["Inception.2010.1080p.mkv"])
            .await;
        h.provider.set_cache_status(&hash(4), CacheStatus::NotCached).await;
        let mut item = h.insert_movie("Inception", 2010);
        item.filled_by_magnet = Some(magnet_from_hash(&hash(4)));
        item.original_scraped_torrent_title = Some("Inception.2010.1080p".to_string());
        item.filled_by_score = Some(77.0);
        h.place(item, ItemState::PendingUncached).await
    }

    #[test]
    fn test_rebuild_candidate_from_item() {
        let mut item = crate::testing::fixtures::movie(1, "Inception", 2010);
        assert!(rebuild_candidate(&item).is_none());

        item.filled_by_magnet = Some(magnet_from_hash(&hash(4)));
        item.original_scraped_torrent_title = Some("Inception.2010.1080p".to_string());
        item.filled_by_score = Some(77.0);
        let result = rebuild_candidate(&item).unwrap();
        assert_eq!(result.title, "Inception.2010.1080p");
        assert_eq!(result.total_score, 77.0);
        assert_eq!(result.resolution, Resolution::R1080p);
    }

    #[tokio::test]
    async fn test_stays_parked_while_slots_full() {
        let h = harness();
        h.provider
            .set_active_downloads(ActiveDownloads { active: 25, limit: 25 })
            .await;
        let item = parked(&h).await;

        h.process(ItemState::PendingUncached).await;

        assert_eq!(h.reload(item.id).state, ItemState::PendingUncached);
        let entries = h.manager.queue(ItemState::PendingUncached).get_contents().await;
        assert!(entries[0].last_attempt.is_some());
        assert_eq!(entries[0].results.len(), 1);
    }

    #[tokio::test]
    async fn test_added_once_slot_frees() {
        let h = harness();
        h.provider
            .set_active_downloads(ActiveDownloads { active: 3, limit: 25 })
            .await;
        let item = parked(&h).await;

        h.process(ItemState::PendingUncached).await;

        let item = h.reload(item.id);
        assert_eq!(item.state, ItemState::Checking);
        assert!(item.filled_by_torrent_id.is_some());
        assert_eq!(h.provider.added_hashes().await, vec![hash(4)]);
        let history = h.tracking.get_history(&hash(4)).unwrap();
        assert!(history.iter().any(|a| a.trigger_source == trigger::PENDING_UNCACHED));
    }

    #[tokio::test]
    async fn test_unknown_release_rescrapes() {
        let h = harness();
        let item = h.insert_movie("Inception", 2010);
        let item = h.place(item, ItemState::PendingUncached).await;

        h.process(ItemState::PendingUncached).await;

        assert_eq!(h.reload(item.id).state, ItemState::Scraping);
    }
}
