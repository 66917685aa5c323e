use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::audit::AuditEvent;
use crate::media::{ItemState, MediaItem};
use crate::processor::{ProcessOptions, ProcessOutcome, ProcessorError};
use crate::scraper::{filter_results, ScrapeResult};
use crate::tracking::trigger;

use super::{Membership, MoveOptions, Queue, QueueError, QueueManager, QueuedItem};

/// Collected items inside their upgrade window, periodically rescraped for a better release.
pub struct UpgradingQueue {
    membership: Membership,
}

impl UpgradingQueue {
    pub fn new() -> Self {
        Self {
            membership: Membership::memory(),
        }
    }

    async fn scan(
        &self,
        manager: &QueueManager,
        entry: QueuedItem,
        now: DateTime<Utc>,
    ) -> Result<(), QueueError> {
        let item = entry.item;
        self.membership
            .update_entry(item.id, |e| e.last_attempt = Some(now))
            .await;

        let Some(version) = manager.version_for(&item).cloned() else {
            return Ok(());
        };
        let raw = match manager.scrapers().scrape(&item, &version).await {
            Ok(results) => results,
            Err(e) => {
                debug!(item_id = item.id, error = %e, "Upgrade scrape failed");
                return Ok(());
            }
        };
        let not_wanted = manager.media().not_wanted(item.id)?;
        let ranked = filter_results(
            &item,
            &version,
            raw,
            &not_wanted,
            manager.config().queues.sort_by_uncached_status,
        );

        let current = item.filled_by_score.unwrap_or(0.0);
        let candidates = better_candidates(
            ranked,
            current,
            manager.config().queues.upgrading_percentage_threshold,
        );
        if candidates.is_empty() {
            debug!(item_id = item.id, current, "No better release found");
            return Ok(());
        }

        let outcome = match manager
            .processor()
            .process(&item, &candidates, &ProcessOptions::for_upgrade())
            .await
        {
            Ok(outcome) => outcome,
            Err(ProcessorError::Auth(msg)) => return Err(QueueError::Auth(msg)),
            Err(ProcessorError::Unavailable(msg)) => {
                warn!(item_id = item.id, error = %msg, "Debrid provider unavailable, retrying next pass");
                return Ok(());
            }
        };

        let ProcessOutcome::Added(added) = outcome else {
            debug!(item_id = item.id, "No upgrade candidate could be added");
            return Ok(());
        };
        if item.filled_by_torrent_id.as_deref() == Some(added.info.id.as_str()) {
            return Ok(());
        }

        info!(
            item = %item.label(),
            old_score = current,
            new_score = added.result.total_score,
            "Upgrade found"
        );
        manager
            .audit(AuditEvent::UpgradeStarted {
                item_id: item.id,
                from_torrent_id: item.filled_by_torrent_id.clone(),
                old_score: current,
                new_score: added.result.total_score,
            })
            .await;

        let previous = item.clone();
        let mut item = manager.apply_added(item, &added, trigger::UPGRADE).await;
        item.upgrading_from = previous.filled_by_torrent_id.clone();
        let options = MoveOptions {
            silent: true,
            replaced: Some(Box::new(previous)),
            ..MoveOptions::default()
        };
        manager.move_item(item, ItemState::Checking, options).await?;
        Ok(())
    }
}

impl Default for UpgradingQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Ranked results scoring at least `threshold` above the current release.
fn better_candidates(ranked: Vec<ScrapeResult>, current: f64, threshold: f64) -> Vec<ScrapeResult> {
    let bar = current * (1.0 + threshold);
    ranked.into_iter().filter(|r| r.total_score >= bar).collect()
}

fn window_open(item: &MediaItem, window: Duration, now: DateTime<Utc>) -> bool {
    item.original_collected_at
        .or(item.collected_at)
        .is_some_and(|at| now < at + window)
}

#[async_trait]
impl Queue for UpgradingQueue {
    fn state(&self) -> ItemState {
        ItemState::Upgrading
    }

    fn membership(&self) -> &Membership {
        &self.membership
    }

    async fn process(&self, manager: &QueueManager) -> Result<(), QueueError> {
        let window = Duration::hours(manager.config().queues.upgrade_window_hours as i64);
        let now = manager.now();

        for entry in self.get_contents().await {
            if !window_open(&entry.item, window, now) {
                debug!(item_id = entry.item.id, "Upgrade window closed");
                let options = MoveOptions {
                    silent: true,
                    ..MoveOptions::default()
                };
                manager
                    .move_item(entry.item, ItemState::Collected, options)
                    .await?;
                continue;
            }
            self.scan(manager, entry, now).await?;
            manager.item_delay().await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaStore;
    use crate::queues::test_support::{harness, hash, Harness};
    use crate::testing::fixtures;

    async fn collected(h: &Harness, score: f64) -> MediaItem {
        let item = h.insert_movie("Inception", 2010);
        h.media.add_not_wanted(item.id, &hash(1)).unwrap();
        let item = h.fill(item, 1, "Inception.2010.720p.mkv", score).await;
        let item = h.manager.move_to_collected(item, false).await.unwrap();
        h.manager.move_to_upgrading(item).await.unwrap()
    }

    #[test]
    fn test_better_candidates_threshold() {
        let ranked = vec![
            fixtures::scrape_result("A", &hash(1), 326.3),
            fixtures::scrape_result("B", &hash(2), 240.0),
        ];
        let kept = better_candidates(ranked, 226.3, 0.1);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].total_score, 326.3);
    }

    #[tokio::test]
    async fn test_better_release_starts_upgrade() {
        let h = harness();
        let item = collected(&h, 226.3).await;
        let old_id = item.filled_by_torrent_id.clone().unwrap();
        h.provider
            .add_cached_torrent(&hash(2), "Inception.2010.1080p", &["Inception.2010.1080p.mkv"])
            .await;
        h.scraper
            .set_results(vec![fixtures::scrape_result("Inception.2010.1080p", &hash(2), 326.3)])
            .await;

        h.process(ItemState::Upgrading).await;

        let item = h.reload(item.id);
        assert_eq!(item.state, ItemState::Checking);
        assert_eq!(item.effective_state(), ItemState::Upgrading);
        assert_eq!(item.upgrading_from, Some(old_id));
        assert_eq!(item.filled_by_score, Some(326.3));
        assert_eq!(item.filled_by_file.as_deref(), Some("Inception.2010.1080p.mkv"));
        assert!(!h.media.is_not_wanted(item.id, &hash(2)).unwrap());
        assert!(!h.in_queue(ItemState::Upgrading, item.id).await);
    }

    #[tokio::test]
    async fn test_small_improvement_is_ignored() {
        let h = harness();
        let item = collected(&h, 226.3).await;
        h.scraper
            .set_results(vec![fixtures::scrape_result("Inception.2010.1080p", &hash(2), 240.0)])
            .await;

        h.process(ItemState::Upgrading).await;

        assert_eq!(h.reload(item.id).state, ItemState::Upgrading);
        let entries = h.manager.queue(ItemState::Upgrading).get_contents().await;
        assert!(entries[0].last_attempt.is_some());
        assert!(h.provider.added_hashes().await.iter().all(|x| x != &hash(2)));
    }

    #[tokio::test]
    async fn test_closed_window_returns_item_to_collected() {
        let h = harness();
        let item = collected(&h, 226.3).await;

        h.clock.advance(Duration::hours(25));
        h.process(ItemState::Upgrading).await;

        assert_eq!(h.reload(item.id).state, ItemState::Collected);
        assert!(!h.in_queue(ItemState::Upgrading, item.id).await);
        assert!(h.scraper.calls().await.is_empty());
    }
}
