use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::audit::{AuditEvent, AuditHandle};
use crate::clock::Clock;
use crate::config::{Config, VersionConfig};
use crate::debrid::DebridProvider;
use crate::library::LibraryManager;
use crate::media::{ItemState, MediaFilter, MediaItem, MediaStore};
use crate::metrics;
use crate::notifications::{NotificationBuffer, NotificationCategory, NotificationEvent};
use crate::processor::{AddedTorrent, TorrentProcessor};
use crate::scraper::{ScrapeResult, ScraperSet};
use crate::tracking::TrackingStore;

use super::{
    AddingQueue, BlacklistedQueue, CheckingQueue, CollectedQueue, FinalCheckQueue,
    PendingUncachedQueue, PreReleaseQueue, Queue, QueueError, QueueTiming, QueuedItem,
    ScrapingQueue, SleepingQueue, UnreleasedQueue, UpgradingQueue, WantedQueue,
};

/// Everything the queues need, handed to [`QueueManager::new`].
pub struct QueueDeps {
    pub config: Arc<Config>,
    pub media: Arc<dyn MediaStore>,
    pub tracking: Arc<dyn TrackingStore>,
    pub provider: Arc<dyn DebridProvider>,
    pub scrapers: ScraperSet,
    pub library: Arc<dyn LibraryManager>,
    pub clock: Arc<dyn Clock>,
    pub audit: Option<AuditHandle>,
    pub notifications: Option<NotificationBuffer>,
}

/// Extra data carried by a move.
#[derive(Debug, Clone, Default)]
pub struct MoveOptions {
    pub results: Vec<ScrapeResult>,
    pub final_attempt: bool,
    pub is_upgrade: bool,
    /// Suppress the notification for this move.
    pub silent: bool,
    /// The collected item an upgrade is replacing.
    pub replaced: Option<Box<MediaItem>>,
}

impl MoveOptions {
    pub fn with_results(results: Vec<ScrapeResult>) -> Self {
        Self {
            results,
            ..Self::default()
        }
    }
}

/// Owns every queue and performs all state transitions.
pub struct QueueManager {
    config: Arc<Config>,
    media: Arc<dyn MediaStore>,
    tracking: Arc<dyn TrackingStore>,
    processor: TorrentProcessor,
    scrapers: ScraperSet,
    library: Arc<dyn LibraryManager>,
    clock: Arc<dyn Clock>,
    audit: Option<AuditHandle>,
    notifications: Option<NotificationBuffer>,
    timing: Mutex<QueueTiming>,
    queues: Vec<Arc<dyn Queue>>,
}

impl QueueManager {
    pub fn new(deps: QueueDeps) -> Result<Self, QueueError> {
        let processor = TorrentProcessor::new(
            deps.provider.clone(),
            deps.media.clone(),
            deps.tracking.clone(),
        )
        .map_err(|e| QueueError::Setup(e.to_string()))?;

        let media = deps.media.clone();
        let queues: Vec<Arc<dyn Queue>> = ItemState::ALL
            .iter()
            .map(|state| -> Arc<dyn Queue> {
                match state {
                    ItemState::Wanted => Arc::new(WantedQueue::new(media.clone())),
                    ItemState::Scraping => Arc::new(ScrapingQueue::new()),
                    ItemState::Adding => Arc::new(AddingQueue::new()),
                    ItemState::Checking => Arc::new(CheckingQueue::new()),
                    ItemState::Sleeping => Arc::new(SleepingQueue::new()),
                    ItemState::Unreleased => Arc::new(UnreleasedQueue::new(media.clone())),
                    ItemState::PreRelease => Arc::new(PreReleaseQueue::new(media.clone())),
                    ItemState::FinalCheck => Arc::new(FinalCheckQueue::new()),
                    ItemState::PendingUncached => Arc::new(PendingUncachedQueue::new()),
                    ItemState::Upgrading => Arc::new(UpgradingQueue::new()),
                    ItemState::Blacklisted => Arc::new(BlacklistedQueue::new(media.clone())),
                    ItemState::Collected => Arc::new(CollectedQueue::new(media.clone())),
                }
            })
            .collect();

        Ok(Self {
            config: deps.config,
            media: deps.media,
            tracking: deps.tracking,
            processor,
            scrapers: deps.scrapers,
            library: deps.library,
            clock: deps.clock,
            audit: deps.audit,
            notifications: deps.notifications,
            timing: Mutex::new(QueueTiming::new()),
            queues,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn media(&self) -> &Arc<dyn MediaStore> {
        &self.media
    }

    pub fn tracking(&self) -> &Arc<dyn TrackingStore> {
        &self.tracking
    }

    pub fn provider(&self) -> &Arc<dyn DebridProvider> {
        self.processor.provider()
    }

    pub fn processor(&self) -> &TorrentProcessor {
        &self.processor
    }

    pub fn scrapers(&self) -> &ScraperSet {
        &self.scrapers
    }

    pub fn library(&self) -> &Arc<dyn LibraryManager> {
        &self.library
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn notifications(&self) -> Option<&NotificationBuffer> {
        self.notifications.as_ref()
    }

    pub fn queue(&self, state: ItemState) -> &Arc<dyn Queue> {
        let index = ItemState::ALL
            .iter()
            .position(|s| *s == state)
            .unwrap_or_default();
        &self.queues[index]
    }

    pub fn queues(&self) -> &[Arc<dyn Queue>] {
        &self.queues
    }

    /// Version settings for an item, if its version is configured.
    pub fn version_for(&self, item: &MediaItem) -> Option<&VersionConfig> {
        item.version.as_deref().and_then(|v| self.config.version(v))
    }

    pub fn wake_limit(&self, item: &MediaItem) -> u32 {
        self.config.wake_limit_for(item.version.as_deref())
    }

    /// Pause between items inside one tick.
    pub async fn item_delay(&self) {
        let delay = self.config.scheduler.item_process_delay_secs;
        if delay > 0.0 {
            tokio::time::sleep(Duration::from_secs_f64(delay)).await;
        }
    }

    pub async fn audit(&self, event: AuditEvent) {
        if let Some(audit) = &self.audit {
            audit.emit(event).await;
        }
    }

    pub async fn notify_category(&self, category: NotificationCategory, detail: &str) {
        if let Some(notifications) = &self.notifications {
            notifications.send_category(category, detail).await;
        }
    }

    /// Copy an accepted torrent onto the item and record the addition.
    pub async fn apply_added(
        &self,
        mut item: MediaItem,
        added: &AddedTorrent,
        trigger_source: &str,
    ) -> MediaItem {
        item.filled_by_title = Some(added.info.filename.clone());
        item.filled_by_file = added.file_name.clone();
        item.filled_by_magnet = Some(added.original_link.clone());
        item.filled_by_torrent_id = Some(added.info.id.clone());
        item.filled_by_score = Some(added.result.total_score);
        item.original_scraped_torrent_title = Some(added.result.title.clone());

        self.audit(AuditEvent::TorrentAdded {
            item_id: Some(item.id),
            hash: added.hash.clone(),
            torrent_id: added.info.id.clone(),
            title: Some(added.info.filename.clone()),
            trigger_source: trigger_source.to_string(),
        })
        .await;
        item
    }

    /// Remove a torrent from the debrid account. Failures are logged only.
    pub async fn remove_torrent(
        &self,
        item_id: i64,
        torrent_id: &str,
        hash: Option<String>,
        reason: &str,
    ) {
        if let Err(e) = self.provider().remove_torrent(torrent_id, reason).await {
            warn!(item_id, torrent_id, error = %e, "Failed to remove torrent");
            return;
        }
        self.audit(AuditEvent::TorrentRemoved {
            item_id: Some(item_id),
            hash,
            torrent_id: torrent_id.to_string(),
            reason: reason.to_string(),
        })
        .await;
    }

    /// Load in-memory queues from persisted state after a restart.
    pub async fn rehydrate(&self) -> Result<usize, QueueError> {
        let mut loaded = 0;
        for queue in &self.queues {
            if !queue.membership().is_memory() {
                continue;
            }
            let items = self
                .media
                .list(&MediaFilter::new().with_state(queue.state()).unlimited())?;
            let mut timing = Vec::with_capacity(items.len());
            for item in items {
                let entered_at = item.updated_at;
                timing.push((item.id, entered_at));
                queue.add_item(QueuedItem::new(item, entered_at)).await;
                loaded += 1;
            }
            if let Ok(mut t) = self.timing.lock() {
                for (id, at) in timing {
                    t.enter(id, queue.name(), at);
                }
            }
        }
        info!(items = loaded, "Rehydrated in-memory queues");
        Ok(loaded)
    }

    /// Move an item to another queue.
    ///
    /// The database update is committed before in-memory membership changes,
    /// so a crash between steps leaves the item recoverable from its
    /// persisted state.
    pub async fn move_item(
        &self,
        item: MediaItem,
        to: ItemState,
        options: MoveOptions,
    ) -> Result<MediaItem, QueueError> {
        let from = item.state;
        let now = self.now();

        self.audit(AuditEvent::MoveInitiated {
            item_id: item.id,
            from_state: from,
            to_state: to,
        })
        .await;

        let seconds_in_source = self
            .timing
            .lock()
            .ok()
            .and_then(|mut t| t.exit(item.id, from.as_str(), now));

        let mut item = item;
        item.state = to;
        let item = self.media.update(&item)?;

        self.queue(to)
            .add_item(QueuedItem {
                item: item.clone(),
                entered_at: now,
                results: options.results,
                final_attempt: options.final_attempt,
                last_attempt: None,
                replaced: options.replaced,
            })
            .await;
        if let Ok(mut t) = self.timing.lock() {
            t.enter(item.id, to.as_str(), now);
        }

        if from != to {
            self.queue(from).remove_item(item.id).await;
        }

        self.audit(AuditEvent::MoveCompleted {
            item_id: item.id,
            from_state: from,
            to_state: to,
            seconds_in_source,
        })
        .await;

        metrics::QUEUE_MOVES
            .with_label_values(&[from.as_str(), to.as_str()])
            .inc();
        debug!(item_id = item.id, from = %from, to = %to, "Moved item");

        if !options.silent {
            if let Some(notifications) = &self.notifications {
                notifications
                    .buffer(vec![NotificationEvent::from_item(&item, to.as_str(), options.is_upgrade)])
                    .await;
            }
        }

        Ok(item)
    }

    pub async fn move_to_wanted(&self, item: MediaItem) -> Result<MediaItem, QueueError> {
        self.move_item(item, ItemState::Wanted, MoveOptions::default()).await
    }

    pub async fn move_to_scraping(&self, item: MediaItem) -> Result<MediaItem, QueueError> {
        self.move_item(item, ItemState::Scraping, MoveOptions::default()).await
    }

    pub async fn move_to_adding(
        &self,
        item: MediaItem,
        results: Vec<ScrapeResult>,
        final_attempt: bool,
    ) -> Result<MediaItem, QueueError> {
        let options = MoveOptions {
            final_attempt,
            ..MoveOptions::with_results(results)
        };
        self.move_item(item, ItemState::Adding, options).await
    }

    pub async fn move_to_checking(&self, item: MediaItem) -> Result<MediaItem, QueueError> {
        self.move_item(item, ItemState::Checking, MoveOptions::default()).await
    }

    pub async fn move_to_sleeping(&self, item: MediaItem) -> Result<MediaItem, QueueError> {
        self.move_item(item, ItemState::Sleeping, MoveOptions::default()).await
    }

    pub async fn move_to_unreleased(&self, item: MediaItem) -> Result<MediaItem, QueueError> {
        self.move_item(item, ItemState::Unreleased, MoveOptions::default()).await
    }

    pub async fn move_to_pre_release(&self, item: MediaItem) -> Result<MediaItem, QueueError> {
        self.move_item(item, ItemState::PreRelease, MoveOptions::default()).await
    }

    pub async fn move_to_pending_uncached(
        &self,
        item: MediaItem,
        result: ScrapeResult,
    ) -> Result<MediaItem, QueueError> {
        self.move_item(item, ItemState::PendingUncached, MoveOptions::with_results(vec![result]))
            .await
    }

    pub async fn move_to_collected(
        &self,
        mut item: MediaItem,
        is_upgrade: bool,
    ) -> Result<MediaItem, QueueError> {
        let now = self.now();
        item.collected_at = Some(now);
        item.original_collected_at.get_or_insert(now);
        let options = MoveOptions {
            is_upgrade,
            ..MoveOptions::default()
        };
        self.move_item(item, ItemState::Collected, options).await
    }

    /// Start the upgrade window. Silent, since the item was just announced as collected.
    pub async fn move_to_upgrading(&self, item: MediaItem) -> Result<MediaItem, QueueError> {
        let options = MoveOptions {
            silent: true,
            ..MoveOptions::default()
        };
        self.move_item(item, ItemState::Upgrading, options).await
    }

    /// Blacklist an item. A configured fallback version sends it straight
    /// back to Wanted under the new version.
    pub async fn move_to_blacklisted(&self, mut item: MediaItem) -> Result<MediaItem, QueueError> {
        item.blacklisted_at = Some(self.now());
        let fallback = self
            .version_for(&item)
            .and_then(|v| v.fallback_version.clone())
            .filter(|f| Some(f.as_str()) != item.version.as_deref())
            .filter(|f| self.config.version(f).is_some());

        let item = self
            .move_item(item, ItemState::Blacklisted, MoveOptions::default())
            .await?;
        let Some(fallback) = fallback else {
            return Ok(item);
        };

        info!(item_id = item.id, fallback = %fallback, "Retrying blacklisted item with fallback version");
        let mut item = item;
        item.version = Some(fallback);
        item.wake_count = 0;
        item.blacklisted_at = None;
        self.move_to_wanted(item).await
    }

    /// Final_Check when a delay is configured, else Blacklisted.
    pub async fn move_to_final_or_blacklist(&self, item: MediaItem) -> Result<MediaItem, QueueError> {
        if self.config.queues.final_check_delay_hours > 0 {
            self.move_item(item, ItemState::FinalCheck, MoveOptions::default()).await
        } else {
            self.move_to_blacklisted(item).await
        }
    }

    /// Route an item whose candidates all failed.
    pub async fn route_exhausted(
        &self,
        item: MediaItem,
        final_attempt: bool,
    ) -> Result<MediaItem, QueueError> {
        if final_attempt {
            return self.move_to_blacklisted(item).await;
        }
        if item.wake_count >= self.wake_limit(&item) {
            return self.move_to_final_or_blacklist(item).await;
        }
        self.move_to_sleeping(item).await
    }

    /// Run one queue's `process`, logging and swallowing everything but auth failures.
    pub async fn process_queue(&self, state: ItemState) -> Result<(), QueueError> {
        let queue = self.queue(state).clone();
        match queue.process(self).await {
            Ok(()) => Ok(()),
            Err(QueueError::Auth(msg)) => Err(QueueError::Auth(msg)),
            Err(e) => {
                warn!(queue = queue.name(), error = %e, "Queue processing failed");
                Ok(())
            }
        }
    }

    /// Run every queue's `update` hook.
    pub async fn update_all(&self) {
        for queue in &self.queues {
            if let Err(e) = queue.update(self).await {
                warn!(queue = queue.name(), error = %e, "Queue update failed");
            }
        }
    }

    pub fn timing_snapshot(&self) -> QueueTiming {
        self.timing.lock().map(|t| t.clone()).unwrap_or_default()
    }

    /// Prune and persist timing data.
    pub fn save_timing(&self, path: &std::path::Path) -> Result<(), QueueError> {
        let snapshot = {
            let mut timing = self
                .timing
                .lock()
                .map_err(|e| QueueError::Timing(e.to_string()))?;
            timing.prune(self.now());
            timing.clone()
        };
        snapshot.save(path)
    }

    /// Replace timing data with what was saved before a restart.
    pub fn load_timing(&self, path: &std::path::Path) -> Result<(), QueueError> {
        let loaded = QueueTiming::load(path)?;
        let mut timing = self
            .timing
            .lock()
            .map_err(|e| QueueError::Timing(e.to_string()))?;
        *timing = loaded;
        Ok(())
    }
}
