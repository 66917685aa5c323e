use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::debrid::{extract_hash, TorrentInfoResult, TorrentStatus};
use crate::media::{ItemState, MediaItem};
use crate::notifications::NotificationCategory;

use super::{Membership, MoveOptions, Queue, QueueError, QueueManager, QueuedItem};

pub const REASON_CHECKING_TIMEOUT: &str = "Checking timeout";
pub const REASON_REPLACED_BY_UPGRADE: &str = "Replaced by upgrade";
pub const REASON_MISSING_FROM_ACCOUNT: &str = "Missing from debrid account";
pub const REASON_TORRENT_ERROR: &str = "Torrent in error status";

/// Items added to the debrid account, waiting for their file to reach the library.
pub struct CheckingQueue {
    membership: Membership,
}

impl CheckingQueue {
    pub fn new() -> Self {
        Self {
            membership: Membership::memory(),
        }
    }

    async fn check(
        &self,
        manager: &QueueManager,
        entry: QueuedItem,
        now: DateTime<Utc>,
        timeout: Duration,
    ) -> Result<(), QueueError> {
        match manager.library().item_file_present(&entry.item).await {
            Ok(true) => return self.collect(manager, entry).await,
            Ok(false) => {}
            Err(e) => {
                warn!(item_id = entry.item.id, error = %e, "Library check failed, keeping item in Checking");
                return Ok(());
            }
        }

        let problem = match entry.item.filled_by_torrent_id.as_deref() {
            None => Some(REASON_MISSING_FROM_ACCOUNT),
            Some(torrent_id) => match manager.provider().get_torrent_info(torrent_id).await {
                TorrentInfoResult::NotFound => Some(REASON_MISSING_FROM_ACCOUNT),
                TorrentInfoResult::Ok(info) if info.status == TorrentStatus::Error => {
                    Some(REASON_TORRENT_ERROR)
                }
                _ => None,
            },
        };

        match problem {
            Some(reason) => self.fail(manager, entry, reason).await,
            None if now - entry.entered_at >= timeout => {
                self.fail(manager, entry, REASON_CHECKING_TIMEOUT).await
            }
            None => Ok(()),
        }
    }

    async fn collect(&self, manager: &QueueManager, entry: QueuedItem) -> Result<(), QueueError> {
        let mut item = entry.item;
        let replaced_id = item.upgrading_from.take();
        let is_upgrade = replaced_id.is_some();

        if let Some(old_id) = replaced_id {
            if item.filled_by_torrent_id.as_deref() != Some(old_id.as_str()) {
                let old_hash = entry
                    .replaced
                    .as_ref()
                    .and_then(|r| r.filled_by_magnet.as_deref())
                    .and_then(extract_hash);
                manager
                    .remove_torrent(item.id, &old_id, old_hash, REASON_REPLACED_BY_UPGRADE)
                    .await;
            }
        }

        info!(item = %item.label(), upgrade = is_upgrade, "File present in library");
        let file = item.filled_by_file.clone();
        let item = manager.move_to_collected(item, is_upgrade).await?;
        if let Some(file) = file {
            manager.library().trigger_scan(&file).await;
        }

        let upgrading = manager
            .version_for(&item)
            .is_some_and(|v| v.enable_upgrading);
        let window = Duration::hours(manager.config().queues.upgrade_window_hours as i64);
        let in_window = item
            .original_collected_at
            .is_some_and(|at| manager.now() < at + window);
        if upgrading && in_window {
            manager.move_to_upgrading(item).await?;
        }
        Ok(())
    }

    async fn fail(
        &self,
        manager: &QueueManager,
        entry: QueuedItem,
        reason: &str,
    ) -> Result<(), QueueError> {
        let mut item = entry.item;
        warn!(item = %item.label(), reason, "Check failed");

        let hash = item.filled_by_magnet.as_deref().and_then(extract_hash);
        if let Some(hash) = &hash {
            manager.media().add_not_wanted(item.id, hash)?;
        }
        if reason != REASON_MISSING_FROM_ACCOUNT {
            if let Some(torrent_id) = item.filled_by_torrent_id.clone() {
                manager.remove_torrent(item.id, &torrent_id, hash, reason).await;
            }
        }

        if let Some(old_id) = item.upgrading_from.take() {
            restore_replaced(&mut item, old_id, entry.replaced.as_deref());
            manager
                .notify_category(
                    NotificationCategory::UpgradeFailed,
                    &format!("{}: {}", item.label(), reason),
                )
                .await;
            let options = MoveOptions {
                silent: true,
                ..MoveOptions::default()
            };
            manager.move_item(item, ItemState::Collected, options).await?;
            return Ok(());
        }

        clear_fill(&mut item);
        item.wake_count += 1;
        if item.wake_count >= manager.wake_limit(&item) {
            manager.move_to_final_or_blacklist(item).await?;
        } else {
            manager.move_to_wanted(item).await?;
        }
        Ok(())
    }
}

impl Default for CheckingQueue {
    fn default() -> Self {
        Self::new()
    }
}

fn clear_fill(item: &mut MediaItem) {
    item.filled_by_title = None;
    item.filled_by_file = None;
    item.filled_by_magnet = None;
    item.filled_by_torrent_id = None;
    item.filled_by_score = None;
}

/// Put back the release an abandoned upgrade was meant to replace.
fn restore_replaced(item: &mut MediaItem, old_torrent_id: String, replaced: Option<&MediaItem>) {
    match replaced {
        Some(previous) => {
            item.filled_by_title = previous.filled_by_title.clone();
            item.filled_by_file = previous.filled_by_file.clone();
            item.filled_by_magnet = previous.filled_by_magnet.clone();
            item.filled_by_score = previous.filled_by_score;
            item.original_scraped_torrent_title = previous.original_scraped_torrent_title.clone();
        }
        None => {
            item.filled_by_title = None;
            item.filled_by_file = None;
            item.filled_by_magnet = None;
            item.filled_by_score = None;
        }
    }
    item.filled_by_torrent_id = Some(old_torrent_id);
}

#[async_trait]
impl Queue for CheckingQueue {
    fn state(&self) -> ItemState {
        ItemState::Checking
    }

    fn membership(&self) -> &Membership {
        &self.membership
    }

    async fn process(&self, manager: &QueueManager) -> Result<(), QueueError> {
        let entries = self.get_contents().await;
        if entries.is_empty() {
            return Ok(());
        }
        let timeout = Duration::minutes(manager.config().queues.checking_timeout_minutes as i64);
        let now = manager.now();
        for entry in entries {
            self.check(manager, entry, now, timeout).await?;
            manager.item_delay().await;
        }
        Ok(())
    }
}
