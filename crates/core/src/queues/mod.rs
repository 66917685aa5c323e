//! The queue state machine.
//!
//! Every [`ItemState`] has one queue. In-memory queues hold the items they
//! are working on; database-backed queues (Wanted, Unreleased, Pre_release,
//! Blacklisted, Collected) read their members from the media store. All
//! moves go through [`QueueManager::move_item`], which commits the new state
//! to the database before touching in-memory membership, so a restart can
//! always rehydrate from the database.

mod adding;
mod blacklisted;
mod checking;
mod final_check;
mod manager;
mod membership;
mod pending_uncached;
mod release;
mod schedule;
mod scraping;
mod sleeping;
#[cfg(test)]
pub(crate) mod test_support;
mod timing;
mod upgrading;
mod wanted;

pub use adding::AddingQueue;
pub use blacklisted::BlacklistedQueue;
pub use checking::{
    CheckingQueue, REASON_CHECKING_TIMEOUT, REASON_MISSING_FROM_ACCOUNT, REASON_REPLACED_BY_UPGRADE,
    REASON_TORRENT_ERROR,
};
pub use final_check::FinalCheckQueue;
pub use manager::{MoveOptions, QueueDeps, QueueManager};
pub use membership::Membership;
pub use pending_uncached::PendingUncachedQueue;
pub use release::{CollectedQueue, PreReleaseQueue, UnreleasedQueue};
pub use schedule::{release_status, scrape_due_at, ReleaseStatus};
pub use scraping::ScrapingQueue;
pub use sleeping::SleepingQueue;
pub use timing::{QueueStat, QueueTiming};
pub use upgrading::UpgradingQueue;
pub use wanted::WantedQueue;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::media::{ItemState, MediaError, MediaItem};
use crate::metrics;
use crate::scraper::ScrapeResult;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Media store error: {0}")]
    Media(#[from] MediaError),

    /// The debrid provider rejected our credentials.
    #[error("Debrid authentication failed: {0}")]
    Auth(String),

    #[error("Queue setup failed: {0}")]
    Setup(String),

    #[error("Queue timing persistence failed: {0}")]
    Timing(String),
}

/// An item held by an in-memory queue.
#[derive(Debug, Clone, Serialize)]
pub struct QueuedItem {
    pub item: MediaItem,
    pub entered_at: DateTime<Utc>,
    /// Ranked candidates carried from Scraping into Adding.
    #[serde(skip)]
    pub results: Vec<ScrapeResult>,
    /// Set when Adding runs on the Final_Check scrape; exhaustion then blacklists.
    pub final_attempt: bool,
    /// Last upgrade scan or uncached retry.
    pub last_attempt: Option<DateTime<Utc>>,
    /// Snapshot of the collected item an upgrade in Checking replaces.
    #[serde(skip)]
    pub replaced: Option<Box<MediaItem>>,
}

impl QueuedItem {
    pub fn new(item: MediaItem, entered_at: DateTime<Utc>) -> Self {
        Self {
            item,
            entered_at,
            results: Vec::new(),
            final_attempt: false,
            last_attempt: None,
            replaced: None,
        }
    }
}

/// One state's queue.
///
/// Queues never keep a reference to the manager; it is passed to
/// [`process`](Queue::process) on every tick.
#[async_trait]
pub trait Queue: Send + Sync {
    fn state(&self) -> ItemState;

    fn membership(&self) -> &Membership;

    fn name(&self) -> &'static str {
        self.state().as_str()
    }

    async fn add_item(&self, entry: QueuedItem) {
        self.membership().add(entry).await;
    }

    async fn remove_item(&self, item_id: i64) -> Option<QueuedItem> {
        self.membership().remove(item_id).await
    }

    async fn contains_item_id(&self, item_id: i64) -> bool {
        self.membership().contains(item_id).await
    }

    async fn get_contents(&self) -> Vec<QueuedItem> {
        self.membership().contents().await
    }

    async fn len(&self) -> usize {
        self.membership().len().await
    }

    /// Cheap hook run every loop, even while processing is paused.
    async fn update(&self, _manager: &QueueManager) -> Result<(), QueueError> {
        metrics::QUEUE_SIZE
            .with_label_values(&[self.name()])
            .set(self.len().await as i64);
        Ok(())
    }

    /// Advance the queue's items. Must be safe to repeat after a crash.
    async fn process(&self, manager: &QueueManager) -> Result<(), QueueError>;
}
