//! Torrent processor.
//!
//! Walks a ranked candidate list for one item: resolve the link, check the
//! cache, add (or reuse) the torrent, verify it has files and record why it
//! was added. The first candidate that survives wins.

mod resolve;
mod torrent;

pub use resolve::{LinkResolver, ResolveError};
pub use torrent::TorrentProcessor;

use thiserror::Error;

use crate::debrid::TorrentInfo;
use crate::scraper::ScrapeResult;
use crate::tracking::trigger;

pub const REASON_NO_FILES: &str = "no files after addition";

/// Errors that stop candidate iteration entirely.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// The provider rejected our credentials. Retrying other candidates is pointless.
    #[error("Debrid authentication failed: {0}")]
    Auth(String),

    /// Rate limited or unreachable. The item should be left as-is and retried.
    #[error("Debrid provider unavailable: {0}")]
    Unavailable(String),
}

/// How a processing run should behave.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    pub accept_uncached: bool,
    /// Add the chosen hash to the item's not-wanted set. Upgrades turn this off.
    pub add_to_not_wanted: bool,
    pub trigger_source: String,
    pub rationale: String,
}

impl ProcessOptions {
    /// Options used by the Adding queue.
    pub fn for_adding(accept_uncached: bool) -> Self {
        Self {
            accept_uncached,
            add_to_not_wanted: true,
            trigger_source: trigger::QUEUE_ADD.to_string(),
            rationale: "Added via adding queue processing".to_string(),
        }
    }

    /// Options used when replacing a collected release.
    pub fn for_upgrade() -> Self {
        Self {
            accept_uncached: false,
            add_to_not_wanted: false,
            trigger_source: trigger::UPGRADE.to_string(),
            rationale: "Added as upgrade of a collected release".to_string(),
        }
    }
}

/// A torrent accepted for an item.
#[derive(Debug, Clone)]
pub struct AddedTorrent {
    pub info: TorrentInfo,
    pub hash: String,
    /// The link as supplied by the scraper.
    pub original_link: String,
    /// Largest video file, used for file-presence checks.
    pub file_name: Option<String>,
    pub cached: bool,
    pub result: ScrapeResult,
}

/// Outcome of processing a candidate list.
#[derive(Debug, Clone)]
pub enum ProcessOutcome {
    Added(Box<AddedTorrent>),
    /// The chosen candidate is uncached and no download slot is free.
    PendingUncached { magnet: String, result: ScrapeResult },
    /// No candidate succeeded.
    Exhausted,
}

impl ProcessOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ProcessOutcome::Added(_) => "added",
            ProcessOutcome::PendingUncached { .. } => "pending_uncached",
            ProcessOutcome::Exhausted => "exhausted",
        }
    }
}
