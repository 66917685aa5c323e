//! Torrent addition tracking types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Known trigger sources for torrent additions.
pub mod trigger {
    /// Generic record written by the provider on every successful add.
    pub const DEBRID_ADD: &str = "debrid_add";
    /// Added by the Adding queue.
    pub const QUEUE_ADD: &str = "queue_add";
    /// Added during a cache check.
    pub const CACHE_CHECK: &str = "cache_check";
    /// Added while replacing a collected release.
    pub const UPGRADE: &str = "upgrade";
    /// Added when a parked uncached item got a free slot.
    pub const PENDING_UNCACHED: &str = "pending_uncached";
    /// Still on the account because removing a failed add did not succeed.
    pub const FAILED_ROLLBACK: &str = "failed_rollback";
}

/// One append-only record of a torrent added to the debrid account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TorrentAddition {
    pub id: i64,
    /// Lowercase 40-hex info hash.
    pub torrent_hash: String,
    pub timestamp: DateTime<Utc>,
    pub trigger_source: String,
    pub trigger_details: Value,
    /// Why the torrent was added. Never empty.
    pub rationale: String,
    pub item_data: Value,
    pub is_still_present: bool,
    pub removal_reason: Option<String>,
    pub removal_timestamp: Option<DateTime<Utc>>,
    pub additional_metadata: Value,
}

/// Data for a new tracking record.
#[derive(Debug, Clone)]
pub struct NewTorrentAddition {
    pub torrent_hash: String,
    pub trigger_source: String,
    pub rationale: String,
    pub item_data: Value,
    pub trigger_details: Option<Value>,
    pub additional_metadata: Option<Value>,
}

impl NewTorrentAddition {
    pub fn new(
        torrent_hash: impl Into<String>,
        trigger_source: impl Into<String>,
        rationale: impl Into<String>,
        item_data: Value,
    ) -> Self {
        Self {
            torrent_hash: torrent_hash.into(),
            trigger_source: trigger_source.into(),
            rationale: rationale.into(),
            item_data,
            trigger_details: None,
            additional_metadata: None,
        }
    }

    pub fn with_trigger_details(mut self, details: Value) -> Self {
        self.trigger_details = Some(details);
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.additional_metadata = Some(metadata);
        self
    }
}

/// Fields merged into the most recent record for a hash.
///
/// JSON patches are merged key by key into the stored objects.
#[derive(Debug, Clone, Default)]
pub struct TrackingPatch {
    pub item_data: Option<Value>,
    pub trigger_details: Option<Value>,
    pub additional_metadata: Option<Value>,
    pub trigger_source: Option<String>,
    pub rationale: Option<String>,
}

impl TrackingPatch {
    pub fn is_empty(&self) -> bool {
        self.item_data.is_none()
            && self.trigger_details.is_none()
            && self.additional_metadata.is_none()
            && self.trigger_source.is_none()
            && self.rationale.is_none()
    }
}

/// Shallow-merge `patch` into `base`. Non-object patches replace the base.
pub(crate) fn merge_json(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                base.insert(key, value);
            }
        }
        (base, patch) => *base = patch,
    }
}
