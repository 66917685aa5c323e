use thiserror::Error;

use super::{NewTorrentAddition, TorrentAddition, TrackingPatch};

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Rationale is required for torrent {0}")]
    MissingRationale(String),
}

/// Append-only history of torrents added to the debrid account.
///
/// Records are never deleted; they are only patched or marked removed.
/// All lookups normalise the hash to lowercase.
pub trait TrackingStore: Send + Sync {
    /// Append a new record and return its id.
    fn record_addition(&self, addition: &NewTorrentAddition) -> Result<i64, TrackingError>;

    /// Merge a patch into the most recent record for `hash`.
    /// Returns false if no record exists.
    fn update_tracking(&self, hash: &str, patch: &TrackingPatch) -> Result<bool, TrackingError>;

    /// Mark the most recent still-present record for `hash` as removed.
    /// Returns false if no present record exists.
    fn mark_removed(&self, hash: &str, reason: &str) -> Result<bool, TrackingError>;

    /// The most recent record for `hash`.
    fn latest(&self, hash: &str) -> Result<Option<TorrentAddition>, TrackingError>;

    /// Every record for `hash`, newest first.
    fn get_history(&self, hash: &str) -> Result<Vec<TorrentAddition>, TrackingError>;

    /// Hashes with at least one still-present record.
    fn present_hashes(&self) -> Result<Vec<String>, TrackingError>;

    /// Record a new addition, or patch the most recent record for the hash
    /// if it is still present.
    fn record_or_update(&self, addition: &NewTorrentAddition) -> Result<(), TrackingError> {
        let present = self
            .latest(&addition.torrent_hash)?
            .is_some_and(|record| record.is_still_present);
        if !present {
            return self.record_addition(addition).map(|_| ());
        }

        let patch = TrackingPatch {
            item_data: Some(addition.item_data.clone()),
            trigger_details: addition.trigger_details.clone(),
            additional_metadata: addition.additional_metadata.clone(),
            trigger_source: Some(addition.trigger_source.clone()),
            rationale: Some(addition.rationale.clone()),
        };
        self.update_tracking(&addition.torrent_hash, &patch).map(|_| ())
    }
}
