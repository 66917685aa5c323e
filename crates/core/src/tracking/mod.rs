//! Torrent lifecycle tracking.
//!
//! Every torrent added to the debrid account gets a record naming why it was
//! added; removals are recorded on the same row.

mod sqlite;
mod store;
mod types;

pub use sqlite::SqliteTrackingStore;
pub use store::{TrackingError, TrackingStore};
pub use types::{trigger, NewTorrentAddition, TorrentAddition, TrackingPatch};
