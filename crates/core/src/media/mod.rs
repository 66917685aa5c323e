//! Media items: the wanted movies and episodes driven through the queues.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteMediaStore;
pub use store::{MediaError, MediaFilter, MediaStore};
pub use types::{ItemState, MediaItem, MediaType, NewMediaItem};
