//! Media item storage trait and types.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use super::{ItemState, MediaItem, MediaType, NewMediaItem};

/// Error type for media item operations.
#[derive(Debug)]
pub enum MediaError {
    /// Item not found.
    NotFound(i64),
    /// Database error.
    Database(String),
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaError::NotFound(id) => write!(f, "Media item not found: {}", id),
            MediaError::Database(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl std::error::Error for MediaError {}

/// Filter for querying media items.
#[derive(Debug, Clone, Default)]
pub struct MediaFilter {
    pub state: Option<ItemState>,
    pub media_type: Option<MediaType>,
    pub imdb_id: Option<String>,
    pub content_source: Option<String>,
    /// Maximum number of results; negative means unlimited.
    pub limit: i64,
    pub offset: i64,
}

impl MediaFilter {
    /// Create a new filter with defaults.
    pub fn new() -> Self {
        Self {
            limit: 100,
            ..Default::default()
        }
    }

    pub fn with_state(mut self, state: ItemState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_media_type(mut self, media_type: MediaType) -> Self {
        self.media_type = Some(media_type);
        self
    }

    pub fn with_imdb_id(mut self, imdb_id: impl Into<String>) -> Self {
        self.imdb_id = Some(imdb_id.into());
        self
    }

    pub fn with_content_source(mut self, source: impl Into<String>) -> Self {
        self.content_source = Some(source.into());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    /// Remove the result limit.
    pub fn unlimited(mut self) -> Self {
        self.limit = -1;
        self
    }
}

/// Trait for media item storage backends.
pub trait MediaStore: Send + Sync {
    /// Insert a wanted item. Returns `None` when the same identity is already
    /// wanted in the same version.
    fn insert(&self, item: &NewMediaItem) -> Result<Option<MediaItem>, MediaError>;

    /// Get an item by ID.
    fn get(&self, id: i64) -> Result<Option<MediaItem>, MediaError>;

    /// List items matching the filter, ordered by release date then id.
    fn list(&self, filter: &MediaFilter) -> Result<Vec<MediaItem>, MediaError>;

    /// Count items matching the filter.
    fn count(&self, filter: &MediaFilter) -> Result<i64, MediaError>;

    /// Persist every mutable field of the item (state included) in one statement.
    fn update(&self, item: &MediaItem) -> Result<MediaItem, MediaError>;

    /// Item counts per state name.
    fn count_by_state(&self) -> Result<BTreeMap<String, i64>, MediaError>;

    /// Add a hash or URL to the item's not-wanted set.
    fn add_not_wanted(&self, item_id: i64, key: &str) -> Result<(), MediaError>;

    /// Whether a hash or URL is in the item's not-wanted set.
    fn is_not_wanted(&self, item_id: i64, key: &str) -> Result<bool, MediaError>;

    /// The item's full not-wanted set.
    fn not_wanted(&self, item_id: i64) -> Result<HashSet<String>, MediaError>;

    /// Whether a collected item with this IMDb id is filled by one of `filenames`.
    fn has_collected_file(&self, imdb_id: &str, filenames: &[String]) -> Result<bool, MediaError>;
}
