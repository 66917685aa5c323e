//! Library manager seam used by the Checking queue.

mod fs_library;

pub use fs_library::FsLibrary;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::media::MediaItem;

/// Errors raised by library managers.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Library root not accessible: {path}")]
    RootUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Library error: {0}")]
    Other(String),
}

/// Reports whether an item's file has appeared in the media library.
#[async_trait]
pub trait LibraryManager: Send + Sync {
    fn name(&self) -> &str;

    async fn item_file_present(&self, item: &MediaItem) -> Result<bool, LibraryError>;

    /// Ask the library to rescan a path. Fire-and-forget.
    async fn trigger_scan(&self, _path: &str) {}
}
