//! Mock library manager for testing.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::library::{LibraryError, LibraryManager};
use crate::media::MediaItem;

/// Mock implementation of the LibraryManager trait.
///
/// A file counts as present once its name has been added with [`add_file`](Self::add_file).
#[derive(Default)]
pub struct MockLibrary {
    files: Arc<RwLock<HashSet<String>>>,
    scans: Arc<RwLock<Vec<String>>>,
    fail: Arc<RwLock<bool>>,
}

impl MockLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_file(&self, name: &str) {
        self.files.write().await.insert(name.to_string());
    }

    pub async fn remove_file(&self, name: &str) {
        self.files.write().await.remove(name);
    }

    /// Make presence checks fail until reset.
    pub async fn set_failing(&self, fail: bool) {
        *self.fail.write().await = fail;
    }

    pub async fn scans(&self) -> Vec<String> {
        self.scans.read().await.clone()
    }
}

#[async_trait]
impl LibraryManager for MockLibrary {
    fn name(&self) -> &str {
        "mock"
    }

    async fn item_file_present(&self, item: &MediaItem) -> Result<bool, LibraryError> {
        if *self.fail.read().await {
            return Err(LibraryError::Other("mock library unavailable".to_string()));
        }
        let files = self.files.read().await;
        Ok(item
            .filled_by_file
            .as_ref()
            .is_some_and(|f| files.contains(f)))
    }

    async fn trigger_scan(&self, path: &str) {
        self.scans.write().await.push(path.to_string());
    }
}
