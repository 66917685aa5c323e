//! Mock scraper for testing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::config::VersionConfig;
use crate::media::MediaItem;
use crate::scraper::{ScrapeError, ScrapeResult, Scraper};

/// Mock implementation of the Scraper trait.
///
/// Returns per-item results when configured, otherwise the default list.
/// Every call is recorded by item id.
pub struct MockScraper {
    name: String,
    results: Arc<RwLock<Vec<ScrapeResult>>>,
    per_item: Arc<RwLock<HashMap<i64, Vec<ScrapeResult>>>>,
    next_error: Arc<RwLock<Option<ScrapeError>>>,
    calls: Arc<RwLock<Vec<i64>>>,
}

impl MockScraper {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            results: Arc::new(RwLock::new(Vec::new())),
            per_item: Arc::new(RwLock::new(HashMap::new())),
            next_error: Arc::new(RwLock::new(None)),
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Results returned for any item without its own list.
    pub async fn set_results(&self, results: Vec<ScrapeResult>) {
        *self.results.write().await = results;
    }

    pub async fn set_item_results(&self, item_id: i64, results: Vec<ScrapeResult>) {
        self.per_item.write().await.insert(item_id, results);
    }

    /// The next scrape fails with this error.
    pub async fn set_next_error(&self, error: ScrapeError) {
        *self.next_error.write().await = Some(error);
    }

    /// Item ids scraped so far, in call order.
    pub async fn calls(&self) -> Vec<i64> {
        self.calls.read().await.clone()
    }
}

#[async_trait]
impl Scraper for MockScraper {
    fn name(&self) -> &str {
        &self.name
    }

    async fn scrape(
        &self,
        item: &MediaItem,
        _version: &VersionConfig,
    ) -> Result<Vec<ScrapeResult>, ScrapeError> {
        self.calls.write().await.push(item.id);
        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        if let Some(results) = self.per_item.read().await.get(&item.id) {
            return Ok(results.clone());
        }
        Ok(self.results.read().await.clone())
    }
}
