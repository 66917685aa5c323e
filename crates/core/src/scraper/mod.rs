//! Scraper abstraction, fan-out and the result filter.
//!
//! Scrapers are external collaborators: they return scored candidate
//! releases. [`ScraperSet`] queries every configured scraper with bounded
//! concurrency and merges their output; [`filter_results`] applies a
//! version's rules and ranks what is left.

mod filter;
mod jackett;
mod parse;
mod types;

pub use filter::{filter_results, merge_results, not_wanted_key, version_applies};
pub use jackett::JackettScraper;
pub use parse::{normalize_title, parse_release, title_similarity, ParsedRelease};
pub use types::*;

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::config::VersionConfig;
use crate::media::MediaItem;

/// All configured scrapers, queried together.
#[derive(Clone)]
pub struct ScraperSet {
    scrapers: Vec<Arc<dyn Scraper>>,
    max_concurrent: usize,
}

impl ScraperSet {
    pub fn new(scrapers: Vec<Arc<dyn Scraper>>, max_concurrent: usize) -> Self {
        Self {
            scrapers,
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.scrapers.is_empty()
    }

    /// Query every scraper and merge the results in scraper order.
    ///
    /// Fails only when every scraper failed.
    pub async fn scrape(
        &self,
        item: &MediaItem,
        version: &VersionConfig,
    ) -> Result<Vec<ScrapeResult>, ScrapeError> {
        if self.scrapers.is_empty() {
            return Err(ScrapeError::NoScrapers);
        }

        let futures: Vec<_> = self
            .scrapers
            .iter()
            .enumerate()
            .map(|(index, scraper)| async move {
                (
                    index,
                    scraper.name().to_string(),
                    scraper.scrape(item, version).await,
                )
            })
            .collect();
        let mut outcomes: Vec<(usize, String, Result<Vec<ScrapeResult>, ScrapeError>)> =
            stream::iter(futures)
                .buffer_unordered(self.max_concurrent)
                .collect()
                .await;
        outcomes.sort_by_key(|(index, _, _)| *index);

        let mut batches = Vec::new();
        let mut errors = BTreeMap::new();
        for (_, name, outcome) in outcomes {
            match outcome {
                Ok(results) => batches.push(results),
                Err(e) => {
                    warn!(scraper = %name, item_id = item.id, error = %e, "Scraper failed");
                    errors.insert(name, e.to_string());
                }
            }
        }

        if batches.is_empty() {
            return Err(ScrapeError::AllScrapersFailed(errors));
        }

        let merged = merge_results(batches);
        debug!(item_id = item.id, results = merged.len(), "Scrape complete");
        Ok(merged)
    }
}
