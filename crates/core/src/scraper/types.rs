//! Types for the scraper seam.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{Resolution, VersionConfig};
use crate::media::MediaItem;

/// One candidate release returned by a scraper.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScrapeResult {
    pub title: String,
    /// Magnet URI or a URL resolving to one (or to a `.torrent` file).
    pub magnet: String,
    #[serde(default)]
    pub size_gb: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate_mbps: Option<f64>,
    #[serde(default)]
    pub seeders: u32,
    pub resolution: Resolution,
    #[serde(default)]
    pub is_hdr: bool,
    /// Whether the indexer classified the release as anime.
    #[serde(default)]
    pub is_anime: bool,
    #[serde(default)]
    pub scraper: String,
    pub total_score: f64,
    #[serde(default)]
    pub score_breakdown: BTreeMap<String, f64>,
    /// Cache status once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_cached: Option<bool>,
}

/// Errors that can occur while scraping.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("API error: {0}")]
    ApiError(String),

    #[error("No scrapers configured")]
    NoScrapers,

    #[error("All scrapers failed: {0:?}")]
    AllScrapersFailed(BTreeMap<String, String>),
}

/// A release source for wanted items.
#[async_trait]
pub trait Scraper: Send + Sync {
    fn name(&self) -> &str;

    /// Candidate releases for `item`, scored with the version's weights.
    async fn scrape(
        &self,
        item: &MediaItem,
        version: &VersionConfig,
    ) -> Result<Vec<ScrapeResult>, ScrapeError>;
}
