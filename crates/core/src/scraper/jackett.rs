//! Jackett (Torznab aggregate) scraper.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{JackettConfig, VersionConfig};
use crate::media::{MediaItem, MediaType};

use super::parse::{estimate_bitrate_mbps, parse_release, score_release, title_similarity, ScoreInputs};
use super::{ScrapeError, ScrapeResult, Scraper};

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Jackett scraper backend.
pub struct JackettScraper {
    client: Client,
    config: JackettConfig,
}

impl JackettScraper {
    pub fn new(config: JackettConfig) -> Result<Self, ScrapeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| ScrapeError::ConnectionFailed(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Search text for an item.
    fn build_query(item: &MediaItem) -> String {
        match (item.media_type, item.season_number, item.episode_number) {
            (MediaType::Episode, Some(s), Some(e)) => format!("{} S{:02}E{:02}", item.title, s, e),
            _ => match item.year {
                Some(year) => format!("{} {}", item.title, year),
                None => item.title.clone(),
            },
        }
    }

    fn build_search_url(&self, item: &MediaItem, indexer: &str) -> String {
        let category = match item.media_type {
            MediaType::Movie => 2000,
            MediaType::Episode => 5000,
        };
        format!(
            "{}/api/v2.0/indexers/{}/results?apikey={}&Query={}&Category[]={}",
            self.config.url.trim_end_matches('/'),
            urlencoding::encode(indexer),
            urlencoding::encode(&self.config.api_key),
            urlencoding::encode(&Self::build_query(item)),
            category
        )
    }

    async fn search_indexer(
        &self,
        item: &MediaItem,
        indexer: &str,
    ) -> Result<Vec<JackettResult>, ScrapeError> {
        let url = self.build_search_url(item, indexer);
        debug!(indexer, item_id = item.id, "Searching Jackett");

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                ScrapeError::Timeout
            } else if e.is_connect() {
                ScrapeError::ConnectionFailed(e.to_string())
            } else {
                ScrapeError::ApiError(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ScrapeError::ApiError(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: JackettResponse = response
            .json()
            .await
            .map_err(|e| ScrapeError::ApiError(format!("Failed to parse response: {}", e)))?;
        Ok(parsed.Results)
    }

    fn to_result(item: &MediaItem, version: &VersionConfig, raw: JackettResult) -> Option<ScrapeResult> {
        let magnet = raw.MagnetUri.or(raw.Link)?;
        let parsed = parse_release(&raw.Title);
        let size_gb = raw.Size.unwrap_or(0).max(0) as f64 / BYTES_PER_GB;
        let bitrate_mbps = estimate_bitrate_mbps(size_gb, item.media_type);
        let seeders = raw.Seeders.unwrap_or(0).max(0) as u32;
        let is_anime = raw
            .CategoryDesc
            .as_deref()
            .map(|c| c.to_lowercase().contains("anime"))
            .unwrap_or(false);

        let (total_score, score_breakdown) = score_release(
            &version.weights,
            &ScoreInputs {
                resolution: parsed.resolution,
                is_hdr: parsed.is_hdr,
                enable_hdr: version.enable_hdr,
                similarity: title_similarity(item, &parsed.title),
                size_gb,
                bitrate_mbps,
                seeders,
            },
        );

        Some(ScrapeResult {
            title: raw.Title,
            magnet,
            size_gb,
            bitrate_mbps,
            seeders,
            resolution: parsed.resolution,
            is_hdr: parsed.is_hdr,
            is_anime,
            scraper: "jackett".to_string(),
            total_score,
            score_breakdown,
            is_cached: None,
        })
    }
}

#[async_trait]
impl Scraper for JackettScraper {
    fn name(&self) -> &str {
        "jackett"
    }

    async fn scrape(
        &self,
        item: &MediaItem,
        version: &VersionConfig,
    ) -> Result<Vec<ScrapeResult>, ScrapeError> {
        let indexers: Vec<String> = if self.config.indexers.is_empty() {
            vec!["all".to_string()]
        } else {
            self.config.indexers.clone()
        };

        let searches = indexers.iter().map(|indexer| async move {
            (indexer.as_str(), self.search_indexer(item, indexer).await)
        });
        let outcomes = futures::future::join_all(searches).await;

        let mut results = Vec::new();
        let mut last_error = None;
        for (indexer, outcome) in outcomes {
            match outcome {
                Ok(raw) => results.extend(
                    raw.into_iter()
                        .filter_map(|r| Self::to_result(item, version, r)),
                ),
                Err(e) => {
                    warn!(indexer, error = %e, "Indexer search failed");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if results.is_empty() => Err(e),
            _ => Ok(results),
        }
    }
}

// Jackett API response types
#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct JackettResponse {
    Results: Vec<JackettResult>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct JackettResult {
    Title: String,
    MagnetUri: Option<String>,
    Link: Option<String>,
    Size: Option<i64>,
    Seeders: Option<i32>,
    CategoryDesc: Option<String>,
}
