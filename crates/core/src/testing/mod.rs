//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the external service traits,
//! allowing the queue pipeline to be exercised without a debrid account,
//! indexers, a media library or notification endpoints.
//!
//! # Example
//!
//! ```rust,ignore
//! use debridarr_core::testing::{fixtures, MockDebridProvider, MockScraper};
//!
//! let scraper = MockScraper::new("mock");
//! scraper.set_results(vec![fixtures::scrape_result("Movie.2023.1080p", &hash, 100.0)]).await;
//!
//! let provider = MockDebridProvider::new(media.clone(), tracking.clone());
//! provider.add_cached_torrent(&hash, "Movie.2023.1080p", &["movie.mkv"]).await;
//! ```

mod mock_debrid;
mod mock_library;
mod mock_notifier;
mod mock_scraper;

pub use crate::clock::ManualClock;
pub use mock_debrid::MockDebridProvider;
pub use mock_library::MockLibrary;
pub use mock_notifier::MockNotifier;
pub use mock_scraper::MockScraper;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::collections::BTreeMap;

    use chrono::{TimeZone, Utc};

    use crate::config::Resolution;
    use crate::debrid::magnet_from_hash;
    use crate::media::{ItemState, MediaItem, MediaType, NewMediaItem};
    use crate::scraper::ScrapeResult;

    /// Create a scrape result with reasonable defaults.
    pub fn scrape_result(title: &str, hash: &str, score: f64) -> ScrapeResult {
        ScrapeResult {
            title: title.to_string(),
            magnet: magnet_from_hash(hash),
            size_gb: 0.0,
            bitrate_mbps: None,
            seeders: 10,
            resolution: Resolution::detect(title),
            is_hdr: false,
            is_anime: false,
            scraper: "mock".to_string(),
            total_score: score,
            score_breakdown: BTreeMap::new(),
            is_cached: None,
        }
    }

    /// Create a wanted movie with version "1080p".
    pub fn movie(id: i64, title: &str, year: i32) -> MediaItem {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        MediaItem {
            id,
            media_type: MediaType::Movie,
            title: title.to_string(),
            year: Some(year),
            imdb_id: Some(format!("tt{:07}", id)),
            tmdb_id: None,
            season_number: None,
            episode_number: None,
            release_date: None,
            airtime: None,
            physical_release_date: None,
            original_title: None,
            is_anime: false,
            version: Some("1080p".to_string()),
            state: ItemState::Wanted,
            filled_by_title: None,
            filled_by_file: None,
            filled_by_magnet: None,
            filled_by_torrent_id: None,
            filled_by_score: None,
            original_scraped_torrent_title: None,
            upgrading_from: None,
            wake_count: 0,
            collected_at: None,
            original_collected_at: None,
            blacklisted_at: None,
            content_source: None,
            content_source_detail: None,
            created_at: created,
            updated_at: created,
        }
    }

    /// Create a wanted episode with version "1080p".
    pub fn episode(id: i64, title: &str, season: u32, episode: u32) -> MediaItem {
        MediaItem {
            media_type: MediaType::Episode,
            year: None,
            season_number: Some(season),
            episode_number: Some(episode),
            ..movie(id, title, 2020)
        }
    }

    /// Insert payload for a movie.
    pub fn new_movie(title: &str, year: i32, imdb_id: &str, version: &str) -> NewMediaItem {
        NewMediaItem {
            media_type: Some(MediaType::Movie),
            title: title.to_string(),
            year: Some(year),
            imdb_id: Some(imdb_id.to_string()),
            version: version.to_string(),
            ..NewMediaItem::default()
        }
    }

    /// Insert payload for an episode.
    pub fn new_episode(
        title: &str,
        imdb_id: &str,
        season: u32,
        episode: u32,
        version: &str,
    ) -> NewMediaItem {
        NewMediaItem {
            media_type: Some(MediaType::Episode),
            title: title.to_string(),
            imdb_id: Some(imdb_id.to_string()),
            season_number: Some(season),
            episode_number: Some(episode),
            version: version.to_string(),
            ..NewMediaItem::default()
        }
    }
}
