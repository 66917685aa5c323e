//! Shared setup for queue tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::{TimeZone, Utc};

use crate::clock::ManualClock;
use crate::config::{load_config_from_str, Config};
use crate::debrid::{magnet_from_hash, DebridProvider, TorrentSource};
use crate::media::{ItemState, MediaItem, MediaStore, SqliteMediaStore};
use crate::scraper::{ScrapeResult, Scraper, ScraperSet};
use crate::testing::{fixtures, MockDebridProvider, MockLibrary, MockScraper};
use crate::tracking::SqliteTrackingStore;

use super::{MoveOptions, QueueDeps, QueueManager};

pub const CONFIG: &str = r#"
[debrid]
api_key = "test"

[versions."1080p"]

[versions."720p"]
max_resolution = "720p"
"#;

static NEXT_IMDB: AtomicU32 = AtomicU32::new(1);

pub struct Harness {
    pub manager: Arc<QueueManager>,
    pub media: Arc<SqliteMediaStore>,
    pub tracking: Arc<SqliteTrackingStore>,
    pub provider: Arc<MockDebridProvider>,
    pub scraper: Arc<MockScraper>,
    pub library: Arc<MockLibrary>,
    pub clock: Arc<ManualClock>,
}

pub fn test_config() -> Config {
    load_config_from_str(CONFIG).unwrap()
}

pub fn harness() -> Harness {
    harness_with(test_config())
}

pub fn harness_with(config: Config) -> Harness {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
    ));
    let media = Arc::new(
        SqliteMediaStore::in_memory()
            .unwrap()
            .with_clock(clock.clone()),
    );
    let tracking = Arc::new(
        SqliteTrackingStore::in_memory()
            .unwrap()
            .with_clock(clock.clone()),
    );
    let provider = Arc::new(MockDebridProvider::new(media.clone(), tracking.clone()));
    let scraper = Arc::new(MockScraper::new("mock"));
    let library = Arc::new(MockLibrary::new());

    let manager = Arc::new(
        QueueManager::new(QueueDeps {
            config: Arc::new(config),
            media: media.clone(),
            tracking: tracking.clone(),
            provider: provider.clone(),
            scrapers: ScraperSet::new(vec![scraper.clone() as Arc<dyn Scraper>], 1),
            library: library.clone(),
            clock: clock.clone(),
            audit: None,
            notifications: None,
        })
        .unwrap(),
    );

    Harness {
        manager,
        media,
        tracking,
        provider,
        scraper,
        library,
        clock,
    }
}

/// Lowercase hex hash derived from a small number.
pub fn hash(n: u8) -> String {
    format!("{:040x}", n)
}

impl Harness {
    pub fn insert_movie(&self, title: &str, year: i32) -> MediaItem {
        let imdb = format!("tt{:07}", NEXT_IMDB.fetch_add(1, Ordering::Relaxed));
        self.media
            .insert(&fixtures::new_movie(title, year, &imdb, "1080p"))
            .unwrap()
            .unwrap()
    }

    /// Put an item into a queue as if it had arrived there.
    pub async fn place(&self, item: MediaItem, state: ItemState) -> MediaItem {
        self.manager
            .move_item(item, state, MoveOptions { silent: true, ..MoveOptions::default() })
            .await
            .unwrap()
    }

    pub async fn place_with_results(
        &self,
        item: MediaItem,
        state: ItemState,
        results: Vec<ScrapeResult>,
    ) -> MediaItem {
        self.manager
            .move_item(item, state, MoveOptions::with_results(results))
            .await
            .unwrap()
    }

    /// Add a cached torrent to the mock account and point the item at it.
    pub async fn fill(&self, mut item: MediaItem, n: u8, file: &str, score: f64) -> MediaItem {
        let hash = hash(n);
        self.provider.add_cached_torrent(&hash, file, &[file]).await;
        let torrent_id = self
            .provider
            .add_torrent(&TorrentSource::magnet(magnet_from_hash(&hash)))
            .await
            .unwrap();
        item.filled_by_title = Some(file.to_string());
        item.filled_by_file = Some(file.to_string());
        item.filled_by_magnet = Some(magnet_from_hash(&hash));
        item.filled_by_torrent_id = Some(torrent_id);
        item.filled_by_score = Some(score);
        item
    }

    pub fn reload(&self, item_id: i64) -> MediaItem {
        self.media.get(item_id).unwrap().unwrap()
    }

    pub async fn in_queue(&self, state: ItemState, item_id: i64) -> bool {
        self.manager.queue(state).contains_item_id(item_id).await
    }

    pub async fn process(&self, state: ItemState) {
        self.manager
            .queue(state)
            .process(&self.manager)
            .await
            .unwrap();
    }
}
