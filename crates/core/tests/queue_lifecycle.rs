//! Queue lifecycle integration tests.
//!
//! These tests drive items through the state machine with mock services:
//! Wanted -> Scraping -> Adding -> Checking -> Collected (-> Upgrading)

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use tempfile::TempDir;

use debridarr_core::audit::{create_audit_system, AuditQuery, AuditStore, Page, SqliteAuditStore};
use debridarr_core::config::{
    load_config_from_str, NotificationTargetConfig, NotificationsConfig, NotifierKind,
};
use debridarr_core::debrid::{
    extract_hash, magnet_from_hash, ActiveDownloads, CacheStatus, REASON_NO_VIDEO,
};
use debridarr_core::media::{ItemState, MediaFilter, MediaItem, MediaStore, NewMediaItem, SqliteMediaStore};
use debridarr_core::notifications::{
    create_notification_buffer, Dispatcher, NotificationBuffer, NotificationTarget,
};
use debridarr_core::queues::{Queue, QueueDeps, QueueManager};
use debridarr_core::scraper::{Scraper, ScraperSet};
use debridarr_core::testing::{
    fixtures, ManualClock, MockDebridProvider, MockLibrary, MockNotifier, MockScraper,
};
use debridarr_core::tracking::{trigger, SqliteTrackingStore, TrackingStore};

const CONFIG: &str = r#"
[debrid]
api_key = "test"

[versions."1080p"]
accept_uncached = true
enable_upgrading = true
"#;

/// Test helper wiring a queue manager to mocks over a temporary database.
struct TestHarness {
    manager: Arc<QueueManager>,
    media: Arc<SqliteMediaStore>,
    tracking: Arc<SqliteTrackingStore>,
    audit_store: Arc<SqliteAuditStore>,
    provider: Arc<MockDebridProvider>,
    scraper: Arc<MockScraper>,
    library: Arc<MockLibrary>,
    notifier: Arc<MockNotifier>,
    buffer: NotificationBuffer,
    clock: Arc<ManualClock>,
    _temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut config = load_config_from_str(CONFIG).expect("Failed to parse config");
        config.database.state_dir = temp_dir.path().to_path_buf();
        let dir = temp_dir.path();

        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        ));

        let media = Arc::new(
            SqliteMediaStore::new(&dir.join("media.db"))
                .expect("Failed to create media store")
                .with_clock(clock.clone()),
        );
        let tracking = Arc::new(
            SqliteTrackingStore::new(&dir.join("tracking.db"))
                .expect("Failed to create tracking store")
                .with_clock(clock.clone()),
        );
        let audit_store = Arc::new(
            SqliteAuditStore::new(&dir.join("audit.db")).expect("Failed to create audit store"),
        );
        let (audit, writer) = create_audit_system(audit_store.clone(), clock.clone(), 1000);
        tokio::spawn(writer.run());

        let notifier = Arc::new(MockNotifier::new("discord"));
        let target = NotificationTarget {
            config: NotificationTargetConfig {
                name: "discord".to_string(),
                kind: NotifierKind::Discord,
                enabled: true,
                notify_on: BTreeMap::new(),
                content_sources: vec![],
                discord: None,
                email: None,
                telegram: None,
                ntfy: None,
            },
            notifier: notifier.clone(),
        };
        let dispatcher = Arc::new(Dispatcher::new(vec![target], None, None, 5));
        let (buffer, flusher) =
            create_notification_buffer(dispatcher, &NotificationsConfig::default());
        tokio::spawn(flusher.run());

        let provider = Arc::new(MockDebridProvider::new(media.clone(), tracking.clone()));
        let scraper = Arc::new(MockScraper::new("mock"));
        let library = Arc::new(MockLibrary::new());

        let manager = QueueManager::new(QueueDeps {
            config: Arc::new(config),
            media: media.clone(),
            tracking: tracking.clone(),
            provider: provider.clone(),
            scrapers: ScraperSet::new(vec![scraper.clone() as Arc<dyn Scraper>], 1),
            library: library.clone(),
            clock: clock.clone(),
            audit: Some(audit),
            notifications: Some(buffer.clone()),
        })
        .expect("Failed to create queue manager");

        Self {
            manager: Arc::new(manager),
            media,
            tracking,
            audit_store,
            provider,
            scraper,
            library,
            notifier,
            buffer,
            clock,
            _temp_dir: temp_dir,
        }
    }

    fn insert(&self, item: NewMediaItem) -> MediaItem {
        self.media
            .insert(&item)
            .expect("Failed to insert item")
            .expect("Item already existed")
    }

    fn reload(&self, id: i64) -> MediaItem {
        self.media.get(id).unwrap().unwrap()
    }

    async fn process(&self, state: ItemState) {
        self.manager.process_queue(state).await.unwrap();
    }

    /// Every item with its DB state, plus which queues hold it in memory.
    async fn memberships(&self) -> Vec<(MediaItem, Vec<ItemState>)> {
        let mut out = Vec::new();
        for item in self.media.list(&MediaFilter::new().unlimited()).unwrap() {
            let mut holders = Vec::new();
            for queue in self.manager.queues() {
                if queue.contains_item_id(item.id).await {
                    holders.push(queue.state());
                }
            }
            out.push((item, holders));
        }
        out
    }
}

fn hash(n: u8) -> String {
    format!("{:040x}", n)
}

fn oppenheimer() -> NewMediaItem {
    fixtures::new_movie("Oppenheimer", 2023, "tt15398776", "1080p")
}

#[tokio::test]
async fn test_cached_candidate_flows_to_checking() {
    let h = TestHarness::new();
    let item = h.insert(fixtures::new_movie("Poor Things", 2023, "tt22507374", "1080p"));
    h.provider
        .add_cached_torrent(&hash(1), "Poor.Things.2023.1080p.BluRay", &["Poor.Things.2023.1080p.BluRay.mkv"])
        .await;
    h.provider
        .add_cached_torrent(&hash(2), "Poor.Things.2023.1080p.WEB", &["Poor.Things.2023.1080p.WEB.mkv"])
        .await;
    h.scraper
        .set_results(vec![
            fixtures::scrape_result("Poor.Things.2023.1080p.WEB", &hash(2), 226.3),
            fixtures::scrape_result("Poor.Things.2023.1080p.BluRay", &hash(1), 326.3),
        ])
        .await;

    h.process(ItemState::Wanted).await;
    assert_eq!(h.reload(item.id).state, ItemState::Scraping);
    h.process(ItemState::Scraping).await;
    assert_eq!(h.reload(item.id).state, ItemState::Adding);
    h.process(ItemState::Adding).await;

    let item = h.reload(item.id);
    assert_eq!(item.state, ItemState::Checking);
    assert_eq!(item.filled_by_score, Some(326.3));
    assert_eq!(item.filled_by_magnet, Some(magnet_from_hash(&hash(1))));
    assert_eq!(h.provider.added_hashes().await, vec![hash(1)]);

    let record = h.tracking.latest(&hash(1)).unwrap().unwrap();
    assert_eq!(record.trigger_source, trigger::QUEUE_ADD);
    assert_eq!(record.rationale, "Added via adding queue processing");
    assert!(record.is_still_present);

    // The audit writer runs in the background.
    let query = AuditQuery {
        item_id: Some(item.id),
        ..AuditQuery::moves(None, None)
    };
    let mut moves = Vec::new();
    for _ in 0..50 {
        moves = h.audit_store.query(&query, Page::default()).unwrap().records;
        if moves.len() == 3 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    let transitions: Vec<_> = moves.iter().filter_map(|r| r.data.transition()).collect();
    assert_eq!(
        transitions,
        vec![
            (ItemState::Adding, ItemState::Checking),
            (ItemState::Scraping, ItemState::Adding),
            (ItemState::Wanted, ItemState::Scraping),
        ]
    );
}

#[tokio::test]
async fn test_uncached_candidate_parks_when_slots_full() {
    let h = TestHarness::new();
    let item = h.insert(oppenheimer());
    h.provider.set_cache_status(&hash(3), CacheStatus::NotCached).await;
    h.provider
        .set_active_downloads(ActiveDownloads {
            active: 25,
            limit: 25,
        })
        .await;
    h.scraper
        .set_results(vec![fixtures::scrape_result("Oppenheimer.2023.1080p.WEB", &hash(3), 150.0)])
        .await;

    h.process(ItemState::Wanted).await;
    h.process(ItemState::Scraping).await;
    h.process(ItemState::Adding).await;

    let item = h.reload(item.id);
    assert_eq!(item.state, ItemState::PendingUncached);
    assert_eq!(item.filled_by_magnet, Some(magnet_from_hash(&hash(3))));
    assert!(h.provider.added_hashes().await.is_empty());
    assert!(
        h.manager
            .queue(ItemState::PendingUncached)
            .contains_item_id(item.id)
            .await
    );

    // A slot frees up: the parked release is added on the next pass.
    h.provider
        .set_active_downloads(ActiveDownloads {
            active: 3,
            limit: 25,
        })
        .await;
    h.provider.set_cache_status(&hash(3), CacheStatus::NotCached).await;
    h.provider
        .add_uncached_torrent(&hash(3), "Oppenheimer.2023.1080p.WEB", &["Oppenheimer.2023.1080p.WEB.mkv"])
        .await;
    h.process(ItemState::PendingUncached).await;

    assert_eq!(h.reload(item.id).state, ItemState::Checking);
    assert_eq!(h.provider.added_hashes().await, vec![hash(3)]);
}

#[tokio::test]
async fn test_release_without_video_is_rejected() {
    let h = TestHarness::new();
    let item = h.insert(oppenheimer());
    h.provider
        .add_cached_torrent(&hash(4), "Oppenheimer.2023.1080p.NFO", &["Oppenheimer.2023.1080p.nfo"])
        .await;
    h.scraper
        .set_results(vec![fixtures::scrape_result("Oppenheimer.2023.1080p.NFO", &hash(4), 100.0)])
        .await;

    h.process(ItemState::Wanted).await;
    h.process(ItemState::Scraping).await;
    h.process(ItemState::Adding).await;

    let item = h.reload(item.id);
    assert_eq!(item.state, ItemState::Sleeping);
    assert!(h.media.is_not_wanted(item.id, &hash(4)).unwrap());
    assert!(h.provider.active_hashes().await.is_empty());
    let removals = h.provider.removals().await;
    assert_eq!(removals.len(), 1);
    assert_eq!(removals[0].1, REASON_NO_VIDEO);
}

#[tokio::test]
async fn test_upgrade_replaces_collected_release() {
    let h = TestHarness::new();
    let item = h.insert(oppenheimer());
    h.provider
        .add_cached_torrent(&hash(5), "Oppenheimer.2023.1080p.WEB", &["Oppenheimer.2023.1080p.WEB.mkv"])
        .await;
    h.scraper
        .set_results(vec![fixtures::scrape_result("Oppenheimer.2023.1080p.WEB", &hash(5), 226.3)])
        .await;
    h.library.add_file("Oppenheimer.2023.1080p.WEB.mkv").await;

    h.process(ItemState::Wanted).await;
    h.process(ItemState::Scraping).await;
    h.process(ItemState::Adding).await;
    h.process(ItemState::Checking).await;

    let collected = h.reload(item.id);
    assert_eq!(collected.state, ItemState::Upgrading);
    assert_eq!(collected.filled_by_score, Some(226.3));
    let old_torrent = collected.filled_by_torrent_id.clone().unwrap();

    h.provider
        .add_cached_torrent(&hash(6), "Oppenheimer.2023.1080p.BluRay", &["Oppenheimer.2023.1080p.BluRay.mkv"])
        .await;
    h.scraper
        .set_results(vec![fixtures::scrape_result("Oppenheimer.2023.1080p.BluRay", &hash(6), 326.3)])
        .await;
    h.library.add_file("Oppenheimer.2023.1080p.BluRay.mkv").await;

    h.process(ItemState::Upgrading).await;
    let upgrading = h.reload(item.id);
    assert_eq!(upgrading.state, ItemState::Checking);
    assert_eq!(upgrading.upgrading_from, Some(old_torrent.clone()));

    h.process(ItemState::Checking).await;
    let upgraded = h.reload(item.id);
    assert_eq!(upgraded.filled_by_score, Some(326.3));
    assert_eq!(upgraded.original_collected_at, collected.original_collected_at);
    assert!(h
        .provider
        .removals()
        .await
        .iter()
        .any(|(id, _)| id == &old_torrent));

    h.buffer.flush().await;
    let messages = h.notifier.messages().await;
    assert!(messages.iter().any(|(_, body)| body.contains("Upgraded")));
}

#[tokio::test]
async fn test_collected_items_are_tracked() {
    let h = TestHarness::new();
    for (n, title) in [(7u8, "Dune"), (8u8, "Arrival")] {
        let file = format!("{}.2021.1080p.mkv", title);
        h.insert(fixtures::new_movie(title, 2021, &format!("tt00000{}", n), "1080p"));
        h.provider
            .add_cached_torrent(&hash(n), &format!("{}.2021.1080p", title), &[&file])
            .await;
        h.scraper
            .set_results(vec![fixtures::scrape_result(&format!("{}.2021.1080p", title), &hash(n), 100.0)])
            .await;
        h.library.add_file(&file).await;

        h.process(ItemState::Wanted).await;
        h.process(ItemState::Scraping).await;
        h.process(ItemState::Adding).await;
        h.process(ItemState::Checking).await;
    }

    for (item, _) in h.memberships().await {
        assert!(matches!(item.state, ItemState::Collected | ItemState::Upgrading));
        let hash = item
            .filled_by_magnet
            .as_deref()
            .and_then(extract_hash)
            .unwrap();
        assert!(!h.tracking.get_history(&hash).unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_items_live_in_exactly_one_queue() {
    let h = TestHarness::new();
    h.insert(oppenheimer());
    h.insert(NewMediaItem {
        release_date: Some(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()),
        ..fixtures::new_movie("Future Film", 2025, "tt0000900", "1080p")
    });
    h.scraper
        .set_results(vec![fixtures::scrape_result("Oppenheimer.2023.1080p.WEB", &hash(9), 100.0)])
        .await;
    h.provider
        .add_cached_torrent(&hash(9), "Oppenheimer.2023.1080p.WEB", &["Oppenheimer.2023.1080p.WEB.mkv"])
        .await;

    for _ in 0..3 {
        for state in ItemState::ALL {
            h.process(state).await;
        }
        for (item, holders) in h.memberships().await {
            assert_eq!(holders, vec![item.state], "{}", item.title);
        }
    }
}

#[tokio::test]
async fn test_settled_queues_are_idempotent() {
    let h = TestHarness::new();
    // Sleeping: scraping finds nothing.
    let sleeper = h.insert(oppenheimer());
    // Unreleased: far in the future.
    let future = h.insert(NewMediaItem {
        release_date: Some(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()),
        ..fixtures::new_movie("Sequel", 2026, "tt0000901", "1080p")
    });
    h.process(ItemState::Wanted).await;
    h.process(ItemState::Scraping).await;
    assert_eq!(h.reload(sleeper.id).state, ItemState::Sleeping);
    assert_eq!(h.reload(future.id).state, ItemState::Unreleased);

    h.clock.advance(Duration::minutes(1));
    let before = h.media.list(&MediaFilter::new().unlimited()).unwrap();
    for _ in 0..2 {
        for state in ItemState::ALL {
            h.process(state).await;
        }
    }
    let after = h.media.list(&MediaFilter::new().unlimited()).unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_rehydrate_after_restart() {
    let h = TestHarness::new();
    let item = h.insert(oppenheimer());
    h.scraper.set_results(vec![]).await;
    h.process(ItemState::Wanted).await;
    h.process(ItemState::Scraping).await;
    assert_eq!(h.reload(item.id).state, ItemState::Sleeping);

    // A second manager over the same stores stands in for a restart.
    let restarted = QueueManager::new(QueueDeps {
        config: Arc::new(h.manager.config().clone()),
        media: h.media.clone(),
        tracking: h.tracking.clone(),
        provider: h.provider.clone(),
        scrapers: ScraperSet::new(vec![h.scraper.clone() as Arc<dyn Scraper>], 1),
        library: h.library.clone(),
        clock: h.clock.clone(),
        audit: None,
        notifications: None,
    })
    .unwrap();
    assert_eq!(restarted.rehydrate().await.unwrap(), 1);
    assert!(
        restarted
            .queue(ItemState::Sleeping)
            .contains_item_id(item.id)
            .await
    );
}
