//! In-process API tests over mock services.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{fixtures, TestFixture};
use debridarr_core::audit::AuditEvent;
use debridarr_core::tracking::{trigger, NewTorrentAddition, TrackingStore};
use debridarr_core::{ItemState, MediaStore};

const HASH: &str = "a94a8fe5ccb19ba61c4c0873d391e987982fbbd3";

#[tokio::test]
async fn test_health() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/health").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn test_config_is_sanitized() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/config").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["server"]["port"], 5000);
    assert_eq!(response.body["debrid"]["api_key_configured"], true);
    assert!(!response.body.to_string().contains("super-secret-key"));
}

#[tokio::test]
async fn test_pause_and_resume() {
    let fixture = TestFixture::new().await;

    let status = fixture.get("/api/v1/program/status").await;
    assert_status!(status, StatusCode::OK);
    assert_eq!(status.body["running"], false);
    assert!(status.body["pause"].is_null());

    let paused = fixture
        .post("/api/v1/program/pause", json!({ "reason": "maintenance" }))
        .await;
    assert_status!(paused, StatusCode::OK);
    assert!(fixture.runner.pause_controller().is_paused());

    let status = fixture.get("/api/v1/program/status").await;
    assert_eq!(status.body["pause"]["kind"], "manual");
    assert_eq!(status.body["pause"]["reason"], "maintenance");
    assert_eq!(status.body["processing"], false);

    let again = fixture.post("/api/v1/program/pause", json!({})).await;
    assert_status!(again, StatusCode::CONFLICT);

    let resumed = fixture.post_empty("/api/v1/program/resume").await;
    assert_status!(resumed, StatusCode::OK);
    assert!(!fixture.runner.pause_controller().is_paused());

    let again = fixture.post_empty("/api/v1/program/resume").await;
    assert_status!(again, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_queues_report_counts_and_memory_contents() {
    let fixture = TestFixture::new().await;
    let first = fixture
        .media
        .insert(&fixtures::new_movie("Oppenheimer", 2023, "tt15398776", "1080p"))
        .unwrap()
        .unwrap();
    fixture
        .media
        .insert(&fixtures::new_movie("Poor Things", 2023, "tt22507374", "1080p"))
        .unwrap()
        .unwrap();

    let response = fixture.get("/api/v1/queues").await;
    assert_status!(response, StatusCode::OK);
    let queues = response.body["queues"].as_array().unwrap();
    assert_eq!(queues.len(), 12);
    assert_eq!(response.body["total"], 2);
    let wanted = queues.iter().find(|q| q["name"] == "Wanted").unwrap();
    assert_eq!(wanted["count"], 2);
    assert_eq!(wanted["in_memory"], false);
    assert!(wanted["items"].as_array().unwrap().is_empty());

    fixture
        .manager
        .process_queue(ItemState::Wanted)
        .await
        .unwrap();

    let response = fixture.get("/api/v1/queues").await;
    let queues = response.body["queues"].as_array().unwrap();
    let scraping = queues.iter().find(|q| q["name"] == "Scraping").unwrap();
    assert_eq!(scraping["count"], 2);
    assert_eq!(scraping["in_memory"], true);
    let items = scraping["items"].as_array().unwrap();
    assert!(items.iter().any(|i| i["id"] == first.id && i["title"] == "Oppenheimer"));
    assert_eq!(response.body["total"], 2);
}

#[tokio::test]
async fn test_get_item() {
    let fixture = TestFixture::new().await;
    let item = fixture
        .media
        .insert(&fixtures::new_movie("Oppenheimer", 2023, "tt15398776", "1080p"))
        .unwrap()
        .unwrap();

    let response = fixture.get(&format!("/api/v1/items/{}", item.id)).await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["title"], "Oppenheimer");
    assert_eq!(response.body["imdb_id"], "tt15398776");
    assert_eq!(response.body["effective_state"], "Wanted");

    let missing = fixture.get("/api/v1/items/9999").await;
    assert_status!(missing, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_tracking_history() {
    let fixture = TestFixture::new().await;
    fixture
        .tracking
        .record_addition(&NewTorrentAddition::new(
            HASH,
            trigger::QUEUE_ADD,
            "Added via adding queue processing",
            json!({ "title": "Oppenheimer" }),
        ))
        .unwrap();
    fixture.tracking.mark_removed(HASH, "Replaced by upgrade").unwrap();

    let response = fixture
        .get(&format!("/api/v1/tracking/{}", HASH.to_uppercase()))
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["hash"], HASH);
    let history = response.body["history"].as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["is_still_present"], false);
    assert_eq!(history[0]["removal_reason"], "Replaced by upgrade");

    let unknown = fixture
        .get("/api/v1/tracking/0000000000000000000000000000000000000000")
        .await;
    assert_status!(unknown, StatusCode::NOT_FOUND);

    let invalid = fixture.get("/api/v1/tracking/not-a-hash").await;
    assert_status!(invalid, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_notifications_read_flow() {
    let fixture = TestFixture::new().await;
    let first = fixture.notify("Collected", "Oppenheimer (2023)");
    fixture.notify("Upgraded", "Poor Things (2023)");

    let response = fixture.get("/api/v1/notifications").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["notifications"].as_array().unwrap().len(), 2);
    assert_eq!(response.body["unread"], 2);

    let read = fixture
        .post_empty(&format!("/api/v1/notifications/{}/read", first))
        .await;
    assert_status!(read, StatusCode::OK);

    let unread = fixture.get("/api/v1/notifications?unread_only=true").await;
    let list = unread.body["notifications"].as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["title"], "Upgraded");
    assert_eq!(unread.body["unread"], 1);

    let missing = fixture.post_empty("/api/v1/notifications/9999/read").await;
    assert_status!(missing, StatusCode::NOT_FOUND);

    let all = fixture.post_empty("/api/v1/notifications/read-all").await;
    assert_status!(all, StatusCode::OK);
    assert_eq!(all.body["updated"], 1);
    let response = fixture.get("/api/v1/notifications").await;
    assert_eq!(response.body["unread"], 0);
}

/// Emit events and wait until the background writer has stored them all.
async fn emit_all(fixture: &TestFixture, events: Vec<AuditEvent>) {
    let expected = events.len();
    for event in events {
        fixture.audit.emit(event).await;
    }
    for _ in 0..50 {
        let response = fixture.get("/api/v1/audit").await;
        if response.body["total"] == expected {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    panic!("audit writer did not store {} events", expected);
}

fn moved(item_id: i64, from: ItemState, to: ItemState) -> AuditEvent {
    AuditEvent::MoveCompleted {
        item_id,
        from_state: from,
        to_state: to,
        seconds_in_source: Some(1.5),
    }
}

#[tokio::test]
async fn test_audit_query_filters() {
    let fixture = TestFixture::new().await;
    emit_all(
        &fixture,
        vec![
            moved(7, ItemState::Wanted, ItemState::Scraping),
            AuditEvent::TorrentAdded {
                item_id: Some(7),
                hash: HASH.to_string(),
                torrent_id: "RD1".to_string(),
                title: None,
                trigger_source: trigger::QUEUE_ADD.to_string(),
            },
            AuditEvent::QueuePaused {
                reason: "maintenance".to_string(),
            },
        ],
    )
    .await;

    let by_item = fixture.get("/api/v1/audit?item_id=7").await;
    assert_status!(by_item, StatusCode::OK);
    assert_eq!(by_item.body["total"], 2);
    assert_eq!(by_item.body["events"][0]["kind"], "torrent_added");
    assert_eq!(by_item.body["events"][1]["data"]["to_state"], "Scraping");

    let paused = fixture.get("/api/v1/audit?kind=queue_paused").await;
    assert_eq!(paused.body["total"], 1);

    let either = fixture
        .get("/api/v1/audit?kind=queue_paused,torrent_added")
        .await;
    assert_eq!(either.body["total"], 2);

    let uri = format!("/api/v1/audit?hash={}", HASH.to_uppercase());
    let by_hash = fixture.get(&uri).await;
    assert_eq!(by_hash.body["total"], 1);
    assert_eq!(by_hash.body["events"][0]["data"]["torrent_id"], "RD1");

    let unknown = fixture.get("/api/v1/audit?kind=bogus").await;
    assert_status!(unknown, StatusCode::BAD_REQUEST);
    let bad_hash = fixture.get("/api/v1/audit?hash=nope").await;
    assert_status!(bad_hash, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_audit_query_by_state_transition() {
    let fixture = TestFixture::new().await;
    emit_all(
        &fixture,
        vec![
            AuditEvent::MoveInitiated {
                item_id: 7,
                from_state: ItemState::Wanted,
                to_state: ItemState::Scraping,
            },
            moved(7, ItemState::Wanted, ItemState::Scraping),
            moved(7, ItemState::Scraping, ItemState::Adding),
            moved(8, ItemState::Wanted, ItemState::Scraping),
            moved(8, ItemState::Checking, ItemState::PendingUncached),
            AuditEvent::QueuePaused {
                reason: "maintenance".to_string(),
            },
        ],
    )
    .await;

    let edge = fixture
        .get("/api/v1/audit?from_state=Wanted&to_state=Scraping&kind=move_completed")
        .await;
    assert_status!(edge, StatusCode::OK);
    assert_eq!(edge.body["total"], 2);
    let items: Vec<_> = edge.body["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["item_id"].as_i64().unwrap())
        .collect();
    assert_eq!(items, vec![8, 7]);

    // Without a kind filter the initiated move matches too
    let both = fixture
        .get("/api/v1/audit?from_state=Wanted&to_state=Scraping")
        .await;
    assert_eq!(both.body["total"], 3);

    let parked = fixture
        .get("/api/v1/audit?to_state=Pending%20Uncached")
        .await;
    assert_eq!(parked.body["total"], 1);
    assert_eq!(parked.body["events"][0]["item_id"], 8);
    assert_eq!(parked.body["events"][0]["data"]["from_state"], "Checking");

    let left_scraping = fixture.get("/api/v1/audit?from_state=Scraping&item_id=7").await;
    assert_eq!(left_scraping.body["total"], 1);
    assert_eq!(left_scraping.body["events"][0]["data"]["to_state"], "Adding");

    let unknown = fixture.get("/api/v1/audit?from_state=Limbo").await;
    assert_status!(unknown, StatusCode::BAD_REQUEST);
    assert_eq!(unknown.body["error"], "Unknown from_state: Limbo");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new().await;
    fixture.get("/api/v1/health").await;

    let (status, body) = fixture.get_text("/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("debridarr_http_requests_total"));
    assert!(body.contains("debridarr_runner_running"));
    assert!(body.contains("debridarr_notifications_unread"));
}
