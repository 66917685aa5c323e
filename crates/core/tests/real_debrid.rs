//! Real-Debrid provider tests against an in-process fake API.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Form, Json, Router};
use serde_json::json;

use debridarr_core::config::{load_config_from_str, DebridConfig};
use debridarr_core::debrid::{
    magnet_from_hash, CacheCheckContext, DebridError, DebridProvider, RealDebridProvider,
    TorrentSource,
};
use debridarr_core::media::SqliteMediaStore;
use debridarr_core::metrics::DEBRID_ROLLBACKS;
use debridarr_core::tracking::{trigger, SqliteTrackingStore, TrackingStore};

const HASH: &str = "0123456789abcdef0123456789abcdef01234567";

#[derive(Default)]
struct FakeAccount {
    /// Answer every request with 429.
    throttled: bool,
    /// Answer /user with 401.
    unauthorized: bool,
    /// Answer torrent info with 500.
    info_fails: bool,
    /// Answer deletes with 500.
    delete_fails: bool,
    /// The torrent holds no playable video.
    no_video: bool,
    added: bool,
    selected: Option<String>,
    deleted: Vec<String>,
    requests: u32,
}

type Shared = Arc<Mutex<FakeAccount>>;

fn throttled(state: &Shared) -> Option<Response> {
    let mut account = state.lock().unwrap();
    account.requests += 1;
    account
        .throttled
        .then(|| StatusCode::TOO_MANY_REQUESTS.into_response())
}

fn torrent_json(status: &str, no_video: bool) -> serde_json::Value {
    let progress = if status == "downloaded" { 100.0 } else { 0.0 };
    let video = if no_video {
        "/Sample/oppenheimer-sample.mkv"
    } else {
        "/Oppenheimer.2023.1080p.BluRay.mkv"
    };
    json!({
        "id": "RD1",
        "filename": "Oppenheimer.2023.1080p.BluRay",
        "hash": HASH.to_uppercase(),
        "bytes": 4_000_000_000u64,
        "status": status,
        "progress": progress,
        "files": [
            { "id": 1, "path": video, "bytes": 3_900_000_000u64, "selected": 0 },
            { "id": 2, "path": "/Oppenheimer.2023.1080p.BluRay.nfo", "bytes": 2048, "selected": 0 }
        ]
    })
}

async fn list(State(state): State<Shared>) -> Response {
    if let Some(r) = throttled(&state) {
        return r;
    }
    let account = state.lock().unwrap();
    if account.added && account.selected.is_some() {
        Json(json!([torrent_json("downloaded", account.no_video)])).into_response()
    } else {
        StatusCode::NO_CONTENT.into_response()
    }
}

async fn add_magnet(
    State(state): State<Shared>,
    Form(form): Form<std::collections::HashMap<String, String>>,
) -> Response {
    if let Some(r) = throttled(&state) {
        return r;
    }
    assert!(form.get("magnet").is_some_and(|m| m.contains(HASH)));
    state.lock().unwrap().added = true;
    (StatusCode::CREATED, Json(json!({ "id": "RD1", "uri": "" }))).into_response()
}

async fn info(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    if let Some(r) = throttled(&state) {
        return r;
    }
    let account = state.lock().unwrap();
    if account.info_fails {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    if id != "RD1" || !account.added {
        return StatusCode::NOT_FOUND.into_response();
    }
    let status = if account.selected.is_some() {
        "downloaded"
    } else {
        "waiting_files_selection"
    };
    Json(torrent_json(status, account.no_video)).into_response()
}

async fn select_files(
    State(state): State<Shared>,
    Path(_id): Path<String>,
    Form(form): Form<std::collections::HashMap<String, String>>,
) -> Response {
    if let Some(r) = throttled(&state) {
        return r;
    }
    state.lock().unwrap().selected = form.get("files").cloned();
    StatusCode::NO_CONTENT.into_response()
}

async fn active_count(State(state): State<Shared>) -> Response {
    if let Some(r) = throttled(&state) {
        return r;
    }
    Json(json!({ "nb": 3, "limit": 25 })).into_response()
}

async fn delete_torrent(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    if let Some(r) = throttled(&state) {
        return r;
    }
    let mut account = state.lock().unwrap();
    account.deleted.push(id.clone());
    if account.delete_fails {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    if id == "RD1" && account.added {
        account.added = false;
        StatusCode::NO_CONTENT.into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

async fn user(State(state): State<Shared>) -> Response {
    if let Some(r) = throttled(&state) {
        return r;
    }
    if state.lock().unwrap().unauthorized {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "bad_token" }))).into_response();
    }
    Json(json!({ "username": "tester", "premium": 86400, "expiration": "2030-01-01T00:00:00.000Z" }))
        .into_response()
}

async fn spawn_fake(state: Shared) -> String {
    let app = Router::new()
        .route("/torrents", get(list))
        .route("/torrents/addMagnet", post(add_magnet))
        .route("/torrents/info/{id}", get(info))
        .route("/torrents/selectFiles/{id}", post(select_files))
        .route("/torrents/activeCount", get(active_count))
        .route("/torrents/delete/{id}", delete(delete_torrent))
        .route("/user", get(user))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn debrid_config(base_url: &str, fast_gate: bool) -> DebridConfig {
    let gate = if fast_gate {
        "[debrid.rate_limit]\nmin_interval_secs = 0.01\n"
    } else {
        ""
    };
    let toml = format!(
        r#"
[debrid]
api_key = "secret"
base_url = "{}"
add_poll_interval_ms = 10
add_poll_timeout_secs = 5

[debrid.retry]
max_attempts = 3
base_delay_secs = 0.01
max_delay_secs = 0.02
{}"#,
        base_url, gate
    );
    load_config_from_str(&toml).unwrap().debrid
}

struct Setup {
    provider: RealDebridProvider,
    tracking: Arc<SqliteTrackingStore>,
    state: Shared,
}

async fn setup(fast_gate: bool) -> Setup {
    let state: Shared = Arc::new(Mutex::new(FakeAccount::default()));
    let base_url = spawn_fake(state.clone()).await;
    let media = Arc::new(SqliteMediaStore::in_memory().unwrap());
    let tracking = Arc::new(SqliteTrackingStore::in_memory().unwrap());
    let provider = RealDebridProvider::new(
        &debrid_config(&base_url, fast_gate),
        CacheCheckContext {
            phalanx: None,
            media,
            tracking: tracking.clone(),
        },
    )
    .unwrap();
    Setup {
        provider,
        tracking,
        state,
    }
}

#[tokio::test]
async fn test_429_widens_request_interval() {
    let s = setup(false).await;
    s.state.lock().unwrap().throttled = true;
    assert_eq!(
        s.provider.current_request_interval().await,
        Duration::from_millis(500)
    );

    let result = s.provider.list_active().await;

    assert_eq!(result.unwrap_err(), DebridError::RateLimited);
    assert_eq!(s.state.lock().unwrap().requests, 3);
    assert_eq!(
        s.provider.current_request_interval().await,
        Duration::from_secs(4)
    );
}

#[tokio::test]
async fn test_add_selects_video_files_and_records_addition() {
    let s = setup(true).await;
    let source = TorrentSource::Magnet(magnet_from_hash(HASH));

    let torrent_id = s.provider.add_torrent(&source).await.unwrap();

    assert_eq!(torrent_id, "RD1");
    assert_eq!(s.state.lock().unwrap().selected.as_deref(), Some("1"));
    assert_eq!(s.provider.get_cached_torrent_id(HASH), Some("RD1".to_string()));
    let record = s.tracking.latest(HASH).unwrap().unwrap();
    assert_eq!(record.trigger_source, trigger::DEBRID_ADD);
    assert!(record.is_still_present);

    // A second add finds the torrent already on the account.
    assert_eq!(s.provider.add_torrent(&source).await.unwrap(), "RD1");
    assert!(s.provider.verify_present(HASH).await.unwrap());
}

#[tokio::test]
async fn test_remove_marks_tracking_and_tolerates_missing() {
    let s = setup(true).await;
    let source = TorrentSource::Magnet(magnet_from_hash(HASH));
    let torrent_id = s.provider.add_torrent(&source).await.unwrap();

    s.provider
        .remove_torrent(&torrent_id, "Replaced by upgrade")
        .await
        .unwrap();
    let record = s.tracking.latest(HASH).unwrap().unwrap();
    assert!(!record.is_still_present);
    assert_eq!(record.removal_reason.as_deref(), Some("Replaced by upgrade"));

    // Already gone: the 404 is not an error.
    s.provider.remove_torrent("RD1", "again").await.unwrap();
    assert_eq!(s.state.lock().unwrap().deleted, vec!["RD1", "RD1"]);
}

#[tokio::test]
async fn test_failed_rollback_keeps_torrent_tracked() {
    let s = setup(true).await;
    {
        let mut account = s.state.lock().unwrap();
        account.info_fails = true;
        account.delete_fails = true;
    }
    let failed = DEBRID_ROLLBACKS.with_label_values(&["real_debrid", "failed"]);
    let before = failed.get();

    let result = s
        .provider
        .add_torrent(&TorrentSource::Magnet(magnet_from_hash(HASH)))
        .await;

    assert!(matches!(result, Err(DebridError::AddError(_))));
    assert!(!s.state.lock().unwrap().deleted.is_empty());
    assert!(failed.get() > before);

    // The torrent is still on the account and tracked as such.
    let record = s.tracking.latest(HASH).unwrap().unwrap();
    assert_eq!(record.trigger_source, trigger::FAILED_ROLLBACK);
    assert!(record.is_still_present);
    assert_eq!(record.trigger_details["torrent_id"], "RD1");
}

#[tokio::test]
async fn test_torrent_without_video_is_removed() {
    let s = setup(true).await;
    s.state.lock().unwrap().no_video = true;

    let result = s
        .provider
        .add_torrent(&TorrentSource::Magnet(magnet_from_hash(HASH)))
        .await;

    assert!(matches!(result, Err(DebridError::NoVideoFiles(_))));
    let account = s.state.lock().unwrap();
    assert_eq!(account.selected, None);
    assert_eq!(account.deleted, vec!["RD1"]);
    assert!(!account.added);
    assert!(s.tracking.latest(HASH).unwrap().is_none());
}

#[tokio::test]
async fn test_active_downloads_applies_limit_ratio() {
    let s = setup(true).await;
    let downloads = s.provider.get_active_downloads().await.unwrap();
    assert_eq!(downloads.active, 3);
    assert_eq!(downloads.limit, 19);
}

#[tokio::test]
async fn test_connectivity_and_user_info() {
    let s = setup(true).await;
    tokio_test::assert_ok!(s.provider.connectivity_check().await);
    let user = tokio_test::assert_ok!(s.provider.user_info().await);
    assert_eq!(user.username, "tester");
    assert!(user.premium);

    s.state.lock().unwrap().unauthorized = true;
    let failure = s.provider.connectivity_check().await.unwrap_err();
    assert_eq!(failure.kind, "auth");
    assert!(matches!(
        s.provider.user_info().await,
        Err(DebridError::Auth(_))
    ));
}
