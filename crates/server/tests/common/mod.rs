//! Common test utilities for in-process API testing with mocks.
//!
//! This module provides a test fixture that builds the full router over a
//! queue manager wired to mock services, so the API can be exercised
//! without a debrid account, indexers or notification endpoints.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use debridarr_core::audit::{create_audit_system, AuditHandle};
use debridarr_core::notifications::{NewNotification, SqliteNotificationStore};
use debridarr_core::scheduler::{LoadRegulator, LoadSample, LoadSampler};
use debridarr_core::testing::{ManualClock, MockDebridProvider, MockLibrary, MockScraper};
use debridarr_core::{
    load_config_from_str, AuditStore, NotificationStore, PauseController, ProgramRunner,
    QueueDeps, QueueManager, Scraper, ScraperSet, SqliteAuditStore, SqliteMediaStore,
    SqliteTrackingStore,
};
use debridarr_server::state::AppState;

/// Re-export fixtures for test convenience
pub use debridarr_core::testing::fixtures;

const CONFIG: &str = r#"
[server]
host = "127.0.0.1"
port = 5000

[debrid]
api_key = "super-secret-key"

[versions."1080p"]
"#;

struct IdleSampler;

impl LoadSampler for IdleSampler {
    fn sample(&mut self) -> LoadSample {
        LoadSample {
            cpu_percent: 5.0,
            memory_percent: 20.0,
        }
    }
}

/// Test fixture for API testing with mock dependencies.
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    pub runner: Arc<ProgramRunner>,
    pub manager: Arc<QueueManager>,
    pub media: Arc<SqliteMediaStore>,
    pub tracking: Arc<SqliteTrackingStore>,
    pub notifications: Arc<SqliteNotificationStore>,
    pub audit: AuditHandle,
    pub provider: Arc<MockDebridProvider>,
    pub scraper: Arc<MockScraper>,
    /// Temporary directory for test databases
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let dir = temp_dir.path();
        let mut config = load_config_from_str(CONFIG).expect("Failed to parse config");
        config.database.state_dir = dir.to_path_buf();

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
        let notifications = Arc::new(
            SqliteNotificationStore::new(&dir.join("notifications.db"))
                .expect("Failed to create notification store")
                .with_clock(clock.clone()),
        );
        let audit_store: Arc<dyn AuditStore> = Arc::new(
            SqliteAuditStore::new(&dir.join("audit.db")).expect("Failed to create audit store"),
        );
        let (audit, writer) = create_audit_system(Arc::clone(&audit_store), clock.clone(), 100);
        tokio::spawn(writer.run());

        let provider = Arc::new(MockDebridProvider::new(media.clone(), tracking.clone()));
        let scraper = Arc::new(MockScraper::new("mock"));

        let manager = Arc::new(
            QueueManager::new(QueueDeps {
                config: Arc::new(config),
                media: media.clone(),
                tracking: tracking.clone(),
                provider: provider.clone(),
                scrapers: ScraperSet::new(vec![scraper.clone() as Arc<dyn Scraper>], 1),
                library: Arc::new(MockLibrary::new()),
                clock: clock.clone(),
                audit: Some(audit.clone()),
                notifications: None,
            })
            .expect("Failed to create queue manager"),
        );

        let pause = Arc::new(PauseController::new(None, clock, Some(audit.clone()), None));
        let regulator = LoadRegulator::new(
            manager.config().scheduler.regulation.clone(),
            Box::new(IdleSampler),
        );
        let runner = Arc::new(ProgramRunner::new(
            manager.clone(),
            pause,
            regulator,
            Vec::new(),
            Some(audit.clone()),
        ));

        let state = Arc::new(AppState::new(
            runner.clone(),
            audit_store,
            notifications.clone() as Arc<dyn NotificationStore>,
        ));
        let router = debridarr_server::api::create_router(state);

        Self {
            router,
            runner,
            manager,
            media,
            tracking,
            notifications,
            audit,
            provider,
            scraper,
            temp_dir,
        }
    }

    /// Store a notification the way the dispatcher would.
    pub fn notify(&self, title: &str, message: &str) -> i64 {
        self.notifications
            .insert(&NewNotification {
                title: title.to_string(),
                message: message.to_string(),
                notification_type: "info".to_string(),
                link: None,
            })
            .expect("Failed to store notification")
            .id
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a GET request and return the raw text body.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).to_string())
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
