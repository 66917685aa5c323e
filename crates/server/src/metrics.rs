//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the debridarr server:
//! - HTTP request metrics (latency, counts, errors)
//! - Program runner state (collected dynamically)
//! - Item counts by state and unread notifications (collected dynamically)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use regex_lite::Regex;

use debridarr_core::ItemState;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "debridarr_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("debridarr_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "debridarr_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Program Metrics (collected dynamically)
// =============================================================================

/// Runner loop state (1 = running, 0 = stopped).
pub static RUNNER_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "debridarr_runner_running",
        "Whether the program runner is running (1) or stopped (0)",
    )
    .unwrap()
});

/// Queue processing paused (1) by a manual/connectivity pause or the daily window.
pub static RUNNER_PAUSED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "debridarr_runner_paused",
        "Whether queue processing is currently paused",
    )
    .unwrap()
});

/// Items by persisted state.
pub static ITEMS_BY_STATE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("debridarr_items_by_state", "Current item count by state"),
        &["state"],
    )
    .unwrap()
});

/// Unread stored notifications.
pub static NOTIFICATIONS_UNREAD: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "debridarr_notifications_unread",
        "Number of unread stored notifications",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Program
    registry.register(Box::new(RUNNER_RUNNING.clone())).unwrap();
    registry.register(Box::new(RUNNER_PAUSED.clone())).unwrap();
    registry.register(Box::new(ITEMS_BY_STATE.clone())).unwrap();
    registry
        .register(Box::new(NOTIFICATIONS_UNREAD.clone()))
        .unwrap();

    // Core metrics (queues, processor, debrid, scheduler, notifications)
    for metric in debridarr_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so gauges reflect the runner, the media store and
/// the notification store at scrape time.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let status = state.runner().status();
    RUNNER_RUNNING.set(i64::from(status.running));
    RUNNER_PAUSED.set(i64::from(status.pause.is_some() || status.in_pause_window));

    if let Ok(counts) = state.manager().media().count_by_state() {
        for item_state in ItemState::ALL {
            let name = item_state.as_str();
            ITEMS_BY_STATE
                .with_label_values(&[name])
                .set(counts.get(name).copied().unwrap_or(0));
        }
    }

    if let Ok(unread) = state.notification_store().count_unread() {
        NOTIFICATIONS_UNREAD.set(unread);
    }
}

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .expect("valid uuid regex")
});
static HASH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9a-fA-F]{40}").expect("valid hash regex"));
static NUMERIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/\d+(/|$)").expect("valid numeric regex"));

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let result = UUID_RE.replace_all(path, "{id}");
    let result = HASH_RE.replace_all(&result, "{hash}");
    let result = NUMERIC_RE.replace_all(&result, "/{id}$1");
    result.to_string()
}
