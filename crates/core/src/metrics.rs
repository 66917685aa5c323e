//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Queue manager (moves, queue sizes)
//! - Torrent processor (outcomes)
//! - Debrid request layer (requests, rate-limit widenings)
//! - Scheduler (task durations) and notifications

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts};

// =============================================================================
// Queue Metrics
// =============================================================================

/// Item moves between queues.
pub static QUEUE_MOVES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("debridarr_queue_moves_total", "Total item moves between queues"),
        &["from", "to"],
    )
    .unwrap()
});

/// Items currently in each queue.
pub static QUEUE_SIZE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("debridarr_queue_size", "Number of items in each queue"),
        &["queue"],
    )
    .unwrap()
});

// =============================================================================
// Processor Metrics
// =============================================================================

/// Torrent processor runs by outcome.
pub static PROCESSOR_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "debridarr_processor_outcomes_total",
            "Torrent processor runs by outcome",
        ),
        &["outcome"], // "added", "pending_uncached", "exhausted"
    )
    .unwrap()
});

// =============================================================================
// Debrid Metrics
// =============================================================================

/// Debrid API requests by service and outcome.
pub static DEBRID_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("debridarr_debrid_requests_total", "Total debrid API requests"),
        &["service", "outcome"], // "ok", "rate_limited", "auth", "transient", "error"
    )
    .unwrap()
});

/// Request gate widenings after HTTP 429.
pub static RATE_LIMIT_WIDENINGS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "debridarr_rate_limit_widenings_total",
            "Times a service's request interval was widened after a 429",
        ),
        &["service"],
    )
    .unwrap()
});

/// Removals of torrents that were added but never became usable.
pub static DEBRID_ROLLBACKS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "debridarr_debrid_rollbacks_total",
            "Rollback removals after a failed add",
        ),
        &["service", "result"], // "removed", "failed"
    )
    .unwrap()
});

// =============================================================================
// Scheduler & Notification Metrics
// =============================================================================

/// Scheduler task duration in seconds.
pub static TASK_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "debridarr_task_duration_seconds",
            "Duration of scheduler task runs",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0]),
        &["task"],
    )
    .unwrap()
});

/// Notification deliveries by transport and result.
pub static NOTIFICATIONS_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "debridarr_notifications_sent_total",
            "Notification deliveries by transport",
        ),
        &["transport", "result"], // "success", "failed"
    )
    .unwrap()
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Queues
        Box::new(QUEUE_MOVES.clone()),
        Box::new(QUEUE_SIZE.clone()),
        // Processor
        Box::new(PROCESSOR_OUTCOMES.clone()),
        // Debrid
        Box::new(DEBRID_REQUESTS.clone()),
        Box::new(RATE_LIMIT_WIDENINGS.clone()),
        Box::new(DEBRID_ROLLBACKS.clone()),
        // Scheduler & notifications
        Box::new(TASK_DURATION.clone()),
        Box::new(NOTIFICATIONS_SENT.clone()),
    ]
}
