//! Types for the program runner.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::config::TaskIntervals;
use crate::content::ContentSourceError;
use crate::debrid::DebridError;
use crate::media::{ItemState, MediaError};
use crate::queues::QueueError;
use crate::tracking::TrackingError;

use super::PauseState;

/// Errors from scheduler tasks.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Debrid error: {0}")]
    Debrid(#[from] DebridError),

    #[error("Tracking error: {0}")]
    Tracking(#[from] TrackingError),

    #[error("Media store error: {0}")]
    Media(#[from] MediaError),

    #[error("Content source error: {0}")]
    Content(#[from] ContentSourceError),

    #[error("Invalid pause schedule: {0}")]
    PauseSchedule(String),

    #[error("Failed to persist {path}: {message}")]
    Persist { path: PathBuf, message: String },
}

impl SchedulerError {
    /// Credentials were rejected; processing should pause until connectivity returns.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            SchedulerError::Queue(QueueError::Auth(_)) | SchedulerError::Debrid(DebridError::Auth(_))
        )
    }
}

/// A unit of scheduled work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    Queue(ItemState),
    ContentSources,
    TimingSave,
    DriftCheck,
    LibrarySize,
}

impl Task {
    /// Run order within one scheduler pass. Collected has no work of its own.
    pub const ALL: [Task; 15] = [
        Task::ContentSources,
        Task::Queue(ItemState::Wanted),
        Task::Queue(ItemState::Scraping),
        Task::Queue(ItemState::Adding),
        Task::Queue(ItemState::Checking),
        Task::Queue(ItemState::Sleeping),
        Task::Queue(ItemState::Unreleased),
        Task::Queue(ItemState::PreRelease),
        Task::Queue(ItemState::FinalCheck),
        Task::Queue(ItemState::PendingUncached),
        Task::Queue(ItemState::Upgrading),
        Task::Queue(ItemState::Blacklisted),
        Task::TimingSave,
        Task::DriftCheck,
        Task::LibrarySize,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Task::Queue(state) => state.as_str(),
            Task::ContentSources => "content_sources",
            Task::TimingSave => "timing_save",
            Task::DriftCheck => "drift_check",
            Task::LibrarySize => "library_size",
        }
    }

    /// Cadence in seconds.
    pub fn interval(&self, intervals: &TaskIntervals) -> u64 {
        match self {
            Task::Queue(state) => match state {
                ItemState::Wanted => intervals.wanted,
                ItemState::Scraping => intervals.scraping,
                ItemState::Adding => intervals.adding,
                ItemState::Checking => intervals.checking,
                ItemState::Sleeping => intervals.sleeping,
                ItemState::Unreleased => intervals.unreleased,
                ItemState::PreRelease => intervals.pre_release,
                ItemState::FinalCheck => intervals.final_check,
                ItemState::PendingUncached => intervals.pending_uncached,
                ItemState::Upgrading => intervals.upgrading,
                ItemState::Blacklisted => intervals.blacklisted,
                ItemState::Collected => u64::MAX,
            },
            Task::ContentSources => intervals.content_sources,
            Task::TimingSave => intervals.timing_save,
            Task::DriftCheck => intervals.drift_check,
            Task::LibrarySize => intervals.library_size,
        }
    }
}

/// Current status of the program runner.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunnerStatus {
    pub running: bool,
    /// Manual or connectivity pause, if any.
    pub pause: Option<PauseState>,
    pub in_pause_window: bool,
    /// Extra seconds added to each loop by load regulation.
    pub extra_sleep_secs: f64,
    pub last_runs: BTreeMap<String, DateTime<Utc>>,
    pub content_sources: Vec<String>,
}

impl RunnerStatus {
    pub fn is_processing(&self) -> bool {
        self.running && self.pause.is_none() && !self.in_pause_window
    }
}
