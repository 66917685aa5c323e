//! Program runner.
//!
//! Drives the queue state machine on a single loop:
//! - Every pass runs each queue's `update` hook
//! - Queues and maintenance tasks run when their interval elapses
//! - Manual, connectivity and scheduled-window pauses skip processing
//! - Load regulation stretches the loop sleep while the host is busy

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::audit::AuditHandle;
use crate::content::ContentSource;
use crate::metrics::TASK_DURATION;
use crate::notifications::NotificationCategory;
use crate::queues::QueueManager;

use super::pause::{PauseController, PauseKind};
use super::regulation::LoadRegulator;
use super::tasks::{check_drift, update_library_size, SourcePoller};
use super::types::{RunnerStatus, SchedulerError, Task};

/// Pause reason used when the debrid provider rejects our credentials.
pub const CONNECTIVITY_REASON: &str = "connectivity";

pub struct ProgramRunner {
    manager: Arc<QueueManager>,
    pause: Arc<PauseController>,
    regulator: Mutex<LoadRegulator>,
    sources: SourcePoller,
    audit: Option<AuditHandle>,

    // Runtime state
    running: Arc<AtomicBool>,
    stopping: AtomicBool,
    last_runs: Mutex<HashMap<Task, DateTime<Utc>>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ProgramRunner {
    pub fn new(
        manager: Arc<QueueManager>,
        pause: Arc<PauseController>,
        regulator: LoadRegulator,
        sources: Vec<Arc<dyn ContentSource>>,
        audit: Option<AuditHandle>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            manager,
            pause,
            regulator: Mutex::new(regulator),
            sources: SourcePoller::new(sources),
            audit,
            running: Arc::new(AtomicBool::new(false)),
            stopping: AtomicBool::new(false),
            last_runs: Mutex::new(HashMap::new()),
            shutdown_tx,
        }
    }

    pub fn manager(&self) -> &Arc<QueueManager> {
        &self.manager
    }

    pub fn pause_controller(&self) -> &Arc<PauseController> {
        &self.pause
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the main loop. Returns `None` if it is already running.
    pub fn start(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Program runner already running");
            return None;
        }
        self.stopping.store(false, Ordering::SeqCst);
        info!("Starting program runner");

        let runner = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        Some(tokio::spawn(async move {
            runner
                .manager
                .notify_category(NotificationCategory::QueueStart, "")
                .await;

            loop {
                if runner.stopping.load(Ordering::SeqCst) {
                    break;
                }
                runner.tick().await;

                let sleep = runner.manager.config().scheduler.main_loop_sleep_secs
                    + runner.extra_sleep();
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = tokio::time::sleep(Duration::from_secs_f64(sleep.max(0.0))) => {}
                }
            }

            let timing_path = runner.manager.config().database.queue_timing_path();
            if let Err(e) = runner.manager.save_timing(&timing_path) {
                warn!(error = %e, "Failed to save queue timing on shutdown");
            }
            runner
                .manager
                .notify_category(NotificationCategory::QueueStop, "")
                .await;
            runner.running.store(false, Ordering::SeqCst);
            info!("Program runner stopped");
        }))
    }

    /// Stop accepting new task runs and wait for the loop to finish, bounded
    /// by the configured grace period. Returns false if the loop was aborted.
    pub async fn stop(&self, mut handle: JoinHandle<()>) -> bool {
        info!("Stopping program runner");
        self.stopping.store(true, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(());

        let grace = Duration::from_secs(self.manager.config().scheduler.shutdown_grace_secs);
        match tokio::time::timeout(grace, &mut handle).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                error!(error = %e, "Program runner task failed");
                false
            }
            Err(_) => {
                warn!(grace_secs = grace.as_secs(), "Program runner did not stop in time; aborting");
                handle.abort();
                self.running.store(false, Ordering::SeqCst);
                false
            }
        }
    }

    /// One scheduler pass.
    pub async fn tick(&self) {
        self.manager.update_all().await;

        let in_window = self.pause.refresh_window().await;
        self.recover_connectivity().await;
        if in_window || self.pause.is_paused() {
            return;
        }

        let intervals = &self.manager.config().scheduler.intervals;
        for task in Task::ALL {
            if self.stopping.load(Ordering::SeqCst) {
                break;
            }
            let now = self.manager.now();
            if !self.is_due(task, task.interval(intervals), now) {
                continue;
            }
            if let Ok(mut last) = self.last_runs.lock() {
                last.insert(task, now);
            }

            let started = Instant::now();
            let result = self.run_task(task).await;
            TASK_DURATION
                .with_label_values(&[task.name()])
                .observe(started.elapsed().as_secs_f64());
            if let Ok(mut regulator) = self.regulator.lock() {
                regulator.observe();
            }

            match result {
                Ok(()) => {}
                Err(e) if e.is_auth() => {
                    error!(task = task.name(), error = %e, "Debrid credentials rejected; pausing");
                    self.pause
                        .pause(PauseKind::Connectivity, CONNECTIVITY_REASON)
                        .await;
                    break;
                }
                Err(e) => warn!(task = task.name(), error = %e, "Scheduled task failed"),
            }
        }
    }

    async fn run_task(&self, task: Task) -> Result<(), SchedulerError> {
        match task {
            Task::Queue(state) => self.manager.process_queue(state).await?,
            Task::ContentSources => {
                self.sources
                    .poll_due(&self.manager, self.audit.as_ref())
                    .await;
            }
            Task::TimingSave => {
                let path = self.manager.config().database.queue_timing_path();
                self.manager.save_timing(&path)?;
            }
            Task::DriftCheck => {
                check_drift(&self.manager).await?;
            }
            Task::LibrarySize => {
                let path = self.manager.config().database.library_size_path();
                update_library_size(&self.manager, &path).await?;
            }
        }
        Ok(())
    }

    fn is_due(&self, task: Task, interval_secs: u64, now: DateTime<Utc>) -> bool {
        let Ok(last) = self.last_runs.lock() else {
            return false;
        };
        match last.get(&task) {
            None => true,
            Some(at) => {
                let interval = i64::try_from(interval_secs)
                    .map(chrono::Duration::seconds)
                    .unwrap_or(chrono::Duration::MAX);
                now - *at >= interval
            }
        }
    }

    async fn recover_connectivity(&self) {
        let Some(state) = self.pause.current() else {
            return;
        };
        if state.kind != PauseKind::Connectivity {
            return;
        }
        match self.manager.provider().connectivity_check().await {
            Ok(()) => {
                info!("Debrid connectivity restored");
                self.pause.resume("connectivity restored").await;
            }
            Err(failure) => debug!(?failure, "Debrid still unreachable"),
        }
    }

    fn extra_sleep(&self) -> f64 {
        self.regulator
            .lock()
            .map(|r| r.extra_sleep())
            .unwrap_or_default()
    }

    pub fn status(&self) -> RunnerStatus {
        let last_runs = self
            .last_runs
            .lock()
            .map(|last| {
                last.iter()
                    .map(|(task, at)| (task.name().to_string(), *at))
                    .collect()
            })
            .unwrap_or_default();
        RunnerStatus {
            running: self.is_running(),
            pause: self.pause.current(),
            in_pause_window: self.pause.in_window(),
            extra_sleep_secs: self.extra_sleep(),
            last_runs,
            content_sources: self.sources.source_names(),
        }
    }
}
