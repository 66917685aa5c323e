use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::NotificationsConfig;

use super::{Dispatcher, NotificationCategory, NotificationEvent};

enum BufferCommand {
    Events(Vec<NotificationEvent>),
    Category(NotificationCategory, String),
    Flush(oneshot::Sender<()>),
}

/// Handle for buffering notification events.
///
/// Cheap to clone. Events travel to the [`BufferFlusher`], which delivers
/// them once the short timer (restarted by every batch) or the safety timer
/// (started by the first batch) fires.
#[derive(Clone)]
pub struct NotificationBuffer {
    tx: mpsc::Sender<BufferCommand>,
}

impl NotificationBuffer {
    pub async fn buffer(&self, events: Vec<NotificationEvent>) {
        if events.is_empty() {
            return;
        }
        if self.tx.send(BufferCommand::Events(events)).await.is_err() {
            warn!("Notification buffer closed, dropping events");
        }
    }

    /// Send a program-level message without batching.
    pub async fn send_category(&self, category: NotificationCategory, detail: &str) {
        let command = BufferCommand::Category(category, detail.to_string());
        if self.tx.send(command).await.is_err() {
            warn!(category = category.as_str(), "Notification buffer closed, dropping message");
        }
    }

    /// Deliver everything buffered now and wait for it.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(BufferCommand::Flush(done_tx)).await.is_ok() {
            let _ = done_rx.await;
        }
    }
}

/// Background task owning the pending batch and its timers.
pub struct BufferFlusher {
    rx: mpsc::Receiver<BufferCommand>,
    dispatcher: Arc<Dispatcher>,
    short_timeout: Duration,
    safety_timeout: Duration,
}

impl BufferFlusher {
    /// Run until every handle has been dropped; pending events are flushed first.
    pub async fn run(mut self) {
        let mut pending: Vec<NotificationEvent> = Vec::new();
        let mut short_deadline: Option<Instant> = None;
        let mut safety_deadline: Option<Instant> = None;

        loop {
            let deadline = match (short_deadline, safety_deadline) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };

            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(BufferCommand::Events(events)) => {
                        let now = Instant::now();
                        pending.extend(events);
                        short_deadline = Some(now + self.short_timeout);
                        safety_deadline.get_or_insert(now + self.safety_timeout);
                    }
                    Some(BufferCommand::Category(category, detail)) => {
                        self.dispatcher.send_category(category, &detail).await;
                    }
                    Some(BufferCommand::Flush(done)) => {
                        self.flush(&mut pending).await;
                        short_deadline = None;
                        safety_deadline = None;
                        let _ = done.send(());
                    }
                    None => {
                        self.flush(&mut pending).await;
                        break;
                    }
                },
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.flush(&mut pending).await;
                    short_deadline = None;
                    safety_deadline = None;
                }
            }
        }

        debug!("Notification buffer stopped");
    }

    async fn flush(&self, pending: &mut Vec<NotificationEvent>) {
        if pending.is_empty() {
            return;
        }
        let batch = std::mem::take(pending);
        debug!(events = batch.len(), "Flushing notification buffer");
        self.dispatcher.dispatch_events(batch).await;
    }
}

/// Create a buffer handle and the flusher to spawn with `tokio::spawn(flusher.run())`.
pub fn create_notification_buffer(
    dispatcher: Arc<Dispatcher>,
    config: &NotificationsConfig,
) -> (NotificationBuffer, BufferFlusher) {
    let (tx, rx) = mpsc::channel(1024);
    (
        NotificationBuffer { tx },
        BufferFlusher {
            rx,
            dispatcher,
            short_timeout: Duration::from_secs(config.short_timeout_secs),
            safety_timeout: Duration::from_secs(config.safety_timeout_secs),
        },
    )
}
