use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::config::{NotificationTargetConfig, NotificationsConfig, NotifierKind};
use crate::media::MediaType;

use super::format::{dedup_events, format_batch};
use super::{
    send_with_retry, DiscordNotifier, EmailNotifier, NewNotification, NotificationCategory,
    NotificationEvent, NotificationStore, Notifier, NotifyError, NtfyNotifier, OverseerrTrigger,
    TelegramNotifier,
};

/// A configured channel and its transport.
#[derive(Clone)]
pub struct NotificationTarget {
    pub config: NotificationTargetConfig,
    pub notifier: Arc<dyn Notifier>,
}

impl NotificationTarget {
    fn accepts_source(&self, source: Option<&str>) -> bool {
        self.config.content_sources.is_empty()
            || source.is_some_and(|s| self.config.content_sources.iter().any(|c| c == s))
    }
}

fn build_notifier(
    target: &NotificationTargetConfig,
    timeout: Duration,
) -> Result<Arc<dyn Notifier>, NotifyError> {
    let missing = || NotifyError::Config(format!("target '{}' has no {} section", target.name, target.kind.as_str()));
    Ok(match target.kind {
        NotifierKind::Discord => Arc::new(DiscordNotifier::new(
            &target.name,
            target.discord.as_ref().ok_or_else(missing)?,
            timeout,
        )?),
        NotifierKind::Email => Arc::new(EmailNotifier::new(
            &target.name,
            target.email.as_ref().ok_or_else(missing)?,
            timeout,
        )?),
        NotifierKind::Telegram => Arc::new(TelegramNotifier::new(
            &target.name,
            target.telegram.as_ref().ok_or_else(missing)?,
            timeout,
        )?),
        NotifierKind::Ntfy => Arc::new(NtfyNotifier::new(
            &target.name,
            target.ntfy.as_ref().ok_or_else(missing)?,
            timeout,
        )?),
    })
}

/// Build a transport for every enabled target. Broken targets are logged and skipped.
pub fn create_notifiers(config: &NotificationsConfig) -> Vec<NotificationTarget> {
    let timeout = Duration::from_secs(config.timeout_secs);
    config
        .targets
        .iter()
        .filter(|t| t.enabled)
        .filter_map(|t| match build_notifier(t, timeout) {
            Ok(notifier) => {
                info!(target_name = %t.name, kind = t.kind.as_str(), "Notification target enabled");
                Some(NotificationTarget {
                    config: t.clone(),
                    notifier,
                })
            }
            Err(e) => {
                warn!(target_name = %t.name, error = %e, "Skipping notification target");
                None
            }
        })
        .collect()
}

fn event_label(event: &NotificationEvent) -> String {
    match (event.media_type, event.season_number, event.episode_number) {
        (MediaType::Episode, Some(s), Some(e)) => format!("{} S{:02}E{:02}", event.title, s, e),
        _ => match event.year {
            Some(year) => format!("{} ({})", event.title, year),
            None => event.title.clone(),
        },
    }
}

/// Delivers batches and program messages to every target.
#[derive(Clone)]
pub struct Dispatcher {
    targets: Vec<NotificationTarget>,
    store: Option<Arc<dyn NotificationStore>>,
    overseerr: Option<OverseerrTrigger>,
    condense_threshold: usize,
}

impl Dispatcher {
    pub fn new(
        targets: Vec<NotificationTarget>,
        store: Option<Arc<dyn NotificationStore>>,
        overseerr: Option<OverseerrTrigger>,
        condense_threshold: usize,
    ) -> Self {
        Self {
            targets,
            store,
            overseerr,
            condense_threshold,
        }
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    fn persist(&self, notification: NewNotification) {
        if let Some(store) = &self.store {
            if let Err(e) = store.insert(&notification) {
                error!(error = %e, "Failed to persist notification");
            }
        }
    }

    /// Flush one buffered batch.
    pub async fn dispatch_events(&self, events: Vec<NotificationEvent>) {
        let events = dedup_events(events);
        if events.is_empty() {
            return;
        }

        for event in &events {
            let label = event_label(event);
            self.persist(NewNotification {
                message: format!("{} → {}", label, event.display_state()),
                title: label,
                notification_type: event.notify_key(),
                link: event.link(),
            });
        }

        for target in &self.targets {
            let selected: Vec<NotificationEvent> = events
                .iter()
                .filter(|e| e.wanted_by(&target.config.notify_on))
                .filter(|e| target.accepts_source(e.content_source.as_deref()))
                .cloned()
                .collect();
            if selected.is_empty() {
                continue;
            }
            let message = format_batch(&selected, self.condense_threshold);
            let title = format!("{} media update(s)", selected.len());
            if let Err(e) = send_with_retry(target.notifier.as_ref(), &title, &message).await {
                error!(target_name = %target.config.name, error = %e, "Notification delivery failed");
            }
        }

        let collected = events
            .iter()
            .any(|e| matches!(e.display_state(), "Collected" | "Upgraded"));
        if collected {
            if let Some(overseerr) = &self.overseerr {
                overseerr.schedule();
            }
        }
    }

    /// Send a program-level message immediately.
    pub async fn send_category(&self, category: NotificationCategory, detail: &str) {
        let message = category.message(detail);
        self.persist(NewNotification {
            title: category.title().to_string(),
            message: message.clone(),
            notification_type: category.as_str().to_string(),
            link: None,
        });

        for target in &self.targets {
            let enabled = target
                .config
                .notify_on
                .get(category.as_str())
                .copied()
                .unwrap_or(true);
            if !enabled {
                continue;
            }
            if let Err(e) = send_with_retry(target.notifier.as_ref(), category.title(), &message).await {
                error!(target_name = %target.config.name, category = category.as_str(), error = %e, "Notification delivery failed");
            }
        }
    }

    /// Send from any context, including outside a runtime or while one is
    /// shutting down. Blocks until every target was attempted.
    pub fn send_category_blocking(&self, category: NotificationCategory, detail: &str) {
        let this = self.clone();
        let detail = detail.to_string();
        let handle = std::thread::spawn(move || {
            match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime.block_on(this.send_category(category, &detail)),
                Err(e) => error!(error = %e, "Cannot start runtime for notification"),
            }
        });
        if handle.join().is_err() {
            error!("Notification thread panicked");
        }
    }
}
