//! Notification buffering and dispatch.
//!
//! Queue moves are buffered for a short window, deduplicated, grouped per
//! show/movie and delivered to every enabled target. Program lifecycle
//! categories bypass the buffer and are sent immediately.

mod buffer;
mod discord;
mod dispatch;
mod email;
mod format;
mod notifier;
mod ntfy;
mod overseerr;
mod sqlite;
mod store;
mod telegram;
mod types;

pub use buffer::{create_notification_buffer, BufferFlusher, NotificationBuffer};
pub use discord::DiscordNotifier;
pub use dispatch::{create_notifiers, Dispatcher, NotificationTarget};
pub use email::EmailNotifier;
pub use format::{dedup_events, format_batch, group_events, EventGroup};
pub use notifier::{send_with_retry, Notifier, NotifyError};
pub use ntfy::NtfyNotifier;
pub use overseerr::OverseerrTrigger;
pub use sqlite::SqliteNotificationStore;
pub use store::{NotificationError, NotificationFilter, NotificationStore};
pub use telegram::TelegramNotifier;
pub use types::{NewNotification, Notification, NotificationCategory, NotificationEvent};
