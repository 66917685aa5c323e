//! Notification types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::media::{MediaItem, MediaType};

/// One queue move worth telling someone about.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationEvent {
    pub item_id: i64,
    pub title: String,
    pub year: Option<i32>,
    pub media_type: MediaType,
    pub version: Option<String>,
    pub season_number: Option<u32>,
    pub episode_number: Option<u32>,
    /// State name the item moved into.
    pub new_state: String,
    /// Set when a collection replaced an earlier release.
    pub is_upgrade: bool,
    pub imdb_id: Option<String>,
    pub content_source: Option<String>,
}

impl NotificationEvent {
    pub fn from_item(item: &MediaItem, new_state: &str, is_upgrade: bool) -> Self {
        Self {
            item_id: item.id,
            title: item.title.clone(),
            year: item.year,
            media_type: item.media_type,
            version: item.version.clone(),
            season_number: item.season_number,
            episode_number: item.episode_number,
            new_state: new_state.to_string(),
            is_upgrade,
            imdb_id: item.imdb_id.clone(),
            content_source: item.content_source.clone(),
        }
    }

    /// State shown to users. An upgrade that lands in Collected reads "Upgraded".
    pub fn display_state(&self) -> &str {
        if self.is_upgrade && self.new_state == "Collected" {
            "Upgraded"
        } else {
            &self.new_state
        }
    }

    /// Key looked up in a target's `notify_on` map, e.g. "pending_uncached".
    pub fn notify_key(&self) -> String {
        self.display_state().to_lowercase().replace(' ', "_")
    }

    /// Identity used to drop repeats within one flush.
    pub fn dedup_key(&self) -> String {
        let mut key = format!(
            "{}|{:?}|{}|{}|{}|{}",
            self.title,
            self.year,
            self.media_type.as_str(),
            self.version.as_deref().unwrap_or(""),
            self.new_state,
            self.is_upgrade
        );
        if self.media_type == MediaType::Episode {
            key.push_str(&format!(
                "|{}|{}",
                self.season_number.unwrap_or(0),
                self.episode_number.unwrap_or(0)
            ));
        }
        key
    }

    pub fn link(&self) -> Option<String> {
        self.imdb_id
            .as_ref()
            .map(|id| format!("https://www.imdb.com/title/{}/", id))
    }

    /// Whether a target with this `notify_on` map wants the event.
    /// Collected, Upgraded and Blacklisted are on unless switched off.
    pub fn wanted_by(&self, notify_on: &std::collections::BTreeMap<String, bool>) -> bool {
        let key = self.notify_key();
        notify_on
            .get(&key)
            .copied()
            .unwrap_or(matches!(key.as_str(), "collected" | "upgraded" | "blacklisted"))
    }
}

/// Program-level messages with their own wording and switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    ProgramStart,
    ProgramStop,
    ProgramCrash,
    QueuePause,
    QueueResume,
    QueueStart,
    QueueStop,
    UpgradeFailed,
}

impl NotificationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProgramStart => "program_start",
            Self::ProgramStop => "program_stop",
            Self::ProgramCrash => "program_crash",
            Self::QueuePause => "queue_pause",
            Self::QueueResume => "queue_resume",
            Self::QueueStart => "queue_start",
            Self::QueueStop => "queue_stop",
            Self::UpgradeFailed => "upgrade_failed",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::ProgramStart => "Program started",
            Self::ProgramStop => "Program stopped",
            Self::ProgramCrash => "Program crashed",
            Self::QueuePause => "Queue paused",
            Self::QueueResume => "Queue resumed",
            Self::QueueStart => "Queue started",
            Self::QueueStop => "Queue stopped",
            Self::UpgradeFailed => "Upgrade failed",
        }
    }

    /// Message body for `detail`, e.g. a pause reason or a crash message.
    pub fn message(&self, detail: &str) -> String {
        let base = match self {
            Self::ProgramStart => "🟢 Program started",
            Self::ProgramStop => "🛑 Program stopped",
            Self::ProgramCrash => "💥 Program crashed",
            Self::QueuePause => "⏸️ Queue paused",
            Self::QueueResume => "▶️ Queue resumed",
            Self::QueueStart => "🚀 Queue started",
            Self::QueueStop => "⏹️ Queue stopped",
            Self::UpgradeFailed => "⚠️ Upgrade failed",
        };
        if detail.is_empty() {
            base.to_string()
        } else {
            format!("{}: {}", base, detail)
        }
    }
}

/// A persisted notification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: i64,
    pub title: String,
    pub message: String,
    pub notification_type: String,
    pub link: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub is_read: bool,
}

/// Insert payload for a notification.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    pub notification_type: String,
    pub link: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[test]
    fn test_upgrade_reads_as_upgraded() {
        let item = fixtures::movie(1, "The Movie", 2023);
        let event = NotificationEvent::from_item(&item, "Collected", true);
        assert_eq!(event.display_state(), "Upgraded");
        assert_eq!(event.notify_key(), "upgraded");

        let plain = NotificationEvent::from_item(&item, "Pending Uncached", false);
        assert_eq!(plain.notify_key(), "pending_uncached");
    }

    #[test]
    fn test_dedup_key_includes_episode_numbers() {
        let a = NotificationEvent::from_item(&fixtures::episode(1, "Show", 1, 1), "Collected", false);
        let b = NotificationEvent::from_item(&fixtures::episode(2, "Show", 1, 2), "Collected", false);
        assert_ne!(a.dedup_key(), b.dedup_key());

        let c = NotificationEvent::from_item(&fixtures::episode(3, "Show", 1, 1), "Collected", false);
        assert_eq!(a.dedup_key(), c.dedup_key());
    }

    #[test]
    fn test_notify_on_defaults() {
        let item = fixtures::movie(1, "The Movie", 2023);
        let mut notify_on = std::collections::BTreeMap::new();
        assert!(NotificationEvent::from_item(&item, "Collected", false).wanted_by(&notify_on));
        assert!(!NotificationEvent::from_item(&item, "Scraping", false).wanted_by(&notify_on));

        notify_on.insert("collected".to_string(), false);
        notify_on.insert("scraping".to_string(), true);
        assert!(!NotificationEvent::from_item(&item, "Collected", false).wanted_by(&notify_on));
        assert!(NotificationEvent::from_item(&item, "Scraping", false).wanted_by(&notify_on));
    }
}
