use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::media::ItemState;

/// Audit event types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    // System events
    ServiceStarted {
        version: String,
        config_hash: String,
    },
    ServiceStopped {
        reason: String,
    },

    // Item lifecycle
    /// A content source inserted a new wanted item.
    ItemWanted {
        item_id: i64,
        title: String,
        version: String,
        content_source: Option<String>,
    },
    /// A queue move has started.
    MoveInitiated {
        item_id: i64,
        from_state: ItemState,
        to_state: ItemState,
    },
    /// A queue move has been committed.
    MoveCompleted {
        item_id: i64,
        from_state: ItemState,
        to_state: ItemState,
        /// Time the item spent in the source queue, if it was tracked
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seconds_in_source: Option<f64>,
    },
    /// An upgrade candidate replaced the collected release.
    UpgradeStarted {
        item_id: i64,
        from_torrent_id: Option<String>,
        old_score: f64,
        new_score: f64,
    },

    // Debrid events
    TorrentAdded {
        /// Item that caused the addition, if any
        item_id: Option<i64>,
        /// Info hash of the added torrent
        hash: String,
        /// Provider torrent id
        torrent_id: String,
        /// Release title (if known)
        title: Option<String>,
        /// Tracking trigger source, e.g. "queue_add"
        trigger_source: String,
    },
    TorrentRemoved {
        item_id: Option<i64>,
        hash: Option<String>,
        torrent_id: String,
        reason: String,
    },

    // Program control
    QueuePaused {
        reason: String,
    },
    QueueResumed {
        reason: String,
    },
}

/// Discriminant of an [`AuditEvent`], used for storage and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    ServiceStarted,
    ServiceStopped,
    ItemWanted,
    MoveInitiated,
    MoveCompleted,
    UpgradeStarted,
    TorrentAdded,
    TorrentRemoved,
    QueuePaused,
    QueueResumed,
}

impl AuditKind {
    pub const ALL: [AuditKind; 10] = [
        AuditKind::ServiceStarted,
        AuditKind::ServiceStopped,
        AuditKind::ItemWanted,
        AuditKind::MoveInitiated,
        AuditKind::MoveCompleted,
        AuditKind::UpgradeStarted,
        AuditKind::TorrentAdded,
        AuditKind::TorrentRemoved,
        AuditKind::QueuePaused,
        AuditKind::QueueResumed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::ServiceStarted => "service_started",
            AuditKind::ServiceStopped => "service_stopped",
            AuditKind::ItemWanted => "item_wanted",
            AuditKind::MoveInitiated => "move_initiated",
            AuditKind::MoveCompleted => "move_completed",
            AuditKind::UpgradeStarted => "upgrade_started",
            AuditKind::TorrentAdded => "torrent_added",
            AuditKind::TorrentRemoved => "torrent_removed",
            AuditKind::QueuePaused => "queue_paused",
            AuditKind::QueueResumed => "queue_resumed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }

    /// Kinds that record a queue move and carry a state transition.
    pub fn is_move(&self) -> bool {
        matches!(self, AuditKind::MoveInitiated | AuditKind::MoveCompleted)
    }
}

impl std::fmt::Display for AuditKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AuditEvent {
    pub fn kind(&self) -> AuditKind {
        match self {
            Self::ServiceStarted { .. } => AuditKind::ServiceStarted,
            Self::ServiceStopped { .. } => AuditKind::ServiceStopped,
            Self::ItemWanted { .. } => AuditKind::ItemWanted,
            Self::MoveInitiated { .. } => AuditKind::MoveInitiated,
            Self::MoveCompleted { .. } => AuditKind::MoveCompleted,
            Self::UpgradeStarted { .. } => AuditKind::UpgradeStarted,
            Self::TorrentAdded { .. } => AuditKind::TorrentAdded,
            Self::TorrentRemoved { .. } => AuditKind::TorrentRemoved,
            Self::QueuePaused { .. } => AuditKind::QueuePaused,
            Self::QueueResumed { .. } => AuditKind::QueueResumed,
        }
    }

    /// Extract item_id if this event concerns a media item
    pub fn item_id(&self) -> Option<i64> {
        match self {
            Self::ItemWanted { item_id, .. }
            | Self::MoveInitiated { item_id, .. }
            | Self::MoveCompleted { item_id, .. }
            | Self::UpgradeStarted { item_id, .. } => Some(*item_id),
            Self::TorrentAdded { item_id, .. } | Self::TorrentRemoved { item_id, .. } => *item_id,
            _ => None,
        }
    }

    /// Extract the torrent hash if the event carries one
    pub fn hash(&self) -> Option<&str> {
        match self {
            Self::TorrentAdded { hash, .. } => Some(hash),
            Self::TorrentRemoved { hash, .. } => hash.as_deref(),
            _ => None,
        }
    }

    /// Source and destination queue of a move event.
    pub fn transition(&self) -> Option<(ItemState, ItemState)> {
        match self {
            Self::MoveInitiated {
                from_state,
                to_state,
                ..
            }
            | Self::MoveCompleted {
                from_state,
                to_state,
                ..
            } => Some((*from_state, *to_state)),
            _ => None,
        }
    }
}

/// A stored audit event. `kind`, `item_id` and `hash` are derived from `data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub kind: AuditKind,
    pub item_id: Option<i64>,
    pub hash: Option<String>,
    pub data: AuditEvent,
}

impl AuditRecord {
    /// An unsaved record for `event`. The store assigns the id.
    pub fn new(timestamp: DateTime<Utc>, event: AuditEvent) -> Self {
        Self {
            id: 0,
            timestamp,
            kind: event.kind(),
            item_id: event.item_id(),
            hash: event.hash().map(str::to_lowercase),
            data: event,
        }
    }
}
