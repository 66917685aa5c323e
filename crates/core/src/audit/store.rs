use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::media::ItemState;

use super::{AuditKind, AuditRecord};

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// What to look for in the audit log. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditQuery {
    pub item_id: Option<i64>,
    /// Torrent info hash, matched case-insensitively
    pub hash: Option<String>,
    /// Match any of these kinds; empty matches all
    pub kinds: Vec<AuditKind>,
    /// Queue a move left. Only move events match.
    pub from_state: Option<ItemState>,
    /// Queue a move entered. Only move events match.
    pub to_state: Option<ItemState>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl AuditQuery {
    /// Everything recorded about one item.
    pub fn item(item_id: i64) -> Self {
        Self {
            item_id: Some(item_id),
            ..Default::default()
        }
    }

    /// Everything recorded about one torrent.
    pub fn torrent(hash: &str) -> Self {
        Self {
            hash: Some(hash.to_lowercase()),
            ..Default::default()
        }
    }

    /// Committed moves along one edge of the queue graph. Either end may be open.
    pub fn moves(from: Option<ItemState>, to: Option<ItemState>) -> Self {
        Self {
            kinds: vec![AuditKind::MoveCompleted],
            from_state: from,
            to_state: to,
            ..Default::default()
        }
    }

    pub fn of_kind(mut self, kind: AuditKind) -> Self {
        self.kinds.push(kind);
        self
    }
}

/// Window into a result set ordered newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    pub const DEFAULT_LIMIT: u32 = 100;
    pub const MAX_LIMIT: u32 = 1000;

    /// Limit is clamped to `1..=MAX_LIMIT`.
    pub fn new(limit: u32, offset: u32) -> Self {
        Self {
            limit: limit.clamp(1, Self::MAX_LIMIT),
            offset,
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LIMIT, 0)
    }
}

/// One page of matching records and the number of matches overall.
#[derive(Debug, Clone, Serialize)]
pub struct AuditPage {
    pub records: Vec<AuditRecord>,
    pub total: u64,
}

/// Trait for audit event storage
pub trait AuditStore: Send + Sync {
    /// Append records atomically. Returns the number written.
    fn append(&self, records: &[AuditRecord]) -> Result<usize, AuditError>;

    /// Matching records, newest first, with the total match count.
    fn query(&self, query: &AuditQuery, page: Page) -> Result<AuditPage, AuditError>;
}
