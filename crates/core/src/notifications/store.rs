use thiserror::Error;

use super::{NewNotification, Notification};

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid timestamp: {0}")]
    Timestamp(String),
}

/// Filter for listing notifications.
#[derive(Debug, Clone)]
pub struct NotificationFilter {
    pub unread_only: bool,
    pub limit: i64,
    pub offset: i64,
}

impl NotificationFilter {
    pub fn new() -> Self {
        Self {
            unread_only: false,
            limit: 100,
            offset: 0,
        }
    }

    pub fn unread_only(mut self) -> Self {
        self.unread_only = true;
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

impl Default for NotificationFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Persistent inbox of notifications shown by the API.
pub trait NotificationStore: Send + Sync {
    fn insert(&self, notification: &NewNotification) -> Result<Notification, NotificationError>;

    /// Newest first.
    fn list(&self, filter: &NotificationFilter) -> Result<Vec<Notification>, NotificationError>;

    /// Returns false if no notification has this id.
    fn mark_read(&self, id: i64) -> Result<bool, NotificationError>;

    /// Returns the number of notifications changed.
    fn mark_all_read(&self) -> Result<usize, NotificationError>;

    fn count_unread(&self) -> Result<i64, NotificationError>;
}
