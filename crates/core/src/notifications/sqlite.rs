use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::clock::{Clock, SystemClock};

use super::{
    NewNotification, Notification, NotificationError, NotificationFilter, NotificationStore,
};

/// SQLite-backed notification store.
pub struct SqliteNotificationStore {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
}

impl SqliteNotificationStore {
    pub fn new(path: &Path) -> Result<Self, NotificationError> {
        let conn =
            Connection::open(path).map_err(|e| NotificationError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            clock: Arc::new(SystemClock),
        })
    }

    pub fn in_memory() -> Result<Self, NotificationError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| NotificationError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            clock: Arc::new(SystemClock),
        })
    }

    /// Stamp rows with `clock` instead of the wall clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn initialize_schema(conn: &Connection) -> Result<(), NotificationError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS notifications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                message TEXT NOT NULL,
                notification_type TEXT NOT NULL,
                link TEXT,
                timestamp TEXT NOT NULL,
                is_read INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_notifications_timestamp ON notifications(timestamp);
            "#,
        )
        .map_err(|e| NotificationError::Database(e.to_string()))
    }

    fn row_to_raw(row: &rusqlite::Row) -> rusqlite::Result<(i64, String, String, String, Option<String>, String, bool)> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
        ))
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, NotificationError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| NotificationError::Timestamp(format!("{}: {}", value, e)))
}

impl NotificationStore for SqliteNotificationStore {
    fn insert(&self, notification: &NewNotification) -> Result<Notification, NotificationError> {
        let conn = self.conn.lock().unwrap();
        let timestamp = self.clock.now();
        conn.execute(
            "INSERT INTO notifications (title, message, notification_type, link, timestamp, is_read) \
             VALUES (?, ?, ?, ?, ?, 0)",
            params![
                notification.title,
                notification.message,
                notification.notification_type,
                notification.link,
                timestamp.to_rfc3339(),
            ],
        )
        .map_err(|e| NotificationError::Database(e.to_string()))?;

        Ok(Notification {
            id: conn.last_insert_rowid(),
            title: notification.title.clone(),
            message: notification.message.clone(),
            notification_type: notification.notification_type.clone(),
            link: notification.link.clone(),
            timestamp,
            is_read: false,
        })
    }

    fn list(&self, filter: &NotificationFilter) -> Result<Vec<Notification>, NotificationError> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT id, title, message, notification_type, link, timestamp, is_read \
             FROM notifications {} ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?",
            if filter.unread_only {
                "WHERE is_read = 0"
            } else {
                ""
            }
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| NotificationError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![filter.limit, filter.offset], Self::row_to_raw)
            .map_err(|e| NotificationError::Database(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| NotificationError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|(id, title, message, notification_type, link, timestamp, is_read)| {
                Ok(Notification {
                    id,
                    title,
                    message,
                    notification_type,
                    link,
                    timestamp: parse_timestamp(&timestamp)?,
                    is_read,
                })
            })
            .collect()
    }

    fn mark_read(&self, id: i64) -> Result<bool, NotificationError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute("UPDATE notifications SET is_read = 1 WHERE id = ?", params![id])
            .map_err(|e| NotificationError::Database(e.to_string()))?;
        Ok(changed > 0)
    }

    fn mark_all_read(&self) -> Result<usize, NotificationError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("UPDATE notifications SET is_read = 1 WHERE is_read = 0", [])
            .map_err(|e| NotificationError::Database(e.to_string()))
    }

    fn count_unread(&self) -> Result<i64, NotificationError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE is_read = 0",
            [],
            |row| row.get(0),
        )
        .map_err(|e| NotificationError::Database(e.to_string()))
    }
}
