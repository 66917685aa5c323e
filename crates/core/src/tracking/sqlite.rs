use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use crate::clock::{Clock, SystemClock};

use super::types::merge_json;
use super::{NewTorrentAddition, TorrentAddition, TrackingError, TrackingPatch, TrackingStore};

const SELECT_COLUMNS: &str = "id, torrent_hash, timestamp, trigger_source, trigger_details, \
     rationale, item_data, is_still_present, removal_reason, removal_timestamp, additional_metadata";

/// SQLite-backed torrent tracking store.
pub struct SqliteTrackingStore {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
}

impl SqliteTrackingStore {
    pub fn new(path: &Path) -> Result<Self, TrackingError> {
        let conn = Connection::open(path).map_err(|e| TrackingError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            clock: Arc::new(SystemClock),
        })
    }

    pub fn in_memory() -> Result<Self, TrackingError> {
        let conn =
            Connection::open_in_memory().map_err(|e| TrackingError::Database(e.to_string()))?;
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

    fn initialize_schema(conn: &Connection) -> Result<(), TrackingError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS torrent_additions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                torrent_hash TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                trigger_source TEXT NOT NULL,
                trigger_details TEXT NOT NULL DEFAULT '{}',
                rationale TEXT NOT NULL,
                item_data TEXT NOT NULL DEFAULT '{}',
                is_still_present INTEGER NOT NULL DEFAULT 1,
                removal_reason TEXT,
                removal_timestamp TEXT,
                additional_metadata TEXT NOT NULL DEFAULT '{}'
            );

            CREATE INDEX IF NOT EXISTS idx_torrent_additions_hash ON torrent_additions(torrent_hash);
            CREATE INDEX IF NOT EXISTS idx_torrent_additions_timestamp ON torrent_additions(timestamp);
            CREATE INDEX IF NOT EXISTS idx_torrent_additions_trigger ON torrent_additions(trigger_source);
            "#,
        )
        .map_err(|e| TrackingError::Database(e.to_string()))
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<RawRecord> {
        Ok(RawRecord {
            id: row.get(0)?,
            torrent_hash: row.get(1)?,
            timestamp: row.get(2)?,
            trigger_source: row.get(3)?,
            trigger_details: row.get(4)?,
            rationale: row.get(5)?,
            item_data: row.get(6)?,
            is_still_present: row.get(7)?,
            removal_reason: row.get(8)?,
            removal_timestamp: row.get(9)?,
            additional_metadata: row.get(10)?,
        })
    }

    fn latest_with_conn(conn: &Connection, hash: &str) -> Result<Option<TorrentAddition>, TrackingError> {
        let raw = conn
            .query_row(
                &format!(
                    "SELECT {} FROM torrent_additions WHERE torrent_hash = ? ORDER BY timestamp DESC, id DESC LIMIT 1",
                    SELECT_COLUMNS
                ),
                params![hash],
                Self::row_to_record,
            )
            .optional()
            .map_err(|e| TrackingError::Database(e.to_string()))?;
        raw.map(RawRecord::into_record).transpose()
    }
}

/// Row as stored, before JSON and timestamp decoding.
struct RawRecord {
    id: i64,
    torrent_hash: String,
    timestamp: String,
    trigger_source: String,
    trigger_details: String,
    rationale: String,
    item_data: String,
    is_still_present: bool,
    removal_reason: Option<String>,
    removal_timestamp: Option<String>,
    additional_metadata: String,
}

impl RawRecord {
    fn into_record(self) -> Result<TorrentAddition, TrackingError> {
        Ok(TorrentAddition {
            id: self.id,
            torrent_hash: self.torrent_hash,
            timestamp: parse_timestamp(&self.timestamp)?,
            trigger_source: self.trigger_source,
            trigger_details: parse_json(&self.trigger_details)?,
            rationale: self.rationale,
            item_data: parse_json(&self.item_data)?,
            is_still_present: self.is_still_present,
            removal_reason: self.removal_reason,
            removal_timestamp: self
                .removal_timestamp
                .as_deref()
                .map(parse_timestamp)
                .transpose()?,
            additional_metadata: parse_json(&self.additional_metadata)?,
        })
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, TrackingError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| TrackingError::Database(format!("Invalid timestamp: {}", e)))
}

fn parse_json(s: &str) -> Result<Value, TrackingError> {
    serde_json::from_str(s).map_err(|e| TrackingError::Serialization(e.to_string()))
}

fn to_json(value: &Value) -> Result<String, TrackingError> {
    serde_json::to_string(value).map_err(|e| TrackingError::Serialization(e.to_string()))
}

impl TrackingStore for SqliteTrackingStore {
    fn record_addition(&self, addition: &NewTorrentAddition) -> Result<i64, TrackingError> {
        let hash = addition.torrent_hash.to_lowercase();
        if addition.rationale.trim().is_empty() {
            return Err(TrackingError::MissingRationale(hash));
        }

        let empty = Value::Object(Default::default());
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO torrent_additions (
                torrent_hash, timestamp, trigger_source, trigger_details, rationale,
                item_data, is_still_present, additional_metadata
            ) VALUES (?, ?, ?, ?, ?, ?, 1, ?)
            "#,
            params![
                hash,
                self.clock.now().to_rfc3339(),
                addition.trigger_source,
                to_json(addition.trigger_details.as_ref().unwrap_or(&empty))?,
                addition.rationale,
                to_json(&addition.item_data)?,
                to_json(addition.additional_metadata.as_ref().unwrap_or(&empty))?,
            ],
        )
        .map_err(|e| TrackingError::Database(e.to_string()))?;

        let id = conn.last_insert_rowid();
        tracing::debug!(hash = %hash, id, trigger = %addition.trigger_source, "Recorded torrent addition");
        Ok(id)
    }

    fn update_tracking(&self, hash: &str, patch: &TrackingPatch) -> Result<bool, TrackingError> {
        let hash = hash.to_lowercase();
        let conn = self.conn.lock().unwrap();

        let Some(mut record) = Self::latest_with_conn(&conn, &hash)? else {
            return Ok(false);
        };
        if patch.is_empty() {
            return Ok(true);
        }

        if let Some(ref item) = patch.item_data {
            merge_json(&mut record.item_data, item.clone());
        }
        if let Some(ref details) = patch.trigger_details {
            merge_json(&mut record.trigger_details, details.clone());
        }
        if let Some(ref metadata) = patch.additional_metadata {
            merge_json(&mut record.additional_metadata, metadata.clone());
        }
        if let Some(ref source) = patch.trigger_source {
            record.trigger_source = source.clone();
        }
        if let Some(ref rationale) = patch.rationale {
            if !rationale.trim().is_empty() {
                record.rationale = rationale.clone();
            }
        }

        conn.execute(
            r#"
            UPDATE torrent_additions SET
                trigger_source = ?, trigger_details = ?, rationale = ?,
                item_data = ?, additional_metadata = ?
            WHERE id = ?
            "#,
            params![
                record.trigger_source,
                to_json(&record.trigger_details)?,
                record.rationale,
                to_json(&record.item_data)?,
                to_json(&record.additional_metadata)?,
                record.id,
            ],
        )
        .map_err(|e| TrackingError::Database(e.to_string()))?;

        Ok(true)
    }

    fn mark_removed(&self, hash: &str, reason: &str) -> Result<bool, TrackingError> {
        let hash = hash.to_lowercase();
        let conn = self.conn.lock().unwrap();

        let changed = conn
            .execute(
                r#"
                UPDATE torrent_additions
                SET is_still_present = 0, removal_reason = ?, removal_timestamp = ?
                WHERE id = (
                    SELECT id FROM torrent_additions
                    WHERE torrent_hash = ? AND is_still_present = 1
                    ORDER BY timestamp DESC, id DESC LIMIT 1
                )
                "#,
                params![reason, self.clock.now().to_rfc3339(), hash],
            )
            .map_err(|e| TrackingError::Database(e.to_string()))?;

        if changed > 0 {
            tracing::debug!(hash = %hash, reason, "Marked torrent removed");
        }
        Ok(changed > 0)
    }

    fn latest(&self, hash: &str) -> Result<Option<TorrentAddition>, TrackingError> {
        let conn = self.conn.lock().unwrap();
        Self::latest_with_conn(&conn, &hash.to_lowercase())
    }

    fn get_history(&self, hash: &str) -> Result<Vec<TorrentAddition>, TrackingError> {
        let hash = hash.to_lowercase();
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM torrent_additions WHERE torrent_hash = ? ORDER BY timestamp DESC, id DESC",
                SELECT_COLUMNS
            ))
            .map_err(|e| TrackingError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![hash], Self::row_to_record)
            .map_err(|e| TrackingError::Database(e.to_string()))?;

        let mut records = Vec::new();
        for row in rows {
            let raw = row.map_err(|e| TrackingError::Database(e.to_string()))?;
            records.push(raw.into_record()?);
        }
        Ok(records)
    }

    fn present_hashes(&self) -> Result<Vec<String>, TrackingError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT DISTINCT torrent_hash FROM torrent_additions WHERE is_still_present = 1 ORDER BY torrent_hash",
            )
            .map_err(|e| TrackingError::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| TrackingError::Database(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| TrackingError::Database(e.to_string()))
    }
}
