use std::path::Path;
use std::sync::Mutex;

use chrono::{TimeZone, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};

use super::{AuditError, AuditEvent, AuditPage, AuditQuery, AuditRecord, AuditStore, Page};

fn db_err(e: rusqlite::Error) -> AuditError {
    AuditError::Database(e.to_string())
}

fn json_err(e: serde_json::Error) -> AuditError {
    AuditError::Serialization(e.to_string())
}

/// SQLite-backed audit store
///
/// Timestamps are stored as epoch milliseconds. Move events also store their
/// source and destination queue so transitions can be filtered in SQL.
pub struct SqliteAuditStore {
    conn: Mutex<Connection>,
}

impl SqliteAuditStore {
    /// Open (or create) the audit table in the database at `path`
    pub fn new(path: &Path) -> Result<Self, AuditError> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite audit store (useful for testing)
    pub fn in_memory() -> Result<Self, AuditError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), AuditError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS audit_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                at_ms INTEGER NOT NULL,
                kind TEXT NOT NULL,
                item_id INTEGER,
                hash TEXT,
                from_state TEXT,
                to_state TEXT,
                data TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_audit_events_at ON audit_events(at_ms);
            CREATE INDEX IF NOT EXISTS idx_audit_events_item_id ON audit_events(item_id);
            CREATE INDEX IF NOT EXISTS idx_audit_events_hash ON audit_events(hash);
            CREATE INDEX IF NOT EXISTS idx_audit_events_transition
                ON audit_events(from_state, to_state);
            "#,
        )
        .map_err(db_err)
    }
}

/// WHERE clause and its positional parameters
#[derive(Default)]
struct Conditions {
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl Conditions {
    fn push(&mut self, clause: &str, value: Value) {
        self.clauses.push(clause.to_string());
        self.params.push(value);
    }

    fn from_query(query: &AuditQuery) -> Self {
        let mut c = Self::default();

        if let Some(item_id) = query.item_id {
            c.push("item_id = ?", Value::Integer(item_id));
        }
        if let Some(hash) = &query.hash {
            c.push("hash = ?", Value::Text(hash.to_lowercase()));
        }
        if !query.kinds.is_empty() {
            let marks = vec!["?"; query.kinds.len()].join(", ");
            c.clauses.push(format!("kind IN ({})", marks));
            c.params.extend(
                query
                    .kinds
                    .iter()
                    .map(|kind| Value::Text(kind.as_str().to_string())),
            );
        }
        if let Some(state) = query.from_state {
            c.push("from_state = ?", Value::Text(state.as_str().to_string()));
        }
        if let Some(state) = query.to_state {
            c.push("to_state = ?", Value::Text(state.as_str().to_string()));
        }
        if let Some(since) = query.since {
            c.push("at_ms >= ?", Value::Integer(since.timestamp_millis()));
        }
        if let Some(until) = query.until {
            c.push("at_ms <= ?", Value::Integer(until.timestamp_millis()));
        }

        c
    }

    fn sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

impl AuditStore for SqliteAuditStore {
    fn append(&self, records: &[AuditRecord]) -> Result<usize, AuditError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(db_err)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO audit_events (at_ms, kind, item_id, hash, from_state, to_state, data)
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                )
                .map_err(db_err)?;

            for record in records {
                let data = serde_json::to_string(&record.data).map_err(json_err)?;
                let (from, to) = match record.data.transition() {
                    Some((from, to)) => (Some(from.as_str()), Some(to.as_str())),
                    None => (None, None),
                };
                stmt.execute(params![
                    record.timestamp.timestamp_millis(),
                    record.kind.as_str(),
                    record.item_id,
                    record.hash.as_deref().map(str::to_lowercase),
                    from,
                    to,
                    data,
                ])
                .map_err(db_err)?;
            }
        }
        tx.commit().map_err(db_err)?;

        Ok(records.len())
    }

    fn query(&self, query: &AuditQuery, page: Page) -> Result<AuditPage, AuditError> {
        let conditions = Conditions::from_query(query);
        let where_sql = conditions.sql();
        let conn = self.conn.lock().unwrap();

        let total: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM audit_events{}", where_sql),
                params_from_iter(conditions.params.iter()),
                |row| row.get(0),
            )
            .map_err(db_err)?;

        let mut params = conditions.params;
        params.push(Value::Integer(i64::from(page.limit)));
        params.push(Value::Integer(i64::from(page.offset)));

        let mut stmt = conn
            .prepare(&format!(
                "SELECT id, at_ms, data FROM audit_events{} ORDER BY at_ms DESC, id DESC LIMIT ? OFFSET ?",
                where_sql
            ))
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(db_err)?;

        let mut records = Vec::new();
        for row in rows {
            let (id, at_ms, data) = row.map_err(db_err)?;
            let event: AuditEvent = serde_json::from_str(&data).map_err(json_err)?;
            let timestamp = Utc
                .timestamp_millis_opt(at_ms)
                .single()
                .ok_or_else(|| AuditError::Database(format!("Invalid timestamp: {}", at_ms)))?;
            records.push(AuditRecord {
                id,
                ..AuditRecord::new(timestamp, event)
            });
        }

        Ok(AuditPage {
            records,
            total: total as u64,
        })
    }
}
