//! SQLite-backed media item store implementation.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::clock::{Clock, SystemClock};

use super::{ItemState, MediaError, MediaFilter, MediaItem, MediaStore, MediaType, NewMediaItem};

const SELECT_COLUMNS: &str = "id, media_type, title, year, imdb_id, tmdb_id, season_number, \
     episode_number, release_date, airtime, physical_release_date, original_title, is_anime, \
     version, state, filled_by_title, filled_by_file, filled_by_magnet, filled_by_torrent_id, \
     filled_by_score, original_scraped_torrent_title, upgrading_from, wake_count, collected_at, \
     original_collected_at, blacklisted_at, content_source, content_source_detail, created_at, \
     updated_at";

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

/// SQLite-backed media item store.
pub struct SqliteMediaStore {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
}

impl SqliteMediaStore {
    /// Create a new SQLite media store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, MediaError> {
        let conn = Connection::open(path).map_err(|e| MediaError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            clock: Arc::new(SystemClock),
        })
    }

    /// Create an in-memory SQLite media store (useful for testing).
    pub fn in_memory() -> Result<Self, MediaError> {
        let conn = Connection::open_in_memory().map_err(|e| MediaError::Database(e.to_string()))?;
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

    fn initialize_schema(conn: &Connection) -> Result<(), MediaError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS media_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                media_type TEXT NOT NULL,
                title TEXT NOT NULL,
                year INTEGER,
                imdb_id TEXT,
                tmdb_id TEXT,
                season_number INTEGER,
                episode_number INTEGER,
                release_date TEXT,
                airtime TEXT,
                physical_release_date TEXT,
                original_title TEXT,
                is_anime INTEGER NOT NULL DEFAULT 0,
                version TEXT,
                state TEXT NOT NULL,
                filled_by_title TEXT,
                filled_by_file TEXT,
                filled_by_magnet TEXT,
                filled_by_torrent_id TEXT,
                filled_by_score REAL,
                original_scraped_torrent_title TEXT,
                upgrading_from TEXT,
                wake_count INTEGER NOT NULL DEFAULT 0,
                collected_at TEXT,
                original_collected_at TEXT,
                content_source TEXT,
                content_source_detail TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_media_items_state ON media_items(state);
            CREATE INDEX IF NOT EXISTS idx_media_items_imdb_id ON media_items(imdb_id);
            CREATE INDEX IF NOT EXISTS idx_media_items_release_date ON media_items(release_date);

            CREATE TABLE IF NOT EXISTS not_wanted (
                item_id INTEGER NOT NULL,
                key TEXT NOT NULL,
                added_at TEXT NOT NULL,
                PRIMARY KEY (item_id, key)
            );
            "#,
        )
        .map_err(|e| MediaError::Database(e.to_string()))?;

        // Migration: add blacklisted_at column if it doesn't exist
        let _ = conn.execute("ALTER TABLE media_items ADD COLUMN blacklisted_at TEXT", []);

        Ok(())
    }

    fn build_where_clause(filter: &MediaFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(state) = filter.state {
            conditions.push("state = ?");
            params.push(Box::new(state.as_str()));
        }

        if let Some(media_type) = filter.media_type {
            conditions.push("media_type = ?");
            params.push(Box::new(media_type.as_str()));
        }

        if let Some(ref imdb_id) = filter.imdb_id {
            conditions.push("imdb_id = ?");
            params.push(Box::new(imdb_id.clone()));
        }

        if let Some(ref source) = filter.content_source {
            conditions.push("content_source = ?");
            params.push(Box::new(source.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<MediaItem> {
        let media_type: String = row.get(1)?;
        let state: String = row.get(14)?;

        Ok(MediaItem {
            id: row.get(0)?,
            media_type: MediaType::parse(&media_type).unwrap_or(MediaType::Movie),
            title: row.get(2)?,
            year: row.get(3)?,
            imdb_id: row.get(4)?,
            tmdb_id: row.get(5)?,
            season_number: row.get(6)?,
            episode_number: row.get(7)?,
            release_date: parse_date(row.get(8)?),
            airtime: parse_time(row.get(9)?),
            physical_release_date: parse_date(row.get(10)?),
            original_title: row.get(11)?,
            is_anime: row.get(12)?,
            version: row.get(13)?,
            state: ItemState::parse(&state).unwrap_or(ItemState::Wanted),
            filled_by_title: row.get(15)?,
            filled_by_file: row.get(16)?,
            filled_by_magnet: row.get(17)?,
            filled_by_torrent_id: row.get(18)?,
            filled_by_score: row.get(19)?,
            original_scraped_torrent_title: row.get(20)?,
            upgrading_from: row.get(21)?,
            wake_count: row.get(22)?,
            collected_at: parse_timestamp(row.get(23)?),
            original_collected_at: parse_timestamp(row.get(24)?),
            blacklisted_at: parse_timestamp(row.get(25)?),
            content_source: row.get(26)?,
            content_source_detail: row.get(27)?,
            created_at: parse_timestamp(row.get(28)?).unwrap_or_else(Utc::now),
            updated_at: parse_timestamp(row.get(29)?).unwrap_or_else(Utc::now),
        })
    }

    fn get_with_conn(conn: &Connection, id: i64) -> Result<Option<MediaItem>, MediaError> {
        conn.query_row(
            &format!("SELECT {} FROM media_items WHERE id = ?", SELECT_COLUMNS),
            params![id],
            Self::row_to_item,
        )
        .optional()
        .map_err(|e| MediaError::Database(e.to_string()))
    }
}

fn parse_date(value: Option<String>) -> Option<NaiveDate> {
    value.and_then(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).ok())
}

fn parse_time(value: Option<String>) -> Option<NaiveTime> {
    value.and_then(|s| NaiveTime::parse_from_str(&s, TIME_FORMAT).ok())
}

fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

fn format_date(value: Option<NaiveDate>) -> Option<String> {
    value.map(|d| d.format(DATE_FORMAT).to_string())
}

fn format_time(value: Option<NaiveTime>) -> Option<String> {
    value.map(|t| t.format(TIME_FORMAT).to_string())
}

fn format_timestamp(value: Option<DateTime<Utc>>) -> Option<String> {
    value.map(|t| t.to_rfc3339())
}

impl MediaStore for SqliteMediaStore {
    fn insert(&self, item: &NewMediaItem) -> Result<Option<MediaItem>, MediaError> {
        let conn = self.conn.lock().unwrap();

        let media_type = item.media_type.unwrap_or(if item.episode_number.is_some() {
            MediaType::Episode
        } else {
            MediaType::Movie
        });

        let existing: Option<i64> = conn
            .query_row(
                r#"
                SELECT id FROM media_items
                WHERE media_type = ?1 AND version = ?2
                  AND IFNULL(season_number, -1) = IFNULL(?3, -1)
                  AND IFNULL(episode_number, -1) = IFNULL(?4, -1)
                  AND (
                    (?5 IS NOT NULL AND imdb_id = ?5)
                    OR (?5 IS NULL AND ?6 IS NOT NULL AND tmdb_id = ?6)
                    OR (?5 IS NULL AND ?6 IS NULL AND title = ?7 AND IFNULL(year, -1) = IFNULL(?8, -1))
                  )
                LIMIT 1
                "#,
                params![
                    media_type.as_str(),
                    item.version,
                    item.season_number,
                    item.episode_number,
                    item.imdb_id,
                    item.tmdb_id,
                    item.title,
                    item.year,
                ],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| MediaError::Database(e.to_string()))?;

        if existing.is_some() {
            return Ok(None);
        }

        let now = self.clock.now().to_rfc3339();
        conn.execute(
            r#"
            INSERT INTO media_items (
                media_type, title, year, imdb_id, tmdb_id, season_number, episode_number,
                release_date, airtime, physical_release_date, original_title, is_anime,
                version, state, wake_count, content_source, content_source_detail,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?)
            "#,
            params![
                media_type.as_str(),
                item.title,
                item.year,
                item.imdb_id,
                item.tmdb_id,
                item.season_number,
                item.episode_number,
                format_date(item.release_date),
                format_time(item.airtime),
                format_date(item.physical_release_date),
                item.original_title,
                item.is_anime,
                item.version,
                ItemState::Wanted.as_str(),
                item.content_source,
                item.content_source_detail,
                now,
                now,
            ],
        )
        .map_err(|e| MediaError::Database(e.to_string()))?;

        let id = conn.last_insert_rowid();
        Self::get_with_conn(&conn, id)
    }

    fn get(&self, id: i64) -> Result<Option<MediaItem>, MediaError> {
        let conn = self.conn.lock().unwrap();
        Self::get_with_conn(&conn, id)
    }

    fn list(&self, filter: &MediaFilter) -> Result<Vec<MediaItem>, MediaError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!(
            "SELECT {} FROM media_items {} ORDER BY release_date IS NULL, release_date ASC, id ASC LIMIT ? OFFSET ?",
            SELECT_COLUMNS, where_clause
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| MediaError::Database(e.to_string()))?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_item)
            .map_err(|e| MediaError::Database(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| MediaError::Database(e.to_string()))
    }

    fn count(&self, filter: &MediaFilter) -> Result<i64, MediaError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM media_items {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(|e| MediaError::Database(e.to_string()))
    }

    fn update(&self, item: &MediaItem) -> Result<MediaItem, MediaError> {
        let conn = self.conn.lock().unwrap();

        let changed = conn
            .execute(
                r#"
                UPDATE media_items SET
                    title = ?, year = ?, imdb_id = ?, tmdb_id = ?, season_number = ?,
                    episode_number = ?, release_date = ?, airtime = ?, physical_release_date = ?,
                    original_title = ?, is_anime = ?, version = ?, state = ?,
                    filled_by_title = ?, filled_by_file = ?, filled_by_magnet = ?,
                    filled_by_torrent_id = ?, filled_by_score = ?,
                    original_scraped_torrent_title = ?, upgrading_from = ?, wake_count = ?,
                    collected_at = ?, original_collected_at = ?, blacklisted_at = ?,
                    content_source = ?, content_source_detail = ?, updated_at = ?
                WHERE id = ?
                "#,
                params![
                    item.title,
                    item.year,
                    item.imdb_id,
                    item.tmdb_id,
                    item.season_number,
                    item.episode_number,
                    format_date(item.release_date),
                    format_time(item.airtime),
                    format_date(item.physical_release_date),
                    item.original_title,
                    item.is_anime,
                    item.version,
                    item.state.as_str(),
                    item.filled_by_title,
                    item.filled_by_file,
                    item.filled_by_magnet,
                    item.filled_by_torrent_id,
                    item.filled_by_score,
                    item.original_scraped_torrent_title,
                    item.upgrading_from,
                    item.wake_count,
                    format_timestamp(item.collected_at),
                    format_timestamp(item.original_collected_at),
                    format_timestamp(item.blacklisted_at),
                    item.content_source,
                    item.content_source_detail,
                    self.clock.now().to_rfc3339(),
                    item.id,
                ],
            )
            .map_err(|e| MediaError::Database(e.to_string()))?;

        if changed == 0 {
            return Err(MediaError::NotFound(item.id));
        }

        Self::get_with_conn(&conn, item.id)?.ok_or(MediaError::NotFound(item.id))
    }

    fn count_by_state(&self) -> Result<BTreeMap<String, i64>, MediaError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare("SELECT state, COUNT(*) FROM media_items GROUP BY state")
            .map_err(|e| MediaError::Database(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(|e| MediaError::Database(e.to_string()))?;

        rows.collect::<Result<BTreeMap<_, _>, _>>()
            .map_err(|e| MediaError::Database(e.to_string()))
    }

    fn add_not_wanted(&self, item_id: i64, key: &str) -> Result<(), MediaError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO not_wanted (item_id, key, added_at) VALUES (?, ?, ?)",
            params![item_id, key, self.clock.now().to_rfc3339()],
        )
        .map_err(|e| MediaError::Database(e.to_string()))?;
        Ok(())
    }

    fn is_not_wanted(&self, item_id: i64, key: &str) -> Result<bool, MediaError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM not_wanted WHERE item_id = ? AND key = ?",
                params![item_id, key],
                |row| row.get(0),
            )
            .map_err(|e| MediaError::Database(e.to_string()))?;
        Ok(count > 0)
    }

    fn not_wanted(&self, item_id: i64) -> Result<HashSet<String>, MediaError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT key FROM not_wanted WHERE item_id = ?")
            .map_err(|e| MediaError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![item_id], |row| row.get::<_, String>(0))
            .map_err(|e| MediaError::Database(e.to_string()))?;
        rows.collect::<Result<HashSet<_>, _>>()
            .map_err(|e| MediaError::Database(e.to_string()))
    }

    fn has_collected_file(&self, imdb_id: &str, filenames: &[String]) -> Result<bool, MediaError> {
        if filenames.is_empty() {
            return Ok(false);
        }

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT filled_by_file FROM media_items \
                 WHERE imdb_id = ? AND state IN ('Collected', 'Upgrading') AND filled_by_file IS NOT NULL",
            )
            .map_err(|e| MediaError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![imdb_id], |row| row.get::<_, String>(0))
            .map_err(|e| MediaError::Database(e.to_string()))?;

        for row in rows {
            let file = row.map_err(|e| MediaError::Database(e.to_string()))?;
            if filenames.iter().any(|name| file_names_match(name, &file)) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Compare two paths by their final component.
fn file_names_match(a: &str, b: &str) -> bool {
    let base = |s: &str| s.rsplit('/').next().unwrap_or(s).to_string();
    base(a) == base(b)
}
