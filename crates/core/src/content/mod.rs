//! Content sources: producers of wanted items.
//!
//! A source yields [`WantedEntry`] values; [`ingest_wanted`] turns each entry
//! into one `Wanted` media item per version, skipping items that already exist.

mod json_file;

pub use json_file::JsonFileSource;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::audit::{AuditEvent, AuditHandle};
use crate::config::{ContentSourceConfig, ContentSourceKind, VersionConfig};
use crate::media::{MediaError, MediaStore, MediaType, NewMediaItem};

#[derive(Debug, Error)]
pub enum ContentSourceError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse content source: {0}")]
    Parse(String),

    #[error("Content source misconfigured: {0}")]
    Config(String),

    #[error("Media store error: {0}")]
    Store(#[from] MediaError),
}

/// One wanted movie or episode as produced by a source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WantedEntry {
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub imdb_id: Option<String>,
    #[serde(default)]
    pub tmdb_id: Option<String>,
    #[serde(default, rename = "type")]
    pub media_type: Option<MediaType>,
    #[serde(default)]
    pub season_number: Option<u32>,
    #[serde(default)]
    pub episode_number: Option<u32>,
    #[serde(default)]
    pub release_date: Option<NaiveDate>,
    #[serde(default)]
    pub airtime: Option<NaiveTime>,
    #[serde(default)]
    pub physical_release_date: Option<NaiveDate>,
    #[serde(default)]
    pub original_title: Option<String>,
    #[serde(default)]
    pub is_anime: bool,
    /// Versions selected for this entry; empty means the source's defaults.
    #[serde(default)]
    pub versions: Vec<String>,
    #[serde(default)]
    pub content_source_detail: Option<String>,
}

/// A periodic producer of wanted entries.
#[async_trait]
pub trait ContentSource: Send + Sync {
    fn name(&self) -> &str;

    /// Versions applied to entries that do not name their own.
    fn default_versions(&self) -> &[String];

    fn check_period(&self) -> Duration;

    async fn fetch_wanted(&self) -> Result<Vec<WantedEntry>, ContentSourceError>;
}

/// Counts from one ingest pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub inserted: usize,
    pub skipped: usize,
}

/// Insert one `Wanted` item per (entry, version), skipping existing items.
pub async fn ingest_wanted(
    store: &dyn MediaStore,
    source: &str,
    default_versions: &[String],
    entries: &[WantedEntry],
    versions: &BTreeMap<String, VersionConfig>,
    audit: Option<&AuditHandle>,
) -> Result<IngestReport, ContentSourceError> {
    let mut report = IngestReport::default();

    for entry in entries {
        let selected = if entry.versions.is_empty() {
            default_versions
        } else {
            entry.versions.as_slice()
        };

        for version in selected {
            if !versions.contains_key(version) {
                warn!(source, title = %entry.title, version = %version, "Skipping unknown version");
                report.skipped += 1;
                continue;
            }

            let new_item = NewMediaItem {
                media_type: entry.media_type,
                title: entry.title.clone(),
                year: entry.year,
                imdb_id: entry.imdb_id.clone(),
                tmdb_id: entry.tmdb_id.clone(),
                season_number: entry.season_number,
                episode_number: entry.episode_number,
                release_date: entry.release_date,
                airtime: entry.airtime,
                physical_release_date: entry.physical_release_date,
                original_title: entry.original_title.clone(),
                is_anime: entry.is_anime,
                version: version.clone(),
                content_source: Some(source.to_string()),
                content_source_detail: entry.content_source_detail.clone(),
            };

            match store.insert(&new_item)? {
                Some(item) => {
                    debug!(item_id = item.id, label = %item.label(), version = %version, "Inserted wanted item");
                    report.inserted += 1;
                    if let Some(audit) = audit {
                        audit
                            .emit(AuditEvent::ItemWanted {
                                item_id: item.id,
                                title: item.label(),
                                version: version.clone(),
                                content_source: item.content_source.clone(),
                            })
                            .await;
                    }
                }
                None => report.skipped += 1,
            }
        }
    }

    if report.inserted > 0 {
        info!(source, inserted = report.inserted, skipped = report.skipped, "Ingested wanted items");
    }
    Ok(report)
}

/// Build the configured, enabled content sources.
pub fn create_content_sources(
    configs: &[ContentSourceConfig],
) -> Result<Vec<Arc<dyn ContentSource>>, ContentSourceError> {
    configs
        .iter()
        .filter(|c| c.enabled)
        .map(|c| match c.kind {
            ContentSourceKind::JsonFile => {
                JsonFileSource::from_config(c).map(|s| Arc::new(s) as Arc<dyn ContentSource>)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{ItemState, SqliteMediaStore};

    fn versions() -> BTreeMap<String, VersionConfig> {
        let mut versions = BTreeMap::new();
        versions.insert("1080p".to_string(), VersionConfig::default());
        versions.insert("2160p".to_string(), VersionConfig::default());
        versions
    }

    fn entry(title: &str, imdb: &str) -> WantedEntry {
        WantedEntry {
            title: title.to_string(),
            year: Some(2023),
            imdb_id: Some(imdb.to_string()),
            media_type: Some(MediaType::Movie),
            ..WantedEntry::default()
        }
    }

    #[tokio::test]
    async fn test_ingest_inserts_per_version_and_skips_existing() {
        let store = SqliteMediaStore::in_memory().unwrap();
        let defaults = vec!["1080p".to_string(), "2160p".to_string()];
        let entries = vec![entry("Movie", "tt1")];

        let report = ingest_wanted(&store, "list", &defaults, &entries, &versions(), None)
            .await
            .unwrap();
        assert_eq!(report, IngestReport { inserted: 2, skipped: 0 });

        let again = ingest_wanted(&store, "list", &defaults, &entries, &versions(), None)
            .await
            .unwrap();
        assert_eq!(again, IngestReport { inserted: 0, skipped: 2 });

        let items = store
            .list(&crate::media::MediaFilter::new().with_state(ItemState::Wanted))
            .unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.content_source.as_deref() == Some("list")));
    }

    #[tokio::test]
    async fn test_entry_versions_override_defaults_and_unknown_are_skipped() {
        let store = SqliteMediaStore::in_memory().unwrap();
        let mut wanted = entry("Movie", "tt1");
        wanted.versions = vec!["2160p".to_string(), "720p".to_string()];

        let report = ingest_wanted(
            &store,
            "list",
            &["1080p".to_string()],
            &[wanted],
            &versions(),
            None,
        )
        .await
        .unwrap();
        assert_eq!(report, IngestReport { inserted: 1, skipped: 1 });
        let items = store.list(&crate::media::MediaFilter::new()).unwrap();
        assert_eq!(items[0].version.as_deref(), Some("2160p"));
    }

    #[test]
    fn test_wanted_entry_deserializes_type_field() {
        let entry: WantedEntry = serde_json::from_str(
            r#"{"title":"Show","type":"episode","season_number":1,"episode_number":2,"release_date":"2024-01-05"}"#,
        )
        .unwrap();
        assert_eq!(entry.media_type, Some(MediaType::Episode));
        assert_eq!(entry.release_date, NaiveDate::from_ymd_opt(2024, 1, 5));
    }
}
