//! Periodic maintenance tasks run by the scheduler alongside the queues.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::audit::AuditHandle;
use crate::content::{ingest_wanted, ContentSource, IngestReport};
use crate::debrid::extract_hash;
use crate::media::{ItemState, MediaFilter};
use crate::queues::{QueueManager, REASON_MISSING_FROM_ACCOUNT};

use super::SchedulerError;

/// Mark tracking records removed for Collected items whose torrent is gone
/// from the debrid account. Returns how many records were marked.
pub async fn check_drift(manager: &QueueManager) -> Result<usize, SchedulerError> {
    let collected = manager
        .media()
        .list(&MediaFilter::new().with_state(ItemState::Collected).unlimited())?;

    let mut seen = HashSet::new();
    let mut marked = 0;
    for item in collected {
        let Some(hash) = item.filled_by_magnet.as_deref().and_then(extract_hash) else {
            continue;
        };
        if !seen.insert(hash.clone()) {
            continue;
        }
        if manager.provider().verify_present(&hash).await? {
            continue;
        }
        if manager.tracking().mark_removed(&hash, REASON_MISSING_FROM_ACCOUNT)? {
            warn!(item = %item.label(), hash = %hash, "Collected torrent missing from debrid account");
            marked += 1;
        }
    }
    if marked > 0 {
        info!(marked, "Drift check marked torrents removed");
    }
    Ok(marked)
}

/// Contents of `library_size_cache.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibrarySizeCache {
    pub size_str: String,
    /// Unix seconds.
    pub timestamp: f64,
}

/// Human-readable byte count using binary units.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}

/// Sum active torrent sizes on the account and persist them.
pub async fn update_library_size(
    manager: &QueueManager,
    path: &Path,
) -> Result<LibrarySizeCache, SchedulerError> {
    let active = manager.provider().list_active().await?;
    let total: u64 = active.iter().map(|t| t.bytes).sum();
    let now = manager.now();
    let cache = LibrarySizeCache {
        size_str: format_size(total),
        timestamp: now.timestamp() as f64 + f64::from(now.timestamp_subsec_millis()) / 1000.0,
    };
    write_json(path, &cache)?;
    debug!(size = %cache.size_str, torrents = active.len(), "Updated library size");
    Ok(cache)
}

/// Read a previously saved library size, if any.
pub fn load_library_size(path: &Path) -> Result<Option<LibrarySizeCache>, SchedulerError> {
    match std::fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| persist_error(path, e)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(persist_error(path, e)),
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), SchedulerError> {
    let json = serde_json::to_string(value).map_err(|e| persist_error(path, e))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| persist_error(path, e))?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(|e| persist_error(path, e))?;
    std::fs::rename(&tmp, path).map_err(|e| persist_error(path, e))
}

fn persist_error(path: &Path, e: impl std::fmt::Display) -> SchedulerError {
    SchedulerError::Persist {
        path: PathBuf::from(path),
        message: e.to_string(),
    }
}

/// Polls each content source on its own check period.
pub struct SourcePoller {
    sources: Vec<Arc<dyn ContentSource>>,
    last_polled: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl SourcePoller {
    pub fn new(sources: Vec<Arc<dyn ContentSource>>) -> Self {
        Self {
            sources,
            last_polled: Mutex::new(HashMap::new()),
        }
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    fn is_due(&self, source: &dyn ContentSource, now: DateTime<Utc>) -> bool {
        let Ok(last) = self.last_polled.lock() else {
            return false;
        };
        match last.get(source.name()) {
            None => true,
            Some(at) => {
                let period = chrono::Duration::from_std(source.check_period())
                    .unwrap_or(chrono::Duration::MAX);
                now - *at >= period
            }
        }
    }

    /// Fetch and ingest every source whose period elapsed. A failing source
    /// is logged and retried on its next period.
    pub async fn poll_due(
        &self,
        manager: &QueueManager,
        audit: Option<&AuditHandle>,
    ) -> IngestReport {
        let mut total = IngestReport::default();
        for source in &self.sources {
            let now = manager.now();
            if !self.is_due(source.as_ref(), now) {
                continue;
            }
            if let Ok(mut last) = self.last_polled.lock() {
                last.insert(source.name().to_string(), now);
            }

            let entries = match source.fetch_wanted().await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(source = source.name(), error = %e, "Content source fetch failed");
                    continue;
                }
            };
            match ingest_wanted(
                manager.media().as_ref(),
                source.name(),
                source.default_versions(),
                &entries,
                &manager.config().versions,
                audit,
            )
            .await
            {
                Ok(report) => {
                    if report.inserted > 0 {
                        info!(
                            source = source.name(),
                            inserted = report.inserted,
                            skipped = report.skipped,
                            "Ingested wanted items"
                        );
                    }
                    total.inserted += report.inserted;
                    total.skipped += report.skipped;
                }
                Err(e) => warn!(source = source.name(), error = %e, "Content source ingest failed"),
            }
        }
        total
    }
}
