//! Per-item queue timing, persisted as `queue_timing_data.json`.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::QueueError;

const RETENTION_DAYS: i64 = 30;

/// Aggregate time spent in one queue, in seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueStat {
    pub count: u64,
    pub total_time: f64,
    pub min_time: f64,
    pub max_time: f64,
}

/// Entry/exit timestamps per item and queue.
///
/// Timestamps are Unix seconds. An exit of `None` means the item is still
/// in that queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueTiming {
    pub queue_times: BTreeMap<String, BTreeMap<String, (f64, Option<f64>)>>,
    pub queue_stats: BTreeMap<String, QueueStat>,
}

fn seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_millis() as f64 / 1000.0
}

impl QueueTiming {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self, item_id: i64, queue: &str, at: DateTime<Utc>) {
        self.queue_times
            .entry(item_id.to_string())
            .or_default()
            .insert(queue.to_string(), (seconds(at), None));
    }

    /// Close the open entry and fold it into the queue's stats.
    /// Returns the seconds spent, if the entry was tracked.
    pub fn exit(&mut self, item_id: i64, queue: &str, at: DateTime<Utc>) -> Option<f64> {
        let entry = self
            .queue_times
            .get_mut(&item_id.to_string())?
            .get_mut(queue)?;
        if entry.1.is_some() {
            return None;
        }
        let exit = seconds(at);
        entry.1 = Some(exit);
        let elapsed = (exit - entry.0).max(0.0);

        let stat = self.queue_stats.entry(queue.to_string()).or_default();
        if stat.count == 0 {
            stat.min_time = elapsed;
            stat.max_time = elapsed;
        } else {
            stat.min_time = stat.min_time.min(elapsed);
            stat.max_time = stat.max_time.max(elapsed);
        }
        stat.count += 1;
        stat.total_time += elapsed;
        Some(elapsed)
    }

    /// Seconds the item has been in `queue` so far.
    pub fn time_in(&self, item_id: i64, queue: &str, now: DateTime<Utc>) -> Option<f64> {
        let (entry, exit) = self.queue_times.get(&item_id.to_string())?.get(queue)?;
        Some(exit.unwrap_or_else(|| seconds(now)) - entry)
    }

    /// Drop items with no open entry, and items whose every entry is older
    /// than the retention window.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = seconds(now - Duration::days(RETENTION_DAYS));
        let before = self.queue_times.len();
        self.queue_times.retain(|_, queues| {
            let open = queues.values().any(|(_, exit)| exit.is_none());
            let recent = queues.values().any(|(entry, _)| *entry >= cutoff);
            open && recent
        });
        before - self.queue_times.len()
    }

    pub fn load(path: &Path) -> Result<Self, QueueError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                serde_json::from_str(&content).map_err(|e| QueueError::Timing(e.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(QueueError::Timing(e.to_string())),
        }
    }

    /// Write through a temporary file so readers never see a partial dump.
    pub fn save(&self, path: &Path) -> Result<(), QueueError> {
        let json = serde_json::to_string(self).map_err(|e| QueueError::Timing(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| QueueError::Timing(e.to_string()))?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| QueueError::Timing(e.to_string()))?;
        std::fs::rename(&tmp, path).map_err(|e| QueueError::Timing(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap()
    }

    #[test]
    fn test_enter_exit_updates_stats() {
        let mut timing = QueueTiming::new();
        timing.enter(1, "Scraping", at(0));
        assert_eq!(timing.exit(1, "Scraping", at(2)), Some(120.0));
        assert_eq!(timing.exit(1, "Scraping", at(3)), None);

        timing.enter(2, "Scraping", at(0));
        timing.exit(2, "Scraping", at(1));

        let stat = &timing.queue_stats["Scraping"];
        assert_eq!(stat.count, 2);
        assert_eq!(stat.total_time, 180.0);
        assert_eq!(stat.min_time, 60.0);
        assert_eq!(stat.max_time, 120.0);
    }

    #[test]
    fn test_prune_keeps_open_recent_items() {
        let mut timing = QueueTiming::new();
        timing.enter(1, "Scraping", at(0));
        timing.exit(1, "Scraping", at(1));
        timing.enter(2, "Checking", at(0));
        timing.enter(3, "Collected", at(0) - Duration::days(45));

        assert_eq!(timing.prune(at(5)), 2);
        assert!(timing.queue_times.contains_key("2"));
    }

    #[test]
    fn test_save_and_load_json_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue_timing_data.json");

        let mut timing = QueueTiming::new();
        timing.enter(7, "Wanted", at(0));
        timing.exit(7, "Wanted", at(1));
        timing.enter(7, "Scraping", at(1));
        timing.save(&path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw["queue_times"]["7"]["Scraping"][1].is_null());
        assert_eq!(raw["queue_stats"]["Wanted"]["count"], 1);

        assert_eq!(QueueTiming::load(&path).unwrap(), timing);
        assert_eq!(
            QueueTiming::load(&dir.path().join("missing.json")).unwrap(),
            QueueTiming::new()
        );
    }
}
