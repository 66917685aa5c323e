//! Pause model: a manual or connectivity pause plus an optional daily window.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, FixedOffset, NaiveTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::audit::{AuditEvent, AuditHandle};
use crate::clock::Clock;
use crate::config::PauseScheduleConfig;
use crate::notifications::{NotificationBuffer, NotificationCategory};

use super::SchedulerError;

/// Why processing is paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseKind {
    Manual,
    /// The debrid provider rejected our credentials or was unreachable.
    Connectivity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PauseState {
    pub kind: PauseKind,
    pub reason: String,
    pub since: DateTime<Utc>,
}

/// Daily window, in a fixed UTC offset, during which queues are not processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PauseWindow {
    start: NaiveTime,
    end: NaiveTime,
    offset: FixedOffset,
}

impl PauseWindow {
    pub fn new(start: NaiveTime, end: NaiveTime, offset: FixedOffset) -> Self {
        Self { start, end, offset }
    }

    /// Build the configured window, or `None` when disabled.
    pub fn from_config(config: &PauseScheduleConfig) -> Result<Option<Self>, SchedulerError> {
        if !config.enabled {
            return Ok(None);
        }
        let start = parse_time(&config.start)?;
        let end = parse_time(&config.end)?;
        let offset = match config.utc_offset.as_deref() {
            Some(raw) => parse_utc_offset(raw)
                .ok_or_else(|| SchedulerError::PauseSchedule(format!("invalid UTC offset {:?}", raw)))?,
            None => FixedOffset::east_opt(0)
                .ok_or_else(|| SchedulerError::PauseSchedule("invalid UTC offset".to_string()))?,
        };
        Ok(Some(Self::new(start, end, offset)))
    }

    /// Whether `now` falls inside the window. Windows may wrap past midnight.
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.offset).time();
        if self.start <= self.end {
            local >= self.start && local < self.end
        } else {
            local >= self.start || local < self.end
        }
    }
}

fn parse_time(raw: &str) -> Result<NaiveTime, SchedulerError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| SchedulerError::PauseSchedule(format!("invalid time {:?}, expected HH:MM", raw)))
}

/// Parse "+02:00", "-0530", "+3", "UTC" or "Z".
pub fn parse_utc_offset(raw: &str) -> Option<FixedOffset> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("utc") || raw.eq_ignore_ascii_case("z") {
        return FixedOffset::east_opt(0);
    }
    let (sign, rest) = match raw.as_bytes()[0] {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => (1, raw),
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None if rest.len() == 4 => rest.split_at(2),
        None => (rest, "0"),
    };
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 14 || minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Shared pause switch consulted by the runner before every tick.
pub struct PauseController {
    state: Mutex<Option<PauseState>>,
    window: Option<PauseWindow>,
    window_active: AtomicBool,
    clock: Arc<dyn Clock>,
    audit: Option<AuditHandle>,
    notifications: Option<NotificationBuffer>,
}

impl PauseController {
    pub fn new(
        window: Option<PauseWindow>,
        clock: Arc<dyn Clock>,
        audit: Option<AuditHandle>,
        notifications: Option<NotificationBuffer>,
    ) -> Self {
        Self {
            state: Mutex::new(None),
            window,
            window_active: AtomicBool::new(false),
            clock,
            audit,
            notifications,
        }
    }

    pub fn current(&self) -> Option<PauseState> {
        self.state.lock().ok().and_then(|s| s.clone())
    }

    pub fn is_paused(&self) -> bool {
        self.current().is_some()
    }

    pub fn in_window(&self) -> bool {
        self.window.is_some_and(|w| w.contains(self.clock.now()))
    }

    /// Pause processing. Returns false if already paused.
    pub async fn pause(&self, kind: PauseKind, reason: &str) -> bool {
        {
            let Ok(mut state) = self.state.lock() else {
                return false;
            };
            if state.is_some() {
                return false;
            }
            *state = Some(PauseState {
                kind,
                reason: reason.to_string(),
                since: self.clock.now(),
            });
        }
        info!(?kind, reason, "Queue processing paused");
        self.announce_pause(reason).await;
        true
    }

    /// Resume processing. Returns false if not paused.
    pub async fn resume(&self, reason: &str) -> bool {
        let previous = match self.state.lock() {
            Ok(mut state) => state.take(),
            Err(_) => None,
        };
        if previous.is_none() {
            return false;
        }
        info!(reason, "Queue processing resumed");
        self.announce_resume(reason).await;
        true
    }

    /// Re-evaluate the daily window, announcing transitions. Returns whether it is active.
    pub async fn refresh_window(&self) -> bool {
        let active = self.in_window();
        let was = self.window_active.swap(active, Ordering::SeqCst);
        if active && !was {
            info!("Entering scheduled pause window");
            self.announce_pause("scheduled pause window").await;
        } else if !active && was {
            info!("Leaving scheduled pause window");
            self.announce_resume("scheduled pause window ended").await;
        }
        active
    }

    /// Whether queues may be processed right now.
    pub fn should_process(&self) -> bool {
        !self.is_paused() && !self.in_window()
    }

    async fn announce_pause(&self, reason: &str) {
        if let Some(audit) = &self.audit {
            audit
                .emit(AuditEvent::QueuePaused {
                    reason: reason.to_string(),
                })
                .await;
        }
        if let Some(notifications) = &self.notifications {
            notifications
                .send_category(NotificationCategory::QueuePause, reason)
                .await;
        }
    }

    async fn announce_resume(&self, reason: &str) {
        if let Some(audit) = &self.audit {
            audit
                .emit(AuditEvent::QueueResumed {
                    reason: reason.to_string(),
                })
                .await;
        }
        if let Some(notifications) = &self.notifications {
            notifications
                .send_category(NotificationCategory::QueueResume, reason)
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, h, m, 0).unwrap()
    }

    #[test]
    fn test_parse_utc_offset() {
        assert_eq!(parse_utc_offset("UTC"), FixedOffset::east_opt(0));
        assert_eq!(parse_utc_offset("+02:00"), FixedOffset::east_opt(7200));
        assert_eq!(parse_utc_offset("-0530"), FixedOffset::east_opt(-19800));
        assert_eq!(parse_utc_offset("+3"), FixedOffset::east_opt(10800));
        assert_eq!(parse_utc_offset("+25:00"), None);
        assert_eq!(parse_utc_offset("soon"), None);
    }

    #[test]
    fn test_daytime_window() {
        let window = PauseWindow::new(time(9, 0), time(17, 0), FixedOffset::east_opt(0).unwrap());
        assert!(!window.contains(at(8, 59)));
        assert!(window.contains(at(9, 0)));
        assert!(window.contains(at(16, 59)));
        assert!(!window.contains(at(17, 0)));
    }

    #[test]
    fn test_overnight_window_with_offset() {
        // 23:00-06:00 at UTC+2 is 21:00-04:00 UTC.
        let window = PauseWindow::new(time(23, 0), time(6, 0), FixedOffset::east_opt(7200).unwrap());
        assert!(window.contains(at(21, 30)));
        assert!(window.contains(at(3, 0)));
        assert!(!window.contains(at(4, 0)));
        assert!(!window.contains(at(12, 0)));
    }

    #[test]
    fn test_window_from_config() {
        let config = PauseScheduleConfig {
            enabled: true,
            start: "01:00".to_string(),
            end: "05:00".to_string(),
            utc_offset: Some("-05:00".to_string()),
        };
        let window = PauseWindow::from_config(&config).unwrap().unwrap();
        assert!(window.contains(at(7, 0)));

        let disabled = PauseScheduleConfig::default();
        assert!(PauseWindow::from_config(&disabled).unwrap().is_none());

        let broken = PauseScheduleConfig {
            start: "1am".to_string(),
            ..config
        };
        assert!(PauseWindow::from_config(&broken).is_err());
    }

    #[tokio::test]
    async fn test_pause_and_resume() {
        let clock = Arc::new(ManualClock::new(at(12, 0)));
        let pause = PauseController::new(None, clock, None, None);
        assert!(pause.should_process());

        assert!(pause.pause(PauseKind::Manual, "maintenance").await);
        assert!(!pause.pause(PauseKind::Connectivity, "auth").await);
        let state = pause.current().unwrap();
        assert_eq!(state.kind, PauseKind::Manual);
        assert_eq!(state.reason, "maintenance");
        assert!(!pause.should_process());

        assert!(pause.resume("done").await);
        assert!(!pause.resume("again").await);
        assert!(pause.should_process());
    }

    #[tokio::test]
    async fn test_window_blocks_processing() {
        let clock = Arc::new(ManualClock::new(at(12, 0)));
        let window = PauseWindow::new(time(13, 0), time(14, 0), FixedOffset::east_opt(0).unwrap());
        let pause = PauseController::new(Some(window), clock.clone(), None, None);

        assert!(!pause.refresh_window().await);
        assert!(pause.should_process());

        clock.set(at(13, 30));
        assert!(pause.refresh_window().await);
        assert!(!pause.should_process());
        assert!(!pause.is_paused());
    }
}
