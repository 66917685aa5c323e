//! Release-date scheduling for Wanted, Unreleased and Pre_release.
//!
//! Dates and airtimes are interpreted as UTC.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::config::{QueuesConfig, VersionConfig};
use crate::media::{MediaItem, MediaType};

/// Where a not-yet-scraped item belongs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseStatus {
    /// Ready to scrape.
    Due,
    /// Not due, but inside the pre-release window.
    PreRelease,
    /// Not due and outside the window.
    Unreleased,
}

/// When scraping may start. `None` means no release date is known, which
/// counts as due.
pub fn scrape_due_at(item: &MediaItem, config: &QueuesConfig) -> Option<DateTime<Utc>> {
    let date = item.release_date?;
    if config.use_alternate_scrape_time_strategy {
        return Some(date.and_time(config.alternate_scrape_time).and_utc());
    }
    let airtime = item.airtime.unwrap_or(config.default_airtime);
    let offset_hours = match item.media_type {
        MediaType::Movie => config.movie_airtime_offset_hours,
        MediaType::Episode => config.episode_airtime_offset_hours,
    };
    let offset = Duration::milliseconds((offset_hours * 3_600_000.0) as i64);
    Some(date.and_time(airtime).and_utc() + offset)
}

fn physical_release_pending(item: &MediaItem, version: Option<&VersionConfig>, today: NaiveDate) -> bool {
    let required = version.is_some_and(|v| v.require_physical_release);
    if !required || item.media_type != MediaType::Movie {
        return false;
    }
    item.physical_release_date.is_none_or(|date| date > today)
}

pub fn release_status(
    item: &MediaItem,
    config: &QueuesConfig,
    version: Option<&VersionConfig>,
    now: DateTime<Utc>,
) -> ReleaseStatus {
    if physical_release_pending(item, version, now.date_naive()) {
        return ReleaseStatus::Unreleased;
    }
    let Some(due) = scrape_due_at(item, config) else {
        return ReleaseStatus::Due;
    };
    if now >= due {
        return ReleaseStatus::Due;
    }
    if due - now <= Duration::days(config.pre_release_window_days) {
        ReleaseStatus::PreRelease
    } else {
        ReleaseStatus::Unreleased
    }
}
