//! Media item types.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Movie or episode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Movie,
    Episode,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Episode => "episode",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "movie" => Some(MediaType::Movie),
            "episode" => Some(MediaType::Episode),
            _ => None,
        }
    }
}

/// Pipeline state of an item. The persisted value is the single source of
/// truth for which queue owns the item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemState {
    Wanted,
    Scraping,
    Adding,
    Checking,
    Sleeping,
    Unreleased,
    #[serde(rename = "Pre_release")]
    PreRelease,
    #[serde(rename = "Final_Check")]
    FinalCheck,
    #[serde(rename = "Pending Uncached")]
    PendingUncached,
    Upgrading,
    Blacklisted,
    Collected,
}

impl ItemState {
    pub const ALL: [ItemState; 12] = [
        ItemState::Wanted,
        ItemState::Scraping,
        ItemState::Adding,
        ItemState::Checking,
        ItemState::Sleeping,
        ItemState::Unreleased,
        ItemState::PreRelease,
        ItemState::FinalCheck,
        ItemState::PendingUncached,
        ItemState::Upgrading,
        ItemState::Blacklisted,
        ItemState::Collected,
    ];

    /// Canonical name, as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemState::Wanted => "Wanted",
            ItemState::Scraping => "Scraping",
            ItemState::Adding => "Adding",
            ItemState::Checking => "Checking",
            ItemState::Sleeping => "Sleeping",
            ItemState::Unreleased => "Unreleased",
            ItemState::PreRelease => "Pre_release",
            ItemState::FinalCheck => "Final_Check",
            ItemState::PendingUncached => "Pending Uncached",
            ItemState::Upgrading => "Upgrading",
            ItemState::Blacklisted => "Blacklisted",
            ItemState::Collected => "Collected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|state| state.as_str() == s)
    }

    /// States whose membership lives only in the database.
    pub fn is_db_backed(&self) -> bool {
        matches!(
            self,
            ItemState::Wanted
                | ItemState::Unreleased
                | ItemState::PreRelease
                | ItemState::Blacklisted
                | ItemState::Collected
        )
    }
}

impl std::fmt::Display for ItemState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The unit of work: one movie or episode wanted in one version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaItem {
    pub id: i64,
    pub media_type: MediaType,
    pub title: String,
    pub year: Option<i32>,
    pub imdb_id: Option<String>,
    pub tmdb_id: Option<String>,
    pub season_number: Option<u32>,
    pub episode_number: Option<u32>,
    pub release_date: Option<NaiveDate>,
    pub airtime: Option<NaiveTime>,
    pub physical_release_date: Option<NaiveDate>,
    /// Title in the original language, used by language-aware matching.
    pub original_title: Option<String>,
    pub is_anime: bool,
    /// Version name. `None` only during a pending rename.
    pub version: Option<String>,
    pub state: ItemState,
    pub filled_by_title: Option<String>,
    pub filled_by_file: Option<String>,
    pub filled_by_magnet: Option<String>,
    pub filled_by_torrent_id: Option<String>,
    /// Score of the release currently filling the item.
    pub filled_by_score: Option<f64>,
    pub original_scraped_torrent_title: Option<String>,
    /// Torrent id of the release being replaced during an upgrade.
    pub upgrading_from: Option<String>,
    pub wake_count: u32,
    pub collected_at: Option<DateTime<Utc>>,
    pub original_collected_at: Option<DateTime<Utc>>,
    pub blacklisted_at: Option<DateTime<Utc>>,
    pub content_source: Option<String>,
    pub content_source_detail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MediaItem {
    /// Human label like "Show S01E02" or "Movie (2023)".
    pub fn label(&self) -> String {
        match (self.media_type, self.season_number, self.episode_number) {
            (MediaType::Episode, Some(s), Some(e)) => format!("{} S{:02}E{:02}", self.title, s, e),
            _ => match self.year {
                Some(year) => format!("{} ({})", self.title, year),
                None => self.title.clone(),
            },
        }
    }

    /// State reported to users. An item checking an upgrade shows as Upgrading.
    pub fn effective_state(&self) -> ItemState {
        if self.state == ItemState::Checking && self.upgrading_from.is_some() {
            ItemState::Upgrading
        } else {
            self.state
        }
    }
}

/// Data for inserting a new wanted item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewMediaItem {
    pub media_type: Option<MediaType>,
    pub title: String,
    pub year: Option<i32>,
    pub imdb_id: Option<String>,
    pub tmdb_id: Option<String>,
    pub season_number: Option<u32>,
    pub episode_number: Option<u32>,
    pub release_date: Option<NaiveDate>,
    pub airtime: Option<NaiveTime>,
    pub physical_release_date: Option<NaiveDate>,
    pub original_title: Option<String>,
    pub is_anime: bool,
    pub version: String,
    pub content_source: Option<String>,
    pub content_source_detail: Option<String>,
}
