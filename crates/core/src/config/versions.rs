//! Version (quality profile) settings.

use serde::{Deserialize, Serialize};

/// Video resolution buckets, ordered from lowest to highest.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Resolution {
    #[serde(rename = "SD")]
    Sd,
    #[serde(rename = "720p")]
    R720p,
    #[serde(rename = "1080p")]
    R1080p,
    #[serde(rename = "2160p")]
    R2160p,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Sd => "SD",
            Resolution::R720p => "720p",
            Resolution::R1080p => "1080p",
            Resolution::R2160p => "2160p",
        }
    }

    /// Rank used by scorers: SD = 1 .. 2160p = 4.
    pub fn rank(&self) -> u8 {
        match self {
            Resolution::Sd => 1,
            Resolution::R720p => 2,
            Resolution::R1080p => 3,
            Resolution::R2160p => 4,
        }
    }

    /// Detect a resolution from a release title. Unknown titles count as SD.
    pub fn detect(title: &str) -> Self {
        let lower = title.to_lowercase();
        if lower.contains("2160p") || lower.contains("4k") || lower.contains("uhd") {
            Resolution::R2160p
        } else if lower.contains("1080p") || lower.contains("1080i") {
            Resolution::R1080p
        } else if lower.contains("720p") {
            Resolution::R720p
        } else {
            Resolution::Sd
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a result's resolution is compared to the version's `max_resolution`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ResolutionComparator {
    #[serde(rename = "==")]
    Exact,
    #[default]
    #[serde(rename = "<=")]
    AtMost,
    #[serde(rename = ">=")]
    AtLeast,
}

impl ResolutionComparator {
    pub fn accepts(&self, candidate: Resolution, target: Resolution) -> bool {
        match self {
            ResolutionComparator::Exact => candidate == target,
            ResolutionComparator::AtMost => candidate <= target,
            ResolutionComparator::AtLeast => candidate >= target,
        }
    }
}

/// Which kind of release a version accepts with respect to anime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnimeFilterMode {
    #[default]
    None,
    AnimeOnly,
    NonAnimeOnly,
}

/// A regex with a score adjustment, used by the preferred include/exclude lists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredPattern {
    pub pattern: String,
    pub weight: f64,
}

/// Weighting coefficients handed to scrapers when they compute `total_score`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreWeights {
    #[serde(default = "default_resolution_weight")]
    pub resolution: f64,
    #[serde(default = "default_hdr_weight")]
    pub hdr: f64,
    #[serde(default = "default_similarity_weight")]
    pub similarity: f64,
    #[serde(default = "default_size_weight")]
    pub size: f64,
    #[serde(default = "default_bitrate_weight")]
    pub bitrate: f64,
}

fn default_resolution_weight() -> f64 {
    3.0
}

fn default_hdr_weight() -> f64 {
    3.0
}

fn default_similarity_weight() -> f64 {
    3.0
}

fn default_size_weight() -> f64 {
    3.0
}

fn default_bitrate_weight() -> f64 {
    3.0
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            resolution: default_resolution_weight(),
            hdr: default_hdr_weight(),
            similarity: default_similarity_weight(),
            size: default_size_weight(),
            bitrate: default_bitrate_weight(),
        }
    }
}

/// A named bundle of scraping preferences.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VersionConfig {
    #[serde(default = "default_max_resolution")]
    pub max_resolution: Resolution,
    #[serde(default)]
    pub resolution_wanted: ResolutionComparator,
    #[serde(default)]
    pub enable_hdr: bool,
    #[serde(default)]
    pub min_size_gb: f64,
    #[serde(default)]
    pub max_size_gb: Option<f64>,
    #[serde(default)]
    pub min_bitrate_mbps: f64,
    #[serde(default)]
    pub max_bitrate_mbps: Option<f64>,
    #[serde(default)]
    pub weights: ScoreWeights,
    /// A result must match at least one of these (when non-empty).
    #[serde(default)]
    pub filter_in: Vec<String>,
    /// A result matching any of these is dropped.
    #[serde(default)]
    pub filter_out: Vec<String>,
    #[serde(default)]
    pub preferred_filter_in: Vec<ScoredPattern>,
    #[serde(default)]
    pub preferred_filter_out: Vec<ScoredPattern>,
    #[serde(default)]
    pub minimum_score: Option<f64>,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    #[serde(default = "default_similarity_threshold_anime")]
    pub similarity_threshold_anime: f64,
    #[serde(default = "default_language_code")]
    pub language_code: String,
    #[serde(default)]
    pub fallback_version: Option<String>,
    #[serde(default)]
    pub require_physical_release: bool,
    #[serde(default)]
    pub anime_filter_mode: AnimeFilterMode,
    /// Overrides `queues.wake_limit` for items of this version.
    #[serde(default)]
    pub wake_count: Option<u32>,
    #[serde(default)]
    pub accept_uncached: bool,
    #[serde(default)]
    pub enable_upgrading: bool,
    /// Allowed distance between an item's year and a parsed release year.
    #[serde(default = "default_year_tolerance")]
    pub year_tolerance: i32,
}

fn default_max_resolution() -> Resolution {
    Resolution::R1080p
}

fn default_similarity_threshold() -> f64 {
    0.85
}

fn default_similarity_threshold_anime() -> f64 {
    0.35
}

fn default_language_code() -> String {
    "en".to_string()
}

fn default_year_tolerance() -> i32 {
    1
}

impl Default for VersionConfig {
    fn default() -> Self {
        Self {
            max_resolution: default_max_resolution(),
            resolution_wanted: ResolutionComparator::default(),
            enable_hdr: false,
            min_size_gb: 0.0,
            max_size_gb: None,
            min_bitrate_mbps: 0.0,
            max_bitrate_mbps: None,
            weights: ScoreWeights::default(),
            filter_in: Vec::new(),
            filter_out: Vec::new(),
            preferred_filter_in: Vec::new(),
            preferred_filter_out: Vec::new(),
            minimum_score: None,
            similarity_threshold: default_similarity_threshold(),
            similarity_threshold_anime: default_similarity_threshold_anime(),
            language_code: default_language_code(),
            fallback_version: None,
            require_physical_release: false,
            anime_filter_mode: AnimeFilterMode::default(),
            wake_count: None,
            accept_uncached: false,
            enable_upgrading: false,
            year_tolerance: default_year_tolerance(),
        }
    }
}
