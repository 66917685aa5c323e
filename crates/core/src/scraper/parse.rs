//! Release-title parsing and scoring.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex_lite::Regex;

use crate::config::{Resolution, ScoreWeights};
use crate::media::{MediaItem, MediaType};

static SEASON_EPISODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bs(\d{1,2})[ .]?e(\d{1,3})\b").expect("valid regex"));
static SEASON_PACK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bs(\d{1,2})\b").expect("valid regex"));
static YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").expect("valid regex"));
static RESOLUTION_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(2160p|1080p|1080i|720p|480p|4k|uhd)\b").expect("valid regex")
});
static HDR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(hdr|hdr10|dv|dovi|dolby[ .]?vision)\b").expect("valid regex")
});

/// Fields recovered from a release name.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRelease {
    /// Normalised title portion, before the first year/episode/quality token.
    pub title: String,
    pub year: Option<i32>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub resolution: Resolution,
    pub is_hdr: bool,
}

/// Lowercase, punctuation to spaces, collapsed whitespace.
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn parse_release(name: &str) -> ParsedRelease {
    let spaced = name.replace(['.', '_'], " ");

    let episode_match = SEASON_EPISODE.captures(&spaced);
    let season_match = SEASON_PACK.captures(&spaced);
    // A year at the very start is part of the title ("2012", "1917").
    let year_match = YEAR.captures_iter(&spaced).find(|c| {
        c.get(0).map(|m| m.start() > 0).unwrap_or(false)
    });

    let mut cut = spaced.len();
    for start in [
        episode_match.as_ref().and_then(|c| c.get(0)).map(|m| m.start()),
        season_match.as_ref().and_then(|c| c.get(0)).map(|m| m.start()),
        year_match.as_ref().and_then(|c| c.get(0)).map(|m| m.start()),
        RESOLUTION_TOKEN.find(&spaced).map(|m| m.start()),
    ]
    .into_iter()
    .flatten()
    {
        cut = cut.min(start);
    }

    let (season, episode) = match episode_match {
        Some(c) => (
            c.get(1).and_then(|m| m.as_str().parse().ok()),
            c.get(2).and_then(|m| m.as_str().parse().ok()),
        ),
        None => (
            season_match
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse().ok()),
            None,
        ),
    };

    ParsedRelease {
        title: normalize_title(&spaced[..cut]),
        year: year_match
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok()),
        season,
        episode,
        resolution: Resolution::detect(name),
        is_hdr: HDR.is_match(&spaced),
    }
}

/// Best similarity between a parsed release title and the item's titles.
pub fn title_similarity(item: &MediaItem, release_title: &str) -> f64 {
    let release = normalize_title(release_title);
    std::iter::once(&item.title)
        .chain(item.original_title.iter())
        .map(|t| strsim::normalized_levenshtein(&normalize_title(t), &release))
        .fold(0.0, f64::max)
}

/// Bitrate estimate from size and a typical runtime.
pub fn estimate_bitrate_mbps(size_gb: f64, media_type: MediaType) -> Option<f64> {
    if size_gb <= 0.0 {
        return None;
    }
    let runtime_secs = match media_type {
        MediaType::Movie => 120.0 * 60.0,
        MediaType::Episode => 45.0 * 60.0,
    };
    Some(size_gb * 8192.0 / runtime_secs)
}

/// Inputs to [`score_release`].
pub struct ScoreInputs {
    pub resolution: Resolution,
    pub is_hdr: bool,
    pub enable_hdr: bool,
    pub similarity: f64,
    pub size_gb: f64,
    pub bitrate_mbps: Option<f64>,
    pub seeders: u32,
}

/// Weighted total score and its per-component breakdown.
pub fn score_release(weights: &ScoreWeights, inputs: &ScoreInputs) -> (f64, BTreeMap<String, f64>) {
    let mut breakdown = BTreeMap::new();
    breakdown.insert(
        "resolution".to_string(),
        weights.resolution * inputs.resolution.rank() as f64 * 25.0,
    );
    breakdown.insert(
        "hdr".to_string(),
        if inputs.is_hdr && inputs.enable_hdr {
            weights.hdr * 10.0
        } else {
            0.0
        },
    );
    breakdown.insert(
        "similarity".to_string(),
        weights.similarity * inputs.similarity * 25.0,
    );
    breakdown.insert(
        "size".to_string(),
        weights.size * (1.0 + inputs.size_gb.max(0.0)).ln() * 5.0,
    );
    breakdown.insert(
        "bitrate".to_string(),
        weights.bitrate * (1.0 + inputs.bitrate_mbps.unwrap_or(0.0).max(0.0)).ln() * 5.0,
    );
    breakdown.insert(
        "seeders".to_string(),
        (1.0 + inputs.seeders as f64).ln(),
    );

    let total = breakdown.values().sum();
    (total, breakdown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_movie_release() {
        let parsed = parse_release("The.Movie.2023.1080p.BluRay.HDR.x265-GRP");
        assert_eq!(parsed.title, "the movie");
        assert_eq!(parsed.year, Some(2023));
        assert_eq!(parsed.resolution, Resolution::R1080p);
        assert!(parsed.is_hdr);
        assert_eq!(parsed.season, None);
    }

    #[test]
    fn test_parse_episode_release() {
        let parsed = parse_release("Show.Name.S02E05.720p.WEB-DL");
        assert_eq!(parsed.title, "show name");
        assert_eq!(parsed.season, Some(2));
        assert_eq!(parsed.episode, Some(5));
        assert_eq!(parsed.resolution, Resolution::R720p);
        assert!(!parsed.is_hdr);
    }

    #[test]
    fn test_parse_season_pack() {
        let parsed = parse_release("Show Name S03 1080p");
        assert_eq!(parsed.season, Some(3));
        assert_eq!(parsed.episode, None);
    }

    #[test]
    fn test_leading_year_is_title() {
        let parsed = parse_release("1917.2019.2160p.UHD");
        assert_eq!(parsed.title, "1917");
        assert_eq!(parsed.year, Some(2019));
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("Spider-Man: No Way Home"), "spider man no way home");
    }

    #[test]
    fn test_bitrate_estimate() {
        let movie = estimate_bitrate_mbps(9.0, MediaType::Movie).unwrap();
        assert!((movie - 10.24).abs() < 0.01);
        assert_eq!(estimate_bitrate_mbps(0.0, MediaType::Movie), None);
    }

    #[test]
    fn test_higher_resolution_scores_higher() {
        let weights = ScoreWeights::default();
        let base = ScoreInputs {
            resolution: Resolution::R720p,
            is_hdr: false,
            enable_hdr: false,
            similarity: 1.0,
            size_gb: 4.0,
            bitrate_mbps: None,
            seeders: 10,
        };
        let (low, _) = score_release(&weights, &base);
        let (high, breakdown) = score_release(
            &weights,
            &ScoreInputs {
                resolution: Resolution::R1080p,
                ..base
            },
        );
        assert!(high > low);
        assert_eq!(breakdown["hdr"], 0.0);
    }
}
