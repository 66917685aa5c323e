//! Filtering and ranking of scraped results against a version.
//!
//! Shared by the Scraping, Final_Check and Upgrading queues.

use std::cmp::Ordering;
use std::collections::HashSet;

use regex_lite::Regex;
use tracing::{debug, warn};

use crate::config::{AnimeFilterMode, VersionConfig};
use crate::debrid::extract_hash;
use crate::media::{MediaItem, MediaType};

use super::parse::{parse_release, title_similarity};
use super::ScrapeResult;

/// Key under which a result is tracked in an item's not-wanted set.
pub fn not_wanted_key(result: &ScrapeResult) -> String {
    extract_hash(&result.magnet).unwrap_or_else(|| result.magnet.clone())
}

fn compile(patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| match Regex::new(&format!("(?i){}", p)) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!(pattern = %p, error = %e, "Ignoring invalid filter pattern");
                None
            }
        })
        .collect()
}

fn compile_scored(patterns: &[crate::config::ScoredPattern]) -> Vec<(Regex, f64)> {
    patterns
        .iter()
        .filter_map(|p| match Regex::new(&format!("(?i){}", p.pattern)) {
            Ok(re) => Some((re, p.weight)),
            Err(e) => {
                warn!(pattern = %p.pattern, error = %e, "Ignoring invalid preferred pattern");
                None
            }
        })
        .collect()
}

/// Whether a version applies to an item at all, given its anime filter mode.
pub fn version_applies(item: &MediaItem, version: &VersionConfig) -> bool {
    match version.anime_filter_mode {
        AnimeFilterMode::None => true,
        AnimeFilterMode::AnimeOnly => item.is_anime,
        AnimeFilterMode::NonAnimeOnly => !item.is_anime,
    }
}

/// Drop results that do not fit the version and rank the rest by score.
///
/// Ranking is a stable sort, so equal scores keep the merged scraper order.
/// With `sort_by_uncached_status`, known-uncached results move ahead of the rest.
pub fn filter_results(
    item: &MediaItem,
    version: &VersionConfig,
    results: Vec<ScrapeResult>,
    not_wanted: &HashSet<String>,
    sort_by_uncached_status: bool,
) -> Vec<ScrapeResult> {
    if !version_applies(item, version) {
        debug!(item_id = item.id, "Version does not apply to item, dropping all results");
        return Vec::new();
    }

    let include = compile(&version.filter_in);
    let exclude = compile(&version.filter_out);
    let preferred_in = compile_scored(&version.preferred_filter_in);
    let preferred_out = compile_scored(&version.preferred_filter_out);
    let threshold = if item.is_anime {
        version.similarity_threshold_anime
    } else {
        version.similarity_threshold
    };

    let total = results.len();
    let mut kept: Vec<ScrapeResult> = results
        .into_iter()
        .filter_map(|mut result| {
            if not_wanted.contains(&not_wanted_key(&result)) || not_wanted.contains(&result.magnet) {
                return None;
            }
            if !include.is_empty() && !include.iter().any(|re| re.is_match(&result.title)) {
                return None;
            }
            if exclude.iter().any(|re| re.is_match(&result.title)) {
                return None;
            }
            if !version
                .resolution_wanted
                .accepts(result.resolution, version.max_resolution)
            {
                return None;
            }
            if result.is_hdr && !version.enable_hdr {
                return None;
            }
            if result.size_gb > 0.0 {
                if result.size_gb < version.min_size_gb {
                    return None;
                }
                if version.max_size_gb.is_some_and(|max| result.size_gb > max) {
                    return None;
                }
            }
            if let Some(bitrate) = result.bitrate_mbps {
                if bitrate < version.min_bitrate_mbps {
                    return None;
                }
                if version.max_bitrate_mbps.is_some_and(|max| bitrate > max) {
                    return None;
                }
            }

            let parsed = parse_release(&result.title);
            if title_similarity(item, &parsed.title) < threshold {
                return None;
            }
            match item.media_type {
                MediaType::Movie => {
                    if let (Some(wanted), Some(found)) = (item.year, parsed.year) {
                        if (wanted - found).abs() > version.year_tolerance {
                            return None;
                        }
                    }
                }
                MediaType::Episode => {
                    if parsed.season.is_some() && parsed.season != item.season_number {
                        return None;
                    }
                    if parsed.episode.is_some() && parsed.episode != item.episode_number {
                        return None;
                    }
                }
            }

            for (re, weight) in &preferred_in {
                if re.is_match(&result.title) {
                    result.total_score += weight;
                }
            }
            for (re, weight) in &preferred_out {
                if re.is_match(&result.title) {
                    result.total_score -= weight;
                }
            }
            if version
                .minimum_score
                .is_some_and(|min| result.total_score < min)
            {
                return None;
            }
            Some(result)
        })
        .collect();

    kept.sort_by(|a, b| {
        b.total_score
            .partial_cmp(&a.total_score)
            .unwrap_or(Ordering::Equal)
    });
    if sort_by_uncached_status {
        kept.sort_by_key(|r| r.is_cached != Some(false));
    }

    debug!(item_id = item.id, total, kept = kept.len(), "Filtered scrape results");
    kept
}

/// Merge scraper outputs in order, keeping the first listing of each release.
pub fn merge_results(batches: Vec<Vec<ScrapeResult>>) -> Vec<ScrapeResult> {
    let mut seen = HashSet::new();
    batches
        .into_iter()
        .flatten()
        .filter(|r| seen.insert(not_wanted_key(r)))
        .collect()
}
