use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{debug, info, warn};

use crate::debrid::{
    hash_from_source, video_files, CacheCheckOptions, CacheStatus, DebridError, DebridProvider,
    TorrentInfo,
};
use crate::media::{MediaItem, MediaStore};
use crate::metrics;
use crate::scraper::ScrapeResult;
use crate::tracking::{NewTorrentAddition, TrackingPatch, TrackingStore};

use super::resolve::{LinkResolver, ResolveError};
use super::{AddedTorrent, ProcessOptions, ProcessOutcome, ProcessorError, REASON_NO_FILES};

/// Runs candidate lists against the debrid provider.
pub struct TorrentProcessor {
    provider: Arc<dyn DebridProvider>,
    media: Arc<dyn MediaStore>,
    tracking: Arc<dyn TrackingStore>,
    resolver: LinkResolver,
}

impl TorrentProcessor {
    pub fn new(
        provider: Arc<dyn DebridProvider>,
        media: Arc<dyn MediaStore>,
        tracking: Arc<dyn TrackingStore>,
    ) -> Result<Self, ResolveError> {
        Ok(Self {
            provider,
            media,
            tracking,
            resolver: LinkResolver::new(Duration::from_secs(30))?,
        })
    }

    pub fn provider(&self) -> &Arc<dyn DebridProvider> {
        &self.provider
    }

    /// Try each candidate in order until one is added or parked.
    ///
    /// Candidates failing resolution, cache check or addition are skipped.
    /// Authentication failures and an unavailable provider abort the run.
    pub async fn process(
        &self,
        item: &MediaItem,
        results: &[ScrapeResult],
        options: &ProcessOptions,
    ) -> Result<ProcessOutcome, ProcessorError> {
        let outcome = self.try_candidates(item, results, options).await?;
        metrics::PROCESSOR_OUTCOMES
            .with_label_values(&[outcome.label()])
            .inc();
        Ok(outcome)
    }

    async fn try_candidates(
        &self,
        item: &MediaItem,
        results: &[ScrapeResult],
        options: &ProcessOptions,
    ) -> Result<ProcessOutcome, ProcessorError> {
        let snapshot = serde_json::to_value(item).unwrap_or_else(|_| json!({ "id": item.id }));

        for result in results {
            let source = match self.resolver.resolve(&result.magnet).await {
                Ok(source) => source,
                Err(e) => {
                    debug!(item_id = item.id, title = %result.title, error = %e, "Skipping unresolvable candidate");
                    continue;
                }
            };
            let hash = match hash_from_source(&source) {
                Ok(hash) => hash,
                Err(e) => {
                    debug!(item_id = item.id, title = %result.title, error = %e, "Skipping candidate without hash");
                    continue;
                }
            };

            let check = CacheCheckOptions {
                remove_cached: false,
                remove_uncached: true,
                item_id: Some(item.id),
                imdb_id: item.imdb_id.clone(),
                item_snapshot: Some(snapshot.clone()),
            };
            let cached = match self.provider.is_cached(&source, &check).await {
                CacheStatus::Cached => true,
                CacheStatus::NotCached if !options.accept_uncached => {
                    debug!(item_id = item.id, hash = %hash, "Skipping uncached candidate");
                    continue;
                }
                CacheStatus::NotCached => {
                    match self.provider.get_active_downloads().await {
                        Ok(active) if active.is_full() => {
                            info!(
                                item_id = item.id,
                                active = active.active,
                                limit = active.limit,
                                "Download slots full, parking uncached candidate"
                            );
                            return Ok(ProcessOutcome::PendingUncached {
                                magnet: result.magnet.clone(),
                                result: result.clone(),
                            });
                        }
                        Ok(_) => {}
                        Err(e) => {
                            check_fatal(&e)?;
                            warn!(item_id = item.id, error = %e, "Active download lookup failed");
                            continue;
                        }
                    }
                    false
                }
                CacheStatus::Error => {
                    debug!(item_id = item.id, hash = %hash, "Cache check failed, skipping candidate");
                    continue;
                }
                CacheStatus::Unavailable => {
                    return Err(ProcessorError::Unavailable(format!(
                        "cache check for {} could not reach the provider",
                        hash
                    )));
                }
                CacheStatus::Unauthorized => {
                    return Err(ProcessorError::Auth(format!(
                        "credentials rejected during cache check for {}",
                        hash
                    )));
                }
            };

            let torrent_id = match self.provider.get_cached_torrent_id(&hash) {
                Some(id) => id,
                None => match self.provider.add_torrent(&source).await {
                    Ok(id) => id,
                    Err(e) => {
                        check_fatal(&e)?;
                        warn!(item_id = item.id, hash = %hash, error = %e, "Add failed, trying next candidate");
                        continue;
                    }
                },
            };

            let info = match self
                .provider
                .get_torrent_info(&torrent_id)
                .await
                .into_result(&torrent_id)
            {
                Ok(info) => info,
                Err(e) => {
                    check_fatal(&e)?;
                    warn!(item_id = item.id, torrent_id = %torrent_id, error = %e, "Info lookup failed after add");
                    continue;
                }
            };

            if info.files.is_empty() {
                warn!(item_id = item.id, torrent_id = %torrent_id, "Torrent has no files, removing");
                if let Err(e) = self.provider.remove_torrent(&torrent_id, REASON_NO_FILES).await {
                    warn!(torrent_id = %torrent_id, error = %e, "Failed to remove empty torrent");
                }
                continue;
            }

            if options.add_to_not_wanted {
                if let Err(e) = self.media.add_not_wanted(item.id, &hash) {
                    warn!(item_id = item.id, error = %e, "Failed to mark chosen hash not wanted");
                }
            }

            self.record(&hash, &info, result, cached, &snapshot, options);

            info!(
                item_id = item.id,
                hash = %hash,
                torrent_id = %torrent_id,
                score = result.total_score,
                cached,
                "Torrent accepted"
            );
            return Ok(ProcessOutcome::Added(Box::new(AddedTorrent {
                file_name: largest_video(&info),
                hash,
                original_link: result.magnet.clone(),
                cached,
                result: result.clone(),
                info,
            })));
        }

        Ok(ProcessOutcome::Exhausted)
    }

    fn record(
        &self,
        hash: &str,
        info: &TorrentInfo,
        result: &ScrapeResult,
        cached: bool,
        snapshot: &serde_json::Value,
        options: &ProcessOptions,
    ) {
        let details = json!({
            "torrent_id": info.id,
            "is_cached": cached,
            "filename": info.filename,
            "title": result.title,
            "score": result.total_score,
            "scraper": result.scraper,
        });
        let patch = TrackingPatch {
            item_data: Some(snapshot.clone()),
            trigger_details: Some(details.clone()),
            additional_metadata: None,
            trigger_source: Some(options.trigger_source.clone()),
            rationale: Some(options.rationale.clone()),
        };

        let present = self
            .tracking
            .latest(hash)
            .map(|r| r.is_some_and(|r| r.is_still_present))
            .unwrap_or(false);
        let outcome = if present {
            self.tracking.update_tracking(hash, &patch).map(|_| ())
        } else {
            let addition = NewTorrentAddition::new(
                hash,
                options.trigger_source.clone(),
                options.rationale.clone(),
                snapshot.clone(),
            )
            .with_trigger_details(details);
            self.tracking.record_addition(&addition).map(|_| ())
        };
        if let Err(e) = outcome {
            warn!(hash, error = %e, "Failed to record tracking");
        }
    }
}

/// Errors that would fail every remaining candidate the same way.
fn check_fatal(err: &DebridError) -> Result<(), ProcessorError> {
    if err.is_auth() {
        return Err(ProcessorError::Auth(err.to_string()));
    }
    if err.is_unavailable() {
        return Err(ProcessorError::Unavailable(err.to_string()));
    }
    Ok(())
}

/// Name of the largest video file, falling back to the largest file.
fn largest_video(info: &TorrentInfo) -> Option<String> {
    let videos = video_files(&info.files);
    let pick = if videos.is_empty() {
        info.files.iter().max_by_key(|f| f.bytes)
    } else {
        videos.into_iter().max_by_key(|f| f.bytes)
    };
    pick.map(|f| f.name().to_string())
}
