//! Add-and-check cache detection.
//!
//! Debrid services no longer expose an instant-availability endpoint, so a
//! torrent's cache status is learned by adding it and looking at its status.
//! The flow is shared by every provider.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use crate::media::MediaStore;
use crate::tracking::{trigger, NewTorrentAddition, TrackingStore};

use super::files::video_files;
use super::hash::hash_from_source;
use super::{CacheCheckOptions, CacheStatus, DebridProvider, PhalanxClient, TorrentSource, TorrentStatus};

pub const REASON_NO_VIDEO: &str = "No video files found in torrent";
pub const REASON_CACHED_REMOVAL: &str = "Removed after cache check (cached)";
pub const REASON_UNCACHED_REMOVAL: &str = "Removed after cache check (not cached)";

/// Stores the cache check reads and writes besides the provider itself.
pub struct CacheCheckContext {
    pub phalanx: Option<PhalanxClient>,
    pub media: Arc<dyn MediaStore>,
    pub tracking: Arc<dyn TrackingStore>,
}

/// Determine whether `source` is cached on the provider.
pub async fn check_cache<P: DebridProvider + ?Sized>(
    provider: &P,
    ctx: &CacheCheckContext,
    source: &TorrentSource,
    options: &CacheCheckOptions,
) -> CacheStatus {
    let hash = match hash_from_source(source) {
        Ok(hash) => hash,
        Err(e) => {
            warn!(error = %e, "Cannot cache-check source without a hash");
            return CacheStatus::Error;
        }
    };

    if let Some(ref phalanx) = ctx.phalanx {
        if phalanx.get_cache_status(&hash).await == Some(true) {
            debug!(hash = %hash, "Mesh cache reports cached");
            return CacheStatus::Cached;
        }
    }

    let torrent_id = match provider.add_torrent(source).await {
        Ok(id) => id,
        Err(e) => {
            warn!(hash = %hash, error = %e, "Cache check add failed");
            return CacheStatus::from_error(&e);
        }
    };

    let info = match provider.get_torrent_info(&torrent_id).await.into_result(&torrent_id) {
        Ok(info) => info,
        Err(e) => {
            warn!(hash = %hash, torrent_id = %torrent_id, error = %e, "Cache check info lookup failed");
            return CacheStatus::from_error(&e);
        }
    };

    if video_files(&info.files).is_empty() {
        info!(hash = %hash, torrent_id = %torrent_id, "No video files, rejecting torrent");
        mark_not_wanted(ctx, options, &hash);
        remove(provider, &torrent_id, REASON_NO_VIDEO).await;
        return CacheStatus::Error;
    }

    if info.status == TorrentStatus::Error {
        let reason = format!("Torrent in error status: {}", info.raw_status);
        info!(hash = %hash, torrent_id = %torrent_id, status = %info.raw_status, "Torrent errored during cache check");
        mark_not_wanted(ctx, options, &hash);
        remove(provider, &torrent_id, &reason).await;
        return CacheStatus::Error;
    }

    let cached = info.status == TorrentStatus::Downloaded;

    // Never remove a torrent that is already filling a collected item.
    let protected = match options.imdb_id.as_deref() {
        Some(imdb_id) => {
            let names: Vec<String> = info.files.iter().map(|f| f.name().to_string()).collect();
            ctx.media.has_collected_file(imdb_id, &names).unwrap_or_else(|e| {
                warn!(error = %e, "Collected-file lookup failed, keeping torrent");
                true
            })
        }
        None => false,
    };

    if let Some(ref phalanx) = ctx.phalanx {
        phalanx.set_cache_status(&hash, cached).await;
    }

    let addition = NewTorrentAddition::new(
        &hash,
        trigger::CACHE_CHECK,
        "Added to check cache status",
        options.item_snapshot.clone().unwrap_or_else(|| json!({})),
    )
    .with_trigger_details(json!({
        "is_cached": cached,
        "torrent_id": torrent_id,
        "filename": info.filename,
        "item_id": options.item_id,
    }));
    if let Err(e) = ctx.tracking.record_or_update(&addition) {
        warn!(hash = %hash, error = %e, "Failed to record cache check");
    }

    let wants_removal = if cached {
        options.remove_cached
    } else {
        options.remove_uncached
    };
    if wants_removal && !protected {
        let reason = if cached {
            REASON_CACHED_REMOVAL
        } else {
            REASON_UNCACHED_REMOVAL
        };
        remove(provider, &torrent_id, reason).await;
    } else if wants_removal {
        info!(hash = %hash, "Torrent files are already collected, skipping removal");
    }

    if cached {
        CacheStatus::Cached
    } else {
        CacheStatus::NotCached
    }
}

fn mark_not_wanted(ctx: &CacheCheckContext, options: &CacheCheckOptions, hash: &str) {
    if let Some(item_id) = options.item_id {
        if let Err(e) = ctx.media.add_not_wanted(item_id, hash) {
            warn!(item_id, hash, error = %e, "Failed to mark hash not wanted");
        }
    }
}

async fn remove<P: DebridProvider + ?Sized>(provider: &P, torrent_id: &str, reason: &str) {
    if let Err(e) = provider.remove_torrent(torrent_id, reason).await {
        warn!(torrent_id, reason, error = %e, "Failed to remove torrent");
    }
}
