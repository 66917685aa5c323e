//! Debrid provider abstraction and the Real-Debrid implementation.
//!
//! Every outbound request goes through a per-service [`RateGate`] and the
//! [`retry_request`] wrapper. Cache status is learned by adding a torrent and
//! inspecting it, see [`check_cache`].

mod cache_check;
mod caches;
mod files;
mod hash;
mod phalanx;
mod real_debrid;
mod request;
mod retry;
mod types;

pub use cache_check::{
    check_cache, CacheCheckContext, REASON_CACHED_REMOVAL, REASON_NO_VIDEO,
    REASON_UNCACHED_REMOVAL,
};
pub use caches::HashCaches;
pub use files::{is_video_file, video_files, VIDEO_EXTENSIONS};
pub use hash::{
    extract_hash, hash_from_source, hash_from_torrent_bytes, magnet_from_hash, torrent_name,
    HashError,
};
pub use phalanx::PhalanxClient;
pub use real_debrid::RealDebridProvider;
pub use request::{GatedClient, RateGate, RawResponse, RequestBody, RequestError};
pub use retry::retry_request;
pub use types::*;
