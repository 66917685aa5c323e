//! Types for debrid provider operations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::RequestError;

/// Errors surfaced by a debrid provider.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DebridError {
    /// Credentials rejected. Not retryable; needs user intervention.
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limited by provider")]
    RateLimited,

    /// Timeouts, 5xx and connection failures that survived the retry wrapper.
    #[error("Transient error: {0}")]
    Transient(String),

    #[error("Torrent not found: {0}")]
    NotFound(String),

    #[error("Failed to add torrent: {0}")]
    AddError(String),

    #[error("No video files found in torrent {0}")]
    NoVideoFiles(String),

    #[error("Torrent {hash} is in error status {status}")]
    ErrorStatus { hash: String, status: String },

    #[error("Too many active downloads ({active}/{limit})")]
    TooManyDownloads { active: u32, limit: u32 },

    #[error("Invalid torrent source: {0}")]
    InvalidSource(String),

    #[error("Unexpected provider response: {0}")]
    Api(String),
}

impl DebridError {
    pub fn is_auth(&self) -> bool {
        matches!(self, DebridError::Auth(_))
    }

    /// The provider could not serve the call right now; retrying later may succeed.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, DebridError::RateLimited | DebridError::Transient(_))
    }
}

impl From<RequestError> for DebridError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::Auth { status } => DebridError::Auth(format!("HTTP {}", status)),
            RequestError::RateLimited => DebridError::RateLimited,
            RequestError::Transient(msg) => DebridError::Transient(msg),
            RequestError::NotFound => DebridError::NotFound("resource".to_string()),
            RequestError::Client { status, message } => {
                DebridError::Api(format!("HTTP {}: {}", status, message))
            }
            RequestError::Server { status } => DebridError::Transient(format!("HTTP {}", status)),
            RequestError::Decode(msg) => DebridError::Api(msg),
        }
    }
}

/// Canonical torrent status. Ordered so that `status >= Downloading` means
/// the torrent has started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorrentStatus {
    Queued,
    Downloading,
    Downloaded,
    Error,
}

impl TorrentStatus {
    /// Map a provider status code to the canonical status.
    pub fn from_provider(code: &str) -> Self {
        match code {
            "queued" | "magnet_conversion" | "waiting_files_selection" => TorrentStatus::Queued,
            "downloading" | "compressing" | "uploading" => TorrentStatus::Downloading,
            "downloaded" | "ready" => TorrentStatus::Downloaded,
            _ => TorrentStatus::Error,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TorrentStatus::Queued => "queued",
            TorrentStatus::Downloading => "downloading",
            TorrentStatus::Downloaded => "downloaded",
            TorrentStatus::Error => "error",
        }
    }
}

/// A file inside a torrent on the debrid account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorrentFile {
    pub id: u64,
    pub path: String,
    pub bytes: u64,
    pub selected: bool,
}

impl TorrentFile {
    /// Final path component.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Detailed torrent information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorrentInfo {
    pub id: String,
    pub filename: String,
    pub hash: String,
    pub status: TorrentStatus,
    /// Provider status code before mapping.
    pub raw_status: String,
    pub files: Vec<TorrentFile>,
    /// Progress percentage (0-100).
    pub progress: f64,
    pub bytes: u64,
}

/// Outcome of a torrent info lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum TorrentInfoResult {
    Ok(TorrentInfo),
    NotFound,
    RateLimited,
    ClientError(u16),
    ServerError(u16),
    RequestError,
    UnknownError(String),
}

impl TorrentInfoResult {
    pub fn ok(self) -> Option<TorrentInfo> {
        match self {
            TorrentInfoResult::Ok(info) => Some(info),
            _ => None,
        }
    }

    /// Convert into a provider error, keeping `Ok` as a value.
    pub fn into_result(self, torrent_id: &str) -> Result<TorrentInfo, DebridError> {
        match self {
            TorrentInfoResult::Ok(info) => Ok(info),
            TorrentInfoResult::NotFound => Err(DebridError::NotFound(torrent_id.to_string())),
            TorrentInfoResult::RateLimited => Err(DebridError::RateLimited),
            TorrentInfoResult::ClientError(401) | TorrentInfoResult::ClientError(403) => {
                Err(DebridError::Auth(format!("torrent info {}", torrent_id)))
            }
            TorrentInfoResult::ClientError(code) => {
                Err(DebridError::Api(format!("HTTP {} for torrent {}", code, torrent_id)))
            }
            TorrentInfoResult::ServerError(code) => {
                Err(DebridError::Transient(format!("HTTP {}", code)))
            }
            TorrentInfoResult::RequestError => {
                Err(DebridError::Transient("request failed".to_string()))
            }
            TorrentInfoResult::UnknownError(msg) => Err(DebridError::Api(msg)),
        }
    }
}

impl From<Result<TorrentInfo, RequestError>> for TorrentInfoResult {
    fn from(result: Result<TorrentInfo, RequestError>) -> Self {
        match result {
            Ok(info) => TorrentInfoResult::Ok(info),
            Err(RequestError::NotFound) => TorrentInfoResult::NotFound,
            Err(RequestError::RateLimited) => TorrentInfoResult::RateLimited,
            Err(RequestError::Auth { status }) => TorrentInfoResult::ClientError(status),
            Err(RequestError::Client { status, .. }) => TorrentInfoResult::ClientError(status),
            Err(RequestError::Server { status }) => TorrentInfoResult::ServerError(status),
            Err(RequestError::Transient(_)) => TorrentInfoResult::RequestError,
            Err(RequestError::Decode(msg)) => TorrentInfoResult::UnknownError(msg),
        }
    }
}

/// A torrent listed on the account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorrentSummary {
    pub id: String,
    pub filename: String,
    pub hash: String,
    pub status: TorrentStatus,
    pub bytes: u64,
}

/// Result of a cache check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    Cached,
    NotCached,
    /// The torrent itself is unusable (no hash, no video files, errored).
    Error,
    /// Rate limited or unreachable; the torrent was not judged.
    Unavailable,
    /// Credentials rejected.
    Unauthorized,
}

impl CacheStatus {
    /// Status for a provider error hit mid-check.
    pub fn from_error(err: &DebridError) -> Self {
        if err.is_auth() {
            CacheStatus::Unauthorized
        } else if err.is_unavailable() {
            CacheStatus::Unavailable
        } else {
            CacheStatus::Error
        }
    }
}

/// What to add to the debrid account.
#[derive(Debug, Clone, PartialEq)]
pub enum TorrentSource {
    Magnet(String),
    /// Raw .torrent file bytes.
    File { bytes: Vec<u8>, name: Option<String> },
}

impl TorrentSource {
    pub fn magnet(uri: impl Into<String>) -> Self {
        TorrentSource::Magnet(uri.into())
    }

    pub fn file(bytes: Vec<u8>) -> Self {
        TorrentSource::File { bytes, name: None }
    }

    /// Returns "magnet" or "file" for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            TorrentSource::Magnet(_) => "magnet",
            TorrentSource::File { .. } => "file",
        }
    }
}

/// Options for [`DebridProvider::is_cached`].
#[derive(Debug, Clone, Default)]
pub struct CacheCheckOptions {
    /// Remove the torrent afterwards if it turned out cached.
    pub remove_cached: bool,
    /// Remove the torrent afterwards if it turned out not cached.
    pub remove_uncached: bool,
    /// Item whose not-wanted set receives bad hashes.
    pub item_id: Option<i64>,
    /// Used to protect files already collected for the same title.
    pub imdb_id: Option<String>,
    /// Snapshot of the item for tracking records.
    pub item_snapshot: Option<Value>,
}

/// Download slot usage as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveDownloads {
    pub active: u32,
    /// Effective limit after applying the configured ratio.
    pub limit: u32,
}

impl ActiveDownloads {
    pub fn is_full(&self) -> bool {
        self.active >= self.limit
    }
}

/// Account details from the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub username: String,
    pub premium: bool,
    pub expiration: Option<String>,
}

/// Why a connectivity check failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectivityFailure {
    pub service: String,
    /// "auth", "network" or "api".
    pub kind: String,
    pub message: String,
}

/// Trait for debrid service backends.
///
/// Each provider owns its per-hash torrent id and title caches. Errors are
/// typed; transient failures have already been retried by the time they
/// reach the caller.
#[async_trait]
pub trait DebridProvider: Send + Sync {
    /// Provider name for logging and notifications.
    fn name(&self) -> &str;

    /// Add a torrent and return its provider id. Reuses an existing torrent
    /// with the same hash.
    async fn add_torrent(&self, source: &TorrentSource) -> Result<String, DebridError>;

    async fn get_torrent_info(&self, torrent_id: &str) -> TorrentInfoResult;

    /// Determine whether a torrent is instantly available.
    async fn is_cached(&self, source: &TorrentSource, options: &CacheCheckOptions) -> CacheStatus;

    async fn list_active(&self) -> Result<Vec<TorrentSummary>, DebridError>;

    async fn get_active_downloads(&self) -> Result<ActiveDownloads, DebridError>;

    /// Remove a torrent. Removing an already-removed torrent succeeds.
    async fn remove_torrent(&self, torrent_id: &str, reason: &str) -> Result<(), DebridError>;

    /// Torrent id recorded for this hash by a previous add or cache check.
    fn get_cached_torrent_id(&self, hash: &str) -> Option<String>;

    /// Torrent filename recorded for this hash.
    fn get_cached_torrent_title(&self, hash: &str) -> Option<String>;

    /// Whether a torrent with this hash is on the account.
    async fn verify_present(&self, hash: &str) -> Result<bool, DebridError>;

    async fn connectivity_check(&self) -> Result<(), ConnectivityFailure>;

    async fn user_info(&self) -> Result<UserInfo, DebridError>;
}
