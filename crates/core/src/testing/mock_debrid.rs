//! Mock debrid provider for testing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::RwLock;

use crate::debrid::{
    check_cache, hash_from_source, ActiveDownloads, CacheCheckContext, CacheCheckOptions,
    CacheStatus, ConnectivityFailure, DebridError, DebridProvider, HashCaches, TorrentFile,
    TorrentInfo, TorrentInfoResult, TorrentSource, TorrentStatus, TorrentSummary, UserInfo,
};
use crate::media::MediaStore;
use crate::tracking::{trigger, NewTorrentAddition, TrackingStore};

/// A torrent the mock "knows": what adding its hash produces.
#[derive(Debug, Clone)]
struct CatalogEntry {
    name: String,
    files: Vec<TorrentFile>,
    cached: bool,
}

/// A torrent currently on the mock account.
#[derive(Debug, Clone)]
struct AccountTorrent {
    id: String,
    hash: String,
    entry: CatalogEntry,
}

#[derive(Default)]
struct MockState {
    catalog: HashMap<String, CatalogEntry>,
    account: Vec<AccountTorrent>,
    next_id: u64,
    scripted_cache: HashMap<String, CacheStatus>,
    active_downloads: Option<ActiveDownloads>,
    next_add_error: Option<DebridError>,
    list_error: Option<DebridError>,
    connectivity_failure: Option<ConnectivityFailure>,
    added: Vec<String>,
    removals: Vec<(String, String)>,
}

/// Mock implementation of the DebridProvider trait.
///
/// Behaves like a small in-memory debrid account:
/// - Torrents are registered per hash as cached or uncached with a file list
/// - Adding creates an account entry, removing deletes it
/// - `is_cached` runs the shared add-and-check flow unless a status is scripted
/// - Adds and removals are recorded for assertions
///
/// # Example
///
/// ```rust,ignore
/// let provider = MockDebridProvider::new(media, tracking);
/// provider.add_cached_torrent(&hash, "Movie.2023.1080p", &["movie.mkv"]).await;
/// provider.set_active_downloads(ActiveDownloads { active: 25, limit: 25 }).await;
/// ```
pub struct MockDebridProvider {
    state: Arc<RwLock<MockState>>,
    caches: HashCaches,
    cache_ctx: CacheCheckContext,
    tracking: Arc<dyn TrackingStore>,
}

impl MockDebridProvider {
    pub fn new(media: Arc<dyn MediaStore>, tracking: Arc<dyn TrackingStore>) -> Self {
        Self {
            state: Arc::new(RwLock::new(MockState::default())),
            caches: HashCaches::new(),
            cache_ctx: CacheCheckContext {
                phalanx: None,
                media,
                tracking: tracking.clone(),
            },
            tracking,
        }
    }

    async fn register(&self, hash: &str, name: &str, files: &[&str], cached: bool) {
        let files = files
            .iter()
            .enumerate()
            .map(|(i, path)| TorrentFile {
                id: i as u64 + 1,
                path: format!("/{}", path),
                bytes: 1024 * 1024 * 1024,
                selected: true,
            })
            .collect();
        self.state.write().await.catalog.insert(
            hash.to_lowercase(),
            CatalogEntry {
                name: name.to_string(),
                files,
                cached,
            },
        );
    }

    /// Register a hash that is fully cached on the service.
    pub async fn add_cached_torrent(&self, hash: &str, name: &str, files: &[&str]) {
        self.register(hash, name, files, true).await;
    }

    /// Register a hash that would need downloading.
    pub async fn add_uncached_torrent(&self, hash: &str, name: &str, files: &[&str]) {
        self.register(hash, name, files, false).await;
    }

    /// Make `is_cached` return `status` for this hash without touching the account.
    pub async fn set_cache_status(&self, hash: &str, status: CacheStatus) {
        self.state
            .write()
            .await
            .scripted_cache
            .insert(hash.to_lowercase(), status);
    }

    /// Fix the reported download slot usage.
    pub async fn set_active_downloads(&self, downloads: ActiveDownloads) {
        self.state.write().await.active_downloads = Some(downloads);
    }

    /// The next `add_torrent` call fails with this error.
    pub async fn set_next_add_error(&self, error: DebridError) {
        self.state.write().await.next_add_error = Some(error);
    }

    /// Every `list_active`/`verify_present` call fails with this error until cleared.
    pub async fn set_list_error(&self, error: Option<DebridError>) {
        self.state.write().await.list_error = error;
    }

    pub async fn set_connectivity_failure(&self, failure: Option<ConnectivityFailure>) {
        self.state.write().await.connectivity_failure = failure;
    }

    /// Drop a torrent from the account behind the provider's back.
    pub async fn remove_externally(&self, hash: &str) {
        let hash = hash.to_lowercase();
        self.state.write().await.account.retain(|t| t.hash != hash);
    }

    /// Hashes currently on the account, in add order.
    pub async fn active_hashes(&self) -> Vec<String> {
        self.state
            .read()
            .await
            .account
            .iter()
            .map(|t| t.hash.clone())
            .collect()
    }

    /// Hashes passed to successful `add_torrent` calls.
    pub async fn added_hashes(&self) -> Vec<String> {
        self.state.read().await.added.clone()
    }

    /// `(torrent_id, reason)` for every removal.
    pub async fn removals(&self) -> Vec<(String, String)> {
        self.state.read().await.removals.clone()
    }

    fn info_for(torrent: &AccountTorrent) -> TorrentInfo {
        let status = if torrent.entry.cached {
            TorrentStatus::Downloaded
        } else {
            TorrentStatus::Downloading
        };
        TorrentInfo {
            id: torrent.id.clone(),
            filename: torrent.entry.name.clone(),
            hash: torrent.hash.clone(),
            status,
            raw_status: if torrent.entry.cached {
                "downloaded".to_string()
            } else {
                "downloading".to_string()
            },
            files: torrent.entry.files.clone(),
            progress: if torrent.entry.cached { 100.0 } else { 0.0 },
            bytes: torrent.entry.files.iter().map(|f| f.bytes).sum(),
        }
    }
}

#[async_trait]
impl DebridProvider for MockDebridProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn add_torrent(&self, source: &TorrentSource) -> Result<String, DebridError> {
        let hash =
            hash_from_source(source).map_err(|e| DebridError::InvalidSource(e.to_string()))?;

        let (id, name) = {
            let mut state = self.state.write().await;
            if let Some(error) = state.next_add_error.take() {
                return Err(error);
            }
            let existing = state
                .account
                .iter()
                .find(|t| t.hash == hash)
                .map(|t| (t.id.clone(), t.entry.name.clone()));
            if let Some((id, name)) = existing {
                drop(state);
                self.caches.remember(&hash, &id, Some(&name));
                return Ok(id);
            }
            let entry = state
                .catalog
                .get(&hash)
                .cloned()
                .ok_or_else(|| DebridError::AddError(format!("unknown torrent {}", hash)))?;
            state.next_id += 1;
            let id = format!("MOCK{}", state.next_id);
            let name = entry.name.clone();
            state.account.push(AccountTorrent {
                id: id.clone(),
                hash: hash.clone(),
                entry,
            });
            state.added.push(hash.clone());
            (id, name)
        };

        self.caches.remember(&hash, &id, Some(&name));
        let addition = NewTorrentAddition::new(
            &hash,
            trigger::DEBRID_ADD,
            "Torrent added to debrid account",
            json!({}),
        )
        .with_trigger_details(json!({ "torrent_id": id }));
        let _ = self.tracking.record_or_update(&addition);
        Ok(id)
    }

    async fn get_torrent_info(&self, torrent_id: &str) -> TorrentInfoResult {
        let state = self.state.read().await;
        match state.account.iter().find(|t| t.id == torrent_id) {
            Some(torrent) => TorrentInfoResult::Ok(Self::info_for(torrent)),
            None => TorrentInfoResult::NotFound,
        }
    }

    async fn is_cached(&self, source: &TorrentSource, options: &CacheCheckOptions) -> CacheStatus {
        if let Ok(hash) = hash_from_source(source) {
            if let Some(status) = self.state.read().await.scripted_cache.get(&hash) {
                return *status;
            }
        }
        check_cache(self, &self.cache_ctx, source, options).await
    }

    async fn list_active(&self) -> Result<Vec<TorrentSummary>, DebridError> {
        let state = self.state.read().await;
        if let Some(ref error) = state.list_error {
            return Err(error.clone());
        }
        Ok(state
            .account
            .iter()
            .map(|t| {
                let info = Self::info_for(t);
                TorrentSummary {
                    id: info.id,
                    filename: info.filename,
                    hash: info.hash,
                    status: info.status,
                    bytes: info.bytes,
                }
            })
            .collect())
    }

    async fn get_active_downloads(&self) -> Result<ActiveDownloads, DebridError> {
        let state = self.state.read().await;
        Ok(state.active_downloads.unwrap_or(ActiveDownloads {
            active: state.account.iter().filter(|t| !t.entry.cached).count() as u32,
            limit: 25,
        }))
    }

    async fn remove_torrent(&self, torrent_id: &str, reason: &str) -> Result<(), DebridError> {
        let hash = {
            let mut state = self.state.write().await;
            state
                .removals
                .push((torrent_id.to_string(), reason.to_string()));
            let hash = state
                .account
                .iter()
                .find(|t| t.id == torrent_id)
                .map(|t| t.hash.clone());
            state.account.retain(|t| t.id != torrent_id);
            hash.or_else(|| self.caches.hash_for_id(torrent_id))
        };
        self.caches.forget_id(torrent_id);
        if let Some(hash) = hash {
            let _ = self.tracking.mark_removed(&hash, reason);
        }
        Ok(())
    }

    fn get_cached_torrent_id(&self, hash: &str) -> Option<String> {
        self.caches.torrent_id(hash)
    }

    fn get_cached_torrent_title(&self, hash: &str) -> Option<String> {
        self.caches.title(hash)
    }

    async fn verify_present(&self, hash: &str) -> Result<bool, DebridError> {
        let hash = hash.to_lowercase();
        Ok(self.list_active().await?.iter().any(|t| t.hash == hash))
    }

    async fn connectivity_check(&self) -> Result<(), ConnectivityFailure> {
        match self.state.read().await.connectivity_failure.clone() {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }

    async fn user_info(&self) -> Result<UserInfo, DebridError> {
        Ok(UserInfo {
            username: "mock".to_string(),
            premium: true,
            expiration: None,
        })
    }
}
