//! Real-Debrid provider implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{DebridConfig, RetryConfig};
use crate::metrics::DEBRID_ROLLBACKS;
use crate::tracking::{trigger, NewTorrentAddition, TrackingStore};

use super::cache_check::{check_cache, CacheCheckContext, REASON_NO_VIDEO};
use super::files::video_files;
use super::hash::hash_from_source;
use super::request::{GatedClient, RawResponse, RequestBody, RequestError};
use super::retry::retry_request;
use super::{
    ActiveDownloads, CacheCheckOptions, CacheStatus, ConnectivityFailure, DebridError,
    DebridProvider, HashCaches, TorrentFile, TorrentInfo, TorrentInfoResult, TorrentSource,
    TorrentStatus, TorrentSummary, UserInfo,
};

const SERVICE: &str = "real_debrid";
const SELECT_ATTEMPTS: u32 = 5;
const SELECT_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct RdTorrent {
    id: String,
    #[serde(default)]
    filename: String,
    #[serde(default)]
    hash: String,
    #[serde(default)]
    bytes: u64,
    #[serde(default)]
    status: String,
    #[serde(default)]
    progress: f64,
    #[serde(default)]
    files: Vec<RdFile>,
}

#[derive(Debug, Deserialize)]
struct RdFile {
    id: u64,
    path: String,
    bytes: u64,
    #[serde(default)]
    selected: u8,
}

#[derive(Debug, Deserialize)]
struct RdAdded {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RdActiveCount {
    nb: u32,
    limit: u32,
}

#[derive(Debug, Deserialize)]
struct RdUser {
    username: String,
    #[serde(default)]
    premium: u64,
    expiration: Option<String>,
}

impl RdTorrent {
    fn into_info(self) -> TorrentInfo {
        TorrentInfo {
            status: TorrentStatus::from_provider(&self.status),
            raw_status: self.status,
            hash: self.hash.to_lowercase(),
            files: self
                .files
                .into_iter()
                .map(|f| TorrentFile {
                    id: f.id,
                    path: f.path,
                    bytes: f.bytes,
                    selected: f.selected == 1,
                })
                .collect(),
            id: self.id,
            filename: self.filename,
            progress: self.progress,
            bytes: self.bytes,
        }
    }

    fn into_summary(self) -> TorrentSummary {
        TorrentSummary {
            status: TorrentStatus::from_provider(&self.status),
            hash: self.hash.to_lowercase(),
            id: self.id,
            filename: self.filename,
            bytes: self.bytes,
        }
    }
}

/// Real-Debrid REST API client.
pub struct RealDebridProvider {
    http: GatedClient,
    retry: RetryConfig,
    caches: HashCaches,
    cache_ctx: CacheCheckContext,
    tracking: Arc<dyn TrackingStore>,
    download_limit_ratio: f64,
    add_poll_timeout: Duration,
    add_poll_interval: Duration,
    connectivity_timeout: Duration,
}

impl RealDebridProvider {
    pub fn new(config: &DebridConfig, cache_ctx: CacheCheckContext) -> Result<Self, DebridError> {
        let http = GatedClient::new(
            SERVICE,
            &config.base_url,
            &config.api_key,
            Duration::from_secs(config.timeout_secs),
            &config.rate_limit,
        )?;

        Ok(Self {
            http,
            retry: config.retry.clone(),
            caches: HashCaches::new(),
            tracking: cache_ctx.tracking.clone(),
            cache_ctx,
            download_limit_ratio: config.download_limit_ratio,
            add_poll_timeout: Duration::from_secs(config.add_poll_timeout_secs),
            add_poll_interval: Duration::from_millis(config.add_poll_interval_ms),
            connectivity_timeout: Duration::from_secs(config.connectivity_timeout_secs),
        })
    }

    /// Current request gate interval, for diagnostics.
    pub async fn current_request_interval(&self) -> Duration {
        self.http.gate().current_interval().await
    }

    async fn call(
        &self,
        method: Method,
        endpoint: &str,
        body: RequestBody,
        params: &[(&str, String)],
    ) -> Result<RawResponse, RequestError> {
        let http = &self.http;
        let name = format!("{} {}", method, endpoint);
        retry_request(
            move || http.request(method.clone(), endpoint, body.clone(), params),
            &self.retry,
            &name,
        )
        .await
    }

    async fn fetch_info(&self, torrent_id: &str) -> Result<TorrentInfo, RequestError> {
        let endpoint = format!("/torrents/info/{}", torrent_id);
        let response = self
            .call(Method::GET, &endpoint, RequestBody::Empty, &[])
            .await?;
        Ok(response.json::<RdTorrent>()?.into_info())
    }

    async fn upload(&self, source: &TorrentSource) -> Result<String, DebridError> {
        let response = match source {
            TorrentSource::Magnet(uri) => {
                let fields = vec![("magnet".to_string(), uri.clone())];
                self.call(
                    Method::POST,
                    "/torrents/addMagnet",
                    RequestBody::Form(fields),
                    &[],
                )
                .await
            }
            TorrentSource::File { bytes, .. } => {
                self.call(
                    Method::PUT,
                    "/torrents/addTorrent",
                    RequestBody::Bytes(bytes.clone()),
                    &[],
                )
                .await
            }
        }
        .map_err(|e| match e {
            RequestError::Auth { status } => DebridError::Auth(format!("HTTP {}", status)),
            other => DebridError::AddError(other.to_string()),
        })?;

        let added: RdAdded = response
            .json()
            .map_err(|e| DebridError::AddError(e.to_string()))?;
        Ok(added.id)
    }

    /// Select the video files of a torrent. Samples never count as video.
    async fn select_files(&self, info: &TorrentInfo) -> Result<(), DebridError> {
        let videos = video_files(&info.files);
        if videos.is_empty() {
            return Err(DebridError::NoVideoFiles(info.id.clone()));
        }
        let selection = videos
            .iter()
            .map(|f| f.id.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let endpoint = format!("/torrents/selectFiles/{}", info.id);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let body = RequestBody::Form(vec![("files".to_string(), selection.clone())]);
            match self.http.request(Method::POST, &endpoint, body, &[]).await {
                Ok(_) => {
                    debug!(torrent_id = %info.id, files = %selection, "Selected files");
                    return Ok(());
                }
                Err(e) if e.is_retryable() && attempt < SELECT_ATTEMPTS => {
                    warn!(torrent_id = %info.id, attempt, error = %e, "File selection failed, retrying");
                    tokio::time::sleep(SELECT_BACKOFF).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Poll until the torrent has started, selecting files when asked to.
    async fn wait_until_started(&self, torrent_id: &str) -> Result<TorrentInfo, DebridError> {
        let deadline = Instant::now() + self.add_poll_timeout;
        let mut selected = false;

        loop {
            let info = self
                .get_torrent_info(torrent_id)
                .await
                .into_result(torrent_id)?;

            if info.raw_status == "waiting_files_selection" && !selected {
                self.select_files(&info).await?;
                selected = true;
                continue;
            }
            if info.status >= TorrentStatus::Downloading {
                return Ok(info);
            }
            if Instant::now() >= deadline {
                return Err(DebridError::AddError(format!(
                    "torrent {} did not start within {}s (status {})",
                    torrent_id,
                    self.add_poll_timeout.as_secs(),
                    info.raw_status
                )));
            }
            tokio::time::sleep(self.add_poll_interval).await;
        }
    }

    /// Remove a torrent that was added but never became usable.
    ///
    /// When the removal fails the torrent stays on the account, so it is
    /// tracked as present and the drift task can find it later.
    async fn roll_back(&self, hash: &str, torrent_id: &str, source: &TorrentSource, reason: &str) {
        match self.remove_torrent(torrent_id, reason).await {
            Ok(()) => {
                DEBRID_ROLLBACKS.with_label_values(&[SERVICE, "removed"]).inc();
            }
            Err(e) => {
                DEBRID_ROLLBACKS.with_label_values(&[SERVICE, "failed"]).inc();
                warn!(hash, torrent_id, error = %e, "Rollback removal failed");
                let addition = NewTorrentAddition::new(
                    hash,
                    trigger::FAILED_ROLLBACK,
                    "Left on account after a failed rollback",
                    json!({}),
                )
                .with_trigger_details(json!({
                    "torrent_id": torrent_id,
                    "source": source.kind(),
                    "rollback_reason": reason,
                    "error": e.to_string(),
                }));
                if let Err(e) = self.tracking.record_or_update(&addition) {
                    warn!(hash, error = %e, "Failed to record orphaned torrent");
                }
            }
        }
    }

    fn record_addition(&self, hash: &str, torrent_id: &str, info: &TorrentInfo, source: &TorrentSource) {
        let addition = NewTorrentAddition::new(
            hash,
            trigger::DEBRID_ADD,
            "Torrent added to debrid account",
            json!({}),
        )
        .with_trigger_details(json!({
            "torrent_id": torrent_id,
            "source": source.kind(),
        }))
        .with_metadata(json!({
            "filename": info.filename,
            "status": info.raw_status,
            "bytes": info.bytes,
        }));
        if let Err(e) = self.tracking.record_or_update(&addition) {
            warn!(hash, error = %e, "Failed to record torrent addition");
        }
    }
}

#[async_trait]
impl DebridProvider for RealDebridProvider {
    fn name(&self) -> &str {
        SERVICE
    }

    async fn add_torrent(&self, source: &TorrentSource) -> Result<String, DebridError> {
        let hash =
            hash_from_source(source).map_err(|e| DebridError::InvalidSource(e.to_string()))?;

        if let Some(existing) = self
            .list_active()
            .await?
            .into_iter()
            .find(|t| t.hash == hash)
        {
            debug!(hash = %hash, torrent_id = %existing.id, "Torrent already on account");
            self.caches
                .remember(&hash, &existing.id, Some(&existing.filename));
            return Ok(existing.id);
        }

        let torrent_id = self.upload(source).await?;
        self.caches.remember(&hash, &torrent_id, None);

        let info = match self.wait_until_started(&torrent_id).await {
            Ok(info) => info,
            Err(e) => {
                warn!(hash = %hash, torrent_id = %torrent_id, error = %e, "Added torrent did not start");
                let reason = match e {
                    DebridError::NoVideoFiles(_) => REASON_NO_VIDEO,
                    _ => "Failed to start after addition",
                };
                self.roll_back(&hash, &torrent_id, source, reason).await;
                return Err(match e {
                    DebridError::Auth(msg) => DebridError::Auth(msg),
                    DebridError::NoVideoFiles(id) => DebridError::NoVideoFiles(id),
                    other => DebridError::AddError(other.to_string()),
                });
            }
        };

        if info.status == TorrentStatus::Error {
            self.roll_back(&hash, &torrent_id, source, "Torrent entered error status")
                .await;
            return Err(DebridError::ErrorStatus {
                hash,
                status: info.raw_status,
            });
        }

        self.caches
            .remember(&hash, &torrent_id, Some(&info.filename));
        self.record_addition(&hash, &torrent_id, &info, source);
        info!(hash = %hash, torrent_id = %torrent_id, filename = %info.filename, "Added torrent");
        Ok(torrent_id)
    }

    async fn get_torrent_info(&self, torrent_id: &str) -> TorrentInfoResult {
        let result = self.fetch_info(torrent_id).await;
        if let Ok(ref info) = result {
            self.caches.remember(&info.hash, &info.id, Some(&info.filename));
        }
        result.into()
    }

    async fn is_cached(&self, source: &TorrentSource, options: &CacheCheckOptions) -> CacheStatus {
        check_cache(self, &self.cache_ctx, source, options).await
    }

    async fn list_active(&self) -> Result<Vec<TorrentSummary>, DebridError> {
        let params = [("limit", "2500".to_string())];
        let response = self
            .call(Method::GET, "/torrents", RequestBody::Empty, &params)
            .await?;
        // 204 means no torrents
        if response.body.trim().is_empty() {
            return Ok(Vec::new());
        }
        let torrents: Vec<RdTorrent> = response.json()?;
        Ok(torrents.into_iter().map(RdTorrent::into_summary).collect())
    }

    async fn get_active_downloads(&self) -> Result<ActiveDownloads, DebridError> {
        let response = self
            .call(Method::GET, "/torrents/activeCount", RequestBody::Empty, &[])
            .await?;
        let count: RdActiveCount = response.json()?;
        Ok(ActiveDownloads {
            active: count.nb,
            limit: (count.limit as f64 * self.download_limit_ratio).round() as u32,
        })
    }

    async fn remove_torrent(&self, torrent_id: &str, reason: &str) -> Result<(), DebridError> {
        let hash = match self.caches.hash_for_id(torrent_id) {
            Some(hash) => Some(hash),
            None => self.fetch_info(torrent_id).await.ok().map(|i| i.hash),
        };

        let endpoint = format!("/torrents/delete/{}", torrent_id);
        match self
            .call(Method::DELETE, &endpoint, RequestBody::Empty, &[])
            .await
        {
            Ok(_) | Err(RequestError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }

        self.caches.forget_id(torrent_id);
        if let Some(hash) = hash {
            if let Err(e) = self.tracking.mark_removed(&hash, reason) {
                warn!(hash = %hash, error = %e, "Failed to record torrent removal");
            }
        }
        info!(torrent_id, reason, "Removed torrent");
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
        let failure = |kind: &str, message: String| ConnectivityFailure {
            service: SERVICE.to_string(),
            kind: kind.to_string(),
            message,
        };
        match self
            .http
            .request_with_timeout(Method::GET, "/user", self.connectivity_timeout)
            .await
        {
            Ok(_) => Ok(()),
            Err(e @ RequestError::Auth { .. }) => Err(failure("auth", e.to_string())),
            Err(e @ RequestError::Transient(_)) | Err(e @ RequestError::Server { .. }) => {
                Err(failure("network", e.to_string()))
            }
            Err(e) => Err(failure("api", e.to_string())),
        }
    }

    async fn user_info(&self) -> Result<UserInfo, DebridError> {
        let response = self
            .call(Method::GET, "/user", RequestBody::Empty, &[])
            .await?;
        let user: RdUser = response.json()?;
        Ok(UserInfo {
            username: user.username,
            premium: user.premium > 0,
            expiration: user.expiration,
        })
    }
}
