//! Client for the optional Phalanx mesh-cache store.
//!
//! The store shares cache status between instances. It is advisory only:
//! any failure is logged and treated as "unknown".

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::PhalanxConfig;

#[derive(Debug, Deserialize)]
struct CacheEntry {
    cached: bool,
}

#[derive(Debug, Serialize)]
struct CacheUpdate<'a> {
    cached: bool,
    service: &'a str,
}

pub struct PhalanxClient {
    client: Client,
    base_url: String,
    service: String,
}

impl PhalanxClient {
    /// Build a client if the mesh cache is enabled.
    pub fn from_config(config: &PhalanxConfig, service: &str) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .ok()?;
        Some(Self {
            client,
            base_url: format!("{}:{}", config.url.trim_end_matches('/'), config.port),
            service: service.to_string(),
        })
    }

    /// Cached status known to the mesh, or `None` if unknown or unreachable.
    pub async fn get_cache_status(&self, hash: &str) -> Option<bool> {
        let url = format!("{}/api/cache/{}", self.base_url, hash.to_lowercase());
        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Phalanx lookup failed");
                return None;
            }
        };
        if !response.status().is_success() {
            debug!(status = %response.status(), hash, "Phalanx has no entry");
            return None;
        }
        response.json::<CacheEntry>().await.ok().map(|e| e.cached)
    }

    /// Publish a cache status. Failures are logged and ignored.
    pub async fn set_cache_status(&self, hash: &str, cached: bool) {
        let url = format!("{}/api/cache/{}", self.base_url, hash.to_lowercase());
        let body = CacheUpdate {
            cached,
            service: &self.service,
        };
        match self.client.post(&url).json(&body).send().await {
            Ok(r) if r.status().is_success() => {}
            Ok(r) => warn!(status = %r.status(), hash, "Phalanx update rejected"),
            Err(e) => warn!(error = %e, hash, "Phalanx update failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_config_builds_nothing() {
        assert!(PhalanxClient::from_config(&PhalanxConfig::default(), "real_debrid").is_none());
    }

    #[test]
    fn test_base_url_includes_port() {
        let config = PhalanxConfig {
            enabled: true,
            url: "http://mesh/".to_string(),
            port: 9000,
        };
        let client = PhalanxClient::from_config(&config, "real_debrid").unwrap();
        assert_eq!(client.base_url, "http://mesh:9000");
    }

    #[tokio::test]
    async fn test_unreachable_store_is_unknown() {
        let config = PhalanxConfig {
            enabled: true,
            url: "http://127.0.0.1".to_string(),
            port: 1,
        };
        let client = PhalanxClient::from_config(&config, "real_debrid").unwrap();
        assert_eq!(client.get_cache_status("abc").await, None);
        client.set_cache_status("abc", true).await;
    }
}
