use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::OverseerrConfig;

use super::NotifyError;

const SCAN_JOB_PATH: &str = "/api/v1/settings/jobs/plex-recently-added-scan/run";

struct Instance {
    config: OverseerrConfig,
    pending: AtomicBool,
}

/// Schedules one delayed "recently added" scan per Overseerr instance.
///
/// Calls arriving while a scan is already pending for an instance are
/// coalesced into that scan.
#[derive(Clone)]
pub struct OverseerrTrigger {
    instances: Arc<Vec<Instance>>,
    delay: Duration,
    client: reqwest::Client,
}

impl OverseerrTrigger {
    pub fn new(
        configs: &[OverseerrConfig],
        delay: Duration,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let mut instances = Vec::new();
        for config in configs.iter().filter(|c| c.enabled) {
            if !(config.url.starts_with("http://") || config.url.starts_with("https://")) {
                return Err(NotifyError::Config(format!(
                    "overseerr instance {:?} has no http(s) url: {:?}",
                    config.name, config.url
                )));
            }
            instances.push(Instance {
                config: config.clone(),
                pending: AtomicBool::new(false),
            });
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            instances: Arc::new(instances),
            delay,
            client,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Arm the timer for every instance without one pending.
    pub fn schedule(&self) {
        for index in 0..self.instances.len() {
            if self.instances[index].pending.swap(true, Ordering::SeqCst) {
                debug!(instance = %self.instances[index].config.name, "Scan already pending");
                continue;
            }
            let this = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(this.delay).await;
                let instance = &this.instances[index];
                instance.pending.store(false, Ordering::SeqCst);
                this.run_scan(&instance.config).await;
            });
        }
    }

    /// Whether a scan is pending for the named instance.
    pub fn is_pending(&self, name: &str) -> bool {
        self.instances
            .iter()
            .any(|i| i.config.name == name && i.pending.load(Ordering::SeqCst))
    }

    async fn run_scan(&self, config: &OverseerrConfig) {
        let url = format!("{}{}", config.url.trim_end_matches('/'), SCAN_JOB_PATH);
        match self
            .client
            .post(&url)
            .header("X-Api-Key", &config.api_key)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                info!(instance = %config.name, "Triggered recently-added scan");
            }
            Ok(response) => {
                warn!(instance = %config.name, status = %response.status(), "Recently-added scan rejected");
            }
            Err(e) => {
                warn!(instance = %config.name, error = %e, "Recently-added scan failed");
            }
        }
    }
}
