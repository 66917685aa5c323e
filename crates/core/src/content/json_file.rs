//! Wanted list read from a JSON file.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::ContentSourceConfig;

use super::{ContentSource, ContentSourceError, WantedEntry};

/// Reads a JSON array of [`WantedEntry`] on every poll.
pub struct JsonFileSource {
    name: String,
    path: PathBuf,
    versions: Vec<String>,
    check_period: Duration,
}

impl JsonFileSource {
    pub fn from_config(config: &ContentSourceConfig) -> Result<Self, ContentSourceError> {
        let path = config.path.clone().ok_or_else(|| {
            ContentSourceError::Config(format!("source '{}' has no path", config.name))
        })?;
        Ok(Self {
            name: config.name.clone(),
            path,
            versions: config.versions.clone(),
            check_period: Duration::from_secs(config.check_period_minutes * 60),
        })
    }
}

#[async_trait]
impl ContentSource for JsonFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_versions(&self) -> &[String] {
        &self.versions
    }

    fn check_period(&self) -> Duration {
        self.check_period
    }

    async fn fetch_wanted(&self) -> Result<Vec<WantedEntry>, ContentSourceError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| ContentSourceError::Io {
                path: self.path.clone(),
                source,
            })?;
        serde_json::from_str(&raw).map_err(|e| ContentSourceError::Parse(e.to_string()))
    }
}
