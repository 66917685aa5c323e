use std::time::Duration;

use async_trait::async_trait;

use crate::config::{NotifierKind, NtfyConfig};

use super::{Notifier, NotifyError};

/// ntfy topic push notifier.
pub struct NtfyNotifier {
    name: String,
    url: String,
    api_key: Option<String>,
    priority: Option<String>,
    client: reqwest::Client,
}

impl NtfyNotifier {
    pub fn new(name: &str, config: &NtfyConfig, timeout: Duration) -> Result<Self, NotifyError> {
        if config.topic.is_empty() {
            return Err(NotifyError::Config("ntfy topic is empty".to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            url: format!("{}/{}", config.host.trim_end_matches('/'), config.topic),
            api_key: config.api_key.clone(),
            priority: config.priority.clone(),
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }
}

#[async_trait]
impl Notifier for NtfyNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NotifierKind {
        NotifierKind::Ntfy
    }

    async fn send(&self, title: &str, message: &str) -> Result<(), NotifyError> {
        let mut request = self
            .client
            .post(&self.url)
            .header("Title", title)
            .header("Markdown", "yes")
            .body(message.to_string());
        if let Some(priority) = &self.priority {
            request = request.header("Priority", priority.as_str());
        }
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(NotifyError::Status {
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        })
    }
}
