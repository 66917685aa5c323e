use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::config::{DiscordConfig, NotifierKind};

use super::{Notifier, NotifyError};

/// Discord's per-message content limit.
pub(crate) const DISCORD_MAX_LEN: usize = 2000;

/// Discord webhook notifier.
pub struct DiscordNotifier {
    name: String,
    webhook_url: String,
    client: reqwest::Client,
}

impl DiscordNotifier {
    pub fn new(name: &str, config: &DiscordConfig, timeout: Duration) -> Result<Self, NotifyError> {
        if config.webhook_url.is_empty() {
            return Err(NotifyError::Config("discord webhook_url is empty".to_string()));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            name: name.to_string(),
            webhook_url: config.webhook_url.clone(),
            client,
        })
    }

    async fn post(&self, content: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&json!({ "content": content }))
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(NotifyError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

/// Split on line boundaries into chunks of at most `max_len` bytes.
/// A single line longer than `max_len` is cut at a char boundary.
pub(crate) fn split_message(message: &str, max_len: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in message.lines() {
        let mut line = line;
        while line.len() > max_len {
            let mut cut = max_len;
            while !line.is_char_boundary(cut) {
                cut -= 1;
            }
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            chunks.push(line[..cut].to_string());
            line = &line[cut..];
        }
        let needed = if current.is_empty() {
            line.len()
        } else {
            current.len() + 1 + line.len()
        };
        if needed > max_len {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[async_trait]
impl Notifier for DiscordNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NotifierKind {
        NotifierKind::Discord
    }

    async fn send(&self, _title: &str, message: &str) -> Result<(), NotifyError> {
        match self.post(message).await {
            Err(NotifyError::Status { status: 400, .. }) if message.len() > DISCORD_MAX_LEN => {
                let chunks = split_message(message, DISCORD_MAX_LEN);
                debug!(notifier = %self.name, chunks = chunks.len(), "Message too long, sending in chunks");
                for chunk in chunks {
                    self.post(&chunk).await?;
                }
                Ok(())
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};

    #[test]
    fn test_split_respects_lines() {
        let message = "aaaa\nbbbb\ncccc";
        assert_eq!(split_message(message, 9), vec!["aaaa\nbbbb", "cccc"]);
        assert_eq!(split_message(message, 100), vec![message]);
        assert_eq!(split_message("abcdefgh", 3), vec!["abc", "def", "gh"]);
    }

    async fn webhook(
        State(received): State<Arc<Mutex<Vec<String>>>>,
        Json(body): Json<serde_json::Value>,
    ) -> StatusCode {
        let content = body["content"].as_str().unwrap_or_default().to_string();
        if content.len() > DISCORD_MAX_LEN {
            return StatusCode::BAD_REQUEST;
        }
        received.lock().unwrap().push(content);
        StatusCode::NO_CONTENT
    }

    #[tokio::test]
    async fn test_oversized_message_is_chunked() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/hook", post(webhook))
            .with_state(received.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let notifier = DiscordNotifier::new(
            "discord",
            &DiscordConfig {
                webhook_url: format!("http://{}/hook", addr),
            },
            Duration::from_secs(5),
        )
        .unwrap();

        let line = "x".repeat(99);
        let message = vec![line; 30].join("\n");
        notifier.send("title", &message).await.unwrap();

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 2);
        assert!(received.iter().all(|c| c.len() <= DISCORD_MAX_LEN));
        assert_eq!(received.join("\n"), message);
    }
}
