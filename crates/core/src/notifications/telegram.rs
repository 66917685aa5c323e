use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::config::{NotifierKind, TelegramConfig};

use super::{Notifier, NotifyError};

/// Telegram bot notifier.
pub struct TelegramNotifier {
    name: String,
    chat_id: String,
    endpoint: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(name: &str, config: &TelegramConfig, timeout: Duration) -> Result<Self, NotifyError> {
        if config.bot_token.is_empty() || config.chat_id.is_empty() {
            return Err(NotifyError::Config(
                "telegram bot_token and chat_id are required".to_string(),
            ));
        }
        Ok(Self {
            name: name.to_string(),
            chat_id: config.chat_id.clone(),
            endpoint: format!(
                "{}/bot{}/sendMessage",
                config.api_base.trim_end_matches('/'),
                config.bot_token
            ),
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NotifierKind {
        NotifierKind::Telegram
    }

    async fn send(&self, _title: &str, message: &str) -> Result<(), NotifyError> {
        // Telegram Markdown uses single asterisks for bold.
        let text = message.replace("**", "*");
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({
                "chat_id": self.chat_id,
                "text": text,
                "parse_mode": "Markdown",
            }))
            .send()
            .await?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::extract::{Path, State};
    use axum::routing::post;
    use axum::{Json, Router};

    #[tokio::test]
    async fn test_posts_to_bot_endpoint() {
        let received: Arc<Mutex<Vec<(String, serde_json::Value)>>> = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route(
                "/{bot}/sendMessage",
                post(
                    |State(received): State<Arc<Mutex<Vec<(String, serde_json::Value)>>>>,
                     Path(bot): Path<String>,
                     Json(body): Json<serde_json::Value>| async move {
                        received.lock().unwrap().push((bot, body));
                        Json(json!({ "ok": true }))
                    },
                ),
            )
            .with_state(received.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let notifier = TelegramNotifier::new(
            "tg",
            &TelegramConfig {
                bot_token: "123:abc".to_string(),
                chat_id: "42".to_string(),
                api_base: format!("http://{}", addr),
            },
            Duration::from_secs(5),
        )
        .unwrap();
        notifier.send("title", "**Show** → Collected").await.unwrap();

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0, "bot123:abc");
        assert_eq!(received[0].1["chat_id"], "42");
        assert_eq!(received[0].1["text"], "*Show* → Collected");
    }
}
