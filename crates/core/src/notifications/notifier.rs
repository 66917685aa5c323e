use std::time::Duration;

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use thiserror::Error;
use tracing::warn;

use crate::config::NotifierKind;
use crate::metrics;

/// Errors from a single delivery attempt.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("SMTP error: {0}")]
    Smtp(String),

    #[error("Invalid notifier configuration: {0}")]
    Config(String),
}

impl NotifyError {
    /// Configuration and 4xx failures will not improve on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            NotifyError::Http(_) | NotifyError::Smtp(_) => true,
            NotifyError::Status { status, .. } => *status == 429 || *status >= 500,
            NotifyError::Config(_) => false,
        }
    }
}

impl From<reqwest::Error> for NotifyError {
    fn from(e: reqwest::Error) -> Self {
        NotifyError::Http(e.to_string())
    }
}

/// An outbound notification channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> NotifierKind;

    /// Deliver one message. Implementations make a single attempt.
    async fn send(&self, title: &str, message: &str) -> Result<(), NotifyError>;
}

const MAX_ATTEMPTS: u32 = 3;

fn notify_backoff() -> ExponentialBackoff {
    let mut backoff = ExponentialBackoff {
        initial_interval: Duration::from_secs(1),
        max_interval: Duration::from_secs(8),
        multiplier: 2.0,
        randomization_factor: 0.1,
        max_elapsed_time: None,
        ..Default::default()
    };
    backoff.reset();
    backoff
}

/// Send with up to three attempts and exponential backoff.
pub async fn send_with_retry(
    notifier: &dyn Notifier,
    title: &str,
    message: &str,
) -> Result<(), NotifyError> {
    let mut backoff = notify_backoff();
    let mut attempt = 0;
    let result = loop {
        attempt += 1;
        match notifier.send(title, message).await {
            Ok(()) => break Ok(()),
            Err(e) if !e.is_retryable() || attempt >= MAX_ATTEMPTS => break Err(e),
            Err(e) => {
                let delay = backoff.next_backoff().unwrap_or(Duration::from_secs(1));
                warn!(
                    notifier = notifier.name(),
                    attempt = attempt,
                    error = %e,
                    "Notification failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    };

    let outcome = if result.is_ok() { "success" } else { "failed" };
    metrics::NOTIFICATIONS_SENT
        .with_label_values(&[notifier.kind().as_str(), outcome])
        .inc();
    result
}
