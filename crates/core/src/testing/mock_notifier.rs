//! Mock notifier for testing.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::config::NotifierKind;
use crate::notifications::{Notifier, NotifyError};

/// Mock implementation of the Notifier trait.
///
/// Records every delivered `(title, message)` pair. `fail_next(n)` makes the
/// next `n` attempts fail with a retryable error.
pub struct MockNotifier {
    name: String,
    messages: Arc<RwLock<Vec<(String, String)>>>,
    failures_left: Arc<RwLock<u32>>,
    attempts: Arc<RwLock<u32>>,
}

impl MockNotifier {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            messages: Arc::new(RwLock::new(Vec::new())),
            failures_left: Arc::new(RwLock::new(0)),
            attempts: Arc::new(RwLock::new(0)),
        }
    }

    pub async fn fail_next(&self, count: u32) {
        *self.failures_left.write().await = count;
    }

    pub async fn messages(&self) -> Vec<(String, String)> {
        self.messages.read().await.clone()
    }

    pub async fn attempts(&self) -> u32 {
        *self.attempts.read().await
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NotifierKind {
        NotifierKind::Discord
    }

    async fn send(&self, title: &str, message: &str) -> Result<(), NotifyError> {
        *self.attempts.write().await += 1;
        {
            let mut failures = self.failures_left.write().await;
            if *failures > 0 {
                *failures -= 1;
                return Err(NotifyError::Http("mock failure".to_string()));
            }
        }
        self.messages
            .write()
            .await
            .push((title.to_string(), message.to_string()));
        Ok(())
    }
}
