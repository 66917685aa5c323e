use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::{EmailConfig, NotifierKind};

use super::{Notifier, NotifyError};

/// SMTP notifier with optional STARTTLS and optional authentication.
pub struct EmailNotifier {
    name: String,
    from: Mailbox,
    to: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailNotifier {
    pub fn new(name: &str, config: &EmailConfig, timeout: Duration) -> Result<Self, NotifyError> {
        let from: Mailbox = config
            .from_address
            .parse()
            .map_err(|e| NotifyError::Config(format!("from_address: {}", e)))?;
        let to: Mailbox = config
            .to_address
            .parse()
            .map_err(|e| NotifyError::Config(format!("to_address: {}", e)))?;

        let mut builder = if config.use_starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_server)
                .map_err(|e| NotifyError::Config(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_server)
        };
        builder = builder.port(config.smtp_port).timeout(Some(timeout));
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            name: name.to_string(),
            from,
            to,
            transport: builder.build(),
        })
    }

    fn build_message(&self, title: &str, message: &str) -> Result<Message, NotifyError> {
        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(title)
            .header(ContentType::TEXT_PLAIN)
            .body(message.replace("**", ""))
            .map_err(|e| NotifyError::Config(e.to_string()))
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NotifierKind {
        NotifierKind::Email
    }

    async fn send(&self, title: &str, message: &str) -> Result<(), NotifyError> {
        let email = self.build_message(title, message)?;
        self.transport
            .send(email)
            .await
            .map(|_| ())
            .map_err(|e| NotifyError::Smtp(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EmailConfig {
        EmailConfig {
            smtp_server: "smtp.example.com".to_string(),
            smtp_port: 587,
            username: Some("user".to_string()),
            password: Some("pass".to_string()),
            from_address: "debridarr@example.com".to_string(),
            to_address: "me@example.com".to_string(),
            use_starttls: true,
        }
    }

    #[tokio::test]
    async fn test_builds_plain_text_message() {
        let notifier = EmailNotifier::new("mail", &config(), Duration::from_secs(5)).unwrap();
        let message = notifier
            .build_message("Collected", "🎬 **The Movie** (2023) → Collected")
            .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Collected"));
        assert!(raw.contains("To: me@example.com"));
    }

    #[test]
    fn test_rejects_bad_address() {
        let mut bad = config();
        bad.to_address = "not an address".to_string();
        assert!(matches!(
            EmailNotifier::new("mail", &bad, Duration::from_secs(5)),
            Err(NotifyError::Config(_))
        ));
    }
}
