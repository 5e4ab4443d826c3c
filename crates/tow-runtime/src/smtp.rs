//! SMTP Notification Provider
//!
//! Sends payment requests as plain-text email through an SMTP relay.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use tow_core::{NotificationError, NotificationService};

/// SMTP relay settings and sender identity
#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
}

impl SmtpConfig {
    /// Read `SMTP_*` variables; `None` when no server is configured
    pub fn from_env() -> Option<Self> {
        let server = std::env::var("SMTP_SERVER").ok().filter(|s| !s.is_empty())?;
        Some(Self {
            server,
            port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(587),
            username: std::env::var("SMTP_USERNAME").unwrap_or_default(),
            password: std::env::var("SMTP_PASSWORD").unwrap_or_default(),
            from_email: std::env::var("SMTP_FROM_EMAIL")
                .unwrap_or_else(|_| "dispatch@example.com".into()),
            from_name: std::env::var("SMTP_FROM_NAME").unwrap_or_else(|_| "Tow Dispatch".into()),
        })
    }

    fn sender(&self) -> Result<Mailbox, NotificationError> {
        format!("{} <{}>", self.from_name, self.from_email)
            .parse()
            .map_err(|e| NotificationError(format!("Invalid from address: {e}")))
    }
}

/// `NotificationService` over SMTP
pub struct SmtpNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self, NotificationError> {
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.server)
            .map_err(|e| NotificationError(format!("SMTP relay error: {e}")))?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self {
            mailer,
            sender: config.sender()?,
        })
    }
}

/// Build the message; split out so addressing can be tested without a relay
fn compose(
    sender: &Mailbox,
    address: &str,
    subject: &str,
    body: &str,
) -> Result<Message, NotificationError> {
    let recipient: Mailbox = address
        .parse()
        .map_err(|e| NotificationError(format!("Invalid to address '{address}': {e}")))?;

    Message::builder()
        .from(sender.clone())
        .to(recipient)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())
        .map_err(|e| NotificationError(format!("Failed to build email: {e}")))
}

#[async_trait]
impl NotificationService for SmtpNotifier {
    async fn send(&self, address: &str, subject: &str, body: &str) -> Result<(), NotificationError> {
        let email = compose(&self.sender, address, subject, body)?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| NotificationError(format!("Failed to send email: {e}")))?;

        info!(to = %address, subject, "Sent email");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SmtpConfig {
        SmtpConfig {
            server: "smtp.example.com".into(),
            port: 587,
            username: "user".into(),
            password: "secret".into(),
            from_email: "dispatch@acme-towing.com".into(),
            from_name: "Acme Towing".into(),
        }
    }

    #[test]
    fn test_compose_plain_text() {
        let sender = config().sender().unwrap();
        let message = compose(&sender, "driver@example.com", "Your tow", "Pay here").unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("To: driver@example.com"));
        assert!(raw.contains("Subject: Your tow"));
        assert!(raw.contains("Acme Towing"));
    }

    #[test]
    fn test_rejects_bad_recipient() {
        let sender = config().sender().unwrap();
        let err = compose(&sender, "not an address", "Your tow", "Pay here").unwrap_err();
        assert!(err.0.contains("Invalid to address"));
    }
}
