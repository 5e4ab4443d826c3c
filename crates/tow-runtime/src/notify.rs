//! Log Notifier
//!
//! Writes notifications to the log instead of delivering them. Used when no
//! mail relay is configured.

use async_trait::async_trait;
use tracing::info;

use tow_core::{NotificationError, NotificationService};

#[derive(Clone, Debug, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationService for LogNotifier {
    async fn send(&self, address: &str, subject: &str, body: &str) -> Result<(), NotificationError> {
        if address.trim().is_empty() {
            return Err(NotificationError("no recipient address".into()));
        }
        info!(to = %address, subject, body, "Notification (not delivered)");
        Ok(())
    }
}
