//! Booking Configuration

use std::future::Future;
use std::time::Duration;

use tow_core::{Result, TowError};

/// Settings injected into the booking workflows
#[derive(Clone, Debug)]
pub struct BookingConfig {
    /// Deadline for each geocoding, routing, gateway and notification call
    pub call_timeout: Duration,

    /// Subject line of the payment-request message
    pub payment_subject: String,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(10),
            payment_subject: "Your tow payment link".into(),
        }
    }
}

impl BookingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let call_timeout = std::env::var("TOW_CALL_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map_or(defaults.call_timeout, Duration::from_secs);
        let payment_subject =
            std::env::var("TOW_PAYMENT_SUBJECT").unwrap_or(defaults.payment_subject);

        Self {
            call_timeout,
            payment_subject,
        }
    }
}

/// Run an external call under a deadline
///
/// Exhaustion is reported through `on_timeout`, so it surfaces as the same
/// error kind the call itself would have produced.
pub(crate) async fn with_deadline<T, F>(
    deadline: Duration,
    call: F,
    on_timeout: fn(String) -> TowError,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(deadline, call)
        .await
        .unwrap_or_else(|_| Err(on_timeout(format!("no response within {deadline:?}"))))
}
