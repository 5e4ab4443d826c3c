//! Payment Error Types

use thiserror::Error;
use tracing::warn;

use tow_core::TowError;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    /// Stripe API error
    #[error("Stripe error: {0}")]
    Stripe(String),

    /// The request cannot be turned into a checkout session
    #[error("Invalid payable: {0}")]
    InvalidPayable(String),

    /// Not a connected-account id
    #[error("Invalid account: {0}")]
    InvalidAccount(String),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Webhook payload parsing failed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PaymentError {
    /// Check if this error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Stripe(_))
    }
}

impl From<PaymentError> for TowError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::WebhookSignature(_) | PaymentError::WebhookParse(_) => {
                Self::MalformedEvent(err.to_string())
            }
            PaymentError::Stripe(_)
            | PaymentError::InvalidPayable(_)
            | PaymentError::InvalidAccount(_)
            | PaymentError::Config(_) => Self::PaymentGateway(err.to_string()),
        }
    }
}

/// Convert a failed Stripe call for the workflow layer, logging it first
pub(crate) fn logged<T>(call: &str, result: Result<T>) -> tow_core::Result<T> {
    result.map_err(|e| {
        warn!(call, error = %e, retryable = e.is_retryable(), "Stripe call failed");
        e.into()
    })
}
