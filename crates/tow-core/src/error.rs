//! Error Types
//!
//! Every operation in the booking and reconciliation paths fails with one of
//! these kinds, so upstream layers can map them to status codes without
//! looking at message text.

use thiserror::Error;

use crate::model::TowRequest;

/// Result type alias for tow operations
pub type Result<T> = std::result::Result<T, TowError>;

/// Tow workflow errors
#[derive(Error, Debug)]
pub enum TowError {
    /// No company matches the supplied key
    #[error("Company not found: {0}")]
    CompanyNotFound(String),

    /// Rate sheet lacks a mandatory item, or an item has no amount
    #[error("Invalid rate sheet: {0}")]
    InvalidRateSheet(String),

    /// Address could not be resolved to a coordinate
    #[error("Geocoding failed: {0}")]
    GeocodingFailed(String),

    /// No travel distance between the two coordinates
    #[error("Routing failed: {0}")]
    RoutingFailed(String),

    /// Payment gateway rejected or did not answer the payable request
    #[error("Payment gateway error: {0}")]
    PaymentGateway(String),

    /// The company has no account at the payment provider
    #[error("No payment account for company {0}")]
    NoPaymentAccount(String),

    /// Repository read or write failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The tow was persisted but the payment-request notification was not
    /// delivered. The record is durable and carried here.
    #[error("Notification failed for tow {}: {reason}", .tow.id)]
    NotificationFailed {
        tow: Box<TowRequest>,
        reason: String,
    },

    /// Confirmation event payload has no usable session identifier
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    /// No tow carries the payment reference (yet)
    #[error("No tow with payment reference {0}")]
    ReferenceNotFound(String),

    /// More than one tow carries the payment reference
    #[error("Payment reference {reference} matches {count} tows")]
    AmbiguousReference { reference: String, count: usize },
}

/// Delivery failure reported by a `NotificationService`
///
/// Kept apart from `TowError` because the notifier does not know which tow
/// the message belongs to; the booking flow attaches it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Notification failed: {0}")]
pub struct NotificationError(pub String);

impl TowError {
    /// Stable machine-readable code for this error kind
    pub const fn code(&self) -> &'static str {
        match self {
            Self::CompanyNotFound(_) => "COMPANY_NOT_FOUND",
            Self::InvalidRateSheet(_) => "INVALID_RATE_SHEET",
            Self::GeocodingFailed(_) => "GEOCODING_FAILED",
            Self::RoutingFailed(_) => "ROUTING_FAILED",
            Self::PaymentGateway(_) => "PAYMENT_GATEWAY_ERROR",
            Self::NoPaymentAccount(_) => "NO_PAYMENT_ACCOUNT",
            Self::Persistence(_) => "PERSISTENCE_ERROR",
            Self::NotificationFailed { .. } => "NOTIFICATION_FAILED",
            Self::MalformedEvent(_) => "MALFORMED_EVENT",
            Self::ReferenceNotFound(_) => "REFERENCE_NOT_FOUND",
            Self::AmbiguousReference { .. } => "AMBIGUOUS_REFERENCE",
        }
    }

    /// Check if the caller may retry the whole operation
    ///
    /// `ReferenceNotFound` is retryable: the confirmation event can arrive
    /// before the booking's write is visible.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::GeocodingFailed(_)
                | Self::RoutingFailed(_)
                | Self::PaymentGateway(_)
                | Self::Persistence(_)
                | Self::ReferenceNotFound(_)
        )
    }

    /// The tow that was persisted despite this error, if any
    pub fn persisted_tow(&self) -> Option<&TowRequest> {
        match self {
            Self::NotificationFailed { tow, .. } => Some(tow.as_ref()),
            _ => None,
        }
    }

    /// Get user-friendly message
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::CompanyNotFound(_) => "Towing company not found.",
            Self::InvalidRateSheet(_) => "This company has not finished setting up its pricing.",
            Self::GeocodingFailed(_) => "We could not locate one of the addresses.",
            Self::RoutingFailed(_) => "We could not find a route between the addresses.",
            Self::PaymentGateway(_) => "Payment processing failed. Please try again.",
            Self::NoPaymentAccount(_) => "This company has not connected a payment account.",
            Self::NotificationFailed { .. } => {
                "Your tow was booked, but we could not send the payment link."
            }
            _ => "An error occurred processing your request.",
        }
    }
}
