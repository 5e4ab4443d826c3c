//! External Collaborators
//!
//! Strategy traits for the services a booking talks to. Implementations live
//! in `tow-runtime` (geocoding, routing, notification) and `tow-payments`
//! (payment gateway, company payment accounts); `tow-booking` ships mocks
//! for tests.
//!
//! Each implementation reports its own failure kind: geocoders return
//! `TowError::GeocodingFailed`, routers `TowError::RoutingFailed`, gateways
//! and account providers `TowError::PaymentGateway`.
//! Notifiers return a bare `NotificationError`; the booking flow attaches the
//! persisted tow to it.

use async_trait::async_trait;

use crate::error::{NotificationError, Result};
use crate::model::{Coordinate, Miles, Payable, PayableRequest, PaymentAccount};

/// Address to coordinate resolution
#[async_trait]
pub trait GeocodingProvider: Send + Sync {
    /// Resolve an address to the nearest coordinate
    async fn geocode(&self, address: &str) -> Result<Coordinate>;

    /// Address completions for a partial query, nearest `bias` first
    async fn suggest(
        &self,
        _query: &str,
        _bias: Option<Coordinate>,
        _limit: usize,
    ) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    /// Provider name
    fn name(&self) -> &str;
}

/// Travel distance between coordinates
#[async_trait]
pub trait RoutingProvider: Send + Sync {
    /// Driving distance from `from` to `to`
    async fn distance(&self, from: Coordinate, to: Coordinate) -> Result<Miles>;

    /// Provider name
    fn name(&self) -> &str;
}

/// Hosted checkout provider
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payable for the quote; returns its reference and hosted URL
    async fn create_payable(&self, request: &PayableRequest) -> Result<Payable>;

    /// Cancel a payable that will never be attached to a tow
    async fn void_payable(&self, reference: &str) -> Result<()>;

    /// Provider name
    fn name(&self) -> &str;
}

/// Company accounts at the payment provider
#[async_trait]
pub trait PaymentAccountProvider: Send + Sync {
    /// Current state of an account
    async fn account(&self, account_id: &str) -> Result<PaymentAccount>;

    /// Dashboard login for an onboarded account
    async fn login_link(&self, account_id: &str, redirect_url: &str) -> Result<String>;

    /// Resume onboarding; `refresh_url` is used when the link has expired
    async fn onboarding_link(
        &self,
        account_id: &str,
        return_url: &str,
        refresh_url: &str,
    ) -> Result<String>;
}

/// Outbound message delivery
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Deliver a plain-text message
    async fn send(
        &self,
        address: &str,
        subject: &str,
        body: &str,
    ) -> std::result::Result<(), NotificationError>;
}
