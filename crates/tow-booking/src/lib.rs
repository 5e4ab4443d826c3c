//! # tow-booking
//!
//! The tow workflows: estimating, booking and payment reconciliation, plus
//! the companies' payment accounts.
//!
//! ## Booking
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐
//! │ Company  │──▶│  Rate    │──▶│ Geocode  │──▶│  Route   │──▶│  Price   │
//! │ lookup   │   │  sheet   │   │ (x2)     │   │ (miles)  │   │ (cents)  │
//! └──────────┘   └──────────┘   └──────────┘   └──────────┘   └────┬─────┘
//!                                                                  │
//!            ┌──────────┐   ┌──────────┐   ┌──────────────┐        │
//!            │  Notify  │◀──│ Persist  │◀──│ Payable      │◀───────┘
//!            │ customer │   │ (unpaid) │   │ (gateway)    │
//!            └──────────┘   └──────────┘   └──────────────┘
//! ```
//!
//! ## Payment
//!
//! ```text
//! gateway event ──▶ success? ──▶ find by reference ──▶ mark paid
//!                      │ no
//!                      ▼
//!                   ignored
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tow_booking::{BookingConfig, EstimateCalculator, TowLifecycleManager};
//!
//! let estimator = Arc::new(EstimateCalculator::new(
//!     store.clone(), store.clone(), geocoder, router, BookingConfig::default(),
//! ));
//! let manager = TowLifecycleManager::new(
//!     estimator, store, gateway, notifier, BookingConfig::default(),
//! );
//!
//! let tow = manager.schedule_tow(booking, "acme-towing").await?;
//! // Customer pays at tow.payment_url
//! ```

mod account;
mod config;
mod estimate;
mod lifecycle;
pub mod mock;
mod reconcile;

pub use account::PaymentAccountService;
pub use config::BookingConfig;
pub use estimate::{EstimateCalculator, Quoted};
pub use lifecycle::{DispatchUpdate, TowLifecycleManager};
pub use reconcile::{
    PaymentReconciler, Reconciliation, ASYNC_PAYMENT_SUCCEEDED, SESSION_COMPLETED,
};
