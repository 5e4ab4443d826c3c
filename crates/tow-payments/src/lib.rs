//! # tow-payments
//!
//! Stripe Checkout as the tow payment gateway, and Stripe Connect accounts
//! for the companies being paid.
//!
//! ```text
//! ┌─────────────┐  create   ┌─────────────────┐  pay   ┌─────────────┐
//! │  Booking    │──────────▶│  Stripe Hosted  │◀───────│  Customer   │
//! │  (unpaid)   │           │  Checkout Page  │        │  (email)    │
//! └─────────────┘           └────────┬────────┘        └─────────────┘
//!        ▲                           │ webhook
//!        │ mark paid                 ▼
//! ┌──────┴──────┐           ┌─────────────────┐
//! │ Reconciler  │◀──────────│ WebhookVerifier │
//! └─────────────┘           └─────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tow_payments::{StripeConfig, StripeGateway, WebhookVerifier};
//!
//! let config = StripeConfig::from_env()?;
//! let verifier = WebhookVerifier::from_config(&config);
//! let gateway = Arc::new(StripeGateway::new(config));
//!
//! // In the webhook route:
//! let event = verifier.decode(&body, headers.get(SIGNATURE_HEADER))?;
//! reconciler.reconcile(&event).await?;
//! ```

mod account;
mod checkout;
mod error;
mod webhook;

pub use checkout::{StripeConfig, StripeGateway, DEFAULT_SIGNATURE_TOLERANCE_SECS};
pub use error::{PaymentError, Result};
pub use webhook::{parse_event, verify_signature, WebhookVerifier, SIGNATURE_HEADER};
