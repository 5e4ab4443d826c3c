//! # tow-core
//!
//! Domain model, error taxonomy and collaborator contracts for tow booking.
//!
//! ## Flows
//!
//! ```text
//! booking:  geocode x2 ─▶ route ─▶ price ─▶ payment gateway ─▶ create ─▶ notify
//! payment:  gateway event ─▶ find by reference ─▶ update(paid)
//! ```
//!
//! This crate holds only the pieces both flows share: the types, the
//! `PricingCalculator`, the repository and provider traits, and an in-memory
//! store. The flows themselves live in `tow-booking`.

pub mod error;
pub mod model;
pub mod pricing;
pub mod provider;
pub mod repository;

pub use error::{NotificationError, Result, TowError};
pub use model::{
    BookingRequest, Company, Coordinate, DashboardLink, DashboardLinkKind, LineItem, Miles,
    Payable, PayableRequest, PaymentAccount, PaymentConfirmationEvent, PaymentStatus,
    PriceQuote, RateItem, RateSheet, TowRates, TowRequest, TowStatus,
};
pub use pricing::PricingCalculator;
pub use provider::{
    GeocodingProvider, NotificationService, PaymentAccountProvider, PaymentGateway,
    RoutingProvider,
};
pub use repository::{
    CompanyRepository, MemoryStore, RateSheetRepository, StoreError, StoreResult, TowFilter,
    TowPatch, TowRepository,
};
