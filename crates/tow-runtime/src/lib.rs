//! # tow-runtime
//!
//! Network-backed collaborators for the tow workflows.
//!
//! | Trait                 | Provider             | Backend                     |
//! |-----------------------|----------------------|-----------------------------|
//! | `GeocodingProvider`   | `NominatimGeocoder`  | Nominatim `/search`         |
//! | `RoutingProvider`     | `OsrmRouter`         | OSRM `/route/v1`            |
//! | `NotificationService` | `SmtpNotifier`       | SMTP relay (`smtp` feature) |
//! | `NotificationService` | `LogNotifier`        | log output                  |

pub mod nominatim;
pub mod notify;
pub mod osrm;
#[cfg(feature = "smtp")]
pub mod smtp;

pub use nominatim::{NominatimConfig, NominatimGeocoder};
pub use notify::LogNotifier;
pub use osrm::{OsrmConfig, OsrmRouter};
#[cfg(feature = "smtp")]
pub use smtp::{SmtpConfig, SmtpNotifier};
