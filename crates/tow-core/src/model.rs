//! Domain Models
//!
//! Core data types for tow booking. All money is `i64` in minor currency
//! units (cents); `rust_decimal` is only used to render amounts as text.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Rate item name for the flat hook-up charge
pub const HOOK_UP_FEE: &str = "Hook Up Fee";

/// Rate item name for the per-mile charge
pub const PER_MILE_AMOUNT: &str = "Per Mile Amount";

/// Render a minor-unit amount as dollars, e.g. `1300` -> `$13.00`
pub fn format_minor_units(amount: i64) -> String {
    format!("${}", Decimal::new(amount, 2))
}

/// A geographic position
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub longitude: f64,
    pub latitude: f64,
}

impl Coordinate {
    pub const fn new(longitude: f64, latitude: f64) -> Self {
        Self { longitude, latitude }
    }
}

/// Travel distance in miles, finite and non-negative
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize)]
pub struct Miles(f64);

impl Miles {
    /// Meters in a mile, as used when converting routing results
    pub const METERS_PER_MILE: f64 = 1609.0;

    /// Returns `None` for negative, NaN or infinite distances
    pub fn new(miles: f64) -> Option<Self> {
        (miles.is_finite() && miles >= 0.0).then_some(Self(miles))
    }

    pub fn from_meters(meters: f64) -> Option<Self> {
        Self::new(meters / Self::METERS_PER_MILE)
    }

    pub const fn value(self) -> f64 {
        self.0
    }

    /// Whole miles billed: partial miles always round up
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn billable_units(self) -> u64 {
        self.0.ceil() as u64
    }
}

/// A towing company (read-only to this crate)
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub scheduling_link: Option<String>,
    #[serde(default)]
    pub stripe_account_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Company {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            phone_number: None,
            scheduling_link: None,
            stripe_account_id: None,
            created_at: Utc::now(),
        }
    }

    /// Whether `key` addresses this company, by id or scheduling link
    pub fn matches_key(&self, key: &str) -> bool {
        self.id == key || self.scheduling_link.as_deref() == Some(key)
    }
}

/// A company's account at the payment provider
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAccount {
    pub id: String,
    /// Onboarding finished; the company can log in to its dashboard
    pub details_submitted: bool,
    pub charges_enabled: bool,
    pub payouts_enabled: bool,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// Which dashboard flow a link opens
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DashboardLinkKind {
    Login,
    Onboarding,
}

/// Single-use link into the payment provider's dashboard
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardLink {
    pub url: String,
    pub kind: DashboardLinkKind,
}

/// One named price on a company's rate sheet
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateItem {
    #[serde(default)]
    pub id: Option<String>,
    pub item_name: String,
    /// Minor units; `None` when the company saved the item without a price
    #[serde(default)]
    pub amount: Option<i64>,
    pub company_id: String,
}

impl RateItem {
    pub fn new(company_id: impl Into<String>, item_name: impl Into<String>, amount: i64) -> Self {
        Self {
            id: None,
            item_name: item_name.into(),
            amount: Some(amount),
            company_id: company_id.into(),
        }
    }

    fn is_named(&self, name: &str) -> bool {
        self.item_name.trim().eq_ignore_ascii_case(name)
    }
}

/// A company's rate items
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RateSheet {
    pub items: Vec<RateItem>,
}

impl RateSheet {
    pub const fn new(items: Vec<RateItem>) -> Self {
        Self { items }
    }

    /// Amount of the first item with this name
    ///
    /// Returns `Err` with a description when the item is missing, unpriced or
    /// negative.
    fn mandatory_amount(&self, name: &str) -> std::result::Result<i64, String> {
        let item = self
            .items
            .iter()
            .find(|item| item.is_named(name))
            .ok_or_else(|| format!("missing '{name}'"))?;

        match item.amount {
            None => Err(format!("'{name}' has no amount")),
            Some(amount) if amount < 0 => Err(format!("'{name}' is negative ({amount})")),
            Some(amount) => Ok(amount),
        }
    }

    /// Extract the two rates tow pricing needs
    pub fn tow_rates(&self) -> crate::Result<TowRates> {
        let hook_up_fee = self
            .mandatory_amount(HOOK_UP_FEE)
            .map_err(crate::TowError::InvalidRateSheet)?;
        let per_mile = self
            .mandatory_amount(PER_MILE_AMOUNT)
            .map_err(crate::TowError::InvalidRateSheet)?;

        Ok(TowRates { hook_up_fee, per_mile })
    }
}

/// The mandatory rates, validated
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TowRates {
    pub hook_up_fee: i64,
    pub per_mile: i64,
}

/// Operational state of a tow
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TowStatus {
    #[default]
    Pending,
    Accepted,
    Dispatched,
    ArrivedPickup,
    InTransit,
    Completed,
    Cancelled,
}

impl TowStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Dispatched => "dispatched",
            Self::ArrivedPickup => "arrived_pickup",
            Self::InTransit => "in_transit",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Payment state of a tow. Only ever moves `Unpaid -> Paid`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Paid,
}

/// What a customer submits when booking a tow
///
/// There is no id field: identifiers are assigned at booking time.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub pickup: String,
    pub destination: String,
    /// Email address the payment link is sent to
    pub primary_contact: String,
    #[serde(default)]
    pub vehicle: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A booked tow
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TowRequest {
    pub id: Uuid,
    pub company_id: String,
    pub pickup: String,
    pub destination: String,
    pub primary_contact: String,
    pub vehicle: Option<String>,
    pub notes: Option<String>,
    pub status: TowStatus,
    pub payment_status: PaymentStatus,
    /// Total in minor units
    pub price: i64,
    /// Gateway correlation key, unique across all tows
    pub payment_reference: String,
    pub payment_url: String,
    pub created_at: DateTime<Utc>,
}

impl TowRequest {
    /// Build a fresh, unpaid tow from a booking, a quote and its payable
    pub fn new(company_id: &str, booking: BookingRequest, quote: &PriceQuote, payable: Payable) -> Self {
        Self {
            id: Uuid::new_v4(),
            company_id: company_id.to_string(),
            pickup: booking.pickup,
            destination: booking.destination,
            primary_contact: booking.primary_contact,
            vehicle: booking.vehicle,
            notes: booking.notes,
            status: TowStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            price: quote.total,
            payment_reference: payable.reference,
            payment_url: payable.hosted_url,
            created_at: Utc::now(),
        }
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }
}

/// One charge on a quote
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    /// Per-unit amount in minor units
    pub amount: i64,
    pub quantity: u64,
}

impl LineItem {
    pub fn new(name: impl Into<String>, amount: i64, quantity: u64) -> Self {
        Self {
            name: name.into(),
            amount,
            quantity,
        }
    }
}

/// Itemized price for a tow; never persisted
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub total: i64,
    pub line_items: Vec<LineItem>,
    pub billed_miles: u64,
}

/// What the payment gateway returns for a quote
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payable {
    pub reference: String,
    pub hosted_url: String,
}

/// Request for a payable; the idempotency key is derived from the quote shape
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PayableRequest {
    pub total: i64,
    pub line_items: Vec<LineItem>,
    pub idempotency_key: String,
}

impl PayableRequest {
    pub fn for_quote(quote: &PriceQuote) -> Self {
        Self {
            total: quote.total,
            line_items: quote.line_items.clone(),
            idempotency_key: format!("payable_{}_{}", quote.total, quote.line_items.len()),
        }
    }
}

/// Asynchronous notice from the payment gateway
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentConfirmationEvent {
    /// Gateway event id, when the gateway supplies one
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    /// The event's data object, undecoded
    pub payload: serde_json::Value,
}

impl PaymentConfirmationEvent {
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: None,
            event_type: event_type.into(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_miles_rejects_invalid_distances() {
        assert!(Miles::new(-0.1).is_none());
        assert!(Miles::new(f64::NAN).is_none());
        assert!(Miles::new(f64::INFINITY).is_none());
        assert_eq!(Miles::new(0.0).map(Miles::billable_units), Some(0));
    }

    #[test]
    fn test_billable_units_round_up() {
        let miles = Miles::new(3.2).unwrap();
        assert_eq!(miles.billable_units(), 4);
        assert_eq!(Miles::new(4.0).unwrap().billable_units(), 4);
    }

    #[test]
    fn test_from_meters() {
        let miles = Miles::from_meters(3218.0).unwrap();
        assert!((miles.value() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_format_minor_units() {
        assert_eq!(format_minor_units(1300), "$13.00");
        assert_eq!(format_minor_units(5), "$0.05");
    }

    #[test]
    fn test_rate_sheet_requires_both_items() {
        let sheet = RateSheet::new(vec![RateItem::new("c1", HOOK_UP_FEE, 500)]);
        let err = sheet.tow_rates().unwrap_err();
        assert_eq!(err.code(), "INVALID_RATE_SHEET");
    }

    #[test]
    fn test_rate_sheet_rejects_null_amount() {
        let mut per_mile = RateItem::new("c1", PER_MILE_AMOUNT, 200);
        per_mile.amount = None;
        let sheet = RateSheet::new(vec![RateItem::new("c1", HOOK_UP_FEE, 500), per_mile]);
        assert!(sheet.tow_rates().is_err());
    }

    #[test]
    fn test_rate_sheet_ignores_informational_items() {
        let sheet = RateSheet::new(vec![
            RateItem::new("c1", "Winch Out", 7500),
            RateItem::new("c1", "hook up fee", 500),
            RateItem::new("c1", PER_MILE_AMOUNT, 200),
        ]);
        let rates = sheet.tow_rates().unwrap();
        assert_eq!(rates, TowRates { hook_up_fee: 500, per_mile: 200 });
    }

    #[test]
    fn test_idempotency_key_from_quote_shape() {
        let quote = PriceQuote {
            total: 1300,
            line_items: vec![LineItem::new("a", 500, 1), LineItem::new("b", 200, 4)],
            billed_miles: 4,
        };
        assert_eq!(PayableRequest::for_quote(&quote).idempotency_key, "payable_1300_2");
    }

    #[test]
    fn test_booking_request_has_no_client_id() {
        let json = serde_json::json!({
            "id": "client-chosen",
            "pickup": "1 Main St",
            "destination": "2 Elm St",
            "primaryContact": "a@b.com"
        });
        let booking: BookingRequest = serde_json::from_value(json).unwrap();
        let quote = PriceQuote { total: 100, line_items: vec![], billed_miles: 0 };
        let payable = Payable { reference: "cs_1".into(), hosted_url: "https://pay".into() };
        let tow = TowRequest::new("c1", booking, &quote, payable);
        assert_ne!(tow.id.to_string(), "client-chosen");
        assert_eq!(tow.payment_status, PaymentStatus::Unpaid);
        assert_eq!(tow.status, TowStatus::Pending);
    }
}
