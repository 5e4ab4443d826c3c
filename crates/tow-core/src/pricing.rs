//! Tow Pricing
//!
//! `total = hook-up fee + ceil(miles) * per-mile rate`, in minor units.
//! The per-mile rate is only converted to dollars for line-item text.

use crate::error::{Result, TowError};
use crate::model::{
    format_minor_units, LineItem, Miles, PriceQuote, RateSheet, TowRates, HOOK_UP_FEE,
    PER_MILE_AMOUNT,
};

/// Pure price calculator; no I/O
#[derive(Clone, Copy, Debug, Default)]
pub struct PricingCalculator;

impl PricingCalculator {
    pub const fn new() -> Self {
        Self
    }

    /// Price a tow from a company's rate sheet
    pub fn price(&self, sheet: &RateSheet, distance: Miles) -> Result<PriceQuote> {
        let rates = sheet.tow_rates()?;
        self.price_with_rates(rates, distance)
    }

    /// Price a tow from already-validated rates
    pub fn price_with_rates(&self, rates: TowRates, distance: Miles) -> Result<PriceQuote> {
        let billed_miles = distance.billable_units();

        let mileage = i64::try_from(billed_miles)
            .ok()
            .and_then(|miles| miles.checked_mul(rates.per_mile))
            .ok_or_else(|| overflow(billed_miles))?;
        let total = rates
            .hook_up_fee
            .checked_add(mileage)
            .ok_or_else(|| overflow(billed_miles))?;

        let line_items = vec![
            LineItem::new(HOOK_UP_FEE, rates.hook_up_fee, 1),
            LineItem::new(
                format!(
                    "{PER_MILE_AMOUNT} ({billed_miles} mi @ {}/mi)",
                    format_minor_units(rates.per_mile)
                ),
                rates.per_mile,
                billed_miles,
            ),
        ];

        Ok(PriceQuote {
            total,
            line_items,
            billed_miles,
        })
    }
}

fn overflow(billed_miles: u64) -> TowError {
    TowError::InvalidRateSheet(format!("total overflows for {billed_miles} billed miles"))
}
