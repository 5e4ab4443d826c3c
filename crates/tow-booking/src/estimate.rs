//! Price Estimates
//!
//! Read-only quoting: company → rate sheet → geocode x2 → route → price.
//! The booking flow runs the same pipeline before it touches the gateway.

use std::sync::Arc;

use tracing::{debug, instrument};

use tow_core::{
    Company, CompanyRepository, GeocodingProvider, Miles, PriceQuote, PricingCalculator,
    RateSheetRepository, Result, RoutingProvider, TowError,
};

use crate::config::{with_deadline, BookingConfig};

/// A quote together with what it was computed from
#[derive(Clone, Debug)]
pub struct Quoted {
    pub company: Company,
    pub distance: Miles,
    pub quote: PriceQuote,
}

/// Quotes tows without persisting anything
pub struct EstimateCalculator {
    companies: Arc<dyn CompanyRepository>,
    rates: Arc<dyn RateSheetRepository>,
    geocoder: Arc<dyn GeocodingProvider>,
    router: Arc<dyn RoutingProvider>,
    pricing: PricingCalculator,
    config: BookingConfig,
}

impl EstimateCalculator {
    pub fn new(
        companies: Arc<dyn CompanyRepository>,
        rates: Arc<dyn RateSheetRepository>,
        geocoder: Arc<dyn GeocodingProvider>,
        router: Arc<dyn RoutingProvider>,
        config: BookingConfig,
    ) -> Self {
        Self {
            companies,
            rates,
            geocoder,
            router,
            pricing: PricingCalculator::new(),
            config,
        }
    }

    /// Total price in minor units for a tow between two addresses
    pub async fn estimate(&self, company_ref: &str, pickup: &str, dropoff: &str) -> Result<i64> {
        Ok(self.quote(company_ref, pickup, dropoff).await?.quote.total)
    }

    /// Full itemized quote; any failing step aborts with that step's error
    #[instrument(skip(self), fields(company = %company_key))]
    pub async fn quote(&self, company_key: &str, pickup: &str, dropoff: &str) -> Result<Quoted> {
        let company = self
            .companies
            .find_by_key(company_key)
            .await?
            .ok_or_else(|| TowError::CompanyNotFound(company_key.to_string()))?;

        let rates = self.rates.rate_sheet(&company.id).await?.tow_rates()?;

        let from = self.geocode(pickup).await?;
        let to = self.geocode(dropoff).await?;

        let distance = with_deadline(
            self.config.call_timeout,
            self.router.distance(from, to),
            TowError::RoutingFailed,
        )
        .await?;

        let quote = self.pricing.price_with_rates(rates, distance)?;

        debug!(
            miles = distance.value(),
            billed_miles = quote.billed_miles,
            total = quote.total,
            "Quoted tow"
        );

        Ok(Quoted {
            company,
            distance,
            quote,
        })
    }

    /// Address completions from the geocoder
    pub async fn suggest_addresses(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        with_deadline(
            self.config.call_timeout,
            self.geocoder.suggest(query, None, limit),
            TowError::GeocodingFailed,
        )
        .await
    }

    async fn geocode(&self, address: &str) -> Result<tow_core::Coordinate> {
        if address.trim().is_empty() {
            return Err(TowError::GeocodingFailed("address is empty".into()));
        }
        with_deadline(
            self.config.call_timeout,
            self.geocoder.geocode(address),
            TowError::GeocodingFailed,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::mock::{MockGeocoder, MockRouter};
    use tow_core::model::{HOOK_UP_FEE, PER_MILE_AMOUNT};
    use tow_core::{Coordinate, MemoryStore, RateItem};

    async fn store_with_company(items: Vec<RateItem>) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.save(&Company::new("c1", "Acme Towing")).await.unwrap();
        store.upsert(items).await.unwrap();
        store
    }

    fn geocoder() -> Arc<MockGeocoder> {
        Arc::new(
            MockGeocoder::new()
                .with_address("1 Main St", Coordinate::new(-74.0060, 40.7128))
                .with_address("9 Dock Rd", Coordinate::new(-73.9442, 40.6782)),
        )
    }

    fn calculator(
        store: Arc<MemoryStore>,
        geocoder: Arc<MockGeocoder>,
        router: Arc<MockRouter>,
    ) -> EstimateCalculator {
        EstimateCalculator::new(
            store.clone(),
            store,
            geocoder,
            router,
            BookingConfig::default(),
        )
    }

    fn standard_rates() -> Vec<RateItem> {
        vec![
            RateItem::new("c1", HOOK_UP_FEE, 500),
            RateItem::new("c1", PER_MILE_AMOUNT, 200),
        ]
    }

    #[tokio::test]
    async fn test_estimate_rounds_distance_up() {
        let store = store_with_company(standard_rates()).await;
        let estimator = calculator(store, geocoder(), Arc::new(MockRouter::new(3.2)));

        let total = estimator.estimate("c1", "1 Main St", "9 Dock Rd").await.unwrap();
        assert_eq!(total, 1300);
    }

    #[tokio::test]
    async fn test_unknown_company() {
        let store = store_with_company(standard_rates()).await;
        let geocoder = geocoder();
        let estimator = calculator(store, geocoder.clone(), Arc::new(MockRouter::new(1.0)));

        let err = estimator.estimate("nope", "1 Main St", "9 Dock Rd").await.unwrap_err();
        assert!(matches!(err, TowError::CompanyNotFound(_)));
        assert_eq!(geocoder.calls(), 0);
    }

    #[tokio::test]
    async fn test_incomplete_rate_sheet_fails_before_geocoding() {
        let store = store_with_company(vec![RateItem::new("c1", HOOK_UP_FEE, 500)]).await;
        let geocoder = geocoder();
        let estimator = calculator(store, geocoder.clone(), Arc::new(MockRouter::new(1.0)));

        let err = estimator.estimate("c1", "1 Main St", "9 Dock Rd").await.unwrap_err();
        assert!(matches!(err, TowError::InvalidRateSheet(_)));
        assert_eq!(geocoder.calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_address() {
        let store = store_with_company(standard_rates()).await;
        let router = Arc::new(MockRouter::new(1.0));
        let estimator = calculator(store, geocoder(), router.clone());

        let err = estimator.estimate("c1", "1 Main St", "nowhere").await.unwrap_err();
        assert!(matches!(err, TowError::GeocodingFailed(_)));
        assert_eq!(router.calls(), 0);

        let err = estimator.estimate("c1", "  ", "9 Dock Rd").await.unwrap_err();
        assert!(matches!(err, TowError::GeocodingFailed(_)));
    }

    #[tokio::test]
    async fn test_no_route() {
        let store = store_with_company(standard_rates()).await;
        let estimator = calculator(store, geocoder(), Arc::new(MockRouter::unroutable()));

        let err = estimator.estimate("c1", "1 Main St", "9 Dock Rd").await.unwrap_err();
        assert!(matches!(err, TowError::RoutingFailed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_router_hits_deadline() {
        let store = store_with_company(standard_rates()).await;
        let router = MockRouter::new(1.0).with_delay(Duration::from_secs(60));
        let estimator = calculator(store, geocoder(), Arc::new(router));

        let err = estimator.estimate("c1", "1 Main St", "9 Dock Rd").await.unwrap_err();
        assert!(matches!(err, TowError::RoutingFailed(_)));
    }

    #[tokio::test]
    async fn test_suggestions() {
        let store = store_with_company(standard_rates()).await;
        let estimator = calculator(store, geocoder(), Arc::new(MockRouter::new(1.0)));

        let found = estimator.suggest_addresses("main", 5).await.unwrap();
        assert_eq!(found, vec!["1 Main St".to_string()]);
        assert!(estimator.suggest_addresses("", 5).await.unwrap().is_empty());
    }
}
