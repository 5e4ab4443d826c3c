//! Tow Lifecycle
//!
//! Booking is an ordered pipeline of fallible steps. Nothing is written until
//! the gateway has issued a payable, and the gateway is called at most once
//! per attempt.
//!
//! ```text
//! quote ─▶ create_payable ─▶ repository.create ─▶ notify
//!                                  │ fails
//!                                  ▼
//!                           void_payable (unless the reference
//!                           already belongs to another tow)
//! ```

use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use tow_core::model::format_minor_units;
use tow_core::{
    BookingRequest, Company, NotificationService, PayableRequest, PaymentGateway, Result,
    StoreError, TowError, TowFilter, TowPatch, TowRepository, TowRequest, TowStatus,
};

use crate::config::{with_deadline, BookingConfig};
use crate::estimate::{EstimateCalculator, Quoted};

/// Fields a dispatcher may change after booking
///
/// Payment fields are absent: only the reconciler moves a tow to paid.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchUpdate {
    #[serde(default)]
    pub status: Option<TowStatus>,
    #[serde(default)]
    pub vehicle: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl From<DispatchUpdate> for TowPatch {
    fn from(update: DispatchUpdate) -> Self {
        Self {
            status: update.status,
            payment_status: None,
            vehicle: update.vehicle,
            notes: update.notes,
        }
    }
}

/// Books tows and serves their history
pub struct TowLifecycleManager {
    estimator: Arc<EstimateCalculator>,
    tows: Arc<dyn TowRepository>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn NotificationService>,
    config: BookingConfig,
}

impl TowLifecycleManager {
    pub fn new(
        estimator: Arc<EstimateCalculator>,
        tows: Arc<dyn TowRepository>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn NotificationService>,
        config: BookingConfig,
    ) -> Self {
        Self {
            estimator,
            tows,
            gateway,
            notifier,
            config,
        }
    }

    /// Price, charge, persist and announce a new tow
    ///
    /// On `TowError::NotificationFailed` the tow has been persisted and is
    /// carried in the error.
    #[instrument(skip(self, booking), fields(company = %company_key))]
    pub async fn schedule_tow(&self, booking: BookingRequest, company_key: &str) -> Result<TowRequest> {
        let Quoted { company, quote, .. } = self
            .estimator
            .quote(company_key, &booking.pickup, &booking.destination)
            .await?;

        let payable = with_deadline(
            self.config.call_timeout,
            self.gateway.create_payable(&PayableRequest::for_quote(&quote)),
            TowError::PaymentGateway,
        )
        .await?;

        let tow = TowRequest::new(&company.id, booking, &quote, payable);

        if let Err(err) = self.tows.create(&tow).await {
            self.release_payable(&tow, &err).await;
            return Err(err.into());
        }

        info!(
            tow_id = %tow.id,
            total = tow.price,
            payment_reference = %tow.payment_reference,
            "Booked tow"
        );

        self.send_payment_request(&company, tow).await
    }

    /// All tows of a company, oldest first
    pub async fn tows_for_company(&self, company_id: &str) -> Result<Vec<TowRequest>> {
        if company_id.trim().is_empty() {
            return Err(TowError::CompanyNotFound("company id is empty".into()));
        }
        Ok(self.tows.find(&TowFilter::by_company(company_id)).await?)
    }

    /// Apply a dispatcher's update to a booked tow
    #[instrument(skip(self, update))]
    pub async fn update_dispatch(&self, tow_id: Uuid, update: DispatchUpdate) -> Result<()> {
        let status = update.status;
        self.tows.update(tow_id, &update.into()).await?;
        info!(tow_id = %tow_id, status = ?status, "Updated tow");
        Ok(())
    }

    /// Void the payable of a tow that could not be stored
    async fn release_payable(&self, tow: &TowRequest, cause: &StoreError) {
        if matches!(cause, StoreError::Conflict(_)) {
            warn!(
                payment_reference = %tow.payment_reference,
                error = %cause,
                "Payment reference already belongs to another tow; leaving session open"
            );
            return;
        }

        let voided = with_deadline(
            self.config.call_timeout,
            self.gateway.void_payable(&tow.payment_reference),
            TowError::PaymentGateway,
        )
        .await;

        match voided {
            Ok(()) => warn!(
                payment_reference = %tow.payment_reference,
                error = %cause,
                "Tow not stored; voided its payment session"
            ),
            Err(void_err) => warn!(
                payment_reference = %tow.payment_reference,
                error = %cause,
                void_error = %void_err,
                "Tow not stored and its payment session could not be voided"
            ),
        }
    }

    async fn send_payment_request(&self, company: &Company, tow: TowRequest) -> Result<TowRequest> {
        let body = payment_message(company, &tow);

        let sent = tokio::time::timeout(
            self.config.call_timeout,
            self.notifier
                .send(&tow.primary_contact, &self.config.payment_subject, &body),
        )
        .await;

        let reason = match sent {
            Ok(Ok(())) => return Ok(tow),
            Ok(Err(err)) => err.to_string(),
            Err(_) => format!("no response within {:?}", self.config.call_timeout),
        };

        warn!(tow_id = %tow.id, reason = %reason, "Payment request not delivered");
        Err(TowError::NotificationFailed {
            tow: Box::new(tow),
            reason,
        })
    }
}

fn payment_message(company: &Company, tow: &TowRequest) -> String {
    let mut body = format!(
        "{company} has scheduled your tow.\n\n\
         Pickup: {pickup}\n\
         Destination: {destination}\n\
         Total: {total}\n\n\
         Pay securely here: {url}\n\n\
         Reference: {id}\n",
        company = company.name,
        pickup = tow.pickup,
        destination = tow.destination,
        total = format_minor_units(tow.price),
        url = tow.payment_url,
        id = tow.id,
    );
    if let Some(phone) = company.phone_number.as_deref().filter(|p| !p.trim().is_empty()) {
        body.push_str(&format!("Questions? Call {phone}\n"));
    }
    body
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::mock::{MockGateway, MockGeocoder, MockNotifier, MockRouter};
    use crate::reconcile::PaymentReconciler;
    use tow_core::model::{HOOK_UP_FEE, PER_MILE_AMOUNT};
    use tow_core::{
        CompanyRepository, Coordinate, MemoryStore, PaymentConfirmationEvent, PaymentStatus,
        RateItem, RateSheetRepository, StoreResult,
    };

    struct Harness {
        store: Arc<MemoryStore>,
        gateway: Arc<MockGateway>,
        notifier: Arc<MockNotifier>,
        manager: TowLifecycleManager,
    }

    async fn harness_with(
        items: Vec<RateItem>,
        tows: Option<Arc<dyn TowRepository>>,
        gateway: MockGateway,
        notifier: MockNotifier,
    ) -> Harness {
        let store = Arc::new(MemoryStore::new());
        store.save(&Company::new("c1", "Acme Towing")).await.unwrap();
        store.upsert(items).await.unwrap();

        let geocoder = Arc::new(
            MockGeocoder::new()
                .with_address("1 Main St", Coordinate::new(-74.0060, 40.7128))
                .with_address("9 Dock Rd", Coordinate::new(-73.9442, 40.6782)),
        );
        let estimator = Arc::new(EstimateCalculator::new(
            store.clone(),
            store.clone(),
            geocoder,
            Arc::new(MockRouter::new(3.2)),
            BookingConfig::default(),
        ));

        let gateway = Arc::new(gateway);
        let notifier = Arc::new(notifier);
        let tows = tows.unwrap_or_else(|| store.clone() as Arc<dyn TowRepository>);
        let manager = TowLifecycleManager::new(
            estimator,
            tows,
            gateway.clone(),
            notifier.clone(),
            BookingConfig::default(),
        );

        Harness {
            store,
            gateway,
            notifier,
            manager,
        }
    }

    async fn harness() -> Harness {
        harness_with(standard_rates(), None, MockGateway::new(), MockNotifier::new()).await
    }

    fn standard_rates() -> Vec<RateItem> {
        vec![
            RateItem::new("c1", HOOK_UP_FEE, 500),
            RateItem::new("c1", PER_MILE_AMOUNT, 200),
        ]
    }

    fn booking() -> BookingRequest {
        BookingRequest {
            pickup: "1 Main St".into(),
            destination: "9 Dock Rd".into(),
            primary_contact: "driver@example.com".into(),
            vehicle: Some("2014 Honda Civic".into()),
            notes: None,
        }
    }

    /// Repository whose writes always fail
    struct BrokenRepository;

    #[async_trait]
    impl TowRepository for BrokenRepository {
        async fn create(&self, _tow: &TowRequest) -> StoreResult<()> {
            Err(StoreError::Backend("connection reset".into()))
        }

        async fn find(&self, _filter: &TowFilter) -> StoreResult<Vec<TowRequest>> {
            Ok(Vec::new())
        }

        async fn update(&self, id: Uuid, _patch: &TowPatch) -> StoreResult<()> {
            Err(StoreError::NotFound(id.to_string()))
        }
    }

    /// Repository whose unique index already holds every reference
    struct ConflictingRepository;

    #[async_trait]
    impl TowRepository for ConflictingRepository {
        async fn create(&self, tow: &TowRequest) -> StoreResult<()> {
            Err(StoreError::Conflict(format!(
                "payment reference {} already in use",
                tow.payment_reference
            )))
        }

        async fn find(&self, _filter: &TowFilter) -> StoreResult<Vec<TowRequest>> {
            Ok(Vec::new())
        }

        async fn update(&self, id: Uuid, _patch: &TowPatch) -> StoreResult<()> {
            Err(StoreError::NotFound(id.to_string()))
        }
    }

    #[tokio::test]
    async fn test_schedule_tow_persists_unpaid_booking() {
        let h = harness().await;

        let tow = h.manager.schedule_tow(booking(), "c1").await.unwrap();

        assert_eq!(tow.price, 1300);
        assert_eq!(tow.payment_status, PaymentStatus::Unpaid);
        assert_eq!(tow.status, TowStatus::Pending);
        assert!(!tow.payment_reference.is_empty());
        assert!(tow.payment_url.contains(&tow.payment_reference));

        let stored = h.store.find(&TowFilter::by_company("c1")).await.unwrap();
        assert_eq!(stored, vec![tow.clone()]);

        let created = h.gateway.created().await;
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].total, 1300);
        assert_eq!(created[0].idempotency_key, "payable_1300_2");

        let sent = h.notifier.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].address, "driver@example.com");
        assert!(sent[0].body.contains(&tow.payment_url));
        assert!(sent[0].body.contains("$13.00"));
    }

    #[tokio::test]
    async fn test_booking_then_confirmation_marks_paid() {
        let h = harness().await;
        let tow = h.manager.schedule_tow(booking(), "c1").await.unwrap();

        let reconciler = PaymentReconciler::new(h.store.clone());
        let event = PaymentConfirmationEvent::new(
            crate::reconcile::ASYNC_PAYMENT_SUCCEEDED,
            serde_json::json!({ "id": tow.payment_reference, "object": "checkout.session" }),
        );
        reconciler.reconcile(&event).await.unwrap();

        let paid = h.manager.tows_for_company("c1").await.unwrap().remove(0);
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        assert_eq!(
            TowRequest {
                payment_status: PaymentStatus::Unpaid,
                ..paid
            },
            tow
        );
    }

    #[tokio::test]
    async fn test_missing_per_mile_rate_creates_nothing() {
        let h = harness_with(
            vec![RateItem::new("c1", HOOK_UP_FEE, 500)],
            None,
            MockGateway::new(),
            MockNotifier::new(),
        )
        .await;

        let err = h.manager.schedule_tow(booking(), "c1").await.unwrap_err();

        assert!(matches!(err, TowError::InvalidRateSheet(_)));
        assert!(h.gateway.created().await.is_empty());
        assert_eq!(h.store.tow_count().await, 0);
        assert!(h.notifier.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_company() {
        let h = harness().await;
        let err = h.manager.schedule_tow(booking(), "missing").await.unwrap_err();
        assert!(matches!(err, TowError::CompanyNotFound(_)));
        assert!(h.gateway.created().await.is_empty());
    }

    #[tokio::test]
    async fn test_gateway_failure_persists_nothing() {
        let h = harness_with(standard_rates(), None, MockGateway::failing(), MockNotifier::new())
            .await;

        let err = h.manager.schedule_tow(booking(), "c1").await.unwrap_err();

        assert!(matches!(err, TowError::PaymentGateway(_)));
        assert_eq!(h.store.tow_count().await, 0);
        assert!(h.notifier.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_persistence_failure_voids_payable() {
        let h = harness_with(
            standard_rates(),
            Some(Arc::new(BrokenRepository)),
            MockGateway::new(),
            MockNotifier::new(),
        )
        .await;

        let err = h.manager.schedule_tow(booking(), "c1").await.unwrap_err();

        assert!(matches!(err, TowError::Persistence(_)));
        assert_eq!(h.gateway.created().await.len(), 1);
        assert_eq!(h.gateway.voided().await.len(), 1);
        assert!(h.notifier.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_reference_conflict_leaves_session_open() {
        let h = harness_with(
            standard_rates(),
            Some(Arc::new(ConflictingRepository)),
            MockGateway::new(),
            MockNotifier::new(),
        )
        .await;

        let err = h.manager.schedule_tow(booking(), "c1").await.unwrap_err();

        assert!(matches!(err, TowError::Persistence(_)));
        assert_eq!(h.gateway.created().await.len(), 1);
        assert!(h.gateway.voided().await.is_empty());
        assert!(h.notifier.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_notification_failure_keeps_booking() {
        let h = harness_with(standard_rates(), None, MockGateway::new(), MockNotifier::failing())
            .await;

        let err = h.manager.schedule_tow(booking(), "c1").await.unwrap_err();

        assert_eq!(err.code(), "NOTIFICATION_FAILED");
        let tow = err.persisted_tow().unwrap();
        let stored = h.store.find(&TowFilter::by_company("c1")).await.unwrap();
        assert_eq!(stored, vec![tow.clone()]);
        assert!(h.gateway.voided().await.is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_update_cannot_touch_payment() {
        let h = harness().await;
        let tow = h.manager.schedule_tow(booking(), "c1").await.unwrap();

        let update = DispatchUpdate {
            status: Some(TowStatus::Dispatched),
            notes: Some("Driver en route".into()),
            ..Default::default()
        };
        h.manager.update_dispatch(tow.id, update).await.unwrap();

        let stored = h.manager.tows_for_company("c1").await.unwrap().remove(0);
        assert_eq!(stored.status, TowStatus::Dispatched);
        assert_eq!(stored.notes.as_deref(), Some("Driver en route"));
        assert_eq!(stored.payment_status, PaymentStatus::Unpaid);
    }

    #[tokio::test]
    async fn test_dispatch_update_unknown_tow() {
        let h = harness().await;
        let err = h
            .manager
            .update_dispatch(Uuid::new_v4(), DispatchUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TowError::Persistence(_)));
    }

    #[test]
    fn test_payment_message_lists_company_phone() {
        let tow = TowRequest::new(
            "c1",
            booking(),
            &tow_core::PriceQuote {
                total: 1300,
                line_items: vec![],
                billed_miles: 4,
            },
            tow_core::Payable {
                reference: "cs_1".into(),
                hosted_url: "https://checkout.example.com/pay/cs_1".into(),
            },
        );

        let mut company = Company::new("c1", "Acme Towing");
        assert!(!payment_message(&company, &tow).contains("Call"));

        company.phone_number = Some("555-0100".into());
        let body = payment_message(&company, &tow);
        assert!(body.starts_with("Acme Towing has scheduled your tow."));
        assert!(body.contains("Total: $13.00"));
        assert!(body.contains("Questions? Call 555-0100"));
    }
}
