//! Mock Collaborators
//!
//! For testing and demo purposes. No network; every mock records how it was
//! called so tests can assert on side effects.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use tow_core::{
    Coordinate, GeocodingProvider, Miles, NotificationError, NotificationService, Payable,
    PayableRequest, PaymentAccount, PaymentAccountProvider, PaymentGateway, Result,
    RoutingProvider, TowError,
};

/// Geocoder with a fixed address book
#[derive(Default)]
pub struct MockGeocoder {
    known: HashMap<String, Coordinate>,
    calls: AtomicUsize,
}

impl MockGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an address
    #[must_use]
    pub fn with_address(mut self, address: &str, at: Coordinate) -> Self {
        self.known.insert(address.to_string(), at);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GeocodingProvider for MockGeocoder {
    async fn geocode(&self, address: &str) -> Result<Coordinate> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.known
            .get(address)
            .copied()
            .ok_or_else(|| TowError::GeocodingFailed(format!("no match for '{address}'")))
    }

    async fn suggest(
        &self,
        query: &str,
        _bias: Option<Coordinate>,
        limit: usize,
    ) -> Result<Vec<String>> {
        let query = query.to_lowercase();
        let mut matches: Vec<String> = self
            .known
            .keys()
            .filter(|address| address.to_lowercase().contains(&query))
            .cloned()
            .collect();
        matches.sort();
        matches.truncate(limit);
        Ok(matches)
    }

    fn name(&self) -> &str {
        "MockGeocoder"
    }
}

/// Router that always answers the same distance
pub struct MockRouter {
    miles: Option<f64>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockRouter {
    pub const fn new(miles: f64) -> Self {
        Self {
            miles: Some(miles),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// A router that never finds a route
    pub const fn unroutable() -> Self {
        Self {
            miles: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Answer only after `delay` (for deadline tests)
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RoutingProvider for MockRouter {
    async fn distance(&self, _from: Coordinate, _to: Coordinate) -> Result<Miles> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.miles
            .and_then(Miles::new)
            .ok_or_else(|| TowError::RoutingFailed("no route between coordinates".into()))
    }

    fn name(&self) -> &str {
        "MockRouter"
    }
}

/// Payment gateway that issues `cs_test_*` references
///
/// Also serves company payment accounts registered with `with_account`.
#[derive(Default)]
pub struct MockGateway {
    fail: AtomicBool,
    created: Mutex<Vec<PayableRequest>>,
    voided: Mutex<Vec<String>>,
    accounts: Mutex<HashMap<String, PaymentAccount>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway that rejects every payable
    pub fn failing() -> Self {
        let gateway = Self::default();
        gateway.fail.store(true, Ordering::SeqCst);
        gateway
    }

    pub fn with_account(mut self, account: PaymentAccount) -> Self {
        self.accounts.get_mut().insert(account.id.clone(), account);
        self
    }

    /// Payable requests received so far
    pub async fn created(&self) -> Vec<PayableRequest> {
        self.created.lock().await.clone()
    }

    /// References voided so far
    pub async fn voided(&self) -> Vec<String> {
        self.voided.lock().await.clone()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_payable(&self, request: &PayableRequest) -> Result<Payable> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TowError::PaymentGateway("gateway unavailable".into()));
        }
        self.created.lock().await.push(request.clone());

        let reference = format!("cs_test_{}", Uuid::new_v4().simple());
        Ok(Payable {
            hosted_url: format!("https://checkout.example.com/pay/{reference}"),
            reference,
        })
    }

    async fn void_payable(&self, reference: &str) -> Result<()> {
        self.voided.lock().await.push(reference.to_string());
        Ok(())
    }

    fn name(&self) -> &str {
        "MockGateway"
    }
}

#[async_trait]
impl PaymentAccountProvider for MockGateway {
    async fn account(&self, account_id: &str) -> Result<PaymentAccount> {
        self.accounts
            .lock()
            .await
            .get(account_id)
            .cloned()
            .ok_or_else(|| TowError::PaymentGateway(format!("no such account: {account_id}")))
    }

    async fn login_link(&self, account_id: &str, _redirect_url: &str) -> Result<String> {
        Ok(format!("https://connect.example.com/login/{account_id}"))
    }

    async fn onboarding_link(
        &self,
        account_id: &str,
        _return_url: &str,
        _refresh_url: &str,
    ) -> Result<String> {
        Ok(format!("https://connect.example.com/setup/{account_id}"))
    }
}

/// A message captured by `MockNotifier`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentMessage {
    pub address: String,
    pub subject: String,
    pub body: String,
}

/// Notifier that keeps messages in memory
#[derive(Default)]
pub struct MockNotifier {
    fail: AtomicBool,
    sent: Mutex<Vec<SentMessage>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose deliveries always fail
    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.fail.store(true, Ordering::SeqCst);
        notifier
    }

    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl NotificationService for MockNotifier {
    async fn send(
        &self,
        address: &str,
        subject: &str,
        body: &str,
    ) -> std::result::Result<(), NotificationError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotificationError("mailbox unavailable".into()));
        }
        self.sent.lock().await.push(SentMessage {
            address: address.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}
