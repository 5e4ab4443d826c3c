//! Persistence
//!
//! Keyed repositories for tows, companies and rate sheets, plus an in-memory
//! store for development and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::TowError;
use crate::model::{Company, PaymentStatus, RateItem, RateSheet, TowRequest, TowStatus};

/// Result type alias for repository calls
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Repository errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A unique index rejected the write
    #[error("Conflict: {0}")]
    Conflict(String),

    /// No record matches the id
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage backend failure
    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for TowError {
    fn from(err: StoreError) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Partial-match filter: every `Some` field must equal the record's value
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TowFilter {
    pub id: Option<Uuid>,
    pub company_id: Option<String>,
    pub payment_reference: Option<String>,
    pub status: Option<TowStatus>,
    pub payment_status: Option<PaymentStatus>,
}

impl TowFilter {
    pub fn by_company(company_id: impl Into<String>) -> Self {
        Self {
            company_id: Some(company_id.into()),
            ..Default::default()
        }
    }

    pub fn by_payment_reference(reference: impl Into<String>) -> Self {
        Self {
            payment_reference: Some(reference.into()),
            ..Default::default()
        }
    }

    pub fn matches(&self, tow: &TowRequest) -> bool {
        self.id.is_none_or(|id| id == tow.id)
            && self.company_id.as_ref().is_none_or(|c| *c == tow.company_id)
            && self
                .payment_reference
                .as_ref()
                .is_none_or(|r| *r == tow.payment_reference)
            && self.status.is_none_or(|s| s == tow.status)
            && self.payment_status.is_none_or(|s| s == tow.payment_status)
    }
}

/// Partial update: every `Some` field overwrites the record's value
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TowPatch {
    pub status: Option<TowStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub vehicle: Option<String>,
    pub notes: Option<String>,
}

impl TowPatch {
    /// The only patch the reconciler issues
    pub fn paid() -> Self {
        Self {
            payment_status: Some(PaymentStatus::Paid),
            ..Default::default()
        }
    }

    pub fn apply(&self, tow: &mut TowRequest) {
        if let Some(status) = self.status {
            tow.status = status;
        }
        if let Some(payment_status) = self.payment_status {
            tow.payment_status = payment_status;
        }
        if let Some(vehicle) = &self.vehicle {
            tow.vehicle = Some(vehicle.clone());
        }
        if let Some(notes) = &self.notes {
            tow.notes = Some(notes.clone());
        }
    }
}

/// Tow storage
///
/// Implementations must enforce uniqueness of `payment_reference`.
#[async_trait]
pub trait TowRepository: Send + Sync {
    /// Insert a new tow; `Conflict` on a duplicate id or payment reference
    async fn create(&self, tow: &TowRequest) -> StoreResult<()>;

    /// All tows matching the filter
    async fn find(&self, filter: &TowFilter) -> StoreResult<Vec<TowRequest>>;

    /// Apply a patch by id; `NotFound` when no tow has the id
    async fn update(&self, id: Uuid, patch: &TowPatch) -> StoreResult<()>;
}

/// Company lookup
#[async_trait]
pub trait CompanyRepository: Send + Sync {
    /// Find a company by id or scheduling link
    async fn find_by_key(&self, key: &str) -> StoreResult<Option<Company>>;

    /// Save or replace a company
    async fn save(&self, company: &Company) -> StoreResult<()>;
}

/// Rate sheet storage
#[async_trait]
pub trait RateSheetRepository: Send + Sync {
    /// All rate items of a company (possibly empty)
    async fn rate_sheet(&self, company_id: &str) -> StoreResult<RateSheet>;

    /// Create items without an id, replace items with one
    ///
    /// All or nothing: an unknown id fails the call before anything is written.
    async fn upsert(&self, items: Vec<RateItem>) -> StoreResult<Vec<RateItem>>;
}

/// In-memory store (for development)
#[derive(Default)]
pub struct MemoryStore {
    tows: RwLock<TowTable>,
    companies: RwLock<HashMap<String, Company>>,
    rates: RwLock<HashMap<String, RateItem>>,
}

#[derive(Default)]
struct TowTable {
    rows: HashMap<Uuid, TowRequest>,
    by_reference: HashMap<String, Uuid>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tow bypassing the unique index (for testing integrity faults)
    pub async fn insert_unchecked(&self, tow: TowRequest) {
        let mut table = self.tows.write().await;
        table.by_reference.insert(tow.payment_reference.clone(), tow.id);
        table.rows.insert(tow.id, tow);
    }

    pub async fn tow_count(&self) -> usize {
        self.tows.read().await.rows.len()
    }
}

#[async_trait]
impl TowRepository for MemoryStore {
    async fn create(&self, tow: &TowRequest) -> StoreResult<()> {
        let mut table = self.tows.write().await;

        if table.rows.contains_key(&tow.id) {
            return Err(StoreError::Conflict(format!("tow {} already exists", tow.id)));
        }
        if table.by_reference.contains_key(&tow.payment_reference) {
            return Err(StoreError::Conflict(format!(
                "payment reference {} already in use",
                tow.payment_reference
            )));
        }

        table.by_reference.insert(tow.payment_reference.clone(), tow.id);
        table.rows.insert(tow.id, tow.clone());
        Ok(())
    }

    async fn find(&self, filter: &TowFilter) -> StoreResult<Vec<TowRequest>> {
        let table = self.tows.read().await;
        let mut found: Vec<TowRequest> = table
            .rows
            .values()
            .filter(|tow| filter.matches(tow))
            .cloned()
            .collect();
        found.sort_by_key(|tow| tow.created_at);
        Ok(found)
    }

    async fn update(&self, id: Uuid, patch: &TowPatch) -> StoreResult<()> {
        let mut table = self.tows.write().await;
        let tow = table
            .rows
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("tow {id}")))?;
        patch.apply(tow);
        Ok(())
    }
}

#[async_trait]
impl CompanyRepository for MemoryStore {
    async fn find_by_key(&self, key: &str) -> StoreResult<Option<Company>> {
        let companies = self.companies.read().await;
        Ok(companies.values().find(|c| c.matches_key(key)).cloned())
    }

    async fn save(&self, company: &Company) -> StoreResult<()> {
        self.companies
            .write()
            .await
            .insert(company.id.clone(), company.clone());
        Ok(())
    }
}

#[async_trait]
impl RateSheetRepository for MemoryStore {
    async fn rate_sheet(&self, company_id: &str) -> StoreResult<RateSheet> {
        let rates = self.rates.read().await;
        let mut items: Vec<RateItem> = rates
            .values()
            .filter(|item| item.company_id == company_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.item_name.cmp(&b.item_name));
        Ok(RateSheet::new(items))
    }

    async fn upsert(&self, items: Vec<RateItem>) -> StoreResult<Vec<RateItem>> {
        let mut rates = self.rates.write().await;

        if let Some(unknown) = items
            .iter()
            .filter_map(|item| item.id.as_deref())
            .find(|id| !id.is_empty() && !rates.contains_key(*id))
        {
            return Err(StoreError::NotFound(format!("rate item {unknown}")));
        }

        let mut saved = Vec::with_capacity(items.len());
        for mut item in items {
            let id = match item.id.take() {
                Some(id) if !id.is_empty() => id,
                _ => Uuid::new_v4().to_string(),
            };
            item.id = Some(id.clone());
            rates.insert(id, item.clone());
            saved.push(item);
        }

        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BookingRequest, Payable, PriceQuote};

    fn tow(company_id: &str, reference: &str) -> TowRequest {
        let booking = BookingRequest {
            pickup: "1 Main St".into(),
            destination: "2 Elm St".into(),
            primary_contact: "driver@example.com".into(),
            vehicle: None,
            notes: None,
        };
        let quote = PriceQuote {
            total: 1300,
            line_items: vec![],
            billed_miles: 4,
        };
        let payable = Payable {
            reference: reference.into(),
            hosted_url: format!("https://pay.example.com/{reference}"),
        };
        TowRequest::new(company_id, booking, &quote, payable)
    }

    #[tokio::test]
    async fn test_payment_reference_is_unique() {
        let store = MemoryStore::new();
        store.create(&tow("c1", "cs_1")).await.unwrap();

        let err = store.create(&tow("c2", "cs_1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.tow_count().await, 1);
    }

    #[tokio::test]
    async fn test_find_by_partial_filter() {
        let store = MemoryStore::new();
        store.create(&tow("c1", "cs_1")).await.unwrap();
        store.create(&tow("c1", "cs_2")).await.unwrap();
        store.create(&tow("c2", "cs_3")).await.unwrap();

        assert_eq!(store.find(&TowFilter::by_company("c1")).await.unwrap().len(), 2);
        assert_eq!(store.find(&TowFilter::default()).await.unwrap().len(), 3);

        let found = store
            .find(&TowFilter::by_payment_reference("cs_3"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].company_id, "c2");
    }

    #[tokio::test]
    async fn test_update_applies_only_patched_fields() {
        let store = MemoryStore::new();
        let original = tow("c1", "cs_1");
        store.create(&original).await.unwrap();

        store.update(original.id, &TowPatch::paid()).await.unwrap();

        let updated = store
            .find(&TowFilter::by_payment_reference("cs_1"))
            .await
            .unwrap()
            .remove(0);
        assert_eq!(updated.payment_status, PaymentStatus::Paid);
        assert_eq!(
            TowRequest {
                payment_status: PaymentStatus::Unpaid,
                ..updated
            },
            original
        );
    }

    #[tokio::test]
    async fn test_update_unknown_id() {
        let store = MemoryStore::new();
        let err = store.update(Uuid::new_v4(), &TowPatch::paid()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rate_upsert_assigns_ids() {
        let store = MemoryStore::new();
        let saved = store
            .upsert(vec![RateItem::new("c1", "Hook Up Fee", 500)])
            .await
            .unwrap();
        let id = saved[0].id.clone().unwrap();

        let mut changed = saved[0].clone();
        changed.amount = Some(650);
        store.upsert(vec![changed]).await.unwrap();

        let sheet = store.rate_sheet("c1").await.unwrap();
        assert_eq!(sheet.items.len(), 1);
        assert_eq!(sheet.items[0].id.as_deref(), Some(id.as_str()));
        assert_eq!(sheet.items[0].amount, Some(650));
    }

    #[tokio::test]
    async fn test_failed_rate_upsert_writes_nothing() {
        let store = MemoryStore::new();
        let mut stale = RateItem::new("c1", "Per Mile Amount", 200);
        stale.id = Some("does-not-exist".into());

        let err = store
            .upsert(vec![RateItem::new("c1", "Hook Up Fee", 500), stale])
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(store.rate_sheet("c1").await.unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn test_company_found_by_scheduling_link() {
        let store = MemoryStore::new();
        let mut company = Company::new("c1", "Acme Towing");
        company.scheduling_link = Some("acme-towing".into());
        store.save(&company).await.unwrap();

        assert!(store.find_by_key("acme-towing").await.unwrap().is_some());
        assert!(store.find_by_key("c1").await.unwrap().is_some());
        assert!(store.find_by_key("other").await.unwrap().is_none());
    }
}
