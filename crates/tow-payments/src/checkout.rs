//! Stripe Checkout Gateway
//!
//! Every booked tow gets one hosted Checkout session in `payment` mode. The
//! session id is the tow's payment reference; its URL is what the customer
//! is sent.

use async_trait::async_trait;
use stripe::{
    CheckoutSession, CheckoutSessionId, CheckoutSessionMode, Client, CreateCheckoutSession,
    CreateCheckoutSessionLineItems, CreateCheckoutSessionLineItemsPriceData,
    CreateCheckoutSessionLineItemsPriceDataProductData, Currency, RequestStrategy,
};
use tracing::{debug, info};

use tow_core::{Payable, PayableRequest, PaymentGateway};

use crate::error::{logged, PaymentError, Result};

/// Default tolerance for webhook timestamps (Stripe's recommendation)
pub const DEFAULT_SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Stripe credentials and redirect targets
#[derive(Clone, Debug)]
pub struct StripeConfig {
    pub secret_key: String,

    /// Signing secret of the webhook endpoint (`whsec_...`)
    pub webhook_secret: Option<String>,

    /// Where Checkout sends the customer after paying
    pub success_url: String,

    /// Where Checkout sends the customer after backing out
    pub cancel_url: String,

    pub signature_tolerance_secs: i64,
}

impl StripeConfig {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            webhook_secret: None,
            success_url: "https://example.com/tow/paid".into(),
            cancel_url: "https://example.com/tow/cancelled".into(),
            signature_tolerance_secs: DEFAULT_SIGNATURE_TOLERANCE_SECS,
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let secret_key = std::env::var("STRIPE_SECRET_KEY")
            .or_else(|_| std::env::var("STRIPE_API_KEY"))
            .map_err(|_| PaymentError::Config("STRIPE_SECRET_KEY not set".into()))?;

        let mut config = Self::new(secret_key);
        config.webhook_secret = std::env::var("STRIPE_WEBHOOK_SECRET")
            .ok()
            .filter(|s| !s.is_empty());
        if let Ok(url) = std::env::var("STRIPE_CHECKOUT_SUCCESS_URL") {
            config.success_url = url;
        }
        if let Ok(url) = std::env::var("STRIPE_CHECKOUT_CANCEL_URL") {
            config.cancel_url = url;
        }
        if let Some(secs) = std::env::var("STRIPE_SIGNATURE_TOLERANCE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.signature_tolerance_secs = secs;
        }

        Ok(config)
    }
}

/// A validated checkout line
#[derive(Clone, Debug, PartialEq, Eq)]
struct CheckoutLine {
    name: String,
    unit_amount: i64,
    quantity: u64,
}

/// Validate a payable request and drop lines that charge nothing
///
/// A zero-mile tow has a per-mile line with quantity 0; Stripe rejects such
/// lines, so they are left out of the session.
fn checkout_lines(request: &PayableRequest) -> Result<Vec<CheckoutLine>> {
    if request.total <= 0 {
        return Err(PaymentError::InvalidPayable(format!(
            "total must be positive, got {}",
            request.total
        )));
    }

    let mut lines = Vec::with_capacity(request.line_items.len());
    for (i, item) in request.line_items.iter().enumerate() {
        if item.name.trim().is_empty() {
            return Err(PaymentError::InvalidPayable(format!("line item {i} has no name")));
        }
        if item.amount < 0 {
            return Err(PaymentError::InvalidPayable(format!(
                "line item {i} has a negative amount"
            )));
        }
        if item.amount == 0 || item.quantity == 0 {
            continue;
        }
        lines.push(CheckoutLine {
            name: item.name.clone(),
            unit_amount: item.amount,
            quantity: item.quantity,
        });
    }

    if lines.is_empty() {
        return Err(PaymentError::InvalidPayable("no chargeable line items".into()));
    }
    Ok(lines)
}

/// `PaymentGateway` backed by Stripe Checkout
pub struct StripeGateway {
    client: Client,
    config: StripeConfig,
}

impl StripeGateway {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            client: Client::new(config.secret_key.clone()),
            config,
        }
    }

    pub(crate) const fn client(&self) -> &Client {
        &self.client
    }

    /// Create a hosted Checkout session for a payable
    pub async fn create_checkout_session(&self, request: &PayableRequest) -> Result<Payable> {
        let lines = checkout_lines(request)?;

        let mut params = CreateCheckoutSession::new();
        params.success_url = Some(&self.config.success_url);
        params.cancel_url = Some(&self.config.cancel_url);
        params.mode = Some(CheckoutSessionMode::Payment);
        params.line_items = Some(
            lines
                .into_iter()
                .map(|line| CreateCheckoutSessionLineItems {
                    quantity: Some(line.quantity),
                    price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                        currency: Currency::USD,
                        unit_amount: Some(line.unit_amount),
                        product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                            name: line.name,
                            ..Default::default()
                        }),
                        ..Default::default()
                    }),
                    ..Default::default()
                })
                .collect(),
        );

        // Retries with the same key return the original session
        let client = self
            .client
            .clone()
            .with_strategy(RequestStrategy::Idempotent(request.idempotency_key.clone()));

        let session = CheckoutSession::create(&client, params)
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;

        let hosted_url = session
            .url
            .ok_or_else(|| PaymentError::Stripe("No checkout URL returned".into()))?;

        info!(
            session_id = %session.id,
            total = request.total,
            "Created checkout session"
        );

        Ok(Payable {
            reference: session.id.to_string(),
            hosted_url,
        })
    }

    /// Expire an open Checkout session so it can no longer be paid
    pub async fn expire_checkout_session(&self, session_id: &str) -> Result<()> {
        let id: CheckoutSessionId = session_id
            .parse()
            .map_err(|e| PaymentError::InvalidPayable(format!("bad session id {session_id}: {e}")))?;

        CheckoutSession::expire(&self.client, &id)
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;

        debug!(session_id = %session_id, "Expired checkout session");
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_payable(&self, request: &PayableRequest) -> tow_core::Result<Payable> {
        logged(
            "create_checkout_session",
            self.create_checkout_session(request).await,
        )
    }

    async fn void_payable(&self, reference: &str) -> tow_core::Result<()> {
        logged(
            "expire_checkout_session",
            self.expire_checkout_session(reference).await,
        )
    }

    fn name(&self) -> &str {
        "Stripe"
    }
}
