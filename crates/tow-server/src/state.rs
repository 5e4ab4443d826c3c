//! Application State

use std::sync::Arc;

use tow_booking::{
    EstimateCalculator, PaymentAccountService, PaymentReconciler, TowLifecycleManager,
};
use tow_core::RateSheetRepository;
use tow_payments::WebhookVerifier;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Read-only quoting and address suggestions
    pub estimator: Arc<EstimateCalculator>,

    /// Booking, history and dispatch updates
    pub manager: Arc<TowLifecycleManager>,

    /// Applies Stripe confirmation events
    pub reconciler: Arc<PaymentReconciler>,

    /// Company payment accounts and dashboard links
    pub accounts: Arc<PaymentAccountService>,

    /// Rate sheet maintenance
    pub rates: Arc<dyn RateSheetRepository>,

    /// Webhook signature check and decoding
    pub verifier: Arc<WebhookVerifier>,

    /// Whether payables go to Stripe (false: mock gateway)
    pub stripe_configured: bool,
}
