//! tow-dispatch HTTP Server
//!
//! Axum-based server for tow booking, estimates, dispatch updates and
//! Stripe payment confirmation.

mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tow_booking::{
    mock::MockGateway, BookingConfig, EstimateCalculator, PaymentAccountService,
    PaymentReconciler, TowLifecycleManager,
};
use tow_core::model::{HOOK_UP_FEE, PER_MILE_AMOUNT};
use tow_core::{
    Company, CompanyRepository, MemoryStore, NotificationService, PaymentAccountProvider,
    PaymentGateway, RateItem, RateSheetRepository,
};
use tow_payments::{StripeConfig, StripeGateway, WebhookVerifier};
use tow_runtime::{LogNotifier, NominatimGeocoder, OsrmRouter};

use crate::handlers::{
    create_tow, estimate, get_payment_account, get_pricing, health_check, list_company_tows,
    post_payment_account, put_pricing, stripe_webhook, suggest_locations, update_tow,
};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let store = Arc::new(MemoryStore::new());
    if let Ok(company_id) = std::env::var("TOW_DEMO_COMPANY") {
        seed_demo_company(&store, &company_id).await?;
        tracing::info!(company_id = %company_id, "Seeded demo company");
    }

    // Location providers
    let geocoder = Arc::new(NominatimGeocoder::from_env()?);
    let router = Arc::new(OsrmRouter::from_env()?);

    // Payments
    let (gateway, accounts, verifier, stripe_configured) = match StripeConfig::from_env() {
        Ok(config) => {
            tracing::info!("✓ Stripe configured");
            let verifier = WebhookVerifier::from_config(&config);
            if !verifier.verifies_signatures() {
                tracing::warn!("⚠ STRIPE_WEBHOOK_SECRET not set - webhook signatures NOT verified");
            }
            let stripe = Arc::new(StripeGateway::new(config));
            let gateway: Arc<dyn PaymentGateway> = stripe.clone();
            let accounts: Arc<dyn PaymentAccountProvider> = stripe;
            (gateway, accounts, verifier, true)
        }
        Err(e) => {
            tracing::warn!("⚠ {e} - using mock payment gateway");
            let mock = Arc::new(MockGateway::new());
            let gateway: Arc<dyn PaymentGateway> = mock.clone();
            let accounts: Arc<dyn PaymentAccountProvider> = mock;
            (gateway, accounts, WebhookVerifier::unverified(), false)
        }
    };

    let notifier = notifier();
    let config = BookingConfig::from_env();

    let estimator = Arc::new(EstimateCalculator::new(
        store.clone(),
        store.clone(),
        geocoder,
        router,
        config.clone(),
    ));
    let manager = Arc::new(TowLifecycleManager::new(
        estimator.clone(),
        store.clone(),
        gateway,
        notifier,
        config.clone(),
    ));
    let accounts = Arc::new(PaymentAccountService::new(store.clone(), accounts, config));

    // Build application state
    let state = AppState {
        estimator,
        manager,
        reconciler: Arc::new(PaymentReconciler::new(store.clone())),
        accounts,
        rates: store,
        verifier: Arc::new(verifier),
        stripe_configured,
    };

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = Router::new()
        .route("/health", get(health_check))
        // Tows
        .route("/tows/estimates", get(estimate))
        .route("/tows/company/{company_id}", get(list_company_tows))
        .route("/tows/{id}", post(create_tow).put(update_tow))
        // Pricing
        .route("/pricing", put(put_pricing))
        .route("/pricing/company/{company_id}", get(get_pricing))
        // Locations
        .route("/locations/suggest", get(suggest_locations))
        // Payments
        .route(
            "/payments/account/{company_id}",
            get(get_payment_account).post(post_payment_account),
        )
        .route("/webhooks/stripe", post(stripe_webhook))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚚 tow-dispatch server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                      - Health check");
    tracing::info!("  POST /tows/{{company}}              - Book a tow");
    tracing::info!("  GET  /tows/company/{{company_id}}   - Tow history");
    tracing::info!("  PUT  /tows/{{tow_id}}               - Dispatch update");
    tracing::info!("  GET  /tows/estimates              - Price estimate");
    tracing::info!("  GET  /pricing/company/{{id}}        - Rate sheet");
    tracing::info!("  PUT  /pricing                     - Upsert rate items");
    tracing::info!("  GET  /locations/suggest           - Address suggestions");
    tracing::info!("  GET  /payments/account/{{id}}       - Stripe account");
    tracing::info!("  POST /payments/account/{{id}}       - Dashboard link");
    tracing::info!("  POST /webhooks/stripe             - Stripe events");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}

/// SMTP when configured, otherwise log-only delivery
fn notifier() -> Arc<dyn NotificationService> {
    if let Some(config) = tow_runtime::SmtpConfig::from_env() {
        match tow_runtime::SmtpNotifier::new(&config) {
            Ok(smtp) => {
                tracing::info!(server = %config.server, "✓ SMTP configured");
                return Arc::new(smtp);
            }
            Err(e) => tracing::warn!("⚠ SMTP unavailable: {e}"),
        }
    }
    tracing::warn!("⚠ No mail relay - payment links will only be logged");
    Arc::new(LogNotifier::new())
}

async fn seed_demo_company(store: &MemoryStore, company_id: &str) -> anyhow::Result<()> {
    let mut company = Company::new(company_id, "Demo Towing");
    company.scheduling_link = Some(format!("{company_id}-towing"));
    company.phone_number = std::env::var("TOW_DEMO_PHONE").ok();
    company.stripe_account_id = std::env::var("TOW_DEMO_STRIPE_ACCOUNT").ok();
    store.save(&company).await?;
    store
        .upsert(vec![
            RateItem::new(company_id, HOOK_UP_FEE, 7500),
            RateItem::new(company_id, PER_MILE_AMOUNT, 400),
        ])
        .await?;
    Ok(())
}
