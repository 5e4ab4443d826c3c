//! HTTP Handlers

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tow_booking::{DispatchUpdate, Reconciliation};
use tow_core::{
    BookingRequest, DashboardLink, LineItem, PaymentAccount, RateItem, RateSheet, StoreError,
    TowError, TowRequest,
};
use tow_payments::{PaymentError, SIGNATURE_HEADER};

use crate::state::AppState;

/// Suggestions returned per query
const SUGGESTION_LIMIT: usize = 7;

type ApiResult<T> = Result<T, (StatusCode, Json<ErrorResponse>)>;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub stripe_configured: bool,
    pub webhook_signatures_verified: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// A booked tow; `warning` is set when the customer was not notified
#[derive(Debug, Serialize)]
pub struct BookingResponse {
    #[serde(flatten)]
    pub tow: TowRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateQuery {
    #[serde(alias = "company_id")]
    pub company_id: String,
    pub pickup: String,
    pub dropoff: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateResponse {
    pub total: i64,
    pub line_items: Vec<LineItem>,
    pub billed_miles: u64,
}

/// Where the provider sends the company after the dashboard flow
#[derive(Debug, Deserialize)]
pub struct DashboardLinkRequest {
    #[serde(rename = "returnURL", alias = "returnUrl")]
    pub return_url: String,
    #[serde(rename = "refreshURL", alias = "refreshUrl")]
    pub refresh_url: String,
}

#[derive(Debug, Deserialize)]
pub struct SuggestQuery {
    #[serde(default)]
    pub query: String,
}

// ============================================================================
// Error Mapping
// ============================================================================

fn status_for(err: &TowError) -> StatusCode {
    match err {
        TowError::CompanyNotFound(_)
        | TowError::NoPaymentAccount(_)
        | TowError::ReferenceNotFound(_) => StatusCode::NOT_FOUND,
        TowError::InvalidRateSheet(_)
        | TowError::GeocodingFailed(_)
        | TowError::RoutingFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
        TowError::PaymentGateway(_) => StatusCode::BAD_GATEWAY,
        TowError::MalformedEvent(_) => StatusCode::BAD_REQUEST,
        TowError::AmbiguousReference { .. } => StatusCode::CONFLICT,
        TowError::Persistence(_) | TowError::NotificationFailed { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn api_error(err: &TowError) -> (StatusCode, Json<ErrorResponse>) {
    let status = status_for(err);
    let error = if status.is_server_error() {
        tracing::error!(code = err.code(), error = %err, "Request failed");
        err.user_message().to_string()
    } else {
        err.to_string()
    };

    (
        status,
        Json(ErrorResponse {
            error,
            code: err.code().into(),
        }),
    )
}

/// Unknown rate item ids are the caller's mistake, not a storage fault
fn rate_store_error(err: StoreError) -> (StatusCode, Json<ErrorResponse>) {
    match err {
        StoreError::NotFound(what) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("{what} does not exist"),
                code: "RATE_ITEM_NOT_FOUND".into(),
            }),
        ),
        other => api_error(&TowError::from(other)),
    }
}

fn bad_request(error: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: error.into(),
            code: "BAD_REQUEST".into(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        stripe_configured: state.stripe_configured,
        webhook_signatures_verified: state.verifier.verifies_signatures(),
    })
}

/// Book a tow with the company given by id or scheduling link
pub async fn create_tow(
    State(state): State<AppState>,
    Path(company): Path<String>,
    Json(booking): Json<BookingRequest>,
) -> ApiResult<(StatusCode, Json<BookingResponse>)> {
    match state.manager.schedule_tow(booking, &company).await {
        Ok(tow) => Ok((StatusCode::CREATED, Json(BookingResponse { tow, warning: None }))),
        Err(TowError::NotificationFailed { tow, reason }) => Ok((
            StatusCode::CREATED,
            Json(BookingResponse {
                tow: *tow,
                warning: Some(format!("Tow booked but payment link not sent: {reason}")),
            }),
        )),
        Err(err) => Err(api_error(&err)),
    }
}

/// Tow history of a company
pub async fn list_company_tows(
    State(state): State<AppState>,
    Path(company_id): Path<String>,
) -> ApiResult<Json<Vec<TowRequest>>> {
    state
        .manager
        .tows_for_company(&company_id)
        .await
        .map(Json)
        .map_err(|e| api_error(&e))
}

/// Dispatcher update of status, vehicle or notes
pub async fn update_tow(
    State(state): State<AppState>,
    Path(tow_id): Path<String>,
    Json(update): Json<DispatchUpdate>,
) -> ApiResult<StatusCode> {
    let tow_id: Uuid = tow_id
        .parse()
        .map_err(|_| bad_request(format!("'{tow_id}' is not a tow id")))?;

    state
        .manager
        .update_dispatch(tow_id, update)
        .await
        .map_err(|e| api_error(&e))?;

    Ok(StatusCode::NO_CONTENT)
}

/// Price a tow without booking it
pub async fn estimate(
    State(state): State<AppState>,
    Query(query): Query<EstimateQuery>,
) -> ApiResult<Json<EstimateResponse>> {
    let quoted = state
        .estimator
        .quote(&query.company_id, &query.pickup, &query.dropoff)
        .await
        .map_err(|e| api_error(&e))?;

    Ok(Json(EstimateResponse {
        total: quoted.quote.total,
        line_items: quoted.quote.line_items,
        billed_miles: quoted.quote.billed_miles,
    }))
}

/// A company's rate sheet
pub async fn get_pricing(
    State(state): State<AppState>,
    Path(company_id): Path<String>,
) -> ApiResult<Json<RateSheet>> {
    state
        .rates
        .rate_sheet(&company_id)
        .await
        .map(Json)
        .map_err(|e| api_error(&TowError::from(e)))
}

/// Create or replace rate items
pub async fn put_pricing(
    State(state): State<AppState>,
    Json(items): Json<Vec<RateItem>>,
) -> ApiResult<Json<Vec<RateItem>>> {
    if let Some(bad) = items
        .iter()
        .find(|i| i.company_id.trim().is_empty() || i.item_name.trim().is_empty())
    {
        return Err(bad_request(format!(
            "rate item '{}' needs a company id and a name",
            bad.item_name
        )));
    }

    state
        .rates
        .upsert(items)
        .await
        .map(Json)
        .map_err(rate_store_error)
}

/// Address completions
pub async fn suggest_locations(
    State(state): State<AppState>,
    Query(query): Query<SuggestQuery>,
) -> ApiResult<Json<Vec<String>>> {
    state
        .estimator
        .suggest_addresses(&query.query, SUGGESTION_LIMIT)
        .await
        .map(Json)
        .map_err(|e| api_error(&e))
}

/// A company's Stripe account
pub async fn get_payment_account(
    State(state): State<AppState>,
    Path(company_id): Path<String>,
) -> ApiResult<Json<PaymentAccount>> {
    state
        .accounts
        .payment_account(&company_id)
        .await
        .map(Json)
        .map_err(|e| api_error(&e))
}

/// Dashboard login, or onboarding while the account is incomplete
pub async fn post_payment_account(
    State(state): State<AppState>,
    Path(company_id): Path<String>,
    Json(body): Json<DashboardLinkRequest>,
) -> ApiResult<Json<DashboardLink>> {
    if body.return_url.trim().is_empty() || body.refresh_url.trim().is_empty() {
        return Err(bad_request("returnURL and refreshURL are required"));
    }

    state
        .accounts
        .dashboard_link(&company_id, &body.return_url, &body.refresh_url)
        .await
        .map(Json)
        .map_err(|e| api_error(&e))
}

/// Stripe webhook handler
///
/// 200 tells Stripe to stop; 503 asks it to redeliver later.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let event = state.verifier.decode(&body, signature).map_err(|e: PaymentError| {
        tracing::warn!(error = %e, "Rejected webhook");
        api_error(&TowError::from(e))
    })?;

    match state.reconciler.reconcile(&event).await {
        Ok(Reconciliation::Paid { tow_id }) => {
            tracing::info!(tow_id = %tow_id, event_id = ?event.id, "Payment confirmed");
            Ok(StatusCode::OK)
        }
        Ok(_) => Ok(StatusCode::OK),
        Err(err) if err.is_retryable() => {
            tracing::warn!(error = %err, event_id = ?event.id, "Webhook deferred for redelivery");
            Err((StatusCode::SERVICE_UNAVAILABLE, api_error(&err).1))
        }
        Err(err) => {
            tracing::error!(error = %err, event_id = ?event.id, "Webhook could not be applied");
            Err(api_error(&err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_keep_detail() {
        let (status, Json(body)) = api_error(&TowError::CompanyNotFound("acme".into()));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.code, "COMPANY_NOT_FOUND");
        assert!(body.error.contains("acme"));
    }

    #[test]
    fn test_server_errors_hide_detail() {
        let (status, Json(body)) = api_error(&TowError::Persistence("disk on fire".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.error.contains("disk"));
    }

    #[test]
    fn test_unknown_rate_item_is_not_found() {
        let (status, Json(body)) =
            rate_store_error(StoreError::NotFound("rate item does-not-exist".into()));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.code, "RATE_ITEM_NOT_FOUND");
        assert!(body.error.contains("does-not-exist"));

        let (status, _) = rate_store_error(StoreError::Backend("timeout".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_missing_payment_account_is_not_found() {
        let (status, Json(body)) = api_error(&TowError::NoPaymentAccount("c1".into()));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.code, "NO_PAYMENT_ACCOUNT");
    }

    #[test]
    fn test_dashboard_link_body_field_names() {
        let body: DashboardLinkRequest = serde_json::from_str(
            r#"{"returnURL":"https://app.example.com/done","refreshURL":"https://app.example.com/retry"}"#,
        )
        .unwrap();
        assert_eq!(body.return_url, "https://app.example.com/done");
        assert_eq!(body.refresh_url, "https://app.example.com/retry");
    }

    #[test]
    fn test_rate_sheet_problems_are_unprocessable() {
        let status = status_for(&TowError::InvalidRateSheet("missing 'Hook Up Fee'".into()));
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
