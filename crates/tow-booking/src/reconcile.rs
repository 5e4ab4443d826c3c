//! Payment Reconciliation
//!
//! Applies gateway confirmation events to tows. Delivery is at-least-once,
//! so every path is safe to repeat:
//!
//! ```text
//! unpaid ──(checkout success)──▶ paid ──(redelivery)──▶ paid
//! ```

use std::sync::Arc;

use tracing::{debug, info, instrument};
use uuid::Uuid;

use tow_core::{PaymentConfirmationEvent, Result, TowError, TowFilter, TowPatch, TowRepository};

/// Stripe event for a delayed payment method that has now succeeded
pub const ASYNC_PAYMENT_SUCCEEDED: &str = "checkout.session.async_payment_succeeded";

/// Stripe event for a finished checkout; a success only when already paid
pub const SESSION_COMPLETED: &str = "checkout.session.completed";

/// What reconciling an event did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reconciliation {
    /// Not a checkout-success event
    Ignored { event_type: String },

    /// The tow was already paid (redelivery)
    AlreadyPaid { tow_id: Uuid },

    /// The tow moved from unpaid to paid
    Paid { tow_id: Uuid },
}

/// Applies confirmation events to tows
pub struct PaymentReconciler {
    tows: Arc<dyn TowRepository>,
}

impl PaymentReconciler {
    pub fn new(tows: Arc<dyn TowRepository>) -> Self {
        Self { tows }
    }

    /// Mark the tow behind a checkout-success event as paid
    ///
    /// `TowError::ReferenceNotFound` means the booking may not be visible
    /// yet; callers should let the gateway redeliver.
    #[instrument(skip(self, event), fields(event_type = %event.event_type))]
    pub async fn reconcile(&self, event: &PaymentConfirmationEvent) -> Result<Reconciliation> {
        if !is_checkout_success(event) {
            debug!("Ignoring payment event");
            return Ok(Reconciliation::Ignored {
                event_type: event.event_type.clone(),
            });
        }

        let session_id = session_id(event)?;

        let mut matches = self
            .tows
            .find(&TowFilter::by_payment_reference(session_id))
            .await?;

        let tow = match matches.len() {
            0 => return Err(TowError::ReferenceNotFound(session_id.to_string())),
            1 => matches.remove(0),
            count => {
                return Err(TowError::AmbiguousReference {
                    reference: session_id.to_string(),
                    count,
                });
            }
        };

        if tow.is_paid() {
            debug!(tow_id = %tow.id, "Tow already paid");
            return Ok(Reconciliation::AlreadyPaid { tow_id: tow.id });
        }

        self.tows.update(tow.id, &TowPatch::paid()).await?;

        info!(tow_id = %tow.id, payment_reference = %session_id, "Tow paid");
        Ok(Reconciliation::Paid { tow_id: tow.id })
    }
}

fn is_checkout_success(event: &PaymentConfirmationEvent) -> bool {
    if event.event_type.starts_with(ASYNC_PAYMENT_SUCCEEDED) {
        return true;
    }
    event.event_type == SESSION_COMPLETED
        && event.payload.get("payment_status").and_then(|s| s.as_str()) == Some("paid")
}

fn session_id(event: &PaymentConfirmationEvent) -> Result<&str> {
    event
        .payload
        .get("id")
        .and_then(|id| id.as_str())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| TowError::MalformedEvent("checkout session id missing from payload".into()))
}
