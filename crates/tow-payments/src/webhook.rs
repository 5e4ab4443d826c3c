//! Stripe Webhook Decoding
//!
//! Verifies the `Stripe-Signature` header and turns the raw body into a
//! `PaymentConfirmationEvent`. What the event means is up to the
//! reconciler; this module only vouches that Stripe sent it.
//!
//! Header format: `t=<unix seconds>,v1=<hex hmac>[,v1=...]`, where the HMAC
//! is SHA-256 over `"{t}.{body}"` keyed with the endpoint's signing secret.

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::debug;

use tow_core::PaymentConfirmationEvent;

use crate::checkout::{StripeConfig, DEFAULT_SIGNATURE_TOLERANCE_SECS};
use crate::error::{PaymentError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Name of the header Stripe signs deliveries with
pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

/// Event envelope as Stripe posts it
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type")]
    event_type: String,
    data: EnvelopeData,
}

#[derive(Debug, Deserialize)]
struct EnvelopeData {
    object: serde_json::Value,
}

/// Verifies and decodes webhook deliveries
#[derive(Clone, Debug)]
pub struct WebhookVerifier {
    secret: Option<String>,
    tolerance_secs: i64,
}

impl WebhookVerifier {
    pub fn new(secret: Option<String>, tolerance_secs: i64) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
            tolerance_secs,
        }
    }

    pub fn from_config(config: &StripeConfig) -> Self {
        Self::new(config.webhook_secret.clone(), config.signature_tolerance_secs)
    }

    /// A verifier that accepts unsigned deliveries (local development)
    pub fn unverified() -> Self {
        Self::new(None, DEFAULT_SIGNATURE_TOLERANCE_SECS)
    }

    pub const fn verifies_signatures(&self) -> bool {
        self.secret.is_some()
    }

    /// Check the signature (when a secret is configured) and parse the body
    pub fn decode(&self, payload: &[u8], signature: Option<&str>) -> Result<PaymentConfirmationEvent> {
        self.decode_at(payload, signature, Utc::now().timestamp())
    }

    fn decode_at(
        &self,
        payload: &[u8],
        signature: Option<&str>,
        now: i64,
    ) -> Result<PaymentConfirmationEvent> {
        if let Some(secret) = &self.secret {
            let header = signature.ok_or_else(|| {
                PaymentError::WebhookSignature(format!("missing {SIGNATURE_HEADER} header"))
            })?;
            verify_signature(payload, header, secret, self.tolerance_secs, now)?;
        }
        parse_event(payload)
    }
}

/// Verify a `Stripe-Signature` header against the raw body
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<()> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| PaymentError::WebhookSignature("missing timestamp".into()))?;
    if signatures.is_empty() {
        return Err(PaymentError::WebhookSignature("no v1 signature".into()));
    }

    let age = now.abs_diff(timestamp);
    if age > tolerance_secs.unsigned_abs() {
        return Err(PaymentError::WebhookSignature(format!(
            "timestamp outside tolerance ({age}s > {tolerance_secs}s)"
        )));
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::WebhookSignature(e.to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    // verify_slice compares in constant time
    let valid = signatures.iter().any(|sig| {
        hex::decode(sig).is_ok_and(|bytes| mac.clone().verify_slice(&bytes).is_ok())
    });
    if !valid {
        return Err(PaymentError::WebhookSignature("signature mismatch".into()));
    }

    debug!(timestamp, age, "Webhook signature verified");
    Ok(())
}

/// Parse a Stripe event body
pub fn parse_event(payload: &[u8]) -> Result<PaymentConfirmationEvent> {
    let envelope: Envelope =
        serde_json::from_slice(payload).map_err(|e| PaymentError::WebhookParse(e.to_string()))?;

    if envelope.event_type.trim().is_empty() {
        return Err(PaymentError::WebhookParse("event type is empty".into()));
    }

    Ok(PaymentConfirmationEvent {
        id: envelope.id,
        event_type: envelope.event_type,
        payload: envelope.data.object,
    })
}
