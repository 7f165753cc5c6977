use crate::error::{BillingError, Result};
use crate::stripe::StripeSubscription;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed webhook, in seconds
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// HMAC-SHA256 of `"{timestamp}.{payload}"`, hex encoded
pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| BillingError::Configuration(format!("Invalid webhook secret: {}", e)))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check a `Stripe-Signature` header (`t=...,v1=...[,v1=...]`) against the
/// raw request body.
pub fn verify_signature(payload: &[u8], header: &str, secret: &str, now: i64) -> Result<()> {
    let mut timestamp: Option<i64> = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = Some(value.parse().map_err(|_| {
                    BillingError::InvalidSignature("timestamp is not a number".to_string())
                })?);
            }
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| BillingError::InvalidSignature("missing timestamp".to_string()))?;
    if signatures.is_empty() {
        return Err(BillingError::InvalidSignature("missing v1 signature".to_string()));
    }

    if now.abs_diff(timestamp) > SIGNATURE_TOLERANCE_SECS.unsigned_abs() {
        return Err(BillingError::SignatureExpired);
    }

    for signature in signatures {
        let Ok(expected) = hex::decode(signature) else {
            continue;
        };

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| BillingError::Configuration(format!("Invalid webhook secret: {}", e)))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);

        // verify_slice compares in constant time
        if mac.verify_slice(&expected).is_ok() {
            return Ok(());
        }
    }

    Err(BillingError::InvalidSignature("no matching signature".to_string()))
}

// ============================================================================
// EVENTS
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
struct CheckoutSessionObject {
    id: String,
    customer: Option<String>,
    subscription: Option<String>,
    client_reference_id: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
struct InvoiceObject {
    customer: Option<String>,
    subscription: Option<String>,
}

#[derive(Debug, Clone)]
pub enum StripeEvent {
    CheckoutCompleted {
        session_id: String,
        tenant_id: Uuid,
        customer_id: Option<String>,
        subscription_id: Option<String>,
    },
    SubscriptionUpdated(StripeSubscription),
    SubscriptionDeleted(StripeSubscription),
    InvoicePaid {
        customer_id: Option<String>,
        subscription_id: Option<String>,
    },
    InvoicePaymentFailed {
        customer_id: Option<String>,
        subscription_id: Option<String>,
    },
    /// An event type billing does not act on
    Ignored,
}

impl WebhookEvent {
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }

    pub fn parse(&self) -> Result<StripeEvent> {
        let object = self.data.object.clone();

        let event = match self.event_type.as_str() {
            "checkout.session.completed" => {
                let session: CheckoutSessionObject = serde_json::from_value(object)?;
                let tenant_id = session
                    .client_reference_id
                    .as_deref()
                    .or_else(|| session.metadata.get("tenant_id").map(String::as_str))
                    .and_then(|id| Uuid::parse_str(id).ok())
                    .ok_or_else(|| {
                        BillingError::InvalidPayload("checkout session without tenant reference".to_string())
                    })?;

                StripeEvent::CheckoutCompleted {
                    session_id: session.id,
                    tenant_id,
                    customer_id: session.customer,
                    subscription_id: session.subscription,
                }
            }
            "customer.subscription.updated" => StripeEvent::SubscriptionUpdated(serde_json::from_value(object)?),
            "customer.subscription.deleted" => StripeEvent::SubscriptionDeleted(serde_json::from_value(object)?),
            "invoice.paid" => {
                let invoice: InvoiceObject = serde_json::from_value(object)?;
                StripeEvent::InvoicePaid {
                    customer_id: invoice.customer,
                    subscription_id: invoice.subscription,
                }
            }
            "invoice.payment_failed" => {
                let invoice: InvoiceObject = serde_json::from_value(object)?;
                StripeEvent::InvoicePaymentFailed {
                    customer_id: invoice.customer,
                    subscription_id: invoice.subscription,
                }
            }
            _ => StripeEvent::Ignored,
        };

        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const NOW: i64 = 1_700_000_000;

    fn header_for(payload: &[u8], timestamp: i64) -> String {
        format!("t={},v1={}", timestamp, compute_signature(SECRET, timestamp, payload).unwrap())
    }

    #[test]
    fn test_valid_signature() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = header_for(payload, NOW);

        assert!(verify_signature(payload, &header, SECRET, NOW).is_ok());
        assert!(verify_signature(payload, &header, SECRET, NOW + 299).is_ok());
    }

    #[test]
    fn test_tampered_payload_or_wrong_secret() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = header_for(payload, NOW);

        assert!(matches!(
            verify_signature(br#"{"id":"evt_2"}"#, &header, SECRET, NOW),
            Err(BillingError::InvalidSignature(_))
        ));
        assert!(matches!(
            verify_signature(payload, &header, "whsec_other", NOW),
            Err(BillingError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_stale_signature() {
        let payload = b"{}";
        let header = header_for(payload, NOW - 301);

        assert!(matches!(
            verify_signature(payload, &header, SECRET, NOW),
            Err(BillingError::SignatureExpired)
        ));
    }

    #[test]
    fn test_extreme_timestamps_are_expired() {
        for header in [
            "t=-9223372036854775808,v1=00",
            "t=9223372036854775807,v1=00",
        ] {
            assert!(matches!(
                verify_signature(b"{}", header, SECRET, NOW),
                Err(BillingError::SignatureExpired)
            ));
        }
        assert!(matches!(
            verify_signature(b"{}", "t=0,v1=00", SECRET, i64::MIN),
            Err(BillingError::SignatureExpired)
        ));
    }

    #[test]
    fn test_any_of_several_signatures_may_match() {
        let payload = b"{}";
        let good = compute_signature(SECRET, NOW, payload).unwrap();
        let header = format!("t={},v1=deadbeef,v0=ignored,v1={}", NOW, good);

        assert!(verify_signature(payload, &header, SECRET, NOW).is_ok());
    }

    #[test]
    fn test_malformed_headers() {
        assert!(verify_signature(b"{}", "v1=abc", SECRET, NOW).is_err());
        assert!(verify_signature(b"{}", &format!("t={}", NOW), SECRET, NOW).is_err());
        assert!(verify_signature(b"{}", "t=soon,v1=abc", SECRET, NOW).is_err());
    }

    #[test]
    fn test_parse_checkout_completed() {
        let tenant_id = Uuid::new_v4();
        let payload = serde_json::json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_1",
                "customer": "cus_1",
                "subscription": "sub_1",
                "client_reference_id": tenant_id.to_string(),
                "metadata": {}
            }}
        });

        let event = WebhookEvent::from_payload(payload.to_string().as_bytes()).unwrap();
        match event.parse().unwrap() {
            StripeEvent::CheckoutCompleted {
                tenant_id: parsed,
                subscription_id,
                ..
            } => {
                assert_eq!(parsed, tenant_id);
                assert_eq!(subscription_id.as_deref(), Some("sub_1"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_parse_unhandled_event() {
        let payload = br#"{"id":"evt_9","type":"customer.created","data":{"object":{"id":"cus_1"}}}"#;
        let event = WebhookEvent::from_payload(payload).unwrap();
        assert!(matches!(event.parse().unwrap(), StripeEvent::Ignored));
    }
}
