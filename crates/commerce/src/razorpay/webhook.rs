//! Webhook payload parsing.
//!
//! Only the fields reconciliation needs are read:
//! `{ "event": ..., "payload": { "payment": { "entity": { "id", "order_id" } } } }`.
//! Everything else in the body is ignored.

use serde::Deserialize;

use super::error::RazorpayError;

/// A parsed webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WebhookEvent {
    /// Event kind, e.g. `payment.captured`.
    pub event: String,
    #[serde(default)]
    payload: WebhookPayload,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
struct WebhookPayload {
    #[serde(default)]
    payment: Option<PaymentWrapper>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct PaymentWrapper {
    entity: PaymentEntity,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct PaymentEntity {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    order_id: Option<String>,
}

/// Provider identifiers carried by a payment event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentRef<'a> {
    pub order_id: &'a str,
    pub payment_id: &'a str,
}

impl WebhookEvent {
    /// Parse a raw webhook body.
    ///
    /// # Errors
    ///
    /// Returns `RazorpayError::Response` if the body is not a JSON object with
    /// an `event` field.
    pub fn parse(body: &[u8]) -> Result<Self, RazorpayError> {
        serde_json::from_slice(body).map_err(|e| RazorpayError::Response(e.to_string()))
    }

    /// The provider order and payment ids, if both are present and non-empty.
    #[must_use]
    pub fn payment(&self) -> Option<PaymentRef<'_>> {
        let entity = &self.payload.payment.as_ref()?.entity;
        let order_id = entity.order_id.as_deref().filter(|s| !s.is_empty())?;
        let payment_id = entity.id.as_deref().filter(|s| !s.is_empty())?;
        Some(PaymentRef {
            order_id,
            payment_id,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_captured_event() {
        let body = br#"{
            "entity": "event",
            "event": "payment.captured",
            "payload": {
                "payment": {
                    "entity": {
                        "id": "pay_29QQoUBi66xm2f",
                        "order_id": "order_9A33XWu170gUtm",
                        "amount": 129800,
                        "status": "captured"
                    }
                }
            },
            "created_at": 1400826750
        }"#;

        let event = WebhookEvent::parse(body).unwrap();
        assert_eq!(event.event, "payment.captured");
        assert_eq!(
            event.payment(),
            Some(PaymentRef {
                order_id: "order_9A33XWu170gUtm",
                payment_id: "pay_29QQoUBi66xm2f",
            })
        );
    }

    #[test]
    fn test_event_without_payment() {
        let event = WebhookEvent::parse(br#"{"event":"order.paid","payload":{}}"#).unwrap();
        assert_eq!(event.payment(), None);
    }

    #[test]
    fn test_event_with_blank_order_id() {
        let body = br#"{"event":"payment.failed","payload":{"payment":{"entity":{"id":"pay_1","order_id":""}}}}"#;
        let event = WebhookEvent::parse(body).unwrap();
        assert_eq!(event.payment(), None);
    }

    #[test]
    fn test_rejects_non_json() {
        assert!(matches!(
            WebhookEvent::parse(b"event=payment.captured"),
            Err(RazorpayError::Response(_))
        ));
    }
}
