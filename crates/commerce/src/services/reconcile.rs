//! Payment reconciliation.
//!
//! Both provider channels end here: the browser's signed verification
//! ([`Commerce::verify_payment`]) and the provider's webhook
//! ([`Commerce::handle_webhook`]). Each transition is one unit keyed by the
//! provider order id and serialized on the payment row lock, so duplicate or
//! concurrent deliveries of the same event collapse into one effect.

use secrecy::SecretString;
use tracing::{debug, info, instrument, warn};

use threadline_core::{PaymentEvent, PaymentStatus, Transition, settlement};

use super::{Commerce, ledger};
use crate::db::{CommerceStore, CommerceTx};
use crate::error::{CommerceError, Result};
use crate::models::PaymentUpdate;
use crate::razorpay::{self, WebhookEvent};

/// What a reconciliation call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The payment moved to this status.
    Applied(PaymentStatus),
    /// The payment was already settled in this status; nothing changed.
    AlreadySettled(PaymentStatus),
    /// No payment carries the provider order id; nothing changed.
    UnknownPayment,
    /// The event kind is not acted on.
    Ignored,
}

/// A provider event kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Authorized,
    Captured,
    Failed,
    /// Any kind not acted on, kept verbatim.
    Other(String),
}

impl EventKind {
    /// The settlement event this kind drives, if any.
    #[must_use]
    pub const fn payment_event(&self) -> Option<PaymentEvent> {
        match self {
            Self::Authorized => Some(PaymentEvent::Authorized),
            Self::Captured => Some(PaymentEvent::Captured),
            Self::Failed => Some(PaymentEvent::Failed),
            Self::Other(_) => None,
        }
    }
}

impl From<&str> for EventKind {
    fn from(kind: &str) -> Self {
        match kind {
            "payment.authorized" => Self::Authorized,
            "payment.captured" => Self::Captured,
            "payment.failed" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authorized => f.write_str("payment.authorized"),
            Self::Captured => f.write_str("payment.captured"),
            Self::Failed => f.write_str("payment.failed"),
            Self::Other(kind) => f.write_str(kind),
        }
    }
}

impl<S: CommerceStore> Commerce<S> {
    /// Record an authorization and the provider's payment id and signature.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError` only if the store fails.
    pub async fn mark_authorized(
        &self,
        provider_order_id: &str,
        provider_payment_id: &str,
        signature: Option<&str>,
    ) -> Result<ReconcileOutcome> {
        self.settle(
            PaymentEvent::Authorized,
            provider_order_id,
            provider_payment_id,
            signature,
        )
        .await
    }

    /// Settle a payment as captured: the order is paid and its stock consumed.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError` only if the store fails.
    pub async fn mark_captured(
        &self,
        provider_order_id: &str,
        provider_payment_id: &str,
    ) -> Result<ReconcileOutcome> {
        self.settle(
            PaymentEvent::Captured,
            provider_order_id,
            provider_payment_id,
            None,
        )
        .await
    }

    /// Settle a payment as failed: the order fails and its stock is released.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError` only if the store fails.
    pub async fn mark_failed(
        &self,
        provider_order_id: &str,
        provider_payment_id: &str,
    ) -> Result<ReconcileOutcome> {
        self.settle(
            PaymentEvent::Failed,
            provider_order_id,
            provider_payment_id,
            None,
        )
        .await
    }

    /// Dispatch a provider event by kind. Unrecognised kinds are ignored.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError` only if the store fails.
    pub async fn reconcile(
        &self,
        kind: &EventKind,
        provider_order_id: &str,
        provider_payment_id: &str,
        signature: Option<&str>,
    ) -> Result<ReconcileOutcome> {
        let Some(event) = kind.payment_event() else {
            debug!(kind = %kind, "Ignoring provider event");
            return Ok(ReconcileOutcome::Ignored);
        };
        self.settle(event, provider_order_id, provider_payment_id, signature)
            .await
    }

    /// Synchronous channel: check the browser-submitted signature, then
    /// record the authorization.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::ProviderVerificationFailed` on a bad signature.
    #[instrument(skip(self, signature, key_secret))]
    pub async fn verify_payment(
        &self,
        provider_order_id: &str,
        provider_payment_id: &str,
        signature: &str,
        key_secret: &SecretString,
    ) -> Result<ReconcileOutcome> {
        if !razorpay::verify_payment_signature(
            provider_order_id,
            provider_payment_id,
            signature,
            key_secret,
        ) {
            warn!("Payment signature mismatch");
            return Err(CommerceError::ProviderVerificationFailed);
        }
        self.mark_authorized(provider_order_id, provider_payment_id, Some(signature))
            .await
    }

    /// Asynchronous channel: check the webhook signature over the raw body,
    /// parse it, and dispatch the event.
    ///
    /// Events without a provider order id and payment id are acknowledged
    /// and ignored.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::ProviderVerificationFailed` on a bad signature
    /// and `CommerceError::InvalidInput` if the body is not a webhook event.
    #[instrument(skip(self, body, signature, webhook_secret))]
    pub async fn handle_webhook(
        &self,
        body: &[u8],
        signature: &str,
        webhook_secret: &SecretString,
    ) -> Result<ReconcileOutcome> {
        if !razorpay::verify_webhook_signature(body, signature, webhook_secret) {
            warn!("Webhook signature mismatch");
            return Err(CommerceError::ProviderVerificationFailed);
        }

        let event =
            WebhookEvent::parse(body).map_err(|e| CommerceError::InvalidInput(e.to_string()))?;
        let kind = EventKind::from(event.event.as_str());

        let Some(payment) = event.payment() else {
            debug!(kind = %kind, "Webhook without payment ids");
            return Ok(ReconcileOutcome::Ignored);
        };

        self.reconcile(&kind, payment.order_id, payment.payment_id, None)
            .await
    }

    #[instrument(skip(self, signature), fields(event = %event))]
    async fn settle(
        &self,
        event: PaymentEvent,
        provider_order_id: &str,
        provider_payment_id: &str,
        signature: Option<&str>,
    ) -> Result<ReconcileOutcome> {
        let mut tx = self.store.begin().await?;

        let Some(payment) = tx.lock_payment(provider_order_id).await? else {
            warn!("No payment for provider order");
            return Ok(ReconcileOutcome::UnknownPayment);
        };

        let to = match settlement::transition(payment.status, event) {
            Transition::Apply { to } => to,
            Transition::AlreadySettled { current } => {
                if current == PaymentStatus::Failed && event == PaymentEvent::Captured {
                    warn!(payment_id = %payment.id, "Capture arrived after failure; ignored");
                } else {
                    debug!(payment_id = %payment.id, status = %current, "Payment already settled");
                }
                return Ok(ReconcileOutcome::AlreadySettled(current));
            }
        };

        tx.update_payment(
            payment.id,
            &PaymentUpdate {
                status: to,
                provider_payment_id: non_empty(provider_payment_id),
                provider_signature: signature.and_then(non_empty),
            },
        )
        .await?;

        if let (Some(outcome), Some(effect)) = (event.order_outcome(), event.stock_effect()) {
            if tx.settle_order(payment.order_id, outcome).await? {
                let lines = tx.order_lines(payment.order_id).await?;
                ledger::lock_in_order(&mut tx, lines.iter().map(|l| l.variant_id)).await?;
                for line in &lines {
                    ledger::settle(&mut tx, effect, line.variant_id, line.quantity).await?;
                }
            } else {
                warn!(
                    order_id = %payment.order_id,
                    "Order no longer pending payment; stock left untouched"
                );
            }
        }

        tx.commit().await?;

        info!(
            payment_id = %payment.id,
            order_id = %payment.order_id,
            status = %to,
            "Payment reconciled"
        );
        Ok(ReconcileOutcome::Applied(to))
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_parsing() {
        assert_eq!(EventKind::from("payment.captured"), EventKind::Captured);
        assert_eq!(EventKind::from("payment.failed"), EventKind::Failed);
        assert_eq!(EventKind::from("payment.authorized"), EventKind::Authorized);
        assert_eq!(
            EventKind::from("refund.processed"),
            EventKind::Other("refund.processed".to_string())
        );
        assert_eq!(EventKind::from("order.paid").payment_event(), None);
    }

    #[test]
    fn test_event_kind_display_round_trips() {
        for kind in ["payment.captured", "payment.failed", "order.paid"] {
            assert_eq!(EventKind::from(kind).to_string(), kind);
        }
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty("  "), None);
        assert_eq!(non_empty("pay_1"), Some("pay_1".to_string()));
    }
}
