//! Payment domain types.

use serde::{Deserialize, Serialize};

use threadline_core::{Money, OrderId, PaymentId, PaymentStatus};

/// A payment row as seen under its row lock during reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub status: PaymentStatus,
}

/// Changes applied to a payment by a reconciliation transition.
///
/// `None` fields leave the stored value untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentUpdate {
    pub status: PaymentStatus,
    pub provider_payment_id: Option<String>,
    pub provider_signature: Option<String>,
}

/// Payment information shown with an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSummary {
    pub id: PaymentId,
    pub provider: String,
    pub status: PaymentStatus,
    pub amount: Money,
    pub provider_order_id: Option<String>,
    pub provider_payment_id: Option<String>,
}

/// Outcome of a successful checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutResult {
    pub order_id: OrderId,
    pub payment_id: PaymentId,
    pub amount: Money,
    pub currency: String,
    pub provider: String,
}

/// What the browser checkout widget needs to collect payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderOrder {
    pub key_id: String,
    pub order_id: String,
    pub amount: Money,
    pub currency: String,
}
