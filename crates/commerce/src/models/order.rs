//! Order domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use threadline_core::{Money, OrderId, OrderStatus, OrderTotals, VariantId};

use super::payment::PaymentSummary;

/// Customer contact and shipping snapshot taken at checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Free-form address document, stored and returned unmodified.
    #[serde(default)]
    pub shipping_address: serde_json::Value,
}

/// Everything needed to insert an order row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub currency: String,
    pub totals: OrderTotals,
    pub customer: Customer,
}

/// An immutable order line snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub variant_id: VariantId,
    pub sku: String,
    pub product_name: String,
    pub variant_title: String,
    pub unit_price: Money,
    pub quantity: i32,
    pub line_total: Money,
}

/// Order list entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub id: OrderId,
    pub status: OrderStatus,
    pub total: Money,
    pub created_at: DateTime<Utc>,
}

/// Full order detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub status: OrderStatus,
    pub currency: String,
    pub totals: OrderTotals,
    pub customer: Customer,
    pub lines: Vec<OrderLine>,
    /// `None` only if the payment row is missing.
    pub payment: Option<PaymentSummary>,
    pub created_at: DateTime<Utc>,
}
