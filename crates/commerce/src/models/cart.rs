//! Cart domain types.

use serde::{Deserialize, Serialize};

use threadline_core::{CartId, CartStatus, Money, MoneyError, VariantId};

/// A cart line resolved against the catalog at read time.
///
/// `unit_price` is the variant's current price, not a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub variant_id: VariantId,
    pub sku: String,
    pub product_name: String,
    pub variant_title: String,
    pub unit_price: Money,
    pub quantity: i32,
}

impl CartLine {
    /// `unit_price * quantity`.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Overflow` if the product does not fit.
    pub fn line_total(&self) -> Result<Money, MoneyError> {
        self.unit_price.checked_mul(self.quantity)
    }
}

/// A shopping cart with its resolved lines in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub status: CartStatus,
    pub items: Vec<CartLine>,
}

impl Cart {
    /// Sum of line totals at current prices.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Overflow` if the sum does not fit.
    pub fn subtotal(&self) -> Result<Money, MoneyError> {
        self.items
            .iter()
            .try_fold(Money::ZERO, |acc, line| acc.checked_add(line.line_total()?))
    }

    /// Whether the cart has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
