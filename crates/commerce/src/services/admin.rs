//! Admin operations: catalog maintenance, inventory adjustment, and order reads.
//!
//! Every method takes an [`AdminContext`]. Authentication happens outside
//! this crate; holding a context is the proof that it succeeded.

use tracing::{info, instrument, warn};

use threadline_core::{OrderId, ProductId, StockLevel, VariantId};

use super::cart::validate_variant;
use super::{Commerce, ledger};
use crate::db::{CommerceStore, CommerceTx};
use crate::error::{CommerceError, Result};
use crate::models::{NewVariant, Order, OrderSummary, ProductUpdate, Variant, VariantUpdate};

/// Page size used when the requested limit is out of range.
pub const DEFAULT_ORDER_LIMIT: i64 = 50;

/// Largest accepted page size.
pub const MAX_ORDER_LIMIT: i64 = 200;

/// Proof of an authenticated administrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminContext {
    actor: String,
}

impl AdminContext {
    /// Vouch for `actor` (an email, username, or tool name).
    #[must_use]
    pub fn new(actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
        }
    }

    /// Who is acting.
    #[must_use]
    pub fn actor(&self) -> &str {
        &self.actor
    }
}

impl<S: CommerceStore> Commerce<S> {
    /// Replace a product's slug, name and description.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` for an unknown product and
    /// `CommerceError::InvalidInput` for a blank slug or name or a slug
    /// another product uses.
    #[instrument(skip(self, admin, update), fields(actor = %admin.actor(), slug = %update.slug))]
    pub async fn update_product(
        &self,
        admin: &AdminContext,
        product_id: ProductId,
        update: &ProductUpdate,
    ) -> Result<()> {
        if update.slug.trim().is_empty() || update.name.trim().is_empty() {
            return Err(CommerceError::InvalidInput(
                "product slug and name are required".to_string(),
            ));
        }
        self.store.update_product(product_id, update).await?;
        info!("Product updated");
        Ok(())
    }

    /// Add a variant, with its inventory row, to an existing product.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` for an unknown product and
    /// `CommerceError::InvalidInput` for a blank or taken SKU, a negative
    /// price, or negative stock.
    #[instrument(skip(self, admin, variant), fields(actor = %admin.actor(), sku = %variant.sku))]
    pub async fn create_variant(
        &self,
        admin: &AdminContext,
        product_id: ProductId,
        variant: &NewVariant,
    ) -> Result<Variant> {
        validate_variant(variant)?;
        let created = self.store.create_variant(product_id, variant).await?;
        info!(variant_id = %created.id, "Variant created");
        Ok(created)
    }

    /// Change a variant's title and price.
    ///
    /// Carts pick up the new values on their next read. Orders already placed
    /// keep the snapshot taken at checkout.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` for an unknown variant and
    /// `CommerceError::InvalidInput` for a blank title or negative price.
    #[instrument(skip(self, admin, update), fields(actor = %admin.actor(), price = %update.price))]
    pub async fn update_variant(
        &self,
        admin: &AdminContext,
        variant_id: VariantId,
        update: &VariantUpdate,
    ) -> Result<()> {
        if update.title.trim().is_empty() {
            return Err(CommerceError::InvalidInput("variant title is required".to_string()));
        }
        if update.price.minor() < 0 {
            return Err(CommerceError::InvalidInput(format!(
                "variant {variant_id} would have a negative price"
            )));
        }
        self.store.update_variant(variant_id, update).await?;
        info!("Variant updated");
        Ok(())
    }

    /// Correct a variant's on-hand count by `delta`.
    ///
    /// Returns the new `(on_hand, reserved)` pair.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if the variant has no inventory row
    /// and `CommerceError::NegativeStock` if the result would be negative or
    /// below the reserved count.
    #[instrument(skip(self, admin), fields(actor = %admin.actor()))]
    pub async fn adjust_inventory(
        &self,
        admin: &AdminContext,
        variant_id: VariantId,
        delta: i32,
    ) -> Result<StockLevel> {
        let mut tx = self.store.begin().await?;
        let level = match ledger::adjust_on_hand(&mut tx, variant_id, delta).await {
            Ok(level) => level,
            Err(err) => {
                warn!(error = %err, "Inventory adjustment rejected");
                return Err(err);
            }
        };
        tx.commit().await?;

        info!(
            on_hand = level.on_hand,
            reserved = level.reserved,
            "Inventory adjusted"
        );
        Ok(level)
    }

    /// Newest orders first.
    ///
    /// A `limit` outside `1..=200` falls back to 50.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError` if the store fails.
    pub async fn list_orders(&self, _admin: &AdminContext, limit: i64) -> Result<Vec<OrderSummary>> {
        let limit = if (1..=MAX_ORDER_LIMIT).contains(&limit) {
            limit
        } else {
            DEFAULT_ORDER_LIMIT
        };
        Ok(self.store.list_orders(limit).await?)
    }

    /// Full order detail with line snapshots and payment.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if the order does not exist.
    pub async fn get_order(&self, _admin: &AdminContext, order_id: OrderId) -> Result<Order> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or_else(|| CommerceError::NotFound(format!("order {order_id}")))
    }

    /// Current counters for a variant, read without locking.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if the variant has no inventory row.
    pub async fn stock_level(&self, variant_id: VariantId) -> Result<StockLevel> {
        self.store
            .stock_level(variant_id)
            .await?
            .ok_or_else(|| CommerceError::NotFound(format!("inventory for variant {variant_id}")))
    }
}
