//! Catalog seeding and cart mutation.

use tracing::{debug, info, instrument};

use threadline_core::{CartId, MAX_LINE_QUANTITY, VariantId};

use super::Commerce;
use crate::db::{CommerceStore, RepositoryError};
use crate::error::{CommerceError, Result};
use crate::models::{Cart, NewProduct, NewVariant, Product};

impl<S: CommerceStore> Commerce<S> {
    /// Create a product with its variants and their inventory rows.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::InvalidInput` for blank fields, negative prices
    /// or stock, and duplicate slugs or SKUs.
    #[instrument(skip(self, product), fields(slug = %product.slug))]
    pub async fn create_product(&self, product: &NewProduct) -> Result<Product> {
        validate_product(product)?;
        let created = self.store.create_product(product).await?;
        info!(
            product_id = %created.id,
            variants = created.variants.len(),
            "Product created"
        );
        Ok(created)
    }

    /// Create an empty open cart.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError` if the store fails.
    pub async fn create_cart(&self) -> Result<CartId> {
        let cart_id = self.store.create_cart().await?;
        debug!(cart_id = %cart_id, "Cart created");
        Ok(cart_id)
    }

    /// Set a line's quantity, adding the line if it is new.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::InvalidInput` for a quantity outside `1..=20`,
    /// `CommerceError::NotFound` for an unknown cart or variant, and
    /// `CommerceError::CartClosed` for a checked-out cart.
    #[instrument(skip(self))]
    pub async fn upsert_cart_item(
        &self,
        cart_id: CartId,
        variant_id: VariantId,
        quantity: i32,
    ) -> Result<()> {
        if !(1..=MAX_LINE_QUANTITY).contains(&quantity) {
            return Err(CommerceError::InvalidInput(format!(
                "quantity must be between 1 and {MAX_LINE_QUANTITY} (got {quantity})"
            )));
        }
        self.store
            .upsert_cart_item(cart_id, variant_id, quantity)
            .await
            .map_err(|e| cart_error(cart_id, e))
    }

    /// Remove a line from a cart.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` for an unknown cart and
    /// `CommerceError::CartClosed` for a checked-out cart.
    #[instrument(skip(self))]
    pub async fn delete_cart_item(&self, cart_id: CartId, variant_id: VariantId) -> Result<()> {
        self.store
            .delete_cart_item(cart_id, variant_id)
            .await
            .map_err(|e| cart_error(cart_id, e))
    }

    /// Load a cart with its lines at current prices.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if the cart does not exist.
    pub async fn get_cart(&self, cart_id: CartId) -> Result<Cart> {
        self.store
            .get_cart(cart_id)
            .await?
            .ok_or_else(|| CommerceError::NotFound(format!("cart {cart_id}")))
    }
}

fn cart_error(cart_id: CartId, err: RepositoryError) -> CommerceError {
    match err {
        RepositoryError::Conflict(_) => CommerceError::CartClosed(cart_id),
        other => other.into(),
    }
}

fn validate_product(product: &NewProduct) -> Result<()> {
    if product.slug.trim().is_empty() || product.name.trim().is_empty() {
        return Err(CommerceError::InvalidInput(
            "product slug and name are required".to_string(),
        ));
    }
    if product.variants.is_empty() {
        return Err(CommerceError::InvalidInput(format!(
            "product {} has no variants",
            product.slug
        )));
    }
    product.variants.iter().try_for_each(validate_variant)
}

pub(super) fn validate_variant(variant: &NewVariant) -> Result<()> {
    if variant.sku.trim().is_empty() {
        return Err(CommerceError::InvalidInput("variant sku is required".to_string()));
    }
    if variant.price.minor() < 0 {
        return Err(CommerceError::InvalidInput(format!(
            "variant {} has a negative price",
            variant.sku
        )));
    }
    if variant.on_hand < 0 {
        return Err(CommerceError::InvalidInput(format!(
            "variant {} has negative stock",
            variant.sku
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use threadline_core::{CartStatus, Money};

    use super::*;
    use crate::db::MemoryStore;

    fn shirt(on_hand: i32) -> NewProduct {
        NewProduct {
            slug: "oxford-shirt".to_owned(),
            name: "Oxford Shirt".to_owned(),
            description: "Cotton".to_owned(),
            variants: vec![NewVariant {
                sku: "OX-M".to_owned(),
                title: "M".to_owned(),
                price: Money::from_minor(1999),
                on_hand,
            }],
        }
    }

    #[tokio::test]
    async fn test_quantity_bounds() {
        let commerce = Commerce::new(MemoryStore::new());
        let variant = commerce.create_product(&shirt(5)).await.unwrap().variants[0].id;
        let cart = commerce.create_cart().await.unwrap();

        for bad in [0, -1, 21] {
            let err = commerce.upsert_cart_item(cart, variant, bad).await.unwrap_err();
            assert!(matches!(err, CommerceError::InvalidInput(_)), "{bad}");
        }
        commerce.upsert_cart_item(cart, variant, 20).await.unwrap();
        commerce.upsert_cart_item(cart, variant, 1).await.unwrap();
    }

    #[tokio::test]
    async fn test_cart_read_model() {
        let commerce = Commerce::new(MemoryStore::new());
        let variant = commerce.create_product(&shirt(5)).await.unwrap().variants[0].id;
        let cart_id = commerce.create_cart().await.unwrap();
        commerce.upsert_cart_item(cart_id, variant, 2).await.unwrap();

        let cart = commerce.get_cart(cart_id).await.unwrap();
        assert_eq!(cart.status, CartStatus::Open);
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].product_name, "Oxford Shirt");
        assert_eq!(cart.items[0].line_total().unwrap(), Money::from_minor(3998));
        assert_eq!(cart.subtotal().unwrap(), Money::from_minor(3998));

        commerce.delete_cart_item(cart_id, variant).await.unwrap();
        assert!(commerce.get_cart(cart_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_cart_and_variant() {
        let commerce = Commerce::new(MemoryStore::new());
        let variant = commerce.create_product(&shirt(5)).await.unwrap().variants[0].id;

        let err = commerce.get_cart(CartId::generate()).await.unwrap_err();
        assert!(matches!(err, CommerceError::NotFound(_)));

        let err = commerce
            .upsert_cart_item(CartId::generate(), variant, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::NotFound(_)));

        let cart = commerce.create_cart().await.unwrap();
        let err = commerce
            .upsert_cart_item(cart, VariantId::generate(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_invalid_products_rejected() {
        let commerce = Commerce::new(MemoryStore::new());

        let mut product = shirt(1);
        product.variants.clear();
        assert!(matches!(
            commerce.create_product(&product).await,
            Err(CommerceError::InvalidInput(_))
        ));

        let mut product = shirt(-1);
        product.slug = "negative".to_owned();
        assert!(matches!(
            commerce.create_product(&product).await,
            Err(CommerceError::InvalidInput(_))
        ));

        commerce.create_product(&shirt(1)).await.unwrap();
        assert!(matches!(
            commerce.create_product(&shirt(1)).await,
            Err(CommerceError::InvalidInput(_))
        ));
    }
}
