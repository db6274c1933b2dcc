//! Inventory ledger primitives.
//!
//! Each primitive locks the variant's inventory row through the enclosing
//! transaction, applies [`StockLevel`] arithmetic, and stages the result. The
//! lock is held until that transaction commits or is dropped.

use threadline_core::{StockEffect, StockLevel, VariantId};

use crate::db::CommerceTx;
use crate::error::{CommerceError, Result};

/// Lock inventory rows in ascending variant order.
///
/// Units that touch several variants call this first so that two units never
/// wait on each other's rows in opposite orders.
///
/// # Errors
///
/// Returns `CommerceError` if a lock cannot be taken.
pub async fn lock_in_order<T, I>(tx: &mut T, variants: I) -> Result<()>
where
    T: CommerceTx,
    I: IntoIterator<Item = VariantId>,
{
    let mut variants: Vec<_> = variants.into_iter().collect();
    variants.sort_unstable();
    variants.dedup();
    for variant_id in variants {
        tx.lock_stock(variant_id).await?;
    }
    Ok(())
}

/// Hold `quantity` units of a variant.
///
/// A variant without an inventory row has nothing available.
///
/// # Errors
///
/// Returns `CommerceError::InsufficientStock` if fewer than `quantity` units
/// are available.
pub async fn reserve<T: CommerceTx>(
    tx: &mut T,
    variant_id: VariantId,
    quantity: i32,
) -> Result<StockLevel> {
    let level = tx.lock_stock(variant_id).await?.unwrap_or_default();
    let next = level
        .reserve(quantity)
        .map_err(|e| CommerceError::from_stock(variant_id, e))?;
    tx.put_stock(variant_id, next).await?;
    Ok(next)
}

/// Return `quantity` reserved units to the available pool.
///
/// # Errors
///
/// Returns `CommerceError::NotFound` if the variant has no inventory row.
pub async fn release<T: CommerceTx>(
    tx: &mut T,
    variant_id: VariantId,
    quantity: i32,
) -> Result<StockLevel> {
    settle(tx, StockEffect::Release, variant_id, quantity).await
}

/// Permanently remove `quantity` sold units and their reservation.
///
/// # Errors
///
/// Returns `CommerceError::NotFound` if the variant has no inventory row.
pub async fn consume<T: CommerceTx>(
    tx: &mut T,
    variant_id: VariantId,
    quantity: i32,
) -> Result<StockLevel> {
    settle(tx, StockEffect::Consume, variant_id, quantity).await
}

/// Apply a settlement effect to one variant.
///
/// # Errors
///
/// Returns `CommerceError::NotFound` if the variant has no inventory row.
pub async fn settle<T: CommerceTx>(
    tx: &mut T,
    effect: StockEffect,
    variant_id: VariantId,
    quantity: i32,
) -> Result<StockLevel> {
    let level = locked_level(tx, variant_id).await?;
    let next = effect.apply(level, quantity);
    tx.put_stock(variant_id, next).await?;
    Ok(next)
}

/// Change `on_hand` by `delta`.
///
/// # Errors
///
/// Returns `CommerceError::NotFound` if the variant has no inventory row and
/// `CommerceError::NegativeStock` if the result would be negative or below
/// the reserved count.
pub async fn adjust_on_hand<T: CommerceTx>(
    tx: &mut T,
    variant_id: VariantId,
    delta: i32,
) -> Result<StockLevel> {
    let level = locked_level(tx, variant_id).await?;
    let next = level
        .adjust_on_hand(delta)
        .map_err(|e| CommerceError::from_stock(variant_id, e))?;
    tx.put_stock(variant_id, next).await?;
    Ok(next)
}

async fn locked_level<T: CommerceTx>(tx: &mut T, variant_id: VariantId) -> Result<StockLevel> {
    tx.lock_stock(variant_id)
        .await?
        .ok_or_else(|| CommerceError::NotFound(format!("inventory for variant {variant_id}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use threadline_core::Money;

    use super::*;
    use crate::db::{CommerceStore, MemoryStore};
    use crate::models::{NewProduct, NewVariant};

    async fn store_with(on_hand: i32) -> (MemoryStore, VariantId) {
        let store = MemoryStore::new();
        let product = store
            .create_product(&NewProduct {
                slug: "kurta".to_owned(),
                name: "Kurta".to_owned(),
                description: String::new(),
                variants: vec![NewVariant {
                    sku: "KU-L".to_owned(),
                    title: "L".to_owned(),
                    price: Money::from_minor(2500),
                    on_hand,
                }],
            })
            .await
            .unwrap();
        (store, product.variants[0].id)
    }

    #[tokio::test]
    async fn test_reserve_then_consume() {
        let (store, variant) = store_with(4).await;
        let mut tx = store.begin().await.unwrap();

        assert_eq!(
            reserve(&mut tx, variant, 3).await.unwrap(),
            StockLevel::new(4, 3)
        );
        assert_eq!(
            consume(&mut tx, variant, 3).await.unwrap(),
            StockLevel::new(1, 0)
        );
        tx.commit().await.unwrap();

        assert_eq!(
            store.stock_level(variant).await.unwrap(),
            Some(StockLevel::new(1, 0))
        );
    }

    #[tokio::test]
    async fn test_reserve_unknown_variant_is_insufficient() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let err = reserve(&mut tx, VariantId::generate(), 1).await.unwrap_err();
        assert!(matches!(
            err,
            CommerceError::InsufficientStock { available: 0, .. }
        ));
    }

    #[tokio::test]
    async fn test_release_unknown_variant_is_not_found() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let err = release(&mut tx, VariantId::generate(), 1).await.unwrap_err();
        assert!(matches!(err, CommerceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_adjust_below_zero() {
        let (store, variant) = store_with(2).await;
        let mut tx = store.begin().await.unwrap();
        let err = adjust_on_hand(&mut tx, variant, -5).await.unwrap_err();
        assert!(matches!(err, CommerceError::NegativeStock { delta: -5, .. }));
    }
}
