//! The checkout and settlement flows against `PostgreSQL`.
//!
//! These tests require a migrated database:
//!
//! ```bash
//! DATABASE_URL=postgres://... tl-cli migrate
//! DATABASE_URL=postgres://... cargo test -p threadline-integration-tests -- --ignored
//! ```
//!
//! Every test creates its own products with unique SKUs, so runs can share a
//! database.

#![allow(clippy::unwrap_used)]

use futures::future::join_all;
use secrecy::SecretString;

use threadline_commerce::db::{self, PgStore};
use threadline_commerce::models::VariantUpdate;
use threadline_commerce::{AdminContext, Commerce, CommerceError, ReconcileOutcome};
use threadline_core::{Money, OrderId, OrderStatus, PaymentStatus, StockLevel};
use threadline_integration_tests::{add_variant, cart_with, customer, place_order, pricing};

async fn pg_commerce() -> Commerce<PgStore> {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = db::create_pool(&SecretString::from(url))
        .await
        .expect("Failed to connect to database");
    db::migrate(&pool).await.expect("Failed to run migrations");
    Commerce::new(PgStore::new(pool))
}

fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", OrderId::generate())
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database"]
async fn test_pg_checkout_then_capture() {
    let commerce = pg_commerce().await;
    let variant = add_variant(&commerce, &unique("PG-TEE"), 500, 2).await;
    let provider_order_id = unique("order");

    let placed = place_order(&commerce, &[(variant, 2)], &provider_order_id).await;
    assert_eq!(placed.amount.minor(), 1000);
    assert_eq!(
        commerce.stock_level(variant).await.unwrap(),
        StockLevel::new(2, 2)
    );

    let outcome = commerce
        .mark_captured(&provider_order_id, "pay_PG")
        .await
        .unwrap();
    assert_eq!(outcome, ReconcileOutcome::Applied(PaymentStatus::Captured));
    let again = commerce
        .mark_captured(&provider_order_id, "pay_PG")
        .await
        .unwrap();
    assert_eq!(
        again,
        ReconcileOutcome::AlreadySettled(PaymentStatus::Captured)
    );

    let order = commerce
        .get_order(&AdminContext::new("ops"), placed.order_id)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(order.lines.len(), 1);
    assert_eq!(
        commerce.stock_level(variant).await.unwrap(),
        StockLevel::new(0, 0)
    );
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database"]
async fn test_pg_concurrent_checkouts_never_oversell() {
    let commerce = pg_commerce().await;
    let variant = add_variant(&commerce, &unique("PG-LAMP"), 2500, 5).await;

    let mut carts = Vec::new();
    for _ in 0..4 {
        carts.push(cart_with(&commerce, &[(variant, 3)]).await);
    }

    let results = join_all(
        carts
            .iter()
            .map(|&cart_id| commerce.checkout(cart_id, customer(), pricing(0, 0))),
    )
    .await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        commerce.stock_level(variant).await.unwrap(),
        StockLevel::new(5, 3)
    );
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database"]
async fn test_pg_failed_payment_and_adjustment() {
    let commerce = pg_commerce().await;
    let admin = AdminContext::new("ops");
    let variant = add_variant(&commerce, &unique("PG-MUG"), 300, 2).await;
    let provider_order_id = unique("order");
    place_order(&commerce, &[(variant, 2)], &provider_order_id).await;

    commerce
        .mark_failed(&provider_order_id, "pay_PG_FAIL")
        .await
        .unwrap();
    assert_eq!(
        commerce.stock_level(variant).await.unwrap(),
        StockLevel::new(2, 0)
    );

    let err = commerce
        .adjust_inventory(&admin, variant, -5)
        .await
        .unwrap_err();
    assert!(matches!(err, CommerceError::NegativeStock { .. }));
    assert_eq!(
        commerce.stock_level(variant).await.unwrap(),
        StockLevel::new(2, 0)
    );
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database"]
async fn test_pg_price_change_keeps_order_snapshot() {
    let commerce = pg_commerce().await;
    let admin = AdminContext::new("ops");
    let variant = add_variant(&commerce, &unique("PG-CAP"), 800, 3).await;
    let placed = place_order(&commerce, &[(variant, 1)], &unique("order")).await;

    commerce
        .update_variant(
            &admin,
            variant,
            &VariantUpdate {
                title: "Washed".to_string(),
                price: Money::from_minor(950),
            },
        )
        .await
        .unwrap();

    let order = commerce.get_order(&admin, placed.order_id).await.unwrap();
    assert_eq!(order.lines[0].unit_price, Money::from_minor(800));
    assert_eq!(order.lines[0].variant_title, "Default");

    let cart_id = cart_with(&commerce, &[(variant, 1)]).await;
    let cart = commerce.get_cart(cart_id).await.unwrap();
    assert_eq!(cart.items[0].unit_price, Money::from_minor(950));
}
