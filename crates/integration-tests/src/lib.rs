//! Integration tests for Threadline.
//!
//! # Running Tests
//!
//! ```bash
//! # In-memory store tests
//! cargo test -p threadline-integration-tests
//!
//! # Postgres store tests (needs a migrated database)
//! DATABASE_URL=postgres://... cargo test -p threadline-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `end_to_end` - checkout through settlement
//! - `concurrency` - competing checkouts and duplicate events
//! - `idempotence` - replayed and out-of-order provider events
//! - `admin` - inventory adjustment and order listing
//! - `webhook` - signed provider channels
//! - `postgres_store` - the same flows against `PostgreSQL`

#![allow(clippy::missing_panics_doc)]

use threadline_commerce::models::{CheckoutResult, Customer, NewProduct, NewVariant};
use threadline_commerce::{CheckoutPricing, Commerce, CommerceStore, MemoryStore};
use threadline_core::{CartId, Money, TaxRate, VariantId};

/// Provider order id used when a test opens a payment by hand.
pub const PROVIDER_ORDER_ID: &str = "order_TEST0001";

/// Provider payment id used when a test settles a payment.
pub const PROVIDER_PAYMENT_ID: &str = "pay_TEST0001";

/// A fresh in-memory service.
#[must_use]
pub fn memory_commerce() -> Commerce<MemoryStore> {
    Commerce::new(MemoryStore::new())
}

/// Create a one-variant product and return the variant id.
pub async fn add_variant<S: CommerceStore>(
    commerce: &Commerce<S>,
    sku: &str,
    price: i64,
    on_hand: i32,
) -> VariantId {
    let product = commerce
        .create_product(&NewProduct {
            slug: sku.to_lowercase(),
            name: format!("Product {sku}"),
            description: String::new(),
            variants: vec![NewVariant {
                sku: sku.to_string(),
                title: "Default".to_string(),
                price: Money::from_minor(price),
                on_hand,
            }],
        })
        .await
        .expect("create product");
    product.variants.first().expect("created variant").id
}

/// Create a cart holding `lines`.
pub async fn cart_with<S: CommerceStore>(
    commerce: &Commerce<S>,
    lines: &[(VariantId, i32)],
) -> CartId {
    let cart_id = commerce.create_cart().await.expect("create cart");
    for &(variant_id, quantity) in lines {
        commerce
            .upsert_cart_item(cart_id, variant_id, quantity)
            .await
            .expect("add cart item");
    }
    cart_id
}

/// A customer with every required field set.
#[must_use]
pub fn customer() -> Customer {
    Customer {
        name: "Asha Rao".to_string(),
        phone: "+919800000001".to_string(),
        email: Some("asha@example.com".to_string()),
        shipping_address: serde_json::json!({
            "line1": "12 MG Road",
            "city": "Bengaluru",
            "pincode": "560001",
        }),
    }
}

/// Pricing with the given flat shipping (minor units) and tax rate (bps).
#[must_use]
pub const fn pricing(shipping: i64, tax_bps: u32) -> CheckoutPricing {
    CheckoutPricing {
        shipping_flat: Money::from_minor(shipping),
        tax_rate: TaxRate::from_bps(tax_bps),
    }
}

/// Check out `lines` with no shipping or tax and attach `provider_order_id`.
pub async fn place_order<S: CommerceStore>(
    commerce: &Commerce<S>,
    lines: &[(VariantId, i32)],
    provider_order_id: &str,
) -> CheckoutResult {
    let cart_id = cart_with(commerce, lines).await;
    let placed = commerce
        .checkout(cart_id, customer(), pricing(0, 0))
        .await
        .expect("checkout");
    commerce
        .record_provider_order_id(placed.payment_id, provider_order_id)
        .await
        .expect("record provider order id");
    placed
}
