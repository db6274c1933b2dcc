//! Checkout: cart to order, reservations, and payment in one unit.

use tracing::{info, instrument, warn};

use threadline_core::{
    CartId, CartStatus, OrderTotals, PAYMENT_PROVIDER, PaymentId, SETTLEMENT_CURRENCY,
};

use super::{Commerce, ledger};
use crate::config::CheckoutPricing;
use crate::db::{CommerceStore, CommerceTx};
use crate::error::{CommerceError, Result};
use crate::models::{CheckoutResult, Customer, NewOrder, OrderLine};

/// Largest accepted tax rate (100%).
const MAX_TAX_RATE_BPS: u32 = 10_000;

impl<S: CommerceStore> Commerce<S> {
    /// Place an order for everything in a cart.
    ///
    /// Creates the order with line snapshots, reserves stock for every line,
    /// creates the payment, and closes the cart. Either all of it commits or
    /// none of it does.
    ///
    /// # Errors
    ///
    /// - `CommerceError::NotFound` - cart does not exist
    /// - `CommerceError::CartClosed` - cart was already checked out
    /// - `CommerceError::EmptyCart` - cart has no lines
    /// - `CommerceError::InsufficientStock` - a line cannot be reserved
    /// - `CommerceError::InvalidInput` - missing customer details or bad pricing
    #[instrument(skip(self, customer), fields(cart_id = %cart_id))]
    pub async fn checkout(
        &self,
        cart_id: CartId,
        customer: Customer,
        pricing: CheckoutPricing,
    ) -> Result<CheckoutResult> {
        validate_customer(&customer)?;
        validate_pricing(pricing)?;

        let mut tx = self.store.begin().await?;

        match tx.lock_cart(cart_id).await? {
            None => return Err(CommerceError::NotFound(format!("cart {cart_id}"))),
            Some(CartStatus::CheckedOut) => {
                warn!("Checkout rejected: cart already checked out");
                return Err(CommerceError::CartClosed(cart_id));
            }
            Some(CartStatus::Open) => {}
        }

        let lines = tx.cart_lines(cart_id).await?;
        if lines.is_empty() {
            warn!("Checkout rejected: cart is empty");
            return Err(CommerceError::EmptyCart);
        }

        let totals = OrderTotals::compute(
            lines.iter().map(|l| (l.unit_price, l.quantity)),
            pricing.shipping_flat,
            pricing.tax_rate,
        )?;

        ledger::lock_in_order(&mut tx, lines.iter().map(|l| l.variant_id)).await?;

        let order_id = tx
            .insert_order(&NewOrder {
                currency: SETTLEMENT_CURRENCY.to_string(),
                totals,
                customer,
            })
            .await?;

        for line in &lines {
            let snapshot = OrderLine {
                variant_id: line.variant_id,
                sku: line.sku.clone(),
                product_name: line.product_name.clone(),
                variant_title: line.variant_title.clone(),
                unit_price: line.unit_price,
                quantity: line.quantity,
                line_total: line.line_total()?,
            };
            tx.insert_order_line(order_id, &snapshot).await?;

            if let Err(err) = ledger::reserve(&mut tx, line.variant_id, line.quantity).await {
                warn!(variant_id = %line.variant_id, error = %err, "Checkout rejected");
                return Err(err);
            }
        }

        let payment_id: PaymentId = tx
            .insert_payment(order_id, PAYMENT_PROVIDER, totals.total)
            .await?;
        tx.close_cart(cart_id).await?;
        tx.commit().await?;

        info!(
            order_id = %order_id,
            payment_id = %payment_id,
            total = %totals.total,
            lines = lines.len(),
            "Order placed"
        );

        Ok(CheckoutResult {
            order_id,
            payment_id,
            amount: totals.total,
            currency: SETTLEMENT_CURRENCY.to_string(),
            provider: PAYMENT_PROVIDER.to_string(),
        })
    }
}

fn validate_customer(customer: &Customer) -> Result<()> {
    if customer.name.trim().is_empty() {
        return Err(CommerceError::InvalidInput(
            "customer name is required".to_string(),
        ));
    }
    if customer.phone.trim().is_empty() {
        return Err(CommerceError::InvalidInput(
            "customer phone is required".to_string(),
        ));
    }
    Ok(())
}

fn validate_pricing(pricing: CheckoutPricing) -> Result<()> {
    if pricing.shipping_flat.minor() < 0 {
        return Err(CommerceError::InvalidInput(
            "shipping must not be negative".to_string(),
        ));
    }
    if pricing.tax_rate.bps() > MAX_TAX_RATE_BPS {
        return Err(CommerceError::InvalidInput(format!(
            "tax rate must be at most {MAX_TAX_RATE_BPS} bps"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use threadline_core::{Money, OrderStatus, PaymentStatus, StockLevel, TaxRate, VariantId};

    use super::*;
    use crate::db::MemoryStore;
    use crate::models::{NewProduct, NewVariant};

    fn customer() -> Customer {
        Customer {
            name: "Asha Rao".to_owned(),
            phone: "+91 98450 00000".to_owned(),
            email: None,
            shipping_address: serde_json::json!({ "city": "Pune", "pin": "411001" }),
        }
    }

    async fn commerce_with(variants: &[(&str, i64, i32)]) -> (Commerce<MemoryStore>, Vec<VariantId>) {
        let commerce = Commerce::new(MemoryStore::new());
        let product = commerce
            .create_product(&NewProduct {
                slug: "socks".to_owned(),
                name: "Socks".to_owned(),
                description: String::new(),
                variants: variants
                    .iter()
                    .map(|&(sku, price, on_hand)| NewVariant {
                        sku: sku.to_owned(),
                        title: sku.to_owned(),
                        price: Money::from_minor(price),
                        on_hand,
                    })
                    .collect(),
            })
            .await
            .unwrap();
        let ids = product.variants.iter().map(|v| v.id).collect();
        (commerce, ids)
    }

    #[tokio::test]
    async fn test_checkout_snapshots_lines_and_reserves() {
        let (commerce, ids) = commerce_with(&[("S-1", 1000, 3)]).await;
        let cart = commerce.create_cart().await.unwrap();
        commerce.upsert_cart_item(cart, ids[0], 1).await.unwrap();

        let pricing = CheckoutPricing {
            shipping_flat: Money::from_minor(100),
            tax_rate: TaxRate::from_bps(1800),
        };
        let result = commerce.checkout(cart, customer(), pricing).await.unwrap();
        assert_eq!(result.amount, Money::from_minor(1298));
        assert_eq!(result.currency, "INR");
        assert_eq!(result.provider, "razorpay");

        let order = commerce.store().get_order(result.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::PendingPayment);
        assert_eq!(order.totals.tax, Money::from_minor(198));
        assert_eq!(order.lines.len(), 1);
        assert_eq!(order.lines[0].line_total, Money::from_minor(1000));
        assert_eq!(order.customer, customer());

        let payment = order.payment.unwrap();
        assert_eq!(payment.id, result.payment_id);
        assert_eq!(payment.status, PaymentStatus::Created);
        assert_eq!(payment.amount, Money::from_minor(1298));
        assert_eq!(payment.provider_order_id, None);

        assert_eq!(
            commerce.store().stock_level(ids[0]).await.unwrap(),
            Some(StockLevel::new(3, 1))
        );
        assert_eq!(
            commerce.get_cart(cart).await.unwrap().status,
            CartStatus::CheckedOut
        );
    }

    #[tokio::test]
    async fn test_failed_line_rolls_back_earlier_reservations() {
        let (commerce, ids) = commerce_with(&[("A", 100, 5), ("B", 100, 1)]).await;
        let cart = commerce.create_cart().await.unwrap();
        commerce.upsert_cart_item(cart, ids[0], 2).await.unwrap();
        commerce.upsert_cart_item(cart, ids[1], 2).await.unwrap();

        let err = commerce
            .checkout(cart, customer(), CheckoutPricing::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CommerceError::InsufficientStock { variant_id, requested: 2, available: 1 } if variant_id == ids[1]
        ));

        assert_eq!(
            commerce.store().stock_level(ids[0]).await.unwrap(),
            Some(StockLevel::new(5, 0))
        );
        assert!(commerce.store().list_orders(10).await.unwrap().is_empty());
        assert_eq!(
            commerce.get_cart(cart).await.unwrap().status,
            CartStatus::Open
        );
    }

    #[tokio::test]
    async fn test_checkout_twice_is_rejected() {
        let (commerce, ids) = commerce_with(&[("A", 100, 5)]).await;
        let cart = commerce.create_cart().await.unwrap();
        commerce.upsert_cart_item(cart, ids[0], 1).await.unwrap();
        commerce
            .checkout(cart, customer(), CheckoutPricing::default())
            .await
            .unwrap();

        let err = commerce
            .checkout(cart, customer(), CheckoutPricing::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::CartClosed(id) if id == cart));

        let err = commerce.upsert_cart_item(cart, ids[0], 2).await.unwrap_err();
        assert!(matches!(err, CommerceError::CartClosed(_)));
    }

    #[tokio::test]
    async fn test_missing_customer_details() {
        let (commerce, ids) = commerce_with(&[("A", 100, 5)]).await;
        let cart = commerce.create_cart().await.unwrap();
        commerce.upsert_cart_item(cart, ids[0], 1).await.unwrap();

        let mut anonymous = customer();
        anonymous.phone = "  ".to_owned();
        let err = commerce
            .checkout(cart, anonymous, CheckoutPricing::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_tax_rate_above_whole_rejected() {
        let (commerce, ids) = commerce_with(&[("A", 100, 5)]).await;
        let cart = commerce.create_cart().await.unwrap();
        commerce.upsert_cart_item(cart, ids[0], 1).await.unwrap();

        let pricing = CheckoutPricing {
            shipping_flat: Money::ZERO,
            tax_rate: TaxRate::from_bps(10_001),
        };
        let err = commerce.checkout(cart, customer(), pricing).await.unwrap_err();
        assert!(matches!(err, CommerceError::InvalidInput(_)));
    }
}
