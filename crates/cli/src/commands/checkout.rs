//! Place an order from the command line.
//!
//! Shipping and tax come from `SHIPPING_FLAT_INR` and `TAX_RATE_BPS`. When
//! Razorpay credentials are configured the provider order is opened too.
//!
//! # Usage
//!
//! ```bash
//! tl-cli checkout --item <VARIANT_ID>:2 --item <VARIANT_ID>:1 --customer customer.yaml
//! ```
//!
//! # Customer file
//!
//! ```yaml
//! name: Asha Rao
//! phone: "+919800000001"
//! email: asha@example.com
//! shipping_address:
//!   line1: 12 MG Road
//!   city: Bengaluru
//! ```

use std::path::Path;

use tracing::{info, warn};

use threadline_commerce::CommerceError;
use threadline_commerce::models::Customer;
use threadline_commerce::razorpay::RazorpayClient;
use threadline_core::VariantId;

use super::{CliError, connect_with_config};

/// Parse a `VARIANT_ID:QUANTITY` argument.
///
/// # Errors
///
/// Returns a message naming the malformed part.
pub fn parse_item(value: &str) -> Result<(VariantId, i32), String> {
    let (variant, quantity) = value
        .rsplit_once(':')
        .ok_or_else(|| format!("expected VARIANT_ID:QUANTITY, got '{value}'"))?;
    let variant = variant
        .trim()
        .parse::<VariantId>()
        .map_err(|e| format!("invalid variant id '{variant}': {e}"))?;
    let quantity = quantity
        .trim()
        .parse::<i32>()
        .map_err(|e| format!("invalid quantity '{quantity}': {e}"))?;
    Ok((variant, quantity))
}

/// Parse a customer file's contents.
///
/// # Errors
///
/// Returns `CliError::Input` if the YAML is malformed.
pub fn parse_customer(content: &str) -> Result<Customer, CliError> {
    serde_yaml::from_str(content).map_err(|e| CliError::Input(e.to_string()))
}

/// Build a cart from `items`, check it out, and open the provider order.
///
/// # Errors
///
/// Returns `CliError` if the customer file is unreadable, a line is
/// rejected, stock is short, or the provider call fails.
pub async fn run(items: &[(VariantId, i32)], customer_file: &str) -> Result<(), CliError> {
    let content = tokio::fs::read_to_string(Path::new(customer_file))
        .await
        .map_err(|e| CliError::Input(format!("{customer_file}: {e}")))?;
    let customer = parse_customer(&content)?;

    let (config, commerce) = connect_with_config().await?;

    let cart_id = commerce.create_cart().await?;
    for &(variant_id, quantity) in items {
        commerce
            .upsert_cart_item(cart_id, variant_id, quantity)
            .await?;
    }

    let placed = commerce
        .checkout(cart_id, customer, config.pricing)
        .await?;
    info!(
        order_id = %placed.order_id,
        payment_id = %placed.payment_id,
        amount = %placed.amount,
        currency = %placed.currency,
        "Order placed"
    );

    let Some(razorpay) = &config.razorpay else {
        warn!("Razorpay is not configured; provider order not opened");
        return Ok(());
    };
    let gateway = RazorpayClient::new(razorpay).map_err(CommerceError::from)?;
    let opened = commerce.open_provider_order(&gateway, &placed).await?;
    info!(
        provider_order_id = %opened.order_id,
        key_id = %opened.key_id,
        "Provider order opened"
    );
    Ok(())
}
