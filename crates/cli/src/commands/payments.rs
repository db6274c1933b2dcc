//! Provider payment commands.
//!
//! # Usage
//!
//! ```bash
//! # Open the Razorpay order for a placed order that has none yet
//! tl-cli payments open <ORDER_ID>
//!
//! # Apply a saved webhook delivery (body file plus X-Razorpay-Signature)
//! tl-cli payments webhook --file event.json --signature <HEX>
//! ```

use tracing::info;

use threadline_commerce::models::CheckoutResult;
use threadline_commerce::CommerceError;
use threadline_commerce::razorpay::RazorpayClient;
use threadline_core::{OrderId, PaymentStatus};

use super::{CliError, admin, connect_with_config};

/// Open the provider order for a pending order.
///
/// # Errors
///
/// Returns `CliError` if Razorpay is not configured, the order has no
/// pending payment, or the provider call fails.
pub async fn open(order_id: OrderId) -> Result<(), CliError> {
    let (config, commerce) = connect_with_config().await?;
    let razorpay = config
        .razorpay
        .as_ref()
        .ok_or_else(|| CliError::Input("RAZORPAY_KEY_ID is not set".to_string()))?;

    let order = commerce.get_order(&admin(), order_id).await?;
    let payment = order
        .payment
        .ok_or_else(|| CliError::Input(format!("order {order_id} has no payment")))?;
    if payment.status != PaymentStatus::Created {
        return Err(CliError::Input(format!(
            "payment {} is already {}",
            payment.id, payment.status
        )));
    }
    if let Some(existing) = &payment.provider_order_id {
        return Err(CliError::Input(format!(
            "order {order_id} already has provider order {existing}"
        )));
    }

    let placed = CheckoutResult {
        order_id: order.id,
        payment_id: payment.id,
        amount: payment.amount,
        currency: order.currency,
        provider: payment.provider,
    };
    let gateway = RazorpayClient::new(razorpay).map_err(CommerceError::from)?;
    let opened = commerce.open_provider_order(&gateway, &placed).await?;

    info!(
        order_id = %order_id,
        provider_order_id = %opened.order_id,
        amount = %opened.amount,
        "Provider order opened"
    );
    Ok(())
}

/// Verify and apply a saved webhook body.
///
/// # Errors
///
/// Returns `CliError` if the webhook secret is not configured, the file is
/// unreadable, or the signature does not match.
pub async fn webhook(file_path: &str, signature: &str) -> Result<(), CliError> {
    let body = tokio::fs::read(file_path)
        .await
        .map_err(|e| CliError::Input(format!("{file_path}: {e}")))?;

    let (config, commerce) = connect_with_config().await?;
    let secret = config
        .webhook_secret
        .as_ref()
        .ok_or_else(|| CliError::Input("RAZORPAY_WEBHOOK_SECRET is not set".to_string()))?;

    let outcome = commerce.handle_webhook(&body, signature.trim(), secret).await?;
    info!(outcome = ?outcome, "Webhook applied");
    Ok(())
}
