//! Order inspection commands.
//!
//! # Usage
//!
//! ```bash
//! tl-cli orders list --limit 20
//! tl-cli orders show <ID>
//! ```

use tracing::info;

use threadline_core::OrderId;

use super::{CliError, admin, connect};

/// Print the most recent orders.
///
/// # Errors
///
/// Returns `CliError` if the database is unreachable.
pub async fn list(limit: i64) -> Result<(), CliError> {
    let commerce = connect().await?;
    let orders = commerce.list_orders(&admin(), limit).await?;

    info!("{} orders", orders.len());
    for order in &orders {
        info!(
            "  {}  {:<15}  {:>10}  {}",
            order.id,
            order.status,
            order.total,
            order.created_at.to_rfc3339()
        );
    }
    Ok(())
}

/// Print one order with its lines and payment.
///
/// # Errors
///
/// Returns `CliError` if the order does not exist.
pub async fn show(id: OrderId) -> Result<(), CliError> {
    let commerce = connect().await?;
    let order = commerce.get_order(&admin(), id).await?;

    info!("Order {} ({})", order.id, order.status);
    info!("  Placed: {}", order.created_at.to_rfc3339());
    info!("  Customer: {} <{}>", order.customer.name, order.customer.phone);
    for line in &order.lines {
        info!(
            "  {} x{}  {} / {}  @ {} = {}",
            line.sku,
            line.quantity,
            line.product_name,
            line.variant_title,
            line.unit_price,
            line.line_total
        );
    }
    info!(
        "  Subtotal {}  Shipping {}  Tax {}  Total {} {}",
        order.totals.subtotal,
        order.totals.shipping,
        order.totals.tax,
        order.totals.total,
        order.currency
    );
    match &order.payment {
        Some(payment) => info!(
            "  Payment {} via {}: {} (provider order {}, payment {})",
            payment.id,
            payment.provider,
            payment.status,
            payment.provider_order_id.as_deref().unwrap_or("-"),
            payment.provider_payment_id.as_deref().unwrap_or("-")
        ),
        None => info!("  No payment recorded"),
    }
    Ok(())
}
