//! Inventory commands.
//!
//! # Usage
//!
//! ```bash
//! tl-cli inventory show --variant <ID>
//! tl-cli inventory adjust --variant <ID> --delta -3
//! ```

use tracing::info;

use threadline_core::VariantId;

use super::{CliError, admin, connect};

/// Print a variant's counters.
///
/// # Errors
///
/// Returns `CliError` if the variant has no inventory row.
pub async fn show(variant: VariantId) -> Result<(), CliError> {
    let commerce = connect().await?;
    let level = commerce.stock_level(variant).await?;

    info!(
        variant = %variant,
        on_hand = level.on_hand,
        reserved = level.reserved,
        available = level.available(),
        "Stock level"
    );
    Ok(())
}

/// Change a variant's on-hand count.
///
/// # Errors
///
/// Returns `CliError` if the variant is unknown or the result would be
/// negative or below the reserved count.
pub async fn adjust(variant: VariantId, delta: i32) -> Result<(), CliError> {
    let commerce = connect().await?;
    let level = commerce.adjust_inventory(&admin(), variant, delta).await?;

    info!(
        variant = %variant,
        on_hand = level.on_hand,
        reserved = level.reserved,
        "Inventory updated"
    );
    Ok(())
}
