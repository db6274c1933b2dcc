//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! tl-cli migrate
//! ```
//!
//! Migrations live in `crates/commerce/migrations/` and are embedded into the
//! binary at build time.

use tracing::info;

use threadline_commerce::db;

use super::{CliError, connect};

/// Apply all pending migrations.
///
/// # Errors
///
/// Returns `CliError` if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CliError> {
    let commerce = connect().await?;

    info!("Running migrations...");
    db::migrate(commerce.store().pool()).await?;

    info!("Migrations complete!");
    Ok(())
}
