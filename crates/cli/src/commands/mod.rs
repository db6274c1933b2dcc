//! CLI command implementations.
//!
//! # Environment Variables
//!
//! - `COMMERCE_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `SHIPPING_FLAT_INR`, `TAX_RATE_BPS` - checkout pricing
//! - `RAZORPAY_KEY_ID`, `RAZORPAY_KEY_SECRET` - provider orders
//! - `RAZORPAY_WEBHOOK_SECRET` - webhook replay

pub mod checkout;
pub mod inventory;
pub mod migrate;
pub mod orders;
pub mod payments;
pub mod seed;

use thiserror::Error;

use threadline_commerce::db::{self, PgStore};
use threadline_commerce::{AdminContext, Commerce, CommerceConfig, CommerceError, ConfigError};

/// Actor recorded on admin operations run from the CLI.
const CLI_ACTOR: &str = "tl-cli";

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// A migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A commerce operation failed.
    #[error("{0}")]
    Commerce(#[from] CommerceError),

    /// The seed file could not be read or parsed.
    #[error("Seed file error: {0}")]
    Seed(String),

    /// A command argument or input file was unusable.
    #[error("Invalid input: {0}")]
    Input(String),
}

/// Load configuration and connect to the database.
async fn connect() -> Result<Commerce<PgStore>, CliError> {
    Ok(connect_with_config().await?.1)
}

/// Like [`connect`], also returning the loaded configuration.
async fn connect_with_config() -> Result<(CommerceConfig, Commerce<PgStore>), CliError> {
    let config = CommerceConfig::from_env()?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url).await?;
    Ok((config, Commerce::new(PgStore::new(pool))))
}

fn admin() -> AdminContext {
    AdminContext::new(CLI_ACTOR)
}
