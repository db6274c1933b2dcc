//! Storage for the commerce core.
//!
//! # Storage seam
//!
//! Services are written against two traits:
//!
//! - [`CommerceStore`] - single-statement reads and writes, and [`CommerceStore::begin`]
//! - [`CommerceTx`] - one all-or-nothing unit. Dropping a transaction without
//!   calling [`CommerceTx::commit`] discards every write and releases every lock.
//!
//! Row locks taken through `lock_*` methods are exclusive and held until the
//! transaction ends. Locking the same row twice in one transaction is allowed.
//!
//! # Implementations
//!
//! - [`PgStore`] - `PostgreSQL` (`SELECT ... FOR UPDATE` row locks)
//! - [`MemoryStore`] - in-process, per-row `tokio` mutexes with staged writes
//!
//! # Migrations
//!
//! Migrations are stored in `crates/commerce/migrations/` and run via:
//! ```bash
//! cargo run -p threadline-cli -- migrate
//! ```

pub mod memory;
pub mod postgres;

use std::future::Future;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use threadline_core::{
    CartId, CartStatus, Money, OrderId, OrderStatus, PaymentId, ProductId, StockLevel,
    VariantId,
};

use crate::models::{
    Cart, CartLine, NewOrder, NewProduct, NewVariant, Order, OrderLine, OrderSummary,
    PaymentRecord, PaymentUpdate, Product, ProductUpdate, Variant, VariantUpdate,
};

pub use memory::{MemoryStore, MemoryTx};
pub use postgres::{PgStore, PgTx};

/// `PostgreSQL` SQLSTATE for serialization failures.
const SERIALIZATION_FAILURE: &str = "40001";
/// `PostgreSQL` SQLSTATE for detected deadlocks.
const DEADLOCK_DETECTED: &str = "40P01";

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The write conflicts with current state (e.g., cart already checked out).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Whether retrying the whole unit may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        let Self::Database(err) = self else {
            return false;
        };
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => true,
            sqlx::Error::Database(db_err) => matches!(
                db_err.code().as_deref(),
                Some(SERIALIZATION_FAILURE | DEADLOCK_DETECTED)
            ),
            _ => false,
        }
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Apply pending migrations from `crates/commerce/migrations/`.
///
/// # Errors
///
/// Returns `sqlx::migrate::MigrateError` if a migration fails.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Store operations that do not need a caller-visible transaction.
pub trait CommerceStore: Send + Sync {
    /// Transaction type produced by [`CommerceStore::begin`].
    type Tx: CommerceTx;

    /// Start an atomic unit.
    fn begin(&self) -> impl Future<Output = Result<Self::Tx, RepositoryError>> + Send;

    /// Create a product, its variants, and one inventory row per variant.
    fn create_product(
        &self,
        product: &NewProduct,
    ) -> impl Future<Output = Result<Product, RepositoryError>> + Send;

    /// Replace a product's slug, name and description.
    ///
    /// Fails `NotFound` for an unknown product and `Conflict` for a slug
    /// another product already uses.
    fn update_product(
        &self,
        product_id: ProductId,
        update: &ProductUpdate,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Add a variant and its inventory row to an existing product.
    ///
    /// Fails `NotFound` for an unknown product and `Conflict` for a taken SKU.
    fn create_variant(
        &self,
        product_id: ProductId,
        variant: &NewVariant,
    ) -> impl Future<Output = Result<Variant, RepositoryError>> + Send;

    /// Replace a variant's title and price. Fails `NotFound` if absent.
    fn update_variant(
        &self,
        variant_id: VariantId,
        update: &VariantUpdate,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Create an empty open cart.
    fn create_cart(&self) -> impl Future<Output = Result<CartId, RepositoryError>> + Send;

    /// Insert a cart line or replace its quantity, keeping its position.
    ///
    /// Fails `NotFound` for an unknown cart or variant and `Conflict` for a
    /// checked-out cart.
    fn upsert_cart_item(
        &self,
        cart_id: CartId,
        variant_id: VariantId,
        quantity: i32,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Remove a cart line. Removing an absent line succeeds.
    ///
    /// Fails `NotFound` for an unknown cart and `Conflict` for a checked-out cart.
    fn delete_cart_item(
        &self,
        cart_id: CartId,
        variant_id: VariantId,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Load a cart with its lines at current prices.
    fn get_cart(
        &self,
        cart_id: CartId,
    ) -> impl Future<Output = Result<Option<Cart>, RepositoryError>> + Send;

    /// Record the provider's order id on a payment. Fails `NotFound` if absent.
    fn set_provider_order_id(
        &self,
        payment_id: PaymentId,
        provider_order_id: &str,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Newest orders first.
    fn list_orders(
        &self,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<OrderSummary>, RepositoryError>> + Send;

    /// Full order detail.
    fn get_order(
        &self,
        order_id: OrderId,
    ) -> impl Future<Output = Result<Option<Order>, RepositoryError>> + Send;

    /// Non-locking read of a variant's counters.
    fn stock_level(
        &self,
        variant_id: VariantId,
    ) -> impl Future<Output = Result<Option<StockLevel>, RepositoryError>> + Send;
}

/// One all-or-nothing unit of work.
pub trait CommerceTx: Send {
    /// Lock a cart row and return its status.
    fn lock_cart(
        &mut self,
        cart_id: CartId,
    ) -> impl Future<Output = Result<Option<CartStatus>, RepositoryError>> + Send;

    /// Resolve a cart's lines in insertion order at current prices.
    fn cart_lines(
        &mut self,
        cart_id: CartId,
    ) -> impl Future<Output = Result<Vec<CartLine>, RepositoryError>> + Send;

    /// Mark a cart checked out.
    fn close_cart(
        &mut self,
        cart_id: CartId,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Lock a variant's inventory row and read it.
    fn lock_stock(
        &mut self,
        variant_id: VariantId,
    ) -> impl Future<Output = Result<Option<StockLevel>, RepositoryError>> + Send;

    /// Write a variant's counters. The row must have been locked in this unit.
    fn put_stock(
        &mut self,
        variant_id: VariantId,
        level: StockLevel,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Insert an order in `pending_payment`.
    fn insert_order(
        &mut self,
        order: &NewOrder,
    ) -> impl Future<Output = Result<OrderId, RepositoryError>> + Send;

    /// Append an order line snapshot.
    fn insert_order_line(
        &mut self,
        order_id: OrderId,
        line: &OrderLine,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// An order's line snapshots in line order.
    fn order_lines(
        &mut self,
        order_id: OrderId,
    ) -> impl Future<Output = Result<Vec<OrderLine>, RepositoryError>> + Send;

    /// Move an order from `pending_payment` to `status`.
    ///
    /// Returns `false` (and changes nothing) if the order was not pending.
    fn settle_order(
        &mut self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    /// Insert a payment in `created`.
    fn insert_payment(
        &mut self,
        order_id: OrderId,
        provider: &str,
        amount: Money,
    ) -> impl Future<Output = Result<PaymentId, RepositoryError>> + Send;

    /// Lock the payment carrying `provider_order_id`.
    fn lock_payment(
        &mut self,
        provider_order_id: &str,
    ) -> impl Future<Output = Result<Option<PaymentRecord>, RepositoryError>> + Send;

    /// Update a locked payment.
    fn update_payment(
        &mut self,
        payment_id: PaymentId,
        update: &PaymentUpdate,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Make every write visible and release every lock.
    fn commit(self) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_are_transient() {
        assert!(RepositoryError::Database(sqlx::Error::PoolTimedOut).is_transient());
        assert!(!RepositoryError::Database(sqlx::Error::RowNotFound).is_transient());
    }

    #[test]
    fn test_domain_errors_are_not_transient() {
        assert!(!RepositoryError::NotFound("cart".to_owned()).is_transient());
        assert!(!RepositoryError::Conflict("closed".to_owned()).is_transient());
    }
}
