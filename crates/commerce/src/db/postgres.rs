//! `PostgreSQL` store.
//!
//! Row locks are `SELECT ... FOR UPDATE` inside a `sqlx` transaction, held
//! until commit or rollback. Dropping a [`PgTx`] rolls back.

use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool, Postgres, Transaction};

use threadline_core::{
    CartId, CartStatus, Money, OrderId, OrderStatus, OrderTotals, PaymentId, PaymentStatus,
    ProductId, StockLevel, VariantId,
};

use super::{CommerceStore, CommerceTx, RepositoryError};
use crate::models::{
    Cart, CartLine, Customer, NewOrder, NewProduct, NewVariant, Order, OrderLine,
    OrderSummary, PaymentRecord, PaymentSummary, PaymentUpdate, Product, ProductUpdate, Variant,
    VariantUpdate,
};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct StockRow {
    on_hand: i32,
    reserved: i32,
}

impl From<StockRow> for StockLevel {
    fn from(row: StockRow) -> Self {
        Self::new(row.on_hand, row.reserved)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    variant_id: VariantId,
    sku: String,
    product_name: String,
    variant_title: String,
    price_minor: i64,
    quantity: i32,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        Self {
            variant_id: row.variant_id,
            sku: row.sku,
            product_name: row.product_name,
            variant_title: row.variant_title,
            unit_price: Money::from_minor(row.price_minor),
            quantity: row.quantity,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    status: OrderStatus,
    currency: String,
    subtotal_minor: i64,
    shipping_minor: i64,
    tax_minor: i64,
    total_minor: i64,
    customer_name: String,
    customer_phone: String,
    customer_email: Option<String>,
    shipping_address: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, lines: Vec<OrderLine>, payment: Option<PaymentSummary>) -> Order {
        Order {
            id: self.id,
            status: self.status,
            currency: self.currency,
            totals: OrderTotals {
                subtotal: Money::from_minor(self.subtotal_minor),
                shipping: Money::from_minor(self.shipping_minor),
                tax: Money::from_minor(self.tax_minor),
                total: Money::from_minor(self.total_minor),
            },
            customer: Customer {
                name: self.customer_name,
                phone: self.customer_phone,
                email: self.customer_email,
                shipping_address: self.shipping_address,
            },
            lines,
            payment,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderSummaryRow {
    id: OrderId,
    status: OrderStatus,
    total_minor: i64,
    created_at: DateTime<Utc>,
}

impl From<OrderSummaryRow> for OrderSummary {
    fn from(row: OrderSummaryRow) -> Self {
        Self {
            id: row.id,
            status: row.status,
            total: Money::from_minor(row.total_minor),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderLineRow {
    variant_id: VariantId,
    sku: String,
    product_name: String,
    variant_title: String,
    unit_price_minor: i64,
    quantity: i32,
    line_total_minor: i64,
}

impl From<OrderLineRow> for OrderLine {
    fn from(row: OrderLineRow) -> Self {
        Self {
            variant_id: row.variant_id,
            sku: row.sku,
            product_name: row.product_name,
            variant_title: row.variant_title,
            unit_price: Money::from_minor(row.unit_price_minor),
            quantity: row.quantity,
            line_total: Money::from_minor(row.line_total_minor),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentSummaryRow {
    id: PaymentId,
    provider: String,
    status: PaymentStatus,
    amount_minor: i64,
    provider_order_id: Option<String>,
    provider_payment_id: Option<String>,
}

impl From<PaymentSummaryRow> for PaymentSummary {
    fn from(row: PaymentSummaryRow) -> Self {
        Self {
            id: row.id,
            provider: row.provider,
            status: row.status,
            amount: Money::from_minor(row.amount_minor),
            provider_order_id: row.provider_order_id,
            provider_payment_id: row.provider_payment_id,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentLockRow {
    id: PaymentId,
    order_id: OrderId,
    status: PaymentStatus,
}

impl From<PaymentLockRow> for PaymentRecord {
    fn from(row: PaymentLockRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            status: row.status,
        }
    }
}

// =============================================================================
// Shared Queries
// =============================================================================

async fn fetch_cart_lines<'e, E: PgExecutor<'e>>(
    executor: E,
    cart_id: CartId,
) -> Result<Vec<CartLine>, RepositoryError> {
    let rows = sqlx::query_as::<_, CartLineRow>(
        r"
        SELECT
            ci.variant_id, v.sku, p.name AS product_name,
            v.title AS variant_title, v.price_minor, ci.quantity
        FROM shop.cart_items ci
        JOIN shop.product_variants v ON v.id = ci.variant_id
        JOIN shop.products p ON p.id = v.product_id
        WHERE ci.cart_id = $1
        ORDER BY ci.position
        ",
    )
    .bind(cart_id)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

async fn fetch_order_lines<'e, E: PgExecutor<'e>>(
    executor: E,
    order_id: OrderId,
) -> Result<Vec<OrderLine>, RepositoryError> {
    let rows = sqlx::query_as::<_, OrderLineRow>(
        r"
        SELECT
            variant_id, sku, product_name, variant_title,
            unit_price_minor, quantity, line_total_minor
        FROM shop.order_items
        WHERE order_id = $1
        ORDER BY line_no
        ",
    )
    .bind(order_id)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// Lock a cart and require it to be open.
async fn lock_open_cart(
    tx: &mut Transaction<'static, Postgres>,
    cart_id: CartId,
) -> Result<(), RepositoryError> {
    let status: Option<CartStatus> =
        sqlx::query_scalar("SELECT status FROM shop.carts WHERE id = $1 FOR UPDATE")
            .bind(cart_id)
            .fetch_optional(&mut **tx)
            .await?;

    match status {
        None => Err(RepositoryError::NotFound(format!("cart {cart_id}"))),
        Some(CartStatus::CheckedOut) => Err(RepositoryError::Conflict(format!(
            "cart {cart_id} is checked out"
        ))),
        Some(CartStatus::Open) => Ok(()),
    }
}

/// Map unique-constraint violations to `Conflict`.
fn unique_to_conflict(err: sqlx::Error, what: impl FnOnce() -> String) -> RepositoryError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            RepositoryError::Conflict(what())
        }
        _ => RepositoryError::Database(err),
    }
}

// =============================================================================
// Store
// =============================================================================

/// Store backed by a `PostgreSQL` pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl CommerceStore for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> Result<PgTx, RepositoryError> {
        Ok(PgTx {
            tx: self.pool.begin().await?,
        })
    }

    async fn create_product(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let product_id: ProductId = sqlx::query_scalar(
            r"
            INSERT INTO shop.products (slug, name, description)
            VALUES ($1, $2, $3)
            RETURNING id
            ",
        )
        .bind(&product.slug)
        .bind(&product.name)
        .bind(&product.description)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| unique_to_conflict(e, || format!("product slug {} already exists", product.slug)))?;

        let mut variants = Vec::with_capacity(product.variants.len());
        for new in &product.variants {
            let id: VariantId = sqlx::query_scalar(
                r"
                INSERT INTO shop.product_variants (product_id, sku, title, price_minor)
                VALUES ($1, $2, $3, $4)
                RETURNING id
                ",
            )
            .bind(product_id)
            .bind(&new.sku)
            .bind(&new.title)
            .bind(new.price.minor())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| unique_to_conflict(e, || format!("sku {} already exists", new.sku)))?;

            sqlx::query("INSERT INTO shop.inventory (variant_id, on_hand) VALUES ($1, $2)")
                .bind(id)
                .bind(new.on_hand)
                .execute(&mut *tx)
                .await?;

            variants.push(Variant {
                id,
                product_id,
                sku: new.sku.clone(),
                title: new.title.clone(),
                price: new.price,
                stock: StockLevel::new(new.on_hand, 0),
            });
        }

        tx.commit().await?;

        Ok(Product {
            id: product_id,
            slug: product.slug.clone(),
            name: product.name.clone(),
            description: product.description.clone(),
            variants,
        })
    }

    async fn update_product(
        &self,
        product_id: ProductId,
        update: &ProductUpdate,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.products
            SET slug = $2, name = $3, description = $4, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(product_id)
        .bind(&update.slug)
        .bind(&update.name)
        .bind(&update.description)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_to_conflict(e, || format!("product slug {} already exists", update.slug)))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("product {product_id}")));
        }
        Ok(())
    }

    async fn create_variant(
        &self,
        product_id: ProductId,
        variant: &NewVariant,
    ) -> Result<Variant, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM shop.products WHERE id = $1)")
                .bind(product_id)
                .fetch_one(&mut *tx)
                .await?;
        if !exists {
            return Err(RepositoryError::NotFound(format!("product {product_id}")));
        }

        let id: VariantId = sqlx::query_scalar(
            r"
            INSERT INTO shop.product_variants (product_id, sku, title, price_minor)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(product_id)
        .bind(&variant.sku)
        .bind(&variant.title)
        .bind(variant.price.minor())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| unique_to_conflict(e, || format!("sku {} already exists", variant.sku)))?;

        sqlx::query("INSERT INTO shop.inventory (variant_id, on_hand) VALUES ($1, $2)")
            .bind(id)
            .bind(variant.on_hand)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Variant {
            id,
            product_id,
            sku: variant.sku.clone(),
            title: variant.title.clone(),
            price: variant.price,
            stock: StockLevel::new(variant.on_hand, 0),
        })
    }

    async fn update_variant(
        &self,
        variant_id: VariantId,
        update: &VariantUpdate,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.product_variants
            SET title = $2, price_minor = $3, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(variant_id)
        .bind(&update.title)
        .bind(update.price.minor())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("variant {variant_id}")));
        }
        Ok(())
    }

    async fn create_cart(&self) -> Result<CartId, RepositoryError> {
        let id = sqlx::query_scalar("INSERT INTO shop.carts DEFAULT VALUES RETURNING id")
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }

    async fn upsert_cart_item(
        &self,
        cart_id: CartId,
        variant_id: VariantId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_open_cart(&mut tx, cart_id).await?;

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM shop.product_variants WHERE id = $1)",
        )
        .bind(variant_id)
        .fetch_one(&mut *tx)
        .await?;
        if !exists {
            return Err(RepositoryError::NotFound(format!("variant {variant_id}")));
        }

        sqlx::query(
            r"
            INSERT INTO shop.cart_items (cart_id, variant_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (cart_id, variant_id)
            DO UPDATE SET quantity = EXCLUDED.quantity, updated_at = now()
            ",
        )
        .bind(cart_id)
        .bind(variant_id)
        .bind(quantity)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_cart_item(
        &self,
        cart_id: CartId,
        variant_id: VariantId,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_open_cart(&mut tx, cart_id).await?;

        sqlx::query("DELETE FROM shop.cart_items WHERE cart_id = $1 AND variant_id = $2")
            .bind(cart_id)
            .bind(variant_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_cart(&self, cart_id: CartId) -> Result<Option<Cart>, RepositoryError> {
        let status: Option<CartStatus> =
            sqlx::query_scalar("SELECT status FROM shop.carts WHERE id = $1")
                .bind(cart_id)
                .fetch_optional(&self.pool)
                .await?;

        let Some(status) = status else {
            return Ok(None);
        };

        Ok(Some(Cart {
            id: cart_id,
            status,
            items: fetch_cart_lines(&self.pool, cart_id).await?,
        }))
    }

    async fn set_provider_order_id(
        &self,
        payment_id: PaymentId,
        provider_order_id: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.payments
            SET provider_order_id = $2, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(payment_id)
        .bind(provider_order_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            unique_to_conflict(e, || {
                format!("provider order id {provider_order_id} already recorded")
            })
        })?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("payment {payment_id}")));
        }
        Ok(())
    }

    async fn list_orders(&self, limit: i64) -> Result<Vec<OrderSummary>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderSummaryRow>(
            r"
            SELECT id, status, total_minor, created_at
            FROM shop.orders
            ORDER BY created_at DESC, id DESC
            LIMIT $1
            ",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT
                id, status, currency,
                subtotal_minor, shipping_minor, tax_minor, total_minor,
                customer_name, customer_phone, customer_email,
                shipping_address, created_at
            FROM shop.orders
            WHERE id = $1
            ",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let lines = fetch_order_lines(&self.pool, order_id).await?;
        let payment = sqlx::query_as::<_, PaymentSummaryRow>(
            r"
            SELECT
                id, provider, status, amount_minor,
                provider_order_id, provider_payment_id
            FROM shop.payments
            WHERE order_id = $1
            ",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(Some(row.into_order(lines, payment.map(Into::into))))
    }

    async fn stock_level(&self, variant_id: VariantId) -> Result<Option<StockLevel>, RepositoryError> {
        let row = sqlx::query_as::<_, StockRow>(
            "SELECT on_hand, reserved FROM shop.inventory WHERE variant_id = $1",
        )
        .bind(variant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// A `PostgreSQL` transaction.
#[derive(Debug)]
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

impl CommerceTx for PgTx {
    async fn lock_cart(&mut self, cart_id: CartId) -> Result<Option<CartStatus>, RepositoryError> {
        let status = sqlx::query_scalar("SELECT status FROM shop.carts WHERE id = $1 FOR UPDATE")
            .bind(cart_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(status)
    }

    async fn cart_lines(&mut self, cart_id: CartId) -> Result<Vec<CartLine>, RepositoryError> {
        fetch_cart_lines(&mut *self.tx, cart_id).await
    }

    async fn close_cart(&mut self, cart_id: CartId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE shop.carts SET status = $2, updated_at = now() WHERE id = $1")
            .bind(cart_id)
            .bind(CartStatus::CheckedOut)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn lock_stock(&mut self, variant_id: VariantId) -> Result<Option<StockLevel>, RepositoryError> {
        let row = sqlx::query_as::<_, StockRow>(
            "SELECT on_hand, reserved FROM shop.inventory WHERE variant_id = $1 FOR UPDATE",
        )
        .bind(variant_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn put_stock(&mut self, variant_id: VariantId, level: StockLevel) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.inventory
            SET on_hand = $2, reserved = $3, updated_at = now()
            WHERE variant_id = $1
            ",
        )
        .bind(variant_id)
        .bind(level.on_hand)
        .bind(level.reserved)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!(
                "inventory for variant {variant_id}"
            )));
        }
        Ok(())
    }

    async fn insert_order(&mut self, order: &NewOrder) -> Result<OrderId, RepositoryError> {
        let id = sqlx::query_scalar(
            r"
            INSERT INTO shop.orders (
                currency, subtotal_minor, shipping_minor, tax_minor, total_minor,
                customer_name, customer_phone, customer_email, shipping_address
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            ",
        )
        .bind(&order.currency)
        .bind(order.totals.subtotal.minor())
        .bind(order.totals.shipping.minor())
        .bind(order.totals.tax.minor())
        .bind(order.totals.total.minor())
        .bind(&order.customer.name)
        .bind(&order.customer.phone)
        .bind(&order.customer.email)
        .bind(&order.customer.shipping_address)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    async fn insert_order_line(
        &mut self,
        order_id: OrderId,
        line: &OrderLine,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO shop.order_items (
                order_id, line_no, variant_id, sku, product_name, variant_title,
                unit_price_minor, quantity, line_total_minor
            )
            VALUES (
                $1,
                (SELECT COALESCE(MAX(line_no), 0) + 1 FROM shop.order_items WHERE order_id = $1),
                $2, $3, $4, $5, $6, $7, $8
            )
            ",
        )
        .bind(order_id)
        .bind(line.variant_id)
        .bind(&line.sku)
        .bind(&line.product_name)
        .bind(&line.variant_title)
        .bind(line.unit_price.minor())
        .bind(line.quantity)
        .bind(line.line_total.minor())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn order_lines(&mut self, order_id: OrderId) -> Result<Vec<OrderLine>, RepositoryError> {
        fetch_order_lines(&mut *self.tx, order_id).await
    }

    async fn settle_order(
        &mut self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.orders
            SET status = $2, updated_at = now()
            WHERE id = $1 AND status = 'pending_payment'
            ",
        )
        .bind(order_id)
        .bind(status)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_payment(
        &mut self,
        order_id: OrderId,
        provider: &str,
        amount: Money,
    ) -> Result<PaymentId, RepositoryError> {
        let id = sqlx::query_scalar(
            r"
            INSERT INTO shop.payments (order_id, provider, amount_minor)
            VALUES ($1, $2, $3)
            RETURNING id
            ",
        )
        .bind(order_id)
        .bind(provider)
        .bind(amount.minor())
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    async fn lock_payment(
        &mut self,
        provider_order_id: &str,
    ) -> Result<Option<PaymentRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, PaymentLockRow>(
            r"
            SELECT id, order_id, status
            FROM shop.payments
            WHERE provider_order_id = $1
            FOR UPDATE
            ",
        )
        .bind(provider_order_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn update_payment(
        &mut self,
        payment_id: PaymentId,
        update: &PaymentUpdate,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE shop.payments
            SET status = $2,
                provider_payment_id = COALESCE($3, provider_payment_id),
                provider_signature = COALESCE($4, provider_signature),
                updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(payment_id)
        .bind(update.status)
        .bind(&update.provider_payment_id)
        .bind(&update.provider_signature)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self) -> Result<(), RepositoryError> {
        self.tx.commit().await?;
        Ok(())
    }
}
