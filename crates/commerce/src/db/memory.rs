//! In-process store.
//!
//! Every row that a transaction may lock has its own `tokio` mutex. A
//! [`MemoryTx`] holds the owned guards for the rows it locked and stages its
//! writes; [`CommerceTx::commit`] applies the staged writes under the table
//! mutex and only then releases the row guards. Dropping the transaction
//! discards the staged writes.
//!
//! Reads after a lock always go back to the committed tables, so a waiter
//! sees whatever the previous holder committed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RowKey {
    Cart(CartId),
    Stock(VariantId),
    Order(OrderId),
    Payment(PaymentId),
}

#[derive(Debug, Clone)]
struct ProductRow {
    slug: String,
    name: String,
}

#[derive(Debug, Clone)]
struct VariantRow {
    product_id: ProductId,
    sku: String,
    title: String,
    price: Money,
}

#[derive(Debug, Clone, Default)]
struct CartRow {
    status: CartStatus,
    /// `(variant, quantity)` in insertion order.
    items: Vec<(VariantId, i32)>,
}

#[derive(Debug, Clone)]
struct OrderRow {
    status: OrderStatus,
    currency: String,
    totals: OrderTotals,
    customer: Customer,
    created_at: DateTime<Utc>,
    seq: u64,
}

#[derive(Debug, Clone)]
struct PaymentRow {
    order_id: OrderId,
    provider: String,
    status: PaymentStatus,
    amount: Money,
    provider_order_id: Option<String>,
    provider_payment_id: Option<String>,
    provider_signature: Option<String>,
}

#[derive(Debug, Default)]
struct Tables {
    products: HashMap<ProductId, ProductRow>,
    slugs: HashSet<String>,
    variants: HashMap<VariantId, VariantRow>,
    skus: HashSet<String>,
    inventory: HashMap<VariantId, StockLevel>,
    carts: HashMap<CartId, CartRow>,
    orders: HashMap<OrderId, OrderRow>,
    order_lines: HashMap<OrderId, Vec<OrderLine>>,
    payments: HashMap<PaymentId, PaymentRow>,
    next_seq: u64,
}

impl Tables {
    fn claim_sku(&mut self, sku: &str) -> Result<(), RepositoryError> {
        if !self.skus.insert(sku.to_owned()) {
            return Err(RepositoryError::Conflict(format!("sku {sku} already exists")));
        }
        Ok(())
    }

    fn insert_variant(&mut self, product_id: ProductId, new: &NewVariant) -> Variant {
        let id = VariantId::generate();
        let stock = StockLevel::new(new.on_hand, 0);
        self.variants.insert(
            id,
            VariantRow {
                product_id,
                sku: new.sku.clone(),
                title: new.title.clone(),
                price: new.price,
            },
        );
        self.inventory.insert(id, stock);
        Variant {
            id,
            product_id,
            sku: new.sku.clone(),
            title: new.title.clone(),
            price: new.price,
            stock,
        }
    }

    fn resolve_line(&self, variant_id: VariantId, quantity: i32) -> Result<CartLine, RepositoryError> {
        let variant = self.variants.get(&variant_id).ok_or_else(|| {
            RepositoryError::DataCorruption(format!("cart references missing variant {variant_id}"))
        })?;
        let product_name = self
            .products
            .get(&variant.product_id)
            .map(|p| p.name.clone())
            .unwrap_or_default();
        Ok(CartLine {
            variant_id,
            sku: variant.sku.clone(),
            product_name,
            variant_title: variant.title.clone(),
            unit_price: variant.price,
            quantity,
        })
    }

    fn cart_lines(&self, cart_id: CartId) -> Result<Vec<CartLine>, RepositoryError> {
        let Some(cart) = self.carts.get(&cart_id) else {
            return Ok(Vec::new());
        };
        cart.items
            .iter()
            .map(|&(variant_id, quantity)| self.resolve_line(variant_id, quantity))
            .collect()
    }

    fn payment_summary(&self, order_id: OrderId) -> Option<PaymentSummary> {
        self.payments
            .iter()
            .find(|(_, p)| p.order_id == order_id)
            .map(|(id, p)| PaymentSummary {
                id: *id,
                provider: p.provider.clone(),
                status: p.status,
                amount: p.amount,
                provider_order_id: p.provider_order_id.clone(),
                provider_payment_id: p.provider_payment_id.clone(),
            })
    }
}

/// Row mutexes are created on first use. Once a row's mutex is neither held
/// nor awaited only the map refers to it, and the next sweep drops it.
const MIN_SWEEP_LEN: usize = 1024;

#[derive(Debug, Default)]
struct RowLocks {
    locks: HashMap<RowKey, Arc<Mutex<()>>>,
    /// Size at which the next sweep runs.
    sweep_at: usize,
}

impl RowLocks {
    fn get(&mut self, key: RowKey) -> Arc<Mutex<()>> {
        if self.locks.len() >= self.sweep_at.max(MIN_SWEEP_LEN) {
            self.locks.retain(|_, row| Arc::strong_count(row) > 1);
            self.sweep_at = self.locks.len() * 2;
        }
        Arc::clone(self.locks.entry(key).or_default())
    }
}

#[derive(Debug, Default)]
struct Shared {
    tables: Mutex<Tables>,
    rows: Mutex<RowLocks>,
}

impl Shared {
    async fn row(&self, key: RowKey) -> Arc<Mutex<()>> {
        self.rows.lock().await.get(key)
    }
}

/// Store backed by process memory.
///
/// Cloning is cheap; clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CommerceStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, RepositoryError> {
        Ok(MemoryTx {
            shared: Arc::clone(&self.shared),
            guards: HashMap::new(),
            stock: HashMap::new(),
            closed_carts: HashSet::new(),
            orders: Vec::new(),
            order_lines: HashMap::new(),
            order_status: HashMap::new(),
            payments: Vec::new(),
            payment_updates: HashMap::new(),
        })
    }

    async fn create_product(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let mut tables = self.shared.tables.lock().await;

        if tables.slugs.contains(&product.slug) {
            return Err(RepositoryError::Conflict(format!(
                "product slug {} already exists",
                product.slug
            )));
        }
        let mut seen = HashSet::new();
        for variant in &product.variants {
            if tables.skus.contains(&variant.sku) || !seen.insert(variant.sku.as_str()) {
                return Err(RepositoryError::Conflict(format!(
                    "sku {} already exists",
                    variant.sku
                )));
            }
        }

        let product_id = ProductId::generate();
        tables.slugs.insert(product.slug.clone());
        tables.products.insert(
            product_id,
            ProductRow {
                slug: product.slug.clone(),
                name: product.name.clone(),
            },
        );

        let mut variants = Vec::with_capacity(product.variants.len());
        for new in &product.variants {
            tables.skus.insert(new.sku.clone());
            variants.push(tables.insert_variant(product_id, new));
        }

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
        let mut tables = self.shared.tables.lock().await;

        let current = tables
            .products
            .get(&product_id)
            .map(|p| p.slug.clone())
            .ok_or_else(|| RepositoryError::NotFound(format!("product {product_id}")))?;
        if current != update.slug {
            if tables.slugs.contains(&update.slug) {
                return Err(RepositoryError::Conflict(format!(
                    "product slug {} already exists",
                    update.slug
                )));
            }
            tables.slugs.remove(&current);
            tables.slugs.insert(update.slug.clone());
        }

        if let Some(product) = tables.products.get_mut(&product_id) {
            product.slug.clone_from(&update.slug);
            product.name.clone_from(&update.name);
        }
        Ok(())
    }

    async fn create_variant(
        &self,
        product_id: ProductId,
        variant: &NewVariant,
    ) -> Result<Variant, RepositoryError> {
        let mut tables = self.shared.tables.lock().await;

        if !tables.products.contains_key(&product_id) {
            return Err(RepositoryError::NotFound(format!("product {product_id}")));
        }
        tables.claim_sku(&variant.sku)?;
        Ok(tables.insert_variant(product_id, variant))
    }

    async fn update_variant(
        &self,
        variant_id: VariantId,
        update: &VariantUpdate,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.shared.tables.lock().await;

        let row = tables
            .variants
            .get_mut(&variant_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("variant {variant_id}")))?;
        row.title.clone_from(&update.title);
        row.price = update.price;
        Ok(())
    }

    async fn create_cart(&self) -> Result<CartId, RepositoryError> {
        let id = CartId::generate();
        self.shared
            .tables
            .lock()
            .await
            .carts
            .insert(id, CartRow::default());
        Ok(id)
    }

    async fn upsert_cart_item(
        &self,
        cart_id: CartId,
        variant_id: VariantId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        let row = self.shared.row(RowKey::Cart(cart_id)).await;
        let _guard = row.lock().await;
        let mut tables = self.shared.tables.lock().await;

        open_cart(&mut tables, cart_id)?;
        if !tables.variants.contains_key(&variant_id) {
            return Err(RepositoryError::NotFound(format!("variant {variant_id}")));
        }
        let cart = open_cart(&mut tables, cart_id)?;
        match cart.items.iter_mut().find(|(v, _)| *v == variant_id) {
            Some(item) => item.1 = quantity,
            None => cart.items.push((variant_id, quantity)),
        }
        Ok(())
    }

    async fn delete_cart_item(
        &self,
        cart_id: CartId,
        variant_id: VariantId,
    ) -> Result<(), RepositoryError> {
        let row = self.shared.row(RowKey::Cart(cart_id)).await;
        let _guard = row.lock().await;
        let mut tables = self.shared.tables.lock().await;

        let cart = open_cart(&mut tables, cart_id)?;
        cart.items.retain(|(v, _)| *v != variant_id);
        Ok(())
    }

    async fn get_cart(&self, cart_id: CartId) -> Result<Option<Cart>, RepositoryError> {
        let tables = self.shared.tables.lock().await;
        let Some(cart) = tables.carts.get(&cart_id) else {
            return Ok(None);
        };
        Ok(Some(Cart {
            id: cart_id,
            status: cart.status,
            items: tables.cart_lines(cart_id)?,
        }))
    }

    async fn set_provider_order_id(
        &self,
        payment_id: PaymentId,
        provider_order_id: &str,
    ) -> Result<(), RepositoryError> {
        let row = self.shared.row(RowKey::Payment(payment_id)).await;
        let _guard = row.lock().await;
        let mut tables = self.shared.tables.lock().await;

        let taken = tables.payments.iter().any(|(id, p)| {
            *id != payment_id && p.provider_order_id.as_deref() == Some(provider_order_id)
        });
        if taken {
            return Err(RepositoryError::Conflict(format!(
                "provider order id {provider_order_id} already recorded"
            )));
        }
        let payment = tables
            .payments
            .get_mut(&payment_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("payment {payment_id}")))?;
        payment.provider_order_id = Some(provider_order_id.to_owned());
        Ok(())
    }

    async fn list_orders(&self, limit: i64) -> Result<Vec<OrderSummary>, RepositoryError> {
        let tables = self.shared.tables.lock().await;
        let mut rows: Vec<_> = tables.orders.iter().collect();
        rows.sort_by(|(_, a), (_, b)| (b.created_at, b.seq).cmp(&(a.created_at, a.seq)));

        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(rows
            .into_iter()
            .take(limit)
            .map(|(id, o)| OrderSummary {
                id: *id,
                status: o.status,
                total: o.totals.total,
                created_at: o.created_at,
            })
            .collect())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let tables = self.shared.tables.lock().await;
        let Some(row) = tables.orders.get(&order_id) else {
            return Ok(None);
        };
        Ok(Some(Order {
            id: order_id,
            status: row.status,
            currency: row.currency.clone(),
            totals: row.totals,
            customer: row.customer.clone(),
            lines: tables
                .order_lines
                .get(&order_id)
                .cloned()
                .unwrap_or_default(),
            payment: tables.payment_summary(order_id),
            created_at: row.created_at,
        }))
    }

    async fn stock_level(&self, variant_id: VariantId) -> Result<Option<StockLevel>, RepositoryError> {
        Ok(self
            .shared
            .tables
            .lock()
            .await
            .inventory
            .get(&variant_id)
            .copied())
    }
}

fn open_cart(tables: &mut Tables, cart_id: CartId) -> Result<&mut CartRow, RepositoryError> {
    let cart = tables
        .carts
        .get_mut(&cart_id)
        .ok_or_else(|| RepositoryError::NotFound(format!("cart {cart_id}")))?;
    if cart.status != CartStatus::Open {
        return Err(RepositoryError::Conflict(format!(
            "cart {cart_id} is checked out"
        )));
    }
    Ok(cart)
}

/// A unit of work against a [`MemoryStore`].
pub struct MemoryTx {
    shared: Arc<Shared>,
    guards: HashMap<RowKey, OwnedMutexGuard<()>>,
    stock: HashMap<VariantId, StockLevel>,
    closed_carts: HashSet<CartId>,
    orders: Vec<(OrderId, NewOrder)>,
    order_lines: HashMap<OrderId, Vec<OrderLine>>,
    order_status: HashMap<OrderId, OrderStatus>,
    payments: Vec<(PaymentId, PaymentRow)>,
    payment_updates: HashMap<PaymentId, PaymentUpdate>,
}

impl std::fmt::Debug for MemoryTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTx")
            .field("locked_rows", &self.guards.len())
            .field("staged_orders", &self.orders.len())
            .finish_non_exhaustive()
    }
}

impl MemoryTx {
    async fn lock(&mut self, key: RowKey) {
        if self.guards.contains_key(&key) {
            return;
        }
        let row = self.shared.row(key).await;
        let guard = row.lock_owned().await;
        self.guards.insert(key, guard);
    }

    fn staged_order(&self, order_id: OrderId) -> Option<&NewOrder> {
        self.orders
            .iter()
            .find(|(id, _)| *id == order_id)
            .map(|(_, order)| order)
    }
}

impl CommerceTx for MemoryTx {
    async fn lock_cart(&mut self, cart_id: CartId) -> Result<Option<CartStatus>, RepositoryError> {
        self.lock(RowKey::Cart(cart_id)).await;
        if self.closed_carts.contains(&cart_id) {
            return Ok(Some(CartStatus::CheckedOut));
        }
        let tables = self.shared.tables.lock().await;
        Ok(tables.carts.get(&cart_id).map(|c| c.status))
    }

    async fn cart_lines(&mut self, cart_id: CartId) -> Result<Vec<CartLine>, RepositoryError> {
        self.shared.tables.lock().await.cart_lines(cart_id)
    }

    async fn close_cart(&mut self, cart_id: CartId) -> Result<(), RepositoryError> {
        self.lock(RowKey::Cart(cart_id)).await;
        self.closed_carts.insert(cart_id);
        Ok(())
    }

    async fn lock_stock(&mut self, variant_id: VariantId) -> Result<Option<StockLevel>, RepositoryError> {
        self.lock(RowKey::Stock(variant_id)).await;
        if let Some(level) = self.stock.get(&variant_id) {
            return Ok(Some(*level));
        }
        let tables = self.shared.tables.lock().await;
        Ok(tables.inventory.get(&variant_id).copied())
    }

    async fn put_stock(&mut self, variant_id: VariantId, level: StockLevel) -> Result<(), RepositoryError> {
        self.lock(RowKey::Stock(variant_id)).await;
        self.stock.insert(variant_id, level);
        Ok(())
    }

    async fn insert_order(&mut self, order: &NewOrder) -> Result<OrderId, RepositoryError> {
        let id = OrderId::generate();
        self.lock(RowKey::Order(id)).await;
        self.orders.push((id, order.clone()));
        Ok(id)
    }

    async fn insert_order_line(
        &mut self,
        order_id: OrderId,
        line: &OrderLine,
    ) -> Result<(), RepositoryError> {
        self.order_lines
            .entry(order_id)
            .or_default()
            .push(line.clone());
        Ok(())
    }

    async fn order_lines(&mut self, order_id: OrderId) -> Result<Vec<OrderLine>, RepositoryError> {
        let mut lines = self
            .shared
            .tables
            .lock()
            .await
            .order_lines
            .get(&order_id)
            .cloned()
            .unwrap_or_default();
        if let Some(staged) = self.order_lines.get(&order_id) {
            lines.extend(staged.iter().cloned());
        }
        Ok(lines)
    }

    async fn settle_order(
        &mut self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<bool, RepositoryError> {
        self.lock(RowKey::Order(order_id)).await;
        let current = match self.order_status.get(&order_id) {
            Some(status) => Some(*status),
            None if self.staged_order(order_id).is_some() => Some(OrderStatus::PendingPayment),
            None => self
                .shared
                .tables
                .lock()
                .await
                .orders
                .get(&order_id)
                .map(|o| o.status),
        };
        if current != Some(OrderStatus::PendingPayment) {
            return Ok(false);
        }
        self.order_status.insert(order_id, status);
        Ok(true)
    }

    async fn insert_payment(
        &mut self,
        order_id: OrderId,
        provider: &str,
        amount: Money,
    ) -> Result<PaymentId, RepositoryError> {
        let id = PaymentId::generate();
        self.lock(RowKey::Payment(id)).await;
        self.payments.push((
            id,
            PaymentRow {
                order_id,
                provider: provider.to_owned(),
                status: PaymentStatus::Created,
                amount,
                provider_order_id: None,
                provider_payment_id: None,
                provider_signature: None,
            },
        ));
        Ok(id)
    }

    async fn lock_payment(
        &mut self,
        provider_order_id: &str,
    ) -> Result<Option<PaymentRecord>, RepositoryError> {
        let found = {
            let tables = self.shared.tables.lock().await;
            tables
                .payments
                .iter()
                .find(|(_, p)| p.provider_order_id.as_deref() == Some(provider_order_id))
                .map(|(id, _)| *id)
        };
        let Some(payment_id) = found else {
            return Ok(None);
        };

        self.lock(RowKey::Payment(payment_id)).await;
        let tables = self.shared.tables.lock().await;
        Ok(tables.payments.get(&payment_id).map(|p| PaymentRecord {
            id: payment_id,
            order_id: p.order_id,
            status: self
                .payment_updates
                .get(&payment_id)
                .map_or(p.status, |u| u.status),
        }))
    }

    async fn update_payment(
        &mut self,
        payment_id: PaymentId,
        update: &PaymentUpdate,
    ) -> Result<(), RepositoryError> {
        self.lock(RowKey::Payment(payment_id)).await;
        self.payment_updates.insert(payment_id, update.clone());
        Ok(())
    }

    async fn commit(mut self) -> Result<(), RepositoryError> {
        let shared = Arc::clone(&self.shared);
        let mut tables = shared.tables.lock().await;
        let now = Utc::now();

        for (id, order) in std::mem::take(&mut self.orders) {
            let seq = tables.next_seq;
            tables.next_seq += 1;
            tables.orders.insert(
                id,
                OrderRow {
                    status: OrderStatus::PendingPayment,
                    currency: order.currency,
                    totals: order.totals,
                    customer: order.customer,
                    created_at: now,
                    seq,
                },
            );
        }
        for (id, lines) in std::mem::take(&mut self.order_lines) {
            tables.order_lines.entry(id).or_default().extend(lines);
        }
        for (id, status) in std::mem::take(&mut self.order_status) {
            if let Some(order) = tables.orders.get_mut(&id) {
                order.status = status;
            }
        }
        for (id, payment) in std::mem::take(&mut self.payments) {
            tables.payments.insert(id, payment);
        }
        for (id, update) in std::mem::take(&mut self.payment_updates) {
            if let Some(payment) = tables.payments.get_mut(&id) {
                payment.status = update.status;
                if update.provider_payment_id.is_some() {
                    payment.provider_payment_id = update.provider_payment_id;
                }
                if update.provider_signature.is_some() {
                    payment.provider_signature = update.provider_signature;
                }
            }
        }
        for (id, level) in std::mem::take(&mut self.stock) {
            tables.inventory.insert(id, level);
        }
        for id in std::mem::take(&mut self.closed_carts) {
            if let Some(cart) = tables.carts.get_mut(&id) {
                cart.status = CartStatus::CheckedOut;
            }
        }

        // Row guards are released when `self` drops, after the tables are updated.
        drop(tables);
        Ok(())
    }
}
