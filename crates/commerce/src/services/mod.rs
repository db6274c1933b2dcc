//! Commerce operations.
//!
//! [`Commerce`] is the entry point the HTTP layer and CLI call. Its methods
//! are spread across submodules by concern:
//!
//! - [`cart`] - catalog seeding and cart mutation
//! - [`checkout`] - the atomic checkout unit
//! - [`reconcile`] - payment settlement from either provider channel
//! - [`admin`] - inventory adjustment and order reads
//! - [`provider`] - opening the provider-side order
//! - [`ledger`] - per-variant inventory primitives used by the above

pub mod admin;
pub mod cart;
pub mod checkout;
pub mod ledger;
pub mod provider;
pub mod reconcile;

use crate::db::CommerceStore;

pub use admin::{AdminContext, DEFAULT_ORDER_LIMIT, MAX_ORDER_LIMIT};
pub use provider::PaymentGateway;
pub use reconcile::{EventKind, ReconcileOutcome};

/// Commerce operations over a store.
#[derive(Debug, Clone)]
pub struct Commerce<S> {
    store: S,
}

impl<S: CommerceStore> Commerce<S> {
    /// Create the service over `store`.
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }
}
