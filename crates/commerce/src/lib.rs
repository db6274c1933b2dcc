//! Threadline Commerce - the order, inventory, and payment core.
//!
//! This crate turns carts into orders and settles them against the payment
//! provider without ever overselling stock:
//!
//! - Checkout reserves stock, creates the order and payment, and closes the
//!   cart in one atomic unit.
//! - Provider events (browser verification or webhook) settle the payment
//!   exactly once, consuming or releasing the reserved stock.
//! - Admins correct on-hand counts under the same per-variant row locks.
//!
//! # Modules
//!
//! - [`config`] - Environment configuration
//! - [`db`] - Storage seam with `PostgreSQL` and in-memory stores
//! - [`error`] - Error taxonomy
//! - [`models`] - Domain models
//! - [`razorpay`] - Provider client, signatures, webhook parsing
//! - [`services`] - The [`Commerce`] operations

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod razorpay;
pub mod services;

pub use config::{CheckoutPricing, CommerceConfig, ConfigError, RazorpayConfig};
pub use db::{CommerceStore, CommerceTx, MemoryStore, PgStore, RepositoryError};
pub use error::{CommerceError, Result};
pub use services::{
    AdminContext, Commerce, EventKind, PaymentGateway, ReconcileOutcome,
};
