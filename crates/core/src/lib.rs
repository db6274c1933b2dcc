//! Threadline Core - Shared domain library.
//!
//! This crate provides the types and pure rules used by every Threadline
//! component:
//! - `commerce` - Cart, checkout, payment reconciliation, and inventory
//! - `cli` - Command-line tools for migrations and store operations
//!
//! # Architecture
//!
//! The core crate contains only types and arithmetic - no I/O, no database
//! access, no HTTP clients. Locking and atomicity are the caller's job; the
//! functions here only decide what the next state is.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, money, and statuses
//! - [`stock`] - Per-variant on-hand/reserved ledger arithmetic
//! - [`settlement`] - Payment event transition table

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod settlement;
pub mod stock;
pub mod types;

pub use settlement::{PaymentEvent, StockEffect, Transition};
pub use stock::{StockError, StockLevel};
pub use types::*;

/// Largest quantity of one variant a cart line may hold.
pub const MAX_LINE_QUANTITY: i32 = 20;

/// Payment provider tag recorded on every payment.
pub const PAYMENT_PROVIDER: &str = "razorpay";
