//! Core types for Threadline.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod money;
pub mod status;

pub use id::*;
pub use money::{MoneyError, Money, OrderTotals, SETTLEMENT_CURRENCY, TaxRate};
pub use status::*;
