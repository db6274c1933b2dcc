//! Domain models for the commerce core.
//!
//! These are validated domain objects, separate from database row types.

pub mod cart;
pub mod catalog;
pub mod order;
pub mod payment;

pub use cart::{Cart, CartLine};
pub use catalog::{NewProduct, NewVariant, Product, ProductUpdate, Variant, VariantUpdate};
pub use order::{Customer, NewOrder, Order, OrderLine, OrderSummary};
pub use payment::{CheckoutResult, PaymentRecord, PaymentSummary, PaymentUpdate, ProviderOrder};
