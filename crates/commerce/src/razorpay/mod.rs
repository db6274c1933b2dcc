//! Razorpay integration.
//!
//! - [`RazorpayClient`] - creates provider orders
//! - [`signature`] - payment and webhook signature verification
//! - [`WebhookEvent`] - webhook payload parsing

pub mod client;
pub mod error;
pub mod signature;
pub mod webhook;

pub use client::{RazorpayClient, RazorpayOrder};
pub use error::RazorpayError;
pub use signature::{sign, verify_payment_signature, verify_webhook_signature};
pub use webhook::{PaymentRef, WebhookEvent};
