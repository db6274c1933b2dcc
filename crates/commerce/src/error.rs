//! Error taxonomy for commerce operations.
//!
//! Every multi-step operation either commits in full or rolls back in full,
//! so an error never implies partial success. Only [`CommerceError::TransientIo`]
//! is safe to retry.

use thiserror::Error;

use threadline_core::{CartId, MoneyError, StockError, VariantId};

use crate::db::RepositoryError;
use crate::razorpay::RazorpayError;

/// Result alias for commerce operations.
pub type Result<T> = std::result::Result<T, CommerceError>;

/// Errors surfaced to callers of the commerce core.
#[derive(Debug, Error)]
pub enum CommerceError {
    /// Referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A reservation could not be satisfied.
    #[error(
        "insufficient stock for variant {variant_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        variant_id: VariantId,
        requested: i32,
        available: i32,
    },

    /// An on-hand adjustment would leave negative stock or less than is reserved.
    #[error(
        "adjusting variant {variant_id} by {delta} would leave on_hand at {resulting} (reserved {reserved})"
    )]
    NegativeStock {
        variant_id: VariantId,
        delta: i32,
        resulting: i64,
        reserved: i32,
    },

    /// Checkout of a cart with no lines.
    #[error("cart is empty")]
    EmptyCart,

    /// Mutation or checkout of a cart that was already checked out.
    #[error("cart {0} is already checked out")]
    CartClosed(CartId),

    /// Malformed identifiers, quantities, or customer details.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Payment provider signature mismatch.
    #[error("payment provider signature verification failed")]
    ProviderVerificationFailed,

    /// Storage or network temporarily unavailable; the whole unit may be retried.
    #[error("transient I/O failure: {0}")]
    TransientIo(String),

    /// Payment provider rejected a request.
    #[error("payment gateway error: {0}")]
    Gateway(RazorpayError),

    /// Non-retryable storage failure.
    #[error("storage error: {0}")]
    Storage(RepositoryError),
}

impl CommerceError {
    /// Whether the caller may retry the whole operation.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientIo(_))
    }

    /// Attach a variant to a ledger error.
    #[must_use]
    pub fn from_stock(variant_id: VariantId, err: StockError) -> Self {
        match err {
            StockError::InsufficientStock {
                requested,
                available,
            } => Self::InsufficientStock {
                variant_id,
                requested,
                available,
            },
            StockError::NegativeStock {
                delta,
                resulting,
                reserved,
            } => Self::NegativeStock {
                variant_id,
                delta,
                resulting,
                reserved,
            },
            StockError::InvalidQuantity(quantity) => {
                Self::InvalidInput(format!("quantity must be positive (got {quantity})"))
            }
            StockError::Overflow => {
                Self::InvalidInput(format!("stock counter overflow for variant {variant_id}"))
            }
        }
    }
}

impl From<RepositoryError> for CommerceError {
    fn from(err: RepositoryError) -> Self {
        if err.is_transient() {
            return Self::TransientIo(err.to_string());
        }
        match err {
            RepositoryError::NotFound(what) => Self::NotFound(what),
            RepositoryError::Conflict(what) => Self::InvalidInput(what),
            other => Self::Storage(other),
        }
    }
}

impl From<MoneyError> for CommerceError {
    fn from(err: MoneyError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

impl From<RazorpayError> for CommerceError {
    fn from(err: RazorpayError) -> Self {
        if err.is_transient() {
            return Self::TransientIo(err.to_string());
        }
        Self::Gateway(err)
    }
}
