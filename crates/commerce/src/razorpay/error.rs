//! Razorpay-related errors.

use thiserror::Error;

/// Errors that can occur when interacting with Razorpay.
#[derive(Debug, Error)]
pub enum RazorpayError {
    /// HTTP request could not be completed.
    #[error("Razorpay request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Razorpay answered with a non-success status.
    #[error("Razorpay API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// Failed to parse a response or webhook payload.
    #[error("Razorpay response error: {0}")]
    Response(String),
}

impl RazorpayError {
    /// Whether the request may succeed if retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(err) => err.is_timeout() || err.is_connect(),
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::Response(_) => false,
        }
    }
}
