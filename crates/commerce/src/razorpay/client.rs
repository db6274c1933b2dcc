//! Razorpay Orders API client.

use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use threadline_core::Money;

use super::error::RazorpayError;
use crate::config::RazorpayConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Razorpay API client.
#[derive(Clone)]
pub struct RazorpayClient {
    /// HTTP client.
    client: Client,
    /// Public key id.
    key_id: String,
    /// Key secret for basic auth.
    key_secret: SecretString,
    /// API base URL without trailing slash.
    api_base: String,
}

impl std::fmt::Debug for RazorpayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayClient")
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    payment_capture: u8,
}

/// The subset of a Razorpay order we use.
#[derive(Debug, Clone, Deserialize)]
pub struct RazorpayOrder {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl RazorpayClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `RazorpayError::Request` if the HTTP client cannot be built.
    pub fn new(config: &RazorpayConfig) -> Result<Self, RazorpayError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
            api_base: config.api_base.as_str().trim_end_matches('/').to_string(),
        })
    }

    /// Public key id, handed to the browser checkout widget.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Create a provider order that auto-captures on payment.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or Razorpay rejects it.
    #[instrument(skip(self), fields(amount = %amount))]
    pub async fn create_order(
        &self,
        amount: Money,
        currency: &str,
        receipt: &str,
    ) -> Result<RazorpayOrder, RazorpayError> {
        let request = CreateOrderRequest {
            amount: amount.minor(),
            currency,
            receipt,
            payment_capture: 1,
        };

        let response = self
            .client
            .post(format!("{}/orders", self.api_base))
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Razorpay rejected order creation");
            return Err(RazorpayError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let order: RazorpayOrder = response
            .json()
            .await
            .map_err(|e| RazorpayError::Response(e.to_string()))?;

        debug!(provider_order_id = %order.id, "Razorpay order created");
        Ok(order)
    }
}
