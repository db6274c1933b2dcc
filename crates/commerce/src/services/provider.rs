//! Opening the provider-side order for a placed checkout.

use std::future::Future;

use tracing::{info, instrument};

use threadline_core::{Money, PaymentId};

use super::Commerce;
use crate::db::CommerceStore;
use crate::error::{CommerceError, Result};
use crate::models::{CheckoutResult, ProviderOrder};
use crate::razorpay::{RazorpayClient, RazorpayError};

/// Creates provider orders.
pub trait PaymentGateway: Send + Sync {
    /// Public key id the browser checkout uses.
    fn key_id(&self) -> &str;

    /// Create a provider order and return its id.
    fn create_order(
        &self,
        amount: Money,
        currency: &str,
        receipt: &str,
    ) -> impl Future<Output = std::result::Result<String, RazorpayError>> + Send;
}

impl PaymentGateway for RazorpayClient {
    fn key_id(&self) -> &str {
        Self::key_id(self)
    }

    async fn create_order(
        &self,
        amount: Money,
        currency: &str,
        receipt: &str,
    ) -> std::result::Result<String, RazorpayError> {
        Ok(Self::create_order(self, amount, currency, receipt).await?.id)
    }
}

impl<S: CommerceStore> Commerce<S> {
    /// Attach the provider's order id to a payment.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if the payment does not exist and
    /// `CommerceError::InvalidInput` for a blank id or one already recorded
    /// on another payment.
    #[instrument(skip(self))]
    pub async fn record_provider_order_id(
        &self,
        payment_id: PaymentId,
        provider_order_id: &str,
    ) -> Result<()> {
        if provider_order_id.trim().is_empty() {
            return Err(CommerceError::InvalidInput(
                "provider order id is required".to_string(),
            ));
        }
        self.store
            .set_provider_order_id(payment_id, provider_order_id)
            .await?;
        Ok(())
    }

    /// Create the provider order for a checkout and record its id.
    ///
    /// The order id is used as the provider receipt.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Gateway` or `CommerceError::TransientIo` if the
    /// provider call fails, and the errors of
    /// [`Commerce::record_provider_order_id`].
    #[instrument(skip(self, gateway, checkout), fields(order_id = %checkout.order_id))]
    pub async fn open_provider_order<G: PaymentGateway>(
        &self,
        gateway: &G,
        checkout: &CheckoutResult,
    ) -> Result<ProviderOrder> {
        let receipt = checkout.order_id.to_string();
        let provider_order_id = gateway
            .create_order(checkout.amount, &checkout.currency, &receipt)
            .await?;

        self.record_provider_order_id(checkout.payment_id, &provider_order_id)
            .await?;

        info!(provider_order_id = %provider_order_id, "Provider order opened");

        Ok(ProviderOrder {
            key_id: gateway.key_id().to_string(),
            order_id: provider_order_id,
            amount: checkout.amount,
            currency: checkout.currency.clone(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;
    use serde_json::json;
    use url::Url;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::{CheckoutPricing, RazorpayConfig};
    use crate::db::MemoryStore;
    use crate::models::{Customer, NewProduct, NewVariant};

    async fn placed_checkout(commerce: &Commerce<MemoryStore>) -> CheckoutResult {
        let product = commerce
            .create_product(&NewProduct {
                slug: "mug".to_owned(),
                name: "Mug".to_owned(),
                description: String::new(),
                variants: vec![NewVariant {
                    sku: "MUG-1".to_owned(),
                    title: "Blue".to_owned(),
                    price: Money::from_minor(45_000),
                    on_hand: 2,
                }],
            })
            .await
            .unwrap();
        let cart = commerce.create_cart().await.unwrap();
        commerce
            .upsert_cart_item(cart, product.variants[0].id, 1)
            .await
            .unwrap();
        let customer = Customer {
            name: "Asha Rao".to_owned(),
            phone: "+91 98450 00000".to_owned(),
            email: None,
            shipping_address: json!({ "city": "Pune" }),
        };
        commerce
            .checkout(cart, customer, CheckoutPricing::default())
            .await
            .unwrap()
    }

    fn gateway_for(server: &MockServer) -> RazorpayClient {
        RazorpayClient::new(&RazorpayConfig {
            key_id: "rzp_test_key".to_owned(),
            key_secret: SecretString::from("rzp_test_secret"),
            api_base: Url::parse(&server.uri()).unwrap(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_open_provider_order_records_id() {
        let commerce = Commerce::new(MemoryStore::new());
        let placed = placed_checkout(&commerce).await;

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders"))
            .and(body_partial_json(json!({
                "amount": 45_000,
                "receipt": placed.order_id.to_string(),
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "order_Live01" })))
            .expect(1)
            .mount(&server)
            .await;

        let opened = commerce
            .open_provider_order(&gateway_for(&server), &placed)
            .await
            .unwrap();
        assert_eq!(opened.order_id, "order_Live01");
        assert_eq!(opened.key_id, "rzp_test_key");
        assert_eq!(opened.amount, Money::from_minor(45_000));

        let order = commerce
            .store()
            .get_order(placed.order_id)
            .await
            .unwrap()
            .unwrap();
        let payment = order.payment.unwrap();
        assert_eq!(payment.provider_order_id.as_deref(), Some("order_Live01"));
    }

    #[tokio::test]
    async fn test_open_provider_order_unavailable_is_retryable() {
        let commerce = Commerce::new(MemoryStore::new());
        let placed = placed_checkout(&commerce).await;

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = commerce
            .open_provider_order(&gateway_for(&server), &placed)
            .await
            .unwrap_err();
        assert!(err.is_retryable());

        let order = commerce
            .store()
            .get_order(placed.order_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(order.payment.unwrap().provider_order_id, None);
    }

    #[tokio::test]
    async fn test_unknown_payment() {
        let commerce = Commerce::new(MemoryStore::new());
        let err = commerce
            .record_provider_order_id(PaymentId::generate(), "order_X")
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_blank_provider_order_id() {
        let commerce = Commerce::new(MemoryStore::new());
        let err = commerce
            .record_provider_order_id(PaymentId::generate(), " ")
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::InvalidInput(_)));
    }
}
