//! HMAC-SHA256 signature checks for the two payment channels.
//!
//! Razorpay sends signatures as lowercase hex. Comparison goes through
//! `Mac::verify_slice`, which is constant-time.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verify the signature returned to the browser after payment.
///
/// The signed message is `"{order_id}|{payment_id}"` under the API key secret.
#[must_use]
pub fn verify_payment_signature(
    order_id: &str,
    payment_id: &str,
    signature: &str,
    key_secret: &SecretString,
) -> bool {
    let message = format!("{order_id}|{payment_id}");
    verify(message.as_bytes(), signature, key_secret)
}

/// Verify the `X-Razorpay-Signature` header over the raw webhook body.
#[must_use]
pub fn verify_webhook_signature(body: &[u8], signature: &str, webhook_secret: &SecretString) -> bool {
    verify(body, signature, webhook_secret)
}

/// Hex HMAC-SHA256 of `message` under `secret`.
#[must_use]
pub fn sign(message: &[u8], secret: &SecretString) -> String {
    // HMAC accepts keys of any length, so construction cannot fail.
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.expose_secret().as_bytes()) else {
        return String::new();
    };
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

fn verify(message: &[u8], signature: &str, secret: &SecretString) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.expose_secret().as_bytes()) else {
        return false;
    };
    mac.update(message);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    #[test]
    fn test_sign_known_vector() {
        assert_eq!(
            sign(b"The quick brown fox jumps over the lazy dog", &secret("key")),
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn test_payment_signature_round_trip() {
        let key = secret("q7Zt1mVb9LpW3sXe");
        let signature = sign(b"order_N1|pay_P1", &key);

        assert!(verify_payment_signature("order_N1", "pay_P1", &signature, &key));
        assert!(!verify_payment_signature("order_N1", "pay_P2", &signature, &key));
        assert!(!verify_payment_signature(
            "order_N1",
            "pay_P1",
            &signature,
            &secret("other-key")
        ));
    }

    #[test]
    fn test_webhook_signature_covers_exact_body() {
        let key = secret("whsec_9fK2");
        let body = br#"{"event":"payment.captured"}"#;
        let signature = sign(body, &key);

        assert!(verify_webhook_signature(body, &signature, &key));
        assert!(!verify_webhook_signature(
            br#"{"event":"payment.failed"}"#,
            &signature,
            &key
        ));
    }

    #[test]
    fn test_malformed_signature_rejected() {
        let key = secret("whsec_9fK2");
        assert!(!verify_webhook_signature(b"{}", "not-hex", &key));
        assert!(!verify_webhook_signature(b"{}", "", &key));
        assert!(!verify_webhook_signature(b"{}", "abcd", &key));
    }
}
