//! Commerce configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `COMMERCE_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `SHIPPING_FLAT_INR` - Flat shipping charge in paise (default: 0)
//! - `TAX_RATE_BPS` - Tax rate in basis points, 0 to 10000 (default: 0)
//! - `RAZORPAY_KEY_ID` - Razorpay API key id (requires `RAZORPAY_KEY_SECRET`)
//! - `RAZORPAY_KEY_SECRET` - Razorpay API key secret (requires `RAZORPAY_KEY_ID`)
//! - `RAZORPAY_WEBHOOK_SECRET` - Webhook signing secret
//! - `RAZORPAY_API_BASE` - API base URL (default: <https://api.razorpay.com/v1>)

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use threadline_core::{Money, TaxRate};

/// Default Razorpay API base URL.
pub const DEFAULT_RAZORPAY_API_BASE: &str = "https://api.razorpay.com/v1";

const MAX_TAX_RATE_BPS: u32 = 10_000;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "your_",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Commerce configuration.
#[derive(Debug, Clone)]
pub struct CommerceConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// Shipping and tax applied at checkout
    pub pricing: CheckoutPricing,
    /// Razorpay API credentials, when configured
    pub razorpay: Option<RazorpayConfig>,
    /// Razorpay webhook signing secret
    pub webhook_secret: Option<SecretString>,
}

/// Shipping and tax inputs to the checkout total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CheckoutPricing {
    /// Flat shipping charge per order
    pub shipping_flat: Money,
    /// Tax rate applied to subtotal plus shipping
    pub tax_rate: TaxRate,
}

/// Razorpay API credentials.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct RazorpayConfig {
    /// Public key id (also handed to the browser checkout)
    pub key_id: String,
    /// Key secret for API basic auth and payment signatures
    pub key_secret: SecretString,
    /// API base URL
    pub api_base: Url,
}

impl std::fmt::Debug for RazorpayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayConfig")
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .field("api_base", &self.api_base.as_str())
            .finish()
    }
}

impl CommerceConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets look like placeholders.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("COMMERCE_DATABASE_URL")?;
        let pricing = CheckoutPricing::from_env()?;
        let razorpay = RazorpayConfig::from_env()?;
        let webhook_secret = get_optional_env("RAZORPAY_WEBHOOK_SECRET")
            .map(|value| validated_secret(value, "RAZORPAY_WEBHOOK_SECRET"))
            .transpose()?;

        Ok(Self {
            database_url,
            pricing,
            razorpay,
            webhook_secret,
        })
    }
}

impl CheckoutPricing {
    /// Load shipping and tax settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` for malformed or out-of-range values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            shipping_flat: parse_shipping(&get_env_or_default("SHIPPING_FLAT_INR", "0"))?,
            tax_rate: parse_tax_rate(&get_env_or_default("TAX_RATE_BPS", "0"))?,
        })
    }
}

impl RazorpayConfig {
    /// Load Razorpay credentials if both the key id and secret are set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if only one half of the key pair is set, the
    /// secret looks like a placeholder, or the API base is not a URL.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        razorpay_from_parts(
            get_optional_env("RAZORPAY_KEY_ID"),
            get_optional_env("RAZORPAY_KEY_SECRET"),
            &get_env_or_default("RAZORPAY_API_BASE", DEFAULT_RAZORPAY_API_BASE),
        )
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional, non-empty environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

fn parse_shipping(value: &str) -> Result<Money, ConfigError> {
    let minor = value.trim().parse::<i64>().map_err(|e| {
        ConfigError::InvalidEnvVar("SHIPPING_FLAT_INR".to_string(), e.to_string())
    })?;
    Money::non_negative(minor)
        .map_err(|e| ConfigError::InvalidEnvVar("SHIPPING_FLAT_INR".to_string(), e.to_string()))
}

fn parse_tax_rate(value: &str) -> Result<TaxRate, ConfigError> {
    let bps = value
        .trim()
        .parse::<u32>()
        .map_err(|e| ConfigError::InvalidEnvVar("TAX_RATE_BPS".to_string(), e.to_string()))?;
    if bps > MAX_TAX_RATE_BPS {
        return Err(ConfigError::InvalidEnvVar(
            "TAX_RATE_BPS".to_string(),
            format!("must be at most {MAX_TAX_RATE_BPS} (got {bps})"),
        ));
    }
    Ok(TaxRate::from_bps(bps))
}

fn razorpay_from_parts(
    key_id: Option<String>,
    key_secret: Option<String>,
    api_base: &str,
) -> Result<Option<RazorpayConfig>, ConfigError> {
    let (key_id, key_secret) = match (key_id, key_secret) {
        (None, None) => return Ok(None),
        (Some(id), Some(secret)) => (id, secret),
        (Some(_), None) => {
            return Err(ConfigError::MissingEnvVar("RAZORPAY_KEY_SECRET".to_string()));
        }
        (None, Some(_)) => return Err(ConfigError::MissingEnvVar("RAZORPAY_KEY_ID".to_string())),
    };

    let api_base = Url::parse(api_base.trim_end_matches('/'))
        .map_err(|e| ConfigError::InvalidEnvVar("RAZORPAY_API_BASE".to_string(), e.to_string()))?;

    Ok(Some(RazorpayConfig {
        key_id,
        key_secret: validated_secret(key_secret, "RAZORPAY_KEY_SECRET")?,
        api_base,
    }))
}

/// Reject values that look like unfilled template placeholders.
fn validate_not_placeholder(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }
    Ok(())
}

fn validated_secret(value: String, var_name: &str) -> Result<SecretString, ConfigError> {
    validate_not_placeholder(&value, var_name)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn test_parse_tax_rate_bounds() {
        assert_eq!(parse_tax_rate("1800").unwrap(), TaxRate::from_bps(1800));
        assert_eq!(parse_tax_rate("10000").unwrap(), TaxRate::from_bps(10_000));
        assert!(matches!(
            parse_tax_rate("10001"),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
        assert!(parse_tax_rate("-1").is_err());
        assert!(parse_tax_rate("18%").is_err());
    }

    #[test]
    fn test_parse_shipping_rejects_negative() {
        assert_eq!(parse_shipping("4900").unwrap(), Money::from_minor(4900));
        assert!(matches!(
            parse_shipping("-100"),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
    }

    #[test]
    fn test_razorpay_absent_when_unset() {
        let config = razorpay_from_parts(None, None, DEFAULT_RAZORPAY_API_BASE).unwrap();
        assert!(config.is_none());
    }

    #[test]
    fn test_razorpay_requires_both_halves() {
        let result = razorpay_from_parts(
            Some("rzp_test_Kq8sX2".to_string()),
            None,
            DEFAULT_RAZORPAY_API_BASE,
        );
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(var)) if var == "RAZORPAY_KEY_SECRET"));
    }

    #[test]
    fn test_razorpay_rejects_placeholder_secret() {
        let result = razorpay_from_parts(
            Some("rzp_test_Kq8sX2".to_string()),
            Some("your-key-secret".to_string()),
            DEFAULT_RAZORPAY_API_BASE,
        );
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_razorpay_rejects_bad_base() {
        let result = razorpay_from_parts(
            Some("rzp_test_Kq8sX2".to_string()),
            Some("q7Zt1mVb9LpW3sXe".to_string()),
            "not a url",
        );
        assert!(matches!(result, Err(ConfigError::InvalidEnvVar(_, _))));
    }

    #[test]
    fn test_razorpay_debug_redacts_secret() {
        let config = razorpay_from_parts(
            Some("rzp_test_Kq8sX2".to_string()),
            Some("q7Zt1mVb9LpW3sXe".to_string()),
            "https://api.razorpay.com/v1/",
        )
        .unwrap()
        .unwrap();

        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("q7Zt1mVb9LpW3sXe"));
        assert_eq!(config.key_secret.expose_secret(), "q7Zt1mVb9LpW3sXe");
        assert_eq!(config.api_base.as_str(), "https://api.razorpay.com/v1");
    }
}
