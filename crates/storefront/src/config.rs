//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `LARKSPUR_BASE_URL` - Public URL for the storefront
//! - `PAYMENTS_SECRET_KEY` - Payment-link provider secret API key
//!
//! ## Optional
//! - `LARKSPUR_HOST` - Bind address (default: 127.0.0.1)
//! - `LARKSPUR_PORT` - Listen port (default: 3000)
//! - `LARKSPUR_CART_DIR` - Directory for cart snapshots (default: ./data/carts)
//! - `LARKSPUR_STRICT_STOCK` - Check a new line item against its own stock
//!   ceiling (default: false)
//! - `PAYMENTS_API_BASE` - Provider API base URL (default: <https://api.stripe.com>)
//! - `PAYMENTS_ALLOWED_COUNTRIES` - Comma-separated shipping countries (default: US)
//! - `PAYMENTS_TIMEOUT_SECS` - Provider request timeout (default: 15)
//! - `PRICING_TAX_RATE` - Estimated tax rate (default: 0.10)
//! - `PRICING_FREE_SHIPPING_THRESHOLD` - Subtotal for free shipping (default: 100)
//! - `PRICING_FLAT_SHIPPING` - Shipping below the threshold (default: 10)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use larkspur_core::CurrencyCode;
use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
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

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Directory holding one snapshot per cart namespace
    pub cart_dir: PathBuf,
    /// Reject a brand-new line item that starts above its stock ceiling
    pub strict_stock: bool,
    /// Payment-link provider configuration
    pub payments: PaymentsConfig,
    /// Order summary rates
    pub pricing: PricingConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Payment-link provider configuration.
///
/// Implements `Debug` manually to redact the secret key.
#[derive(Clone)]
pub struct PaymentsConfig {
    /// API base URL (e.g., <https://api.stripe.com>)
    pub api_base: Url,
    /// Secret API key (server-side only)
    pub secret_key: SecretString,
    /// ISO 3166-1 alpha-2 codes shipping addresses may be collected for
    pub allowed_countries: Vec<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl std::fmt::Debug for PaymentsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentsConfig")
            .field("api_base", &self.api_base.as_str())
            .field("secret_key", &"[REDACTED]")
            .field("allowed_countries", &self.allowed_countries)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Rates used for the order summary shown next to the cart.
///
/// These belong to the display layer; the cart store never sees them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingConfig {
    pub currency: CurrencyCode,
    pub tax_rate: Decimal,
    pub free_shipping_threshold: Decimal,
    pub flat_shipping: Decimal,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            currency: CurrencyCode::USD,
            tax_rate: Decimal::new(10, 2),
            free_shipping_threshold: Decimal::new(100, 0),
            flat_shipping: Decimal::new(10, 0),
        }
    }
}

/// Source of raw configuration values, keyed by variable name.
type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        let host = get_parsed_or_default(lookup, "LARKSPUR_HOST", "127.0.0.1")?;
        let port = get_parsed_or_default(lookup, "LARKSPUR_PORT", "3000")?;
        let base_url = get_required_env(lookup, "LARKSPUR_BASE_URL")?;
        Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("LARKSPUR_BASE_URL".to_string(), e.to_string())
        })?;
        let cart_dir = PathBuf::from(get_env_or_default(
            lookup,
            "LARKSPUR_CART_DIR",
            "./data/carts",
        ));
        let strict_stock = parse_bool(lookup, "LARKSPUR_STRICT_STOCK", false)?;

        Ok(Self {
            host,
            port,
            base_url,
            cart_dir,
            strict_stock,
            payments: PaymentsConfig::from_lookup(lookup)?,
            pricing: PricingConfig::from_lookup(lookup)?,
            sentry_dsn: lookup("SENTRY_DSN"),
            sentry_environment: lookup("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl PaymentsConfig {
    /// Load only the payment provider settings from the environment.
    ///
    /// Used by tools that hand off a cart without running the storefront.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the secret key is missing or weak, or a
    /// setting cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        let api_base = get_parsed_or_default(lookup, "PAYMENTS_API_BASE", "https://api.stripe.com")?;
        let allowed_countries =
            parse_country_list(&get_env_or_default(lookup, "PAYMENTS_ALLOWED_COUNTRIES", "US"))
                .map_err(|reason| {
                    ConfigError::InvalidEnvVar("PAYMENTS_ALLOWED_COUNTRIES".to_string(), reason)
                })?;

        Ok(Self {
            api_base,
            secret_key: get_validated_secret(lookup, "PAYMENTS_SECRET_KEY")?,
            allowed_countries,
            timeout_secs: get_parsed_or_default(lookup, "PAYMENTS_TIMEOUT_SECS", "15")?,
        })
    }
}

impl PricingConfig {
    fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            currency: defaults.currency,
            tax_rate: get_decimal_or(lookup, "PRICING_TAX_RATE", defaults.tax_rate)?,
            free_shipping_threshold: get_decimal_or(
                lookup,
                "PRICING_FREE_SHIPPING_THRESHOLD",
                defaults.free_shipping_threshold,
            )?,
            flat_shipping: get_decimal_or(lookup, "PRICING_FLAT_SHIPPING", defaults.flat_shipping)?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(lookup: Lookup<'_>, key: &str) -> Result<String, ConfigError> {
    lookup(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an environment variable with a default value.
fn get_env_or_default(lookup: Lookup<'_>, key: &str, default: &str) -> String {
    lookup(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable (or its default) into `T`.
fn get_parsed_or_default<T>(lookup: Lookup<'_>, key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(lookup, key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse a non-negative decimal, falling back to `default` when unset.
fn get_decimal_or(lookup: Lookup<'_>, key: &str, default: Decimal) -> Result<Decimal, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    let value = raw
        .trim()
        .parse::<Decimal>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if value.is_sign_negative() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must not be negative".to_string(),
        ));
    }
    Ok(value)
}

/// Parse a boolean flag (`true`/`false`/`1`/`0`/`yes`/`no`).
fn parse_bool(lookup: Lookup<'_>, key: &str, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("expected a boolean, got '{other}'"),
        )),
    }
}

/// Parse a comma-separated list of two-letter country codes.
fn parse_country_list(raw: &str) -> Result<Vec<String>, String> {
    let countries: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_ascii_uppercase)
        .collect();

    if countries.is_empty() {
        return Err("at least one country code is required".to_string());
    }
    if let Some(bad) = countries
        .iter()
        .find(|code| code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()))
    {
        return Err(format!("'{bad}' is not a two-letter country code"));
    }
    Ok(countries)
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Real API keys have high entropy
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the key issued by the provider."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret.
fn get_validated_secret(lookup: Lookup<'_>, key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(lookup, key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
