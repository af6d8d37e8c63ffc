//! Cart commands.
//!
//! Every mutation prints the resulting cart snapshot. Checkout needs the
//! payment-link settings:
//!
//! # Environment Variables
//!
//! - `PAYMENTS_SECRET_KEY` - Payment provider secret key (required)
//! - `PAYMENTS_API_BASE` - Provider API base URL
//! - `PAYMENTS_ALLOWED_COUNTRIES` - Comma-separated shipping countries

use clap::Subcommand;
use larkspur_core::checkout::{CheckoutError, PaymentLinkRequest};
use larkspur_core::{
    CartError, CartLineItem, CartStorage, CartStore, MAX_LINE_QUANTITY, MAX_UNIT_PRICE, ProductId,
    VariantKey,
};
use larkspur_storefront::config::{ConfigError, PaymentsConfig};
use larkspur_storefront::payments::{PaymentLinkClient, PaymentsError};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use thiserror::Error;

/// Errors that can occur running a cart command.
#[derive(Debug, Error)]
pub enum CartCommandError {
    /// The cart rejected the mutation.
    #[error("{0}")]
    Cart(#[from] CartError),

    /// The cart cannot be checked out.
    #[error("Checkout rejected: {0}")]
    Checkout(#[from] CheckoutError),

    /// Payment settings are missing or invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The payment-link provider failed.
    #[error("Payments error: {0}")]
    Payments(#[from] PaymentsError),

    /// Unit price is negative.
    #[error("Invalid unit price: {0}")]
    InvalidPrice(Decimal),

    /// Price, quantity or stock ceiling is too large.
    #[error(
        "Line item out of range: unit price must be at most {MAX_UNIT_PRICE}, quantity and stock ceiling at most {MAX_LINE_QUANTITY}"
    )]
    OutOfRange,

    /// Snapshot could not be rendered.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Subcommand)]
pub enum CartAction {
    /// Print the cart
    Show,
    /// Add a line item, merging with an existing item of the same variant
    Add {
        /// Payment provider price reference
        #[arg(long)]
        variant_key: VariantKey,

        #[arg(long)]
        product_id: i64,

        #[arg(long)]
        name: String,

        /// Unit price, e.g. `45.00`
        #[arg(long)]
        unit_price: Decimal,

        #[arg(long)]
        image_url: String,

        #[arg(short, long, default_value_t = 1)]
        quantity: u32,

        /// Stock available for this variant
        #[arg(long)]
        stock_ceiling: u32,

        #[arg(long)]
        size: Option<String>,

        #[arg(long)]
        color: Option<String>,
    },
    /// Increase a line item's quantity by one
    Increase { variant_key: VariantKey },
    /// Decrease a line item's quantity by one (removes it at 1)
    Decrease { variant_key: VariantKey },
    /// Remove a line item
    Remove { variant_key: VariantKey },
    /// Empty the cart
    Clear,
    /// Create a payment link and clear the cart
    Checkout,
}

/// Run `action` against `store` and return the JSON to print.
///
/// # Errors
///
/// Returns an error if the cart rejects the mutation, or if checkout cannot
/// reach the payment provider (the cart is left untouched in that case).
pub async fn execute<S: CartStorage>(
    store: &mut CartStore<S>,
    action: CartAction,
) -> Result<Value, CartCommandError> {
    match action {
        CartAction::Checkout => {
            let config = PaymentsConfig::from_env()?;
            let client = PaymentLinkClient::new(&config)?;
            checkout(store, &client).await
        }
        action => {
            apply(store, action)?;
            Ok(serde_json::to_value(store.state())?)
        }
    }
}

/// Apply a mutating or read-only action.
fn apply<S: CartStorage>(
    store: &mut CartStore<S>,
    action: CartAction,
) -> Result<(), CartCommandError> {
    match action {
        CartAction::Show | CartAction::Checkout => {}
        CartAction::Add {
            variant_key,
            product_id,
            name,
            unit_price,
            image_url,
            quantity,
            stock_ceiling,
            size,
            color,
        } => {
            if unit_price.is_sign_negative() {
                return Err(CartCommandError::InvalidPrice(unit_price));
            }
            let mut item = CartLineItem::new(
                variant_key,
                ProductId::new(product_id),
                name,
                unit_price,
                image_url,
                quantity,
                stock_ceiling,
            );
            if let Some(size) = size {
                item = item.with_size(size);
            }
            if let Some(color) = color {
                item = item.with_color(color);
            }
            if !item.within_bounds() {
                return Err(CartCommandError::OutOfRange);
            }
            store.add_to_cart(item)?;
        }
        CartAction::Increase { variant_key } => store.increase_quantity(&variant_key)?,
        CartAction::Decrease { variant_key } => store.decrease_quantity(&variant_key),
        CartAction::Remove { variant_key } => store.remove_from_cart(&variant_key),
        CartAction::Clear => store.clear_cart(),
    }
    Ok(())
}

async fn checkout<S: CartStorage>(
    store: &mut CartStore<S>,
    client: &PaymentLinkClient,
) -> Result<Value, CartCommandError> {
    let request = PaymentLinkRequest::from_state(store.state())?;
    let url = client.create_payment_link(&request).await?;

    store.clear_cart();
    tracing::info!(units = request.total_quantity(), "Checkout handed off; cart cleared");

    Ok(json!({ "url": url.as_str() }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use larkspur_core::cart::MemoryStorage;
    use secrecy::SecretString;
    use url::Url;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn payments(status: u16, body: Value) -> (MockServer, PaymentLinkClient) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_links"))
            .and(body_string_contains("line_items%5B0%5D%5Bprice%5D=price_scarf"))
            .and(body_string_contains("line_items%5B0%5D%5Bquantity%5D=2"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;

        let client = PaymentLinkClient::new(&PaymentsConfig {
            api_base: Url::parse(&server.uri()).unwrap(),
            secret_key: SecretString::from("sk_test_51Hq8Zr2eZvKYlo2C"),
            allowed_countries: vec!["US".to_string()],
            timeout_secs: 5,
        })
        .unwrap();
        (server, client)
    }

    fn key(s: &str) -> VariantKey {
        VariantKey::parse(s).unwrap()
    }

    fn add(quantity: u32) -> CartAction {
        CartAction::Add {
            variant_key: key("price_scarf"),
            product_id: 3,
            name: "Wool Scarf".to_string(),
            unit_price: Decimal::new(4500, 2),
            image_url: "https://cdn.example.com/scarf.jpg".to_string(),
            quantity,
            stock_ceiling: 5,
            size: None,
            color: Some("Rust".to_string()),
        }
    }

    #[tokio::test]
    async fn test_add_prints_snapshot() {
        let mut store = CartStore::open(MemoryStorage::new());

        let output = execute(&mut store, add(2)).await.unwrap();

        assert_eq!(output["products"][0]["variantKey"], "price_scarf");
        assert_eq!(output["products"][0]["quantity"], 2);
        assert_eq!(output["products"][0]["unitPrice"], "45.00");
        assert_eq!(store.storage().write_count(), 1);
    }

    #[tokio::test]
    async fn test_over_ceiling_merge_is_an_error() {
        let mut store = CartStore::open(MemoryStorage::new());
        execute(&mut store, add(4)).await.unwrap();

        let err = execute(&mut store, add(2)).await.unwrap_err();

        assert!(matches!(
            err,
            CartCommandError::Cart(CartError::StockExceeded { ceiling: 5, .. })
        ));
        assert_eq!(store.total_quantity(), 4);
    }

    #[tokio::test]
    async fn test_decrease_then_remove() {
        let mut store = CartStore::open(MemoryStorage::new());
        execute(&mut store, add(2)).await.unwrap();

        execute(
            &mut store,
            CartAction::Decrease {
                variant_key: key("price_scarf"),
            },
        )
        .await
        .unwrap();
        assert_eq!(store.total_quantity(), 1);

        let output = execute(
            &mut store,
            CartAction::Remove {
                variant_key: key("price_scarf"),
            },
        )
        .await
        .unwrap();
        assert_eq!(output, json!({ "products": [] }));
    }

    #[tokio::test]
    async fn test_checkout_prints_url_and_clears_cart() {
        let (_server, client) =
            payments(200, json!({ "url": "https://buy.example.com/plink_7" })).await;
        let mut store = CartStore::open(MemoryStorage::new());
        execute(&mut store, add(2)).await.unwrap();

        let output = checkout(&mut store, &client).await.unwrap();

        assert_eq!(output, json!({ "url": "https://buy.example.com/plink_7" }));
        assert!(store.is_empty());
        assert_eq!(store.storage().write_count(), 2);
    }

    #[tokio::test]
    async fn test_checkout_failure_keeps_cart() {
        let (_server, client) = payments(
            400,
            json!({ "error": { "message": "No such price: 'price_scarf'" } }),
        )
        .await;
        let mut store = CartStore::open(MemoryStorage::new());
        execute(&mut store, add(2)).await.unwrap();

        let err = checkout(&mut store, &client).await.unwrap_err();

        assert!(matches!(
            err,
            CartCommandError::Payments(PaymentsError::Api { status: 400, .. })
        ));
        assert_eq!(store.total_quantity(), 2);
        assert_eq!(store.storage().write_count(), 1);
    }

    #[tokio::test]
    async fn test_checkout_of_empty_cart_skips_provider() {
        let server = MockServer::start().await;
        let client = PaymentLinkClient::new(&PaymentsConfig {
            api_base: Url::parse(&server.uri()).unwrap(),
            secret_key: SecretString::from("sk_test_51Hq8Zr2eZvKYlo2C"),
            allowed_countries: vec!["US".to_string()],
            timeout_secs: 5,
        })
        .unwrap();
        let mut store = CartStore::open(MemoryStorage::new());

        let err = checkout(&mut store, &client).await.unwrap_err();

        assert!(matches!(
            err,
            CartCommandError::Checkout(CheckoutError::EmptyCart)
        ));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_out_of_range_add_rejected() {
        let mut store = CartStore::open(MemoryStorage::new());
        let action = CartAction::Add {
            variant_key: key("price_scarf"),
            product_id: 3,
            name: "Wool Scarf".to_string(),
            unit_price: Decimal::MAX,
            image_url: "https://cdn.example.com/scarf.jpg".to_string(),
            quantity: 2,
            stock_ceiling: 5,
            size: None,
            color: None,
        };

        assert!(matches!(
            execute(&mut store, action).await,
            Err(CartCommandError::OutOfRange)
        ));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_negative_price_rejected() {
        let mut store = CartStore::open(MemoryStorage::new());
        let action = CartAction::Add {
            variant_key: key("price_scarf"),
            product_id: 3,
            name: "Wool Scarf".to_string(),
            unit_price: Decimal::new(-100, 2),
            image_url: "https://cdn.example.com/scarf.jpg".to_string(),
            quantity: 1,
            stock_ceiling: 5,
            size: None,
            color: None,
        };

        assert!(matches!(
            execute(&mut store, action).await,
            Err(CartCommandError::InvalidPrice(_))
        ));
        assert!(store.is_empty());
    }
}
