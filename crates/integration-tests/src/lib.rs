//! Integration tests for Larkspur.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p larkspur-integration-tests
//! ```
//!
//! Every [`TestContext`] serves the storefront router on an ephemeral port
//! with its own snapshot directory and a `wiremock` payment provider, so tests
//! run in parallel without shared state.
//!
//! # Test Categories
//!
//! - `cart_persistence` - Cart store against the JSON file backend
//! - `storefront_http` - HTTP cart and checkout flows

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use larkspur_storefront::config::{PaymentsConfig, PricingConfig, StorefrontConfig};
use larkspur_storefront::routes;
use larkspur_storefront::state::AppState;
use reqwest::{Client, StatusCode};
use secrecy::SecretString;
use serde_json::{Value, json};
use tempfile::TempDir;
use url::Url;
use wiremock::MockServer;

/// Secret key accepted by the mock payment provider.
pub const TEST_SECRET_KEY: &str = "sk_test_51Hq8Zr2eZvKYlo2CtR9wXbN7mQ";

/// Storefront configuration for tests.
#[must_use]
pub fn test_config(cart_dir: &Path, payments_api_base: &str, strict_stock: bool) -> StorefrontConfig {
    StorefrontConfig {
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        base_url: "http://127.0.0.1".to_string(),
        cart_dir: cart_dir.to_path_buf(),
        strict_stock,
        payments: PaymentsConfig {
            api_base: Url::parse(payments_api_base).expect("mock server URI is a valid URL"),
            secret_key: SecretString::from(TEST_SECRET_KEY),
            allowed_countries: vec!["US".to_string()],
            timeout_secs: 5,
        },
        pricing: PricingConfig::default(),
        sentry_dsn: None,
        sentry_environment: None,
    }
}

/// Add-to-cart request body for `variant_key`.
#[must_use]
pub fn add_body(variant_key: &str, quantity: u32, stock_ceiling: u32) -> Value {
    json!({
        "variantKey": variant_key,
        "productId": 7,
        "name": "Linen Apron",
        "unitPrice": "24.50",
        "imageUrl": "https://cdn.example.com/apron.jpg",
        "quantity": quantity,
        "stockCeiling": stock_ceiling,
    })
}

/// A running storefront with isolated storage and payment provider.
pub struct TestContext {
    /// Client with a cookie store, i.e. one browser session.
    pub client: Client,
    pub base_url: String,
    pub payments: MockServer,
    pub state: AppState,
    cart_dir: TempDir,
}

impl TestContext {
    /// Start a storefront with default settings.
    pub async fn new() -> Self {
        Self::with_strict_stock(false).await
    }

    /// Start a storefront, optionally rejecting over-ceiling first inserts.
    pub async fn with_strict_stock(strict_stock: bool) -> Self {
        let payments = MockServer::start().await;
        let cart_dir = TempDir::new().expect("Failed to create cart directory");
        let config = test_config(cart_dir.path(), &payments.uri(), strict_stock);
        let state = AppState::new(config).expect("Failed to build application state");

        let listener = tokio::net::TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Listener has no address");

        let app = routes::app(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Test server failed");
        });

        Self {
            client: new_client(),
            base_url: format!("http://{addr}"),
            payments,
            state,
            cart_dir,
        }
    }

    /// A second, independent browser session against the same server.
    #[must_use]
    pub fn other_session(&self) -> Client {
        new_client()
    }

    /// Snapshot directory.
    #[must_use]
    pub fn cart_dir(&self) -> &Path {
        self.cart_dir.path()
    }

    /// Every snapshot file written so far.
    #[must_use]
    pub fn snapshot_files(&self) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(self.cart_dir()) else {
            return Vec::new();
        };
        entries
            .filter_map(Result::ok)
            .map(|entry| entry.path().join("cart-storage.json"))
            .filter(|path| path.is_file())
            .collect()
    }

    /// GET `path` with this context's session.
    pub async fn get(&self, path: &str) -> (StatusCode, Value) {
        send(self.client.get(format!("{}{path}", self.base_url))).await
    }

    /// POST a JSON `body` to `path` with this context's session.
    pub async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        send(
            self.client
                .post(format!("{}{path}", self.base_url))
                .json(&body),
        )
        .await
    }
}

fn new_client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

async fn send(request: reqwest::RequestBuilder) -> (StatusCode, Value) {
    let resp = request.send().await.expect("Request failed");
    let status = resp.status();
    let body = resp.json().await.unwrap_or(Value::Null);
    (status, body)
}
