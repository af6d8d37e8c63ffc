//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::payments::{PaymentLinkClient, PaymentsError};
use crate::registry::CartRegistry;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    carts: CartRegistry,
    payments: PaymentLinkClient,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the payment-link client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, PaymentsError> {
        let payments = PaymentLinkClient::new(&config.payments)?;
        let carts = CartRegistry::new(config.cart_dir.clone(), config.strict_stock);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                carts,
                payments,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the per-session cart registry.
    #[must_use]
    pub fn carts(&self) -> &CartRegistry {
        &self.inner.carts
    }

    /// Get a reference to the payment-link client.
    #[must_use]
    pub fn payments(&self) -> &PaymentLinkClient {
        &self.inner.payments
    }
}
