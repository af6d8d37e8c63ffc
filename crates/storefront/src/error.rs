//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use larkspur_core::CartError;
use larkspur_core::checkout::CheckoutError;
use serde::Serialize;
use thiserror::Error;

use crate::payments::PaymentsError;
use crate::registry::RegistryError;
use crate::summary::TotalOverflow;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// A cart mutation was rejected.
    #[error("Cart rejected: {0}")]
    Cart(#[from] CartError),

    /// The cart cannot be checked out.
    #[error("Checkout rejected: {0}")]
    Checkout(#[from] CheckoutError),

    /// Payment-link provider failed.
    #[error("Payments error: {0}")]
    Payments(#[from] PaymentsError),

    /// The cart's totals cannot be computed.
    #[error("Pricing error: {0}")]
    Pricing(#[from] TotalOverflow),

    /// Cart registry failed.
    #[error("Cart registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    /// Stock ceiling of a rejected line item, for "only N available" messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ceiling: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_key: Option<String>,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Cart(CartError::StockExceeded { .. }) => StatusCode::CONFLICT,
            Self::Cart(CartError::ZeroQuantity { .. })
            | Self::Checkout(CheckoutError::EmptyCart)
            | Self::Pricing(_)
            | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Payments(_) => StatusCode::BAD_GATEWAY,
            Self::Registry(_) | Self::Session(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn body(&self) -> ErrorBody {
        let (error, ceiling, variant_key) = match self {
            Self::Cart(CartError::StockExceeded {
                variant_key,
                ceiling,
            }) => (
                format!("Sorry, only {ceiling} items available in stock"),
                Some(*ceiling),
                Some(variant_key.to_string()),
            ),
            Self::Cart(err @ CartError::ZeroQuantity { variant_key }) => {
                (err.to_string(), None, Some(variant_key.to_string()))
            }
            Self::Checkout(CheckoutError::EmptyCart) => {
                ("Your cart is empty".to_string(), None, None)
            }
            Self::Pricing(err) => (
                format!("{err}; remove items to continue"),
                None,
                None,
            ),
            // Don't expose provider or internal details to clients
            Self::Payments(_) => (
                "Something went wrong. Please try again.".to_string(),
                None,
                None,
            ),
            Self::Registry(_) | Self::Session(_) | Self::Internal(_) => {
                ("Internal server error".to_string(), None, None)
            }
            Self::BadRequest(msg) => (msg.clone(), None, None),
        };

        ErrorBody {
            error,
            ceiling,
            variant_key,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(
            self,
            Self::Payments(_) | Self::Registry(_) | Self::Session(_) | Self::Internal(_)
        ) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (self.status(), Json(self.body())).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("variant_key", "price_123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
