//! Hosted payment-link provider.
//!
//! # Architecture
//!
//! - Checkout hands the cart off as a single payment-link request
//! - The provider returns a URL the customer is redirected to
//! - One best-effort request per checkout, no retries; on failure the cart is
//!   left untouched so the customer can try again
//!
//! # Example
//!
//! ```rust,ignore
//! use larkspur_core::checkout::PaymentLinkRequest;
//! use larkspur_storefront::payments::PaymentLinkClient;
//!
//! let client = PaymentLinkClient::new(&config.payments)?;
//! let request = PaymentLinkRequest::from_state(store.state())?;
//! let url = client.create_payment_link(&request).await?;
//! ```

mod client;

pub use client::PaymentLinkClient;

use thiserror::Error;

/// Errors that can occur when creating a payment link.
#[derive(Debug, Error)]
pub enum PaymentsError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider rejected the request.
    #[error("provider returned {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Provider's error message, or a truncated body.
        message: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The response did not contain a redirect URL.
    #[error("payment link response has no url")]
    MissingUrl,

    /// The redirect URL is not a valid absolute URL.
    #[error("invalid payment link url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}
