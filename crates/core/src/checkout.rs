//! Checkout handoff payload.
//!
//! Turns a cart snapshot into the request a hosted payment-link provider
//! needs: one `{ price, quantity }` pair per line item, plus metadata echoing
//! what the customer saw in the cart. Sending the request is the storefront's
//! job; this module only guarantees the payload matches the cart exactly.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::cart::{CartLineItem, CartState};

/// Maximum number of metadata entries a payment link accepts.
pub const MAX_METADATA_ENTRIES: usize = 50;

/// Maximum length of a single metadata value, in characters.
pub const MAX_METADATA_VALUE_LENGTH: usize = 500;

/// Errors building a checkout request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    /// There is nothing to pay for.
    #[error("cart is empty")]
    EmptyCart,
}

/// One purchasable line of a payment link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentLinkLineItem {
    /// Provider price reference (the line item's variant key).
    pub price: String,
    pub quantity: u32,
}

/// Request payload for creating a payment link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentLinkRequest {
    pub line_items: Vec<PaymentLinkLineItem>,
    /// `line_<n>` → human-readable description of line item `n`.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl PaymentLinkRequest {
    /// Build a request from the current cart, in cart order.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::EmptyCart`] if the cart has no line items.
    pub fn from_state(state: &CartState) -> Result<Self, CheckoutError> {
        if state.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let line_items = state
            .products
            .iter()
            .map(|item| PaymentLinkLineItem {
                price: item.variant_key.to_string(),
                quantity: item.quantity,
            })
            .collect();

        let metadata = state
            .products
            .iter()
            .take(MAX_METADATA_ENTRIES)
            .enumerate()
            .map(|(n, item)| (format!("line_{n}"), describe(item)))
            .collect();

        Ok(Self {
            line_items,
            metadata,
        })
    }

    /// Total number of units across all line items.
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.line_items
            .iter()
            .map(|line| u64::from(line.quantity))
            .sum()
    }
}

/// `"<product id>:<name> [size/color] x<qty> @ <unit price>"`, truncated.
fn describe(item: &CartLineItem) -> String {
    let attributes: Vec<&str> = [item.size.as_deref(), item.color.as_deref()]
        .into_iter()
        .flatten()
        .collect();

    let mut description = format!("{}:{}", item.product_id, item.name);
    if !attributes.is_empty() {
        description.push_str(&format!(" [{}]", attributes.join("/")));
    }
    description.push_str(&format!(" x{} @ {}", item.quantity, item.unit_price));

    if description.chars().count() > MAX_METADATA_VALUE_LENGTH {
        description = description.chars().take(MAX_METADATA_VALUE_LENGTH).collect();
    }
    description
}
