//! Order summary shown next to the cart.
//!
//! Subtotal, estimated tax, and estimated shipping are display values derived
//! from the cart on every render. Rates come from [`PricingConfig`].

use larkspur_core::{CartState, Price};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::config::PricingConfig;

/// A cart total that does not fit in a `Decimal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cart total is out of range")]
pub struct TotalOverflow;

/// Totals for a cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSummary {
    pub subtotal: Price,
    pub estimated_tax: Price,
    /// Zero when shipping is free.
    pub estimated_shipping: Price,
    pub total: Price,
    /// How much more qualifies for free shipping, if anything.
    pub free_shipping_remaining: Option<Price>,
}

impl OrderSummary {
    /// Compute the summary for `state`.
    ///
    /// An empty cart has no shipping charge. Shipping is free once the
    /// subtotal reaches the threshold.
    ///
    /// # Errors
    ///
    /// Returns [`TotalOverflow`] if any line total, the tax, or the grand
    /// total overflows.
    pub fn compute(state: &CartState, pricing: &PricingConfig) -> Result<Self, TotalOverflow> {
        let currency = pricing.currency;
        let price = |amount: Decimal| Price::new(amount, currency);

        let subtotal = state.subtotal().ok_or(TotalOverflow)?;
        let estimated_tax = subtotal.checked_mul(pricing.tax_rate).ok_or(TotalOverflow)?;
        let free_shipping = subtotal >= pricing.free_shipping_threshold;
        let estimated_shipping = if state.is_empty() || free_shipping {
            Decimal::ZERO
        } else {
            pricing.flat_shipping
        };
        let free_shipping_remaining = (!state.is_empty() && !free_shipping)
            .then(|| price(pricing.free_shipping_threshold - subtotal));
        let total = subtotal
            .checked_add(estimated_tax)
            .and_then(|sum| sum.checked_add(estimated_shipping))
            .ok_or(TotalOverflow)?;

        Ok(Self {
            subtotal: price(subtotal),
            estimated_tax: price(estimated_tax),
            estimated_shipping: price(estimated_shipping),
            total: price(total),
            free_shipping_remaining,
        })
    }

    /// Summary of an empty cart.
    #[must_use]
    pub fn empty(pricing: &PricingConfig) -> Self {
        let zero = Price::new(Decimal::ZERO, pricing.currency);
        Self {
            subtotal: zero,
            estimated_tax: zero,
            estimated_shipping: zero,
            total: zero,
            free_shipping_remaining: None,
        }
    }

    /// Formatted strings for rendering.
    #[must_use]
    pub fn view(&self) -> SummaryView {
        SummaryView {
            subtotal: self.subtotal.display(),
            estimated_tax: self.estimated_tax.display(),
            estimated_shipping: if self.estimated_shipping.amount.is_zero() {
                "FREE".to_string()
            } else {
                self.estimated_shipping.display()
            },
            total: self.total.display(),
            free_shipping_hint: self
                .free_shipping_remaining
                .map(|remaining| format!("Add {} more for free shipping!", remaining.display())),
        }
    }
}

/// Order summary display data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryView {
    pub subtotal: String,
    pub estimated_tax: String,
    pub estimated_shipping: String,
    pub total: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_shipping_hint: Option<String>,
}
