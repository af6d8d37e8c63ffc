//! Core types for Larkspur.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod price;
pub mod variant_key;

pub use id::*;
pub use price::{CurrencyCode, Price};
pub use variant_key::{VariantKey, VariantKeyError};
