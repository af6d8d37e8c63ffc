//! Shopping cart state and the store that mutates it.
//!
//! # Model
//!
//! A [`CartState`] is an ordered list of [`CartLineItem`]s keyed by
//! [`VariantKey`]. Insertion order is display order.
//!
//! The [`CartStore`] owns a state plus a [`CartStorage`] backend and is the
//! only way to mutate a cart. It keeps these invariants:
//!
//! - at most one line item per variant key (repeat adds merge quantities)
//! - a quantity never drops to zero (the line item is removed instead)
//! - a quantity is never raised past the line item's stock ceiling
//!
//! Every state-changing operation writes a snapshot through the storage
//! backend. Writes are best-effort: a failed write is logged and the in-memory
//! state stays authoritative for the session.
//!
//! # Example
//!
//! ```rust
//! use larkspur_core::cart::{CartLineItem, CartStore, MemoryStorage};
//! use larkspur_core::{ProductId, VariantKey};
//! use rust_decimal::Decimal;
//!
//! let mut store = CartStore::open(MemoryStorage::new());
//! let key = VariantKey::parse("price_tee_blue_m").unwrap();
//!
//! let item = CartLineItem::new(
//!     key.clone(),
//!     ProductId::new(1),
//!     "Linen Tee",
//!     Decimal::new(2400, 2),
//!     "https://cdn.example.com/tee.jpg",
//!     1,
//!     3,
//! );
//! store.add_to_cart(item).unwrap();
//! store.increase_quantity(&key).unwrap();
//!
//! assert_eq!(store.get(&key).map(|i| i.quantity), Some(2));
//! ```

mod storage;
mod store;

pub use storage::{CART_STORAGE_KEY, CartStorage, MemoryStorage, StorageError};
pub use store::CartStore;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{ProductId, VariantKey};

/// Largest unit price a line item may carry.
pub const MAX_UNIT_PRICE: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Largest quantity or stock ceiling a line item may carry.
pub const MAX_LINE_QUANTITY: u32 = 10_000;

/// Rejections produced by cart mutations.
///
/// None of these are failures of the process: the cart is left exactly as it
/// was and the caller is expected to tell the user why.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// The requested quantity would exceed the line item's stock ceiling.
    #[error("only {ceiling} available for {variant_key}")]
    StockExceeded {
        /// Line item that was rejected.
        variant_key: VariantKey,
        /// Maximum quantity allowed in the cart.
        ceiling: u32,
    },

    /// A line item was added with a quantity of zero.
    #[error("quantity for {variant_key} must be at least 1")]
    ZeroQuantity {
        /// Line item that was rejected.
        variant_key: VariantKey,
    },
}

impl CartError {
    /// Variant key the rejection refers to.
    #[must_use]
    pub const fn variant_key(&self) -> &VariantKey {
        match self {
            Self::StockExceeded { variant_key, .. } | Self::ZeroQuantity { variant_key } => {
                variant_key
            }
        }
    }
}

/// One cart entry: a single purchasable variant and its requested quantity.
///
/// Everything except `quantity` is a snapshot of the catalog taken when the
/// item was added and is never changed by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
    /// Dedup/merge key.
    pub variant_key: VariantKey,
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Decimal,
    pub image_url: String,
    pub quantity: u32,
    /// Maximum quantity allowed in the cart for this variant.
    pub stock_ceiling: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl CartLineItem {
    /// Create a line item without size or color attributes.
    #[must_use]
    pub fn new(
        variant_key: VariantKey,
        product_id: ProductId,
        name: impl Into<String>,
        unit_price: Decimal,
        image_url: impl Into<String>,
        quantity: u32,
        stock_ceiling: u32,
    ) -> Self {
        Self {
            variant_key,
            product_id,
            name: name.into(),
            unit_price,
            image_url: image_url.into(),
            quantity,
            stock_ceiling,
            size: None,
            color: None,
        }
    }

    /// Set the size attribute.
    #[must_use]
    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }

    /// Set the color attribute.
    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Whether the quantity has reached the stock ceiling.
    #[must_use]
    pub const fn at_ceiling(&self) -> bool {
        self.quantity >= self.stock_ceiling
    }

    /// `unit_price * quantity`, or `None` if it does not fit in a `Decimal`.
    #[must_use]
    pub fn line_total(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }

    /// Whether price, quantity and ceiling are all within the accepted range.
    #[must_use]
    pub fn within_bounds(&self) -> bool {
        !self.unit_price.is_sign_negative()
            && self.unit_price <= MAX_UNIT_PRICE
            && self.quantity <= MAX_LINE_QUANTITY
            && self.stock_ceiling <= MAX_LINE_QUANTITY
    }
}

/// The persisted cart: ordered line items, at most one per variant key.
///
/// Serialized as `{ "products": [...] }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartState {
    pub products: Vec<CartLineItem>,
}

impl CartState {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            products: Vec::new(),
        }
    }

    /// Look up a line item by variant key.
    #[must_use]
    pub fn get(&self, key: &VariantKey) -> Option<&CartLineItem> {
        self.products.iter().find(|item| &item.variant_key == key)
    }

    fn position(&self, key: &VariantKey) -> Option<usize> {
        self.products
            .iter()
            .position(|item| &item.variant_key == key)
    }

    /// Number of distinct line items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.products.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Sum of all line-item quantities.
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.products
            .iter()
            .map(|item| u64::from(item.quantity))
            .sum()
    }

    /// Sum of all line totals, or `None` on overflow.
    #[must_use]
    pub fn subtotal(&self) -> Option<Decimal> {
        self.products
            .iter()
            .try_fold(Decimal::ZERO, |sum, item| sum.checked_add(item.line_total()?))
    }

    /// Serialize to the snapshot JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Restore from a snapshot JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not a valid snapshot.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
