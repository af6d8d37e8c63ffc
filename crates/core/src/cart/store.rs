//! The cart store.

use tracing::{debug, warn};

use super::{CartError, CartLineItem, CartState, CartStorage};
use crate::checkout::PaymentLinkRequest;
use crate::types::VariantKey;

/// Authoritative cart for one session.
///
/// Construct one per session with [`CartStore::open`] and hand out references
/// to it; there is no global instance. Operations run to completion
/// synchronously and either change the cart and persist it, or leave it
/// untouched.
#[derive(Debug)]
pub struct CartStore<S> {
    state: CartState,
    storage: S,
    strict_first_insert: bool,
}

impl<S: CartStorage> CartStore<S> {
    /// Open a store, restoring the last persisted snapshot.
    ///
    /// A missing snapshot yields an empty cart. So does an unreadable one:
    /// the failure is logged and the session starts over.
    pub fn open(storage: S) -> Self {
        let state = match storage.load() {
            Ok(Some(state)) => {
                debug!(items = state.len(), "Restored cart snapshot");
                state
            }
            Ok(None) => CartState::new(),
            Err(e) => {
                warn!(error = %e, "Failed to restore cart snapshot, starting with an empty cart");
                CartState::new()
            }
        };

        Self::with_state(storage, state)
    }

    /// Wrap an existing state without reading or writing storage.
    pub const fn with_state(storage: S, state: CartState) -> Self {
        Self {
            state,
            storage,
            strict_first_insert: false,
        }
    }

    /// Also check a brand-new line item against its own stock ceiling.
    ///
    /// Off by default: only the merge path of [`add_to_cart`](Self::add_to_cart)
    /// is checked, and a first add above the ceiling is accepted as given.
    #[must_use]
    pub fn with_strict_first_insert(mut self, strict: bool) -> Self {
        self.strict_first_insert = strict;
        self
    }

    /// Add a line item, merging with an existing one for the same variant.
    ///
    /// On merge the quantities are summed and checked against the existing
    /// item's stock ceiling; the descriptive fields of the existing item are
    /// kept.
    ///
    /// # Errors
    ///
    /// - [`CartError::ZeroQuantity`] if `item.quantity` is 0
    /// - [`CartError::StockExceeded`] if the merged quantity would pass the
    ///   ceiling (or, in strict mode, if a new item starts above its own)
    ///
    /// The cart is unchanged when an error is returned.
    pub fn add_to_cart(&mut self, item: CartLineItem) -> Result<(), CartError> {
        if item.quantity == 0 {
            return Err(CartError::ZeroQuantity {
                variant_key: item.variant_key,
            });
        }

        if let Some(existing) = self
            .state
            .products
            .iter_mut()
            .find(|existing| existing.variant_key == item.variant_key)
        {
            let ceiling = existing.stock_ceiling;
            let Some(merged) = existing
                .quantity
                .checked_add(item.quantity)
                .filter(|merged| *merged <= ceiling)
            else {
                debug!(
                    variant_key = %item.variant_key,
                    current = existing.quantity,
                    requested = item.quantity,
                    ceiling,
                    "Rejected add past stock ceiling"
                );
                return Err(CartError::StockExceeded {
                    variant_key: item.variant_key,
                    ceiling,
                });
            };
            existing.quantity = merged;
        } else {
            if self.strict_first_insert && item.quantity > item.stock_ceiling {
                return Err(CartError::StockExceeded {
                    ceiling: item.stock_ceiling,
                    variant_key: item.variant_key,
                });
            }
            debug!(variant_key = %item.variant_key, quantity = item.quantity, "Added line item");
            self.state.products.push(item);
        }

        self.persist();
        Ok(())
    }

    /// Remove a line item regardless of its quantity. Absent keys are ignored.
    pub fn remove_from_cart(&mut self, key: &VariantKey) {
        let before = self.state.products.len();
        self.state.products.retain(|item| &item.variant_key != key);

        if self.state.products.len() != before {
            self.persist();
        }
    }

    /// Raise a line item's quantity by one. Absent keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::StockExceeded`] if the item is already at its
    /// ceiling. The cart is unchanged and nothing is written, so callers that
    /// already disable the control at the ceiling can drop the signal.
    pub fn increase_quantity(&mut self, key: &VariantKey) -> Result<(), CartError> {
        let Some(item) = self
            .state
            .products
            .iter_mut()
            .find(|item| &item.variant_key == key)
        else {
            return Ok(());
        };

        if item.at_ceiling() {
            return Err(CartError::StockExceeded {
                variant_key: key.clone(),
                ceiling: item.stock_ceiling,
            });
        }

        item.quantity += 1;
        self.persist();
        Ok(())
    }

    /// Lower a line item's quantity by one, removing it instead of reaching
    /// zero. Absent keys are ignored.
    pub fn decrease_quantity(&mut self, key: &VariantKey) {
        let Some(pos) = self.state.position(key) else {
            return;
        };

        if let Some(item) = self.state.products.get_mut(pos) {
            if item.quantity <= 1 {
                self.state.products.remove(pos);
                debug!(variant_key = %key, "Removed line item at quantity 1");
            } else {
                item.quantity -= 1;
            }
            self.persist();
        }
    }

    /// Empty the cart and persist the empty snapshot.
    pub fn clear_cart(&mut self) {
        self.state.products.clear();
        self.persist();
    }

    /// Take the units covered by a completed checkout out of the cart.
    ///
    /// Each line of `request` lowers the matching line item by the quantity
    /// that was paid for, removing it once nothing is left. Items added or
    /// raised after the request was built stay in the cart. Returns the number
    /// of units left.
    pub fn settle_checkout(&mut self, request: &PaymentLinkRequest) -> u64 {
        let mut changed = false;

        for line in &request.line_items {
            let Some(pos) = self
                .state
                .products
                .iter()
                .position(|item| item.variant_key.as_str() == line.price)
            else {
                continue;
            };

            if let Some(item) = self.state.products.get_mut(pos) {
                changed = true;
                if item.quantity <= line.quantity {
                    self.state.products.remove(pos);
                } else {
                    item.quantity -= line.quantity;
                }
            }
        }

        if changed {
            self.persist();
        }

        let remaining = self.state.total_quantity();
        if remaining > 0 {
            debug!(remaining, "Kept units added during checkout");
        }
        remaining
    }

    /// Current cart state.
    #[must_use]
    pub const fn state(&self) -> &CartState {
        &self.state
    }

    /// Line items in display order.
    #[must_use]
    pub fn products(&self) -> &[CartLineItem] {
        &self.state.products
    }

    #[must_use]
    pub fn get(&self, key: &VariantKey) -> Option<&CartLineItem> {
        self.state.get(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    /// Sum of all quantities (cart badge count).
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.state.total_quantity()
    }

    /// The storage backend.
    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    fn persist(&self) {
        if let Err(e) = self.storage.save(&self.state) {
            warn!(
                error = %e,
                items = self.state.len(),
                "Failed to persist cart snapshot; keeping in-memory state"
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::cart::MemoryStorage;
    use crate::types::ProductId;

    fn key(s: &str) -> VariantKey {
        VariantKey::parse(s).unwrap()
    }

    fn item(k: &str, quantity: u32, ceiling: u32) -> CartLineItem {
        CartLineItem::new(
            key(k),
            ProductId::new(7),
            format!("Item {k}"),
            Decimal::new(10, 0),
            "https://cdn.example.com/item.jpg",
            quantity,
            ceiling,
        )
    }

    fn quantity_of(store: &CartStore<MemoryStorage>, k: &str) -> Option<u32> {
        store.get(&key(k)).map(|i| i.quantity)
    }

    #[test]
    fn test_repeat_adds_merge_into_one_line_item() {
        let mut store = CartStore::open(MemoryStorage::new());

        for quantity in [1, 2, 3] {
            store.add_to_cart(item("A", quantity, 10)).unwrap();
        }
        store.add_to_cart(item("B", 1, 10)).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(quantity_of(&store, "A"), Some(6));
        assert_eq!(
            store.products().iter().filter(|i| i.variant_key == key("A")).count(),
            1
        );
    }

    #[test]
    fn test_merge_keeps_existing_descriptive_fields() {
        let mut store = CartStore::open(MemoryStorage::new());
        store.add_to_cart(item("A", 1, 10).with_color("Sage")).unwrap();

        let mut renamed = item("A", 1, 10);
        renamed.name = "Renamed".to_string();
        store.add_to_cart(renamed).unwrap();

        let stored = store.get(&key("A")).unwrap();
        assert_eq!(stored.name, "Item A");
        assert_eq!(stored.color.as_deref(), Some("Sage"));
        assert_eq!(stored.quantity, 2);
    }

    #[test]
    fn test_merge_past_ceiling_is_rejected_without_side_effects() {
        let storage = MemoryStorage::new();
        let mut store = CartStore::open(storage.clone());
        store.add_to_cart(item("A", 3, 4)).unwrap();
        store.add_to_cart(item("B", 1, 1)).unwrap();

        let before = store.state().to_json().unwrap();
        let writes = storage.write_count();

        let err = store.add_to_cart(item("A", 2, 4)).unwrap_err();

        assert_eq!(
            err,
            CartError::StockExceeded {
                variant_key: key("A"),
                ceiling: 4,
            }
        );
        assert_eq!(store.state().to_json().unwrap(), before);
        assert_eq!(storage.write_count(), writes);
        assert_eq!(storage.raw().unwrap(), before);
    }

    #[test]
    fn test_merge_overflow_is_stock_exceeded() {
        let mut store = CartStore::open(MemoryStorage::new());
        store.add_to_cart(item("A", u32::MAX, u32::MAX)).unwrap();

        let err = store.add_to_cart(item("A", 1, u32::MAX)).unwrap_err();
        assert!(matches!(err, CartError::StockExceeded { ceiling, .. } if ceiling == u32::MAX));
    }

    #[test]
    fn test_zero_quantity_add_is_rejected() {
        let mut store = CartStore::open(MemoryStorage::new());
        let err = store.add_to_cart(item("A", 0, 5)).unwrap_err();

        assert!(matches!(err, CartError::ZeroQuantity { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn test_decrease_at_one_removes_item() {
        let mut store = CartStore::open(MemoryStorage::new());
        store.add_to_cart(item("A", 1, 5)).unwrap();
        store.add_to_cart(item("B", 2, 5)).unwrap();

        store.decrease_quantity(&key("A"));

        assert_eq!(store.len(), 1);
        assert!(store.get(&key("A")).is_none());
        assert_eq!(quantity_of(&store, "B"), Some(2));
    }

    #[test]
    fn test_increase_at_ceiling_is_a_no_op() {
        let storage = MemoryStorage::new();
        let mut store = CartStore::open(storage.clone());
        store.add_to_cart(item("A", 5, 5)).unwrap();

        let before = store.state().clone();
        let writes = storage.write_count();

        let result = store.increase_quantity(&key("A"));

        assert!(matches!(
            result,
            Err(CartError::StockExceeded { ceiling: 5, .. })
        ));
        assert_eq!(store.state(), &before);
        assert_eq!(storage.write_count(), writes);
    }

    #[test]
    fn test_absent_keys_are_ignored() {
        let storage = MemoryStorage::new();
        let mut store = CartStore::open(storage.clone());
        store.add_to_cart(item("A", 2, 5)).unwrap();
        let writes = storage.write_count();

        store.remove_from_cart(&key("Z"));
        store.decrease_quantity(&key("Z"));
        assert!(store.increase_quantity(&key("Z")).is_ok());

        assert_eq!(store.len(), 1);
        assert_eq!(storage.write_count(), writes);
    }

    #[test]
    fn test_remove_ignores_quantity() {
        let mut store = CartStore::open(MemoryStorage::new());
        store.add_to_cart(item("A", 4, 5)).unwrap();
        store.remove_from_cart(&key("A"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_every_mutation_persists() {
        let storage = MemoryStorage::new();
        let mut store = CartStore::open(storage.clone());

        store.add_to_cart(item("A", 1, 5)).unwrap();
        assert_eq!(storage.write_count(), 1);
        store.increase_quantity(&key("A")).unwrap();
        assert_eq!(storage.write_count(), 2);
        store.decrease_quantity(&key("A"));
        assert_eq!(storage.write_count(), 3);
        store.remove_from_cart(&key("A"));
        assert_eq!(storage.write_count(), 4);
        store.clear_cart();
        assert_eq!(storage.write_count(), 5);

        assert_eq!(storage.raw().as_deref(), Some("{\"products\":[]}"));
    }

    #[test]
    fn test_clear_persists_even_when_already_empty() {
        let storage = MemoryStorage::new();
        let mut store = CartStore::open(storage.clone());
        store.clear_cart();
        assert_eq!(storage.write_count(), 1);
    }

    #[test]
    fn test_failed_save_keeps_in_memory_state() {
        let storage = MemoryStorage::new();
        let mut store = CartStore::open(storage.clone());
        storage.set_fail_writes(true);

        store.add_to_cart(item("A", 2, 5)).unwrap();
        store.increase_quantity(&key("A")).unwrap();

        assert_eq!(quantity_of(&store, "A"), Some(3));
        assert!(storage.raw().is_none());
    }

    #[test]
    fn test_open_restores_snapshot() {
        let storage = MemoryStorage::new();
        {
            let mut store = CartStore::open(&storage);
            store.add_to_cart(item("A", 2, 5)).unwrap();
            store.add_to_cart(item("B", 1, 5).with_size("S")).unwrap();
        }

        let reopened = CartStore::open(&storage);
        let keys: Vec<_> = reopened
            .products()
            .iter()
            .map(|i| i.variant_key.as_str())
            .collect();
        assert_eq!(keys, ["A", "B"]);
        assert_eq!(reopened.get(&key("B")).unwrap().size.as_deref(), Some("S"));
    }

    #[test]
    fn test_open_with_corrupt_snapshot_starts_empty() {
        let store = CartStore::open(MemoryStorage::with_record("{\"products\":"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_add_increase_decrease_walkthrough() {
        let mut store = CartStore::open(MemoryStorage::new());

        store.add_to_cart(item("A", 2, 5)).unwrap();
        store.add_to_cart(item("A", 2, 5)).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(quantity_of(&store, "A"), Some(4));

        assert!(store.increase_quantity(&key("A")).is_ok());
        assert!(store.increase_quantity(&key("A")).is_err());
        assert_eq!(quantity_of(&store, "A"), Some(5));

        for expected in [Some(4), Some(3), Some(2), Some(1), None] {
            store.decrease_quantity(&key("A"));
            assert_eq!(quantity_of(&store, "A"), expected);
        }
        assert!(store.is_empty());
    }

    #[test]
    fn test_first_add_above_ceiling_is_accepted_by_default() {
        let mut store = CartStore::open(MemoryStorage::new());

        store.add_to_cart(item("B", 3, 2)).unwrap();
        assert_eq!(quantity_of(&store, "B"), Some(3));

        assert!(store.increase_quantity(&key("B")).is_err());
        assert_eq!(quantity_of(&store, "B"), Some(3));
    }

    #[test]
    fn test_strict_first_insert_rejects_over_ceiling() {
        let mut store = CartStore::open(MemoryStorage::new()).with_strict_first_insert(true);

        let err = store.add_to_cart(item("B", 3, 2)).unwrap_err();
        assert_eq!(
            err,
            CartError::StockExceeded {
                variant_key: key("B"),
                ceiling: 2,
            }
        );
        assert!(store.is_empty());

        store.add_to_cart(item("B", 2, 2)).unwrap();
        assert_eq!(quantity_of(&store, "B"), Some(2));
    }

    #[test]
    fn test_settle_checkout_empties_unchanged_cart() {
        let mut store = CartStore::open(MemoryStorage::new());
        store.add_to_cart(item("A", 2, 5)).unwrap();
        store.add_to_cart(item("B", 1, 5)).unwrap();
        let request = PaymentLinkRequest::from_state(store.state()).unwrap();

        assert_eq!(store.settle_checkout(&request), 0);
        assert!(store.is_empty());
        assert_eq!(store.storage().write_count(), 3);
    }

    #[test]
    fn test_settle_checkout_keeps_later_changes() {
        let mut store = CartStore::open(MemoryStorage::new());
        store.add_to_cart(item("A", 2, 5)).unwrap();
        store.add_to_cart(item("B", 1, 5)).unwrap();
        let request = PaymentLinkRequest::from_state(store.state()).unwrap();

        // Changes made while the payment link was being created.
        store.increase_quantity(&key("A")).unwrap();
        store.decrease_quantity(&key("B"));
        store.add_to_cart(item("C", 4, 5)).unwrap();

        assert_eq!(store.settle_checkout(&request), 5);
        assert_eq!(quantity_of(&store, "A"), Some(1));
        assert_eq!(quantity_of(&store, "B"), None);
        assert_eq!(quantity_of(&store, "C"), Some(4));
    }

    #[test]
    fn test_total_quantity() {
        let mut store = CartStore::open(MemoryStorage::new());
        store.add_to_cart(item("A", 2, 5)).unwrap();
        store.add_to_cart(item("B", 3, 5)).unwrap();
        assert_eq!(store.total_quantity(), 5);
    }
}
