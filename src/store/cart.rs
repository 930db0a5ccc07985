//! Cart operations of the store.
//!
//! Any change to the cart contents forgets the pending order id, so a
//! retried checkout of a different cart is never mistaken for the earlier one.

use super::Store;
use crate::domain::{AddOutcome, CartConflict, MenuItem};
use rust_decimal::Decimal;
use tracing::debug;

impl Store {
    /// Adds `quantity` of `item` (at least one).
    ///
    /// When the cart holds another restaurant's items, `confirm` is asked
    /// whether to start over with this item. Declining leaves the cart as it was.
    pub fn add_to_cart(
        &self,
        item: MenuItem,
        quantity: u32,
        confirm: impl FnOnce(&CartConflict) -> bool,
    ) -> AddOutcome {
        let added = self.write().cart.add(item.clone(), quantity);
        let conflict = match added {
            Ok(outcome) => {
                self.cart_changed();
                return outcome;
            }
            Err(conflict) => conflict,
        };

        // The lock is released while the user decides
        if !confirm(&conflict) {
            debug!(
                "Kept cart for restaurant {} instead of {}",
                conflict.current_restaurant_id, conflict.incoming_restaurant_id
            );
            return AddOutcome::Declined;
        }
        self.write().cart.replace_with(item, quantity);
        self.cart_changed();
        AddOutcome::Replaced
    }

    /// Sets a line's quantity exactly; zero or less removes it. Returns
    /// whether the item was in the cart.
    pub fn update_quantity(&self, menu_item_id: &str, quantity: i64) -> bool {
        let (found, changed) = {
            let mut state = self.write();
            let before = state.cart.quantity_of(menu_item_id);
            let found = state.cart.update_quantity(menu_item_id, quantity);
            (found, state.cart.quantity_of(menu_item_id) != before)
        };
        if changed {
            self.cart_changed();
        }
        found
    }

    pub fn remove_from_cart(&self, menu_item_id: &str) -> bool {
        let removed = self.write().cart.remove(menu_item_id);
        if removed {
            self.cart_changed();
        }
        removed
    }

    pub fn clear_cart(&self) {
        self.write().cart.clear();
        self.cart_changed();
    }

    #[must_use]
    pub fn cart_subtotal(&self) -> Decimal {
        self.read().cart.subtotal()
    }

    /// Total number of units in the cart.
    #[must_use]
    pub fn cart_item_count(&self) -> u32 {
        self.read().cart.item_count()
    }

    fn cart_changed(&self) {
        self.write().pending_order_id = None;
    }
}
