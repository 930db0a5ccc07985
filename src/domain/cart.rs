//! The pre-checkout cart.
//!
//! A cart holds menu items from exactly one restaurant. Adding an item from
//! another restaurant is reported as a [`CartConflict`] and leaves the cart
//! untouched; the caller decides whether to [`Cart::replace_with`] it.

use super::MenuItem;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A menu item and how many of it are in the cart (always at least one).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub menu_item: MenuItem,
    pub quantity: u32,
}

impl CartItem {
    /// Price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.menu_item.price * Decimal::from(self.quantity)
    }
}

/// What [`Cart::add`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// New line appended
    Added,
    /// Existing line's quantity increased
    Incremented,
    /// Cart emptied and restarted with the item's restaurant
    Replaced,
    /// Cross-restaurant add was not confirmed; cart unchanged
    Declined,
}

/// An add that would mix restaurants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartConflict {
    /// Restaurant the cart currently belongs to
    pub current_restaurant_id: String,
    /// Restaurant of the item being added
    pub incoming_restaurant_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The restaurant every line belongs to, `None` when empty.
    #[must_use]
    pub fn restaurant_id(&self) -> Option<&str> {
        self.items
            .first()
            .map(|line| line.menu_item.restaurant_id.as_str())
    }

    /// Quantity of a menu item, zero when absent.
    #[must_use]
    pub fn quantity_of(&self, menu_item_id: &str) -> u32 {
        self.items
            .iter()
            .find(|line| line.menu_item.id == menu_item_id)
            .map_or(0, |line| line.quantity)
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|line| line.quantity).sum()
    }

    /// Sum of line totals.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Returns the conflict an add of `item` would cause, if any.
    #[must_use]
    pub fn conflict_with(&self, item: &MenuItem) -> Option<CartConflict> {
        self.restaurant_id()
            .filter(|current| *current != item.restaurant_id)
            .map(|current| CartConflict {
                current_restaurant_id: current.to_string(),
                incoming_restaurant_id: item.restaurant_id.clone(),
            })
    }

    /// Adds `quantity` units of `item` (a zero quantity counts as one).
    ///
    /// Fails with the conflict, leaving the cart unchanged, when the item
    /// belongs to a different restaurant than the current lines.
    pub fn add(&mut self, item: MenuItem, quantity: u32) -> Result<AddOutcome, CartConflict> {
        if let Some(conflict) = self.conflict_with(&item) {
            return Err(conflict);
        }
        let quantity = quantity.max(1);
        if let Some(line) = self.items.iter_mut().find(|line| line.menu_item.id == item.id) {
            line.quantity = line.quantity.saturating_add(quantity);
            return Ok(AddOutcome::Incremented);
        }
        self.items.push(CartItem {
            menu_item: item,
            quantity,
        });
        Ok(AddOutcome::Added)
    }

    /// Discards every line and starts over with `item` alone.
    pub fn replace_with(&mut self, item: MenuItem, quantity: u32) {
        self.items.clear();
        self.items.push(CartItem {
            menu_item: item,
            quantity: quantity.max(1),
        });
    }

    /// Sets a line's quantity exactly; zero or less removes the line.
    /// Returns false when the item is not in the cart.
    pub fn update_quantity(&mut self, menu_item_id: &str, quantity: i64) -> bool {
        if quantity <= 0 {
            return self.remove(menu_item_id);
        }
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        match self
            .items
            .iter_mut()
            .find(|line| line.menu_item.id == menu_item_id)
        {
            Some(line) => {
                line.quantity = quantity;
                true
            }
            None => false,
        }
    }

    /// Removes a line. Returns false when the item is not in the cart.
    pub fn remove(&mut self, menu_item_id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|line| line.menu_item.id != menu_item_id);
        self.items.len() != before
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}
