//! Order lifecycle: checkout, status updates and merging server changes.
//!
//! Local writes and realtime events go through [`Store::apply_change`], so
//! whichever arrives last wins.

use super::{Resource, Store};
use crate::{
    domain::{
        Order, OrderChange, OrderDraft, OrderStatus, OrderStatusChanged, PaymentKind, Role, new_id,
    },
    errors::{Error, Result},
};
use tracing::{debug, info};

impl Store {
    /// Fetches the orders visible to the signed-in user, newest first.
    pub async fn load_orders(&self) -> Vec<Order> {
        let Some(user) = self.require_user("Loading orders") else {
            return Vec::new();
        };
        let _loading = self.start_loading(Resource::Orders);
        match self.backend.list_orders(&user.id, user.role).await {
            Ok(orders) => {
                let mut state = self.write();
                // A response for a user who has signed out since is dropped
                if state.session.as_ref().map(|s| s.user.id.as_str()) == Some(user.id.as_str()) {
                    state.orders.clone_from(&orders);
                }
                orders
            }
            Err(e) => {
                self.report("Loading orders", &e);
                Vec::new()
            }
        }
    }

    /// Checks out the cart at the selected restaurant.
    ///
    /// On success the order is cached and the cart cleared. On failure the
    /// cart is kept and a retry reuses the same order id, so a submit that
    /// reached the backend before failing is not placed twice.
    pub async fn place_order(&self, payment_method: PaymentKind) -> Option<Order> {
        let draft = match self.begin_checkout(payment_method) {
            Ok(draft) => draft,
            Err(e) => {
                self.report("Placing order", &e);
                return None;
            }
        };
        let _placing = PlacingGuard { store: self };
        let _loading = self.start_loading(Resource::Orders);

        match self.backend.place_order(&draft).await {
            Ok(order) => {
                {
                    let mut state = self.write();
                    state.cart.clear();
                    state.pending_order_id = None;
                }
                self.apply_change(&OrderChange::Placed(Box::new(order.clone())));
                self.announce(format!("Order placed at {}", order.restaurant_name));
                Some(order)
            }
            Err(e) => {
                self.report("Placing order", &e);
                None
            }
        }
    }

    /// Builds the draft from the cart and marks a checkout as in flight.
    fn begin_checkout(&self, payment_method: PaymentKind) -> Result<OrderDraft> {
        let mut state = self.write();
        if state.placing {
            return Err(Error::OrderInFlight);
        }
        let user = state
            .session
            .as_ref()
            .map(|s| s.user.clone())
            .ok_or(Error::Unauthorized)?;
        if state.cart.is_empty() {
            return Err(Error::EmptyCart);
        }
        let restaurant_id = state
            .selected_restaurant
            .clone()
            .ok_or(Error::NoRestaurantSelected)?;
        if state.cart.restaurant_id() != Some(restaurant_id.as_str()) {
            return Err(Error::validation(
                "restaurant_id",
                "the cart belongs to a different restaurant than the one selected",
            ));
        }
        let restaurant_name = state
            .restaurants
            .iter()
            .find(|r| r.id == restaurant_id)
            .map(|r| r.name.clone())
            .unwrap_or_default();

        let id = state.pending_order_id.get_or_insert_with(new_id).clone();
        let draft = OrderDraft {
            id,
            user_id: user.id,
            restaurant_id,
            restaurant_name,
            items: state.cart.items().to_vec(),
            payment_method,
        };
        draft.validate()?;
        state.placing = true;
        Ok(draft)
    }

    /// Whether a checkout is waiting for the backend.
    #[must_use]
    pub fn is_placing_order(&self) -> bool {
        self.read().placing
    }

    /// Moves one of the owner's orders to `status`.
    ///
    /// Requesting the status the order already has succeeds without a write.
    /// Backward moves, and cancelling once preparation started, are refused.
    pub async fn advance_status(&self, order_id: &str, status: OrderStatus) -> bool {
        let current = match self.check_advance(order_id) {
            Ok(current) => current,
            Err(e) => {
                self.report("Updating order", &e);
                return false;
            }
        };
        if current.status == status {
            debug!("Order {} already {}", order_id, status);
            return true;
        }
        if !current.status.can_transition_to(status) {
            let e = Error::InvalidTransition {
                from: current.status,
                to: status,
            };
            self.report("Updating order", &e);
            return false;
        }

        match self.backend.set_order_status(order_id, status).await {
            Ok(_) => {
                self.apply_change(&OrderChange::StatusChanged(OrderStatusChanged {
                    order_id: order_id.to_string(),
                    restaurant_id: current.restaurant_id,
                    status,
                }));
                true
            }
            Err(e) => {
                self.report("Updating order", &e);
                false
            }
        }
    }

    fn check_advance(&self, order_id: &str) -> Result<Order> {
        let state = self.read();
        let user = state
            .session
            .as_ref()
            .map(|s| &s.user)
            .ok_or(Error::Unauthorized)?;
        let order = state
            .orders
            .iter()
            .find(|o| o.id == order_id)
            .ok_or_else(|| Error::not_found("order", order_id))?;
        if !user.owns(&order.restaurant_id) {
            return Err(Error::Unauthorized);
        }
        Ok(order.clone())
    }

    /// Merges one order change into the cache.
    ///
    /// Status changes for orders that are not cached are ignored. A placed
    /// order is added when it belongs to the signed-in customer or to the
    /// signed-in owner's restaurant. Returns whether anything changed.
    pub fn apply_change(&self, change: &OrderChange) -> bool {
        let changed = {
            let mut state = self.write();
            match change {
                OrderChange::Placed(order) => {
                    let visible = state.session.as_ref().is_some_and(|s| match s.user.role {
                        Role::Customer => s.user.id == order.user_id,
                        Role::RestaurantOwner => s.user.owns(&order.restaurant_id),
                    });
                    if let Some(cached) = state.orders.iter_mut().find(|o| o.id == order.id) {
                        let changed = **order != *cached;
                        cached.clone_from(order);
                        changed
                    } else if visible {
                        state.orders.insert(0, (**order).clone());
                        true
                    } else {
                        false
                    }
                }
                OrderChange::StatusChanged(update) => {
                    match state.orders.iter_mut().find(|o| o.id == update.order_id) {
                        Some(order) if order.status != update.status => {
                            order.status = update.status;
                            true
                        }
                        _ => false,
                    }
                }
            }
        };
        if changed {
            info!("Order {} is now {}", change.order_id(), self.order_status(change.order_id()));
        }

        let terminal = match change {
            OrderChange::Placed(order) => order.status.is_terminal(),
            OrderChange::StatusChanged(update) => update.status.is_terminal(),
        };
        if terminal {
            self.stop_watching_order(change.order_id());
        }
        changed
    }

    fn order_status(&self, order_id: &str) -> String {
        self.order(order_id)
            .map_or_else(|| "unknown".to_string(), |o| o.status.to_string())
    }
}

/// Clears the in-flight checkout flag when the checkout ends or is abandoned.
struct PlacingGuard<'a> {
    store: &'a Store,
}

impl Drop for PlacingGuard<'_> {
    fn drop(&mut self) {
        self.store.write().placing = false;
    }
}
