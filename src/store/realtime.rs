//! Realtime order subscription of the store.
//!
//! The store holds at most one subscription. Replacing it, calling
//! [`Store::unwatch`], or the watched order reaching a terminal status drops
//! the underlying feed, which ends the subscription on the backend side.

use super::{OrderWatch, Store};
use crate::{
    core::{FeedScope, OrderFeed},
    domain::OrderChange,
    errors::Error,
};
use tracing::{debug, info};

impl Store {
    /// Follows a single order (customer tracking view). Orders that are not
    /// cached or already finished are not watched.
    pub fn watch_order(&self, order_id: &str) -> bool {
        match self.order(order_id) {
            Some(order) if !order.status.is_terminal() => {
                self.replace_watch(Some(FeedScope::Order(order.id)));
                true
            }
            Some(_) => false,
            None => {
                self.report("Tracking order", &Error::not_found("order", order_id));
                false
            }
        }
    }

    /// Follows every order of the signed-in owner's restaurant (dashboard).
    pub fn watch_restaurant(&self) -> bool {
        let Some(user) = self.require_user("Opening dashboard") else {
            return false;
        };
        let Some(restaurant_id) = user.restaurant_id.clone().filter(|id| user.owns(id)) else {
            self.report("Opening dashboard", &Error::Unauthorized);
            return false;
        };
        self.replace_watch(Some(FeedScope::Restaurant(restaurant_id)));
        true
    }

    /// Drops the current subscription, if any.
    pub fn unwatch(&self) {
        self.replace_watch(None);
    }

    #[must_use]
    pub fn watched_scope(&self) -> Option<FeedScope> {
        self.watch_slot().scope.clone()
    }

    /// Applies every change already delivered to the subscription without
    /// waiting. Returns how many were received.
    pub fn sync_realtime(&self) -> usize {
        let changes: Vec<OrderChange> = {
            let mut slot = self.watch_slot();
            let Some(feed) = slot.feed.as_mut() else {
                return 0;
            };
            std::iter::from_fn(|| feed.try_recv()).collect()
        };
        for change in &changes {
            self.apply_change(change);
        }
        changes.len()
    }

    /// Waits for the next change on the subscription and applies it.
    ///
    /// Returns `None` when nothing is watched or the backend went away.
    /// Safe to cancel: an abandoned wait hands the subscription back.
    pub async fn next_change(&self) -> Option<OrderChange> {
        let mut lease = {
            let mut slot = self.watch_slot();
            FeedLease {
                store: self,
                feed: Some(slot.feed.take()?),
                epoch: slot.epoch,
            }
        };
        let change = match lease.feed.as_mut() {
            Some(feed) => feed.recv().await,
            None => None,
        };
        if change.is_none() {
            info!("Order feed closed");
            lease.feed = None;
        }
        drop(lease);

        let change = change?;
        self.apply_change(&change);
        Some(change)
    }

    /// Called whenever an order reaches a terminal status.
    pub(super) fn stop_watching_order(&self, order_id: &str) {
        let watched = matches!(
            &self.watch_slot().scope,
            Some(FeedScope::Order(id)) if id == order_id
        );
        if watched {
            debug!("Order {} finished, ending its subscription", order_id);
            self.unwatch();
        }
    }

    fn replace_watch(&self, scope: Option<FeedScope>) {
        let feed = scope.clone().map(|scope| self.backend.subscribe(scope));
        let mut slot = self.watch_slot();
        if let Some(previous) = &slot.scope {
            debug!("Ending order subscription {:?}", previous);
        }
        *slot = OrderWatch {
            scope,
            feed,
            epoch: slot.epoch.wrapping_add(1),
        };
    }
}

/// A feed taken out of the slot while waiting on it. Dropping the lease puts
/// the feed back unless the subscription was replaced in the meantime.
struct FeedLease<'a> {
    store: &'a Store,
    feed: Option<OrderFeed>,
    epoch: u64,
}

impl Drop for FeedLease<'_> {
    fn drop(&mut self) {
        let mut slot = self.store.watch_slot();
        match self.feed.take() {
            Some(feed) if slot.epoch == self.epoch && slot.feed.is_none() => {
                slot.feed = Some(feed);
            }
            Some(_) => {}
            None if slot.epoch == self.epoch => {
                slot.scope = None;
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{
        core::SeaOrmBackend,
        domain::{OrderStatus, PaymentKind},
        errors::Result,
        test_utils::*,
    };
    use std::{sync::Arc, time::Duration};

    struct Setup {
        fixture: OrderFixture,
        backend: Arc<SeaOrmBackend>,
        customer: Store,
        owner: Store,
    }

    async fn setup() -> Result<Setup> {
        let fixture = OrderFixture::new().await?;
        let backend = Arc::new(SeaOrmBackend::new(fixture.db.clone()));
        let customer = Store::new(backend.clone());
        customer.sign_in(CUSTOMER_EMAIL, TEST_PASSWORD, false).await;
        customer.load_restaurants().await;
        customer.select_restaurant(&fixture.restaurant.id).await;
        let owner = Store::new(backend.clone());
        owner.sign_in(OWNER_EMAIL, TEST_PASSWORD, false).await;
        Ok(Setup {
            fixture,
            backend,
            customer,
            owner,
        })
    }

    async fn place(s: &Setup) -> String {
        s.customer.add_to_cart(s.fixture.burger.clone(), 1, |_| true);
        s.customer.place_order(PaymentKind::Cash).await.unwrap().id
    }

    #[tokio::test]
    async fn test_customer_sees_owner_updates() -> Result<()> {
        let s = setup().await?;
        let order_id = place(&s).await;
        assert!(s.customer.watch_order(&order_id));
        s.owner.load_orders().await;

        s.owner.advance_status(&order_id, OrderStatus::Preparing).await;
        s.owner.advance_status(&order_id, OrderStatus::Ready).await;

        assert_eq!(s.customer.sync_realtime(), 2);
        assert_eq!(s.customer.order(&order_id).map(|o| o.status), Some(OrderStatus::Ready));
        assert_eq!(s.customer.sync_realtime(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_subscription_ends_when_order_finishes() -> Result<()> {
        let s = setup().await?;
        let order_id = place(&s).await;
        assert!(s.customer.watch_order(&order_id));
        assert_eq!(s.backend.feed().subscriber_count(), 1);
        s.owner.load_orders().await;

        s.owner.advance_status(&order_id, OrderStatus::Completed).await;
        let change = s.customer.next_change().await.unwrap();
        assert_eq!(change.order_id(), order_id);

        assert!(s.customer.watched_scope().is_none());
        assert_eq!(s.backend.feed().subscriber_count(), 0);
        assert!(!s.customer.watch_order(&order_id));
        Ok(())
    }

    #[tokio::test]
    async fn test_dashboard_receives_new_orders() -> Result<()> {
        let s = setup().await?;
        assert!(s.owner.watch_restaurant());
        assert_eq!(
            s.owner.watched_scope(),
            Some(FeedScope::Restaurant(s.fixture.restaurant.id.clone()))
        );

        let order_id = place(&s).await;
        assert_eq!(s.owner.sync_realtime(), 1);
        assert_eq!(s.owner.order(&order_id).map(|o| o.status), Some(OrderStatus::Pending));
        assert_eq!(s.owner.active_orders().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_customers_have_no_dashboard() -> Result<()> {
        let s = setup().await?;
        assert!(!s.customer.watch_restaurant());
        assert!(s.customer.watched_scope().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_unwatch_and_sign_out_drop_the_subscription() -> Result<()> {
        let s = setup().await?;
        assert!(s.owner.watch_restaurant());
        s.owner.unwatch();
        assert_eq!(s.backend.feed().subscriber_count(), 0);
        assert!(s.owner.next_change().await.is_none());

        assert!(s.owner.watch_restaurant());
        s.owner.sign_out().await;
        assert_eq!(s.backend.feed().subscriber_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_abandoned_wait_keeps_the_subscription() -> Result<()> {
        let s = setup().await?;
        assert!(s.owner.watch_restaurant());

        let waited = tokio::time::timeout(Duration::from_millis(20), s.owner.next_change()).await;
        assert!(waited.is_err());
        assert!(s.owner.watched_scope().is_some());

        let order_id = place(&s).await;
        let change = s.owner.next_change().await.unwrap();
        assert_eq!(change.order_id(), order_id);
        Ok(())
    }
}
