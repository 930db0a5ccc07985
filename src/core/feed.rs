//! Realtime change feed for the orders table.
//!
//! The backend publishes every committed order insert and status update as
//! an [`OrderChange`] on a broadcast channel. Subscribers pick a
//! [`FeedScope`] and only see changes inside it. Dropping an [`OrderFeed`]
//! ends the subscription.

use crate::domain::OrderChange;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, warn};

/// Default number of changes buffered per subscriber before it lags.
pub const DEFAULT_FEED_CAPACITY: usize = 256;

/// Which orders a subscriber wants to hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedScope {
    /// A single order (customer tracking view)
    Order(String),
    /// Every order of a restaurant (owner dashboard)
    Restaurant(String),
}

impl FeedScope {
    #[must_use]
    pub fn matches(&self, change: &OrderChange) -> bool {
        match self {
            Self::Order(order_id) => change.order_id() == order_id,
            Self::Restaurant(restaurant_id) => change.restaurant_id() == restaurant_id,
        }
    }
}

/// Publishing side of the feed, owned by the backend adapter.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<OrderChange>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_FEED_CAPACITY)
    }
}

impl ChangeFeed {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes a committed change. Having no subscribers is not an error.
    pub fn publish(&self, change: OrderChange) {
        let order_id = change.order_id().to_string();
        match self.tx.send(change) {
            Ok(receivers) => debug!("Order {} change sent to {} subscriber(s)", order_id, receivers),
            Err(_) => debug!("Order {} changed with no subscribers", order_id),
        }
    }

    #[must_use]
    pub fn subscribe(&self, scope: FeedScope) -> OrderFeed {
        debug!("New order feed subscription: {:?}", scope);
        OrderFeed {
            rx: self.tx.subscribe(),
            scope,
        }
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Receiving side of one subscription.
#[derive(Debug)]
pub struct OrderFeed {
    rx: broadcast::Receiver<OrderChange>,
    scope: FeedScope,
}

impl OrderFeed {
    #[must_use]
    pub const fn scope(&self) -> &FeedScope {
        &self.scope
    }

    /// Waits for the next change in scope. Returns `None` once the backend
    /// side has gone away.
    pub async fn recv(&mut self) -> Option<OrderChange> {
        loop {
            match self.rx.recv().await {
                Ok(change) if self.scope.matches(&change) => return Some(change),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Order feed {:?} lagged, {} change(s) dropped", self.scope, skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next buffered change in scope without waiting.
    pub fn try_recv(&mut self) -> Option<OrderChange> {
        loop {
            match self.rx.try_recv() {
                Ok(change) if self.scope.matches(&change) => return Some(change),
                Ok(_) => {}
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("Order feed {:?} lagged, {} change(s) dropped", self.scope, skipped);
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderStatus, OrderStatusChanged};

    fn status_change(order_id: &str, restaurant_id: &str, status: OrderStatus) -> OrderChange {
        OrderChange::StatusChanged(OrderStatusChanged {
            order_id: order_id.to_string(),
            restaurant_id: restaurant_id.to_string(),
            status,
        })
    }

    #[tokio::test]
    async fn test_scoped_feeds_filter_changes() {
        let feed = ChangeFeed::default();
        let mut one_order = feed.subscribe(FeedScope::Order("o1".to_string()));
        let mut restaurant = feed.subscribe(FeedScope::Restaurant("rest1".to_string()));

        feed.publish(status_change("o2", "rest1", OrderStatus::Preparing));
        feed.publish(status_change("o1", "rest1", OrderStatus::Ready));
        feed.publish(status_change("o3", "rest2", OrderStatus::Ready));

        assert_eq!(one_order.recv().await.map(|c| c.order_id().to_string()), Some("o1".to_string()));
        assert!(one_order.try_recv().is_none());

        assert_eq!(restaurant.try_recv().map(|c| c.order_id().to_string()), Some("o2".to_string()));
        assert_eq!(restaurant.try_recv().map(|c| c.order_id().to_string()), Some("o1".to_string()));
        assert!(restaurant.try_recv().is_none());
    }

    #[test]
    fn test_dropping_feed_unsubscribes() {
        let feed = ChangeFeed::default();
        let sub = feed.subscribe(FeedScope::Order("o1".to_string()));
        assert_eq!(feed.subscriber_count(), 1);
        drop(sub);
        assert_eq!(feed.subscriber_count(), 0);
        // Publishing with nobody listening is fine
        feed.publish(status_change("o1", "rest1", OrderStatus::Ready));
    }

    #[tokio::test]
    async fn test_recv_returns_none_when_backend_is_gone() {
        let feed = ChangeFeed::default();
        let mut sub = feed.subscribe(FeedScope::Restaurant("rest1".to_string()));
        drop(feed);
        assert!(sub.recv().await.is_none());
    }
}
