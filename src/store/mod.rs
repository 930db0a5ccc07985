//! Domain state container.
//!
//! [`Store`] is the per-session source of truth for the signed-in user, the
//! cart, the selected restaurant, cached restaurants, categories, menu
//! items, payment methods and orders. Views read snapshots and call its
//! operations; only the store talks to [`DataAccess`].
//!
//! Operations never return backend errors to the caller. A failed request
//! leaves a neutral value (empty list, `None`, `false`) and queues a
//! [`Notice`] the view can show as a toast.
//!
//! State sits behind a lock that is never held across an `.await`, so
//! requests, realtime events and user actions interleave freely and are
//! applied in the order they complete.

mod cart;
mod menu;
mod orders;
mod realtime;
mod session;

use crate::{
    core::{DataAccess, FeedScope, OrderFeed},
    domain::{
        Cart, Category, MenuItem, Order, OrderStatus, PaymentMethod, Restaurant, Session, User,
    },
    errors::Error,
    geo::{self, Coordinates},
    storage::{LocalStore, SavedLocation},
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{info, warn};

/// Kinds of cached resource that have a loading flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// The restaurant list
    Restaurants,
    /// Categories of a restaurant
    Categories,
    /// Menu items of a restaurant
    MenuItems,
    /// The signed-in user's orders
    Orders,
}

/// Which resource kinds have a request in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadingFlags {
    /// Restaurants are being fetched
    pub restaurants: bool,
    /// Categories are being fetched
    pub categories: bool,
    /// Menu items are being fetched
    pub menu_items: bool,
    /// Orders are being fetched or an order is being placed
    pub orders: bool,
}

impl LoadingFlags {
    fn set(&mut self, resource: Resource, value: bool) {
        match resource {
            Resource::Restaurants => self.restaurants = value,
            Resource::Categories => self.categories = value,
            Resource::MenuItems => self.menu_items = value,
            Resource::Orders => self.orders = value,
        }
    }
}

/// Severity of a [`Notice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// An action went through
    Success,
    /// A request or validation failed
    Error,
}

/// A transient user-visible message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Success or error
    pub level: NoticeLevel,
    /// Text to show the user
    pub message: String,
}

#[derive(Debug, Default)]
struct State {
    session: Option<Session>,
    cart: Cart,
    selected_restaurant: Option<String>,
    restaurants: Vec<Restaurant>,
    categories: Vec<Category>,
    menu_items: Vec<MenuItem>,
    payment_methods: Vec<PaymentMethod>,
    /// Newest first
    orders: Vec<Order>,
    loading: LoadingFlags,
    notices: Vec<Notice>,
    /// Id reused for every submit of the current cart until one succeeds
    pending_order_id: Option<String>,
    placing: bool,
}

/// The live realtime subscription, if any.
#[derive(Debug, Default)]
struct OrderWatch {
    scope: Option<FeedScope>,
    feed: Option<OrderFeed>,
    /// Bumped whenever the subscription is replaced or dropped
    epoch: u64,
}

/// Per-session domain state. See the module docs.
pub struct Store {
    backend: Arc<dyn DataAccess>,
    local: Option<LocalStore>,
    state: RwLock<State>,
    watch: Mutex<OrderWatch>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("local", &self.local)
            .field("state", &self.state)
            .field("watch", &self.watch)
            .finish_non_exhaustive()
    }
}

impl Store {
    /// Creates an empty, signed-out store over `backend`.
    #[must_use]
    pub fn new(backend: Arc<dyn DataAccess>) -> Self {
        Self {
            backend,
            local: None,
            state: RwLock::new(State::default()),
            watch: Mutex::new(OrderWatch::default()),
        }
    }

    /// Persists the remember-me flag and the user location in `local`.
    #[must_use]
    pub fn with_local_store(mut self, local: LocalStore) -> Self {
        self.local = Some(local);
        self
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn watch_slot(&self) -> MutexGuard<'_, OrderWatch> {
        self.watch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks `resource` as loading until the returned guard is dropped.
    fn start_loading(&self, resource: Resource) -> LoadingGuard<'_> {
        self.write().loading.set(resource, true);
        LoadingGuard {
            store: self,
            resource,
        }
    }

    /// Logs a failed request and queues it as an error notice.
    fn report(&self, action: &str, err: &Error) {
        warn!("{} failed: {}", action, err);
        self.write().notices.push(Notice {
            level: NoticeLevel::Error,
            message: format!("{action} failed: {err}"),
        });
    }

    fn announce(&self, message: impl Into<String>) {
        let message = message.into();
        info!("{}", message);
        self.write().notices.push(Notice {
            level: NoticeLevel::Success,
            message,
        });
    }

    /// Returns and clears the queued notices.
    pub fn take_notices(&self) -> Vec<Notice> {
        std::mem::take(&mut self.write().notices)
    }

    #[must_use]
    pub fn loading(&self) -> LoadingFlags {
        self.read().loading
    }

    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        self.read().session.as_ref().map(|s| s.user.clone())
    }

    #[must_use]
    pub fn cart(&self) -> Cart {
        self.read().cart.clone()
    }

    #[must_use]
    pub fn selected_restaurant(&self) -> Option<Restaurant> {
        let state = self.read();
        let id = state.selected_restaurant.as_deref()?;
        state.restaurants.iter().find(|r| r.id == id).cloned()
    }

    #[must_use]
    pub fn restaurants(&self) -> Vec<Restaurant> {
        self.read().restaurants.clone()
    }

    #[must_use]
    pub fn restaurant(&self, id: &str) -> Option<Restaurant> {
        self.read().restaurants.iter().find(|r| r.id == id).cloned()
    }

    /// Cached restaurants within `radius_km` of `from`, nearest first.
    #[must_use]
    pub fn nearby_restaurants(&self, from: Coordinates, radius_km: f64) -> Vec<(Restaurant, f64)> {
        let mut nearby: Vec<(Restaurant, f64)> = self
            .read()
            .restaurants
            .iter()
            .map(|r| (r.clone(), geo::distance_km(from, r.location)))
            .filter(|(_, distance)| *distance <= radius_km)
            .collect();
        nearby.sort_by(|a, b| a.1.total_cmp(&b.1));
        nearby
    }

    /// Last known user location from local storage.
    #[must_use]
    pub fn user_location(&self) -> Option<SavedLocation> {
        self.local.as_ref()?.user_location()
    }

    pub fn set_user_location(&self, location: &SavedLocation) -> bool {
        let Some(local) = &self.local else {
            return false;
        };
        match local.set_user_location(location) {
            Ok(()) => true,
            Err(e) => {
                self.report("Saving location", &e);
                false
            }
        }
    }

    /// [`Self::nearby_restaurants`] around the saved user location; empty
    /// when no location is known.
    #[must_use]
    pub fn restaurants_near_user(&self, radius_km: f64) -> Vec<(Restaurant, f64)> {
        self.user_location()
            .map(|location| self.nearby_restaurants(location.coordinates(), radius_km))
            .unwrap_or_default()
    }

    /// Cached categories of a restaurant, in creation order.
    #[must_use]
    pub fn categories_for(&self, restaurant_id: &str) -> Vec<Category> {
        self.read()
            .categories
            .iter()
            .filter(|c| c.restaurant_id == restaurant_id)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn menu_for_restaurant(&self, restaurant_id: &str) -> Vec<MenuItem> {
        self.read()
            .menu_items
            .iter()
            .filter(|m| m.restaurant_id == restaurant_id)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn menu_for_category(&self, category_id: &str) -> Vec<MenuItem> {
        self.read()
            .menu_items
            .iter()
            .filter(|m| m.category_id == category_id)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn menu_item(&self, id: &str) -> Option<MenuItem> {
        self.read().menu_items.iter().find(|m| m.id == id).cloned()
    }

    #[must_use]
    pub fn payment_methods(&self) -> Vec<PaymentMethod> {
        self.read().payment_methods.clone()
    }

    #[must_use]
    pub fn default_payment_method(&self) -> Option<PaymentMethod> {
        self.read()
            .payment_methods
            .iter()
            .find(|m| m.is_default)
            .cloned()
    }

    /// Cached orders, newest first.
    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        self.read().orders.clone()
    }

    #[must_use]
    pub fn order(&self, id: &str) -> Option<Order> {
        self.read().orders.iter().find(|o| o.id == id).cloned()
    }

    /// Orders that have not reached a terminal status.
    #[must_use]
    pub fn active_orders(&self) -> Vec<Order> {
        self.read()
            .orders
            .iter()
            .filter(|o| !o.status.is_terminal())
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn orders_by_status(&self, status: OrderStatus) -> Vec<Order> {
        self.read()
            .orders
            .iter()
            .filter(|o| o.status == status)
            .cloned()
            .collect()
    }
}

/// Clears a loading flag when dropped, whether the request succeeded,
/// failed, or was abandoned.
struct LoadingGuard<'a> {
    store: &'a Store,
    resource: Resource,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.store.write().loading.set(self.resource, false);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{core::SeaOrmBackend, errors::Result, test_utils::*};

    #[tokio::test]
    async fn test_queries_are_safe_for_unknown_ids() -> Result<()> {
        let store = Store::new(Arc::new(SeaOrmBackend::new(setup_test_db().await?)));
        assert!(store.restaurant("missing").is_none());
        assert!(store.categories_for("missing").is_empty());
        assert!(store.menu_for_category("missing").is_empty());
        assert!(store.order("missing").is_none());
        assert!(store.selected_restaurant().is_none());
        assert!(store.take_notices().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_offline_backend_degrades_to_empty_state() -> Result<()> {
        let store = Store::new(Arc::new(SeaOrmBackend::new(offline_db().await?)));

        assert!(store.load_restaurants().await.is_empty());
        assert_eq!(store.loading(), LoadingFlags::default());

        let notices = store.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert!(store.take_notices().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_nearby_restaurants_are_sorted_by_distance() -> Result<()> {
        let fixture = OrderFixture::new().await?;
        let backend = SeaOrmBackend::new(fixture.db.clone());
        let mut far = sample_restaurant("Boston Chowder");
        far.location = Coordinates::new(42.3601, -71.0589);
        backend.save_restaurant(&far).await?;
        let mut close = sample_restaurant("Brooklyn Bagels");
        close.location = Coordinates::new(40.6782, -73.9442);
        backend.save_restaurant(&close).await?;

        let store = Store::new(Arc::new(backend));
        store.load_restaurants().await;

        let times_square = Coordinates::new(40.7580, -73.9855);
        let names: Vec<String> = store
            .nearby_restaurants(times_square, 50.0)
            .into_iter()
            .map(|(r, _)| r.name)
            .collect();
        assert_eq!(names, vec!["Burger Barn", "Brooklyn Bagels"]);
        assert_eq!(store.nearby_restaurants(times_square, 500.0).len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_unreadable_local_storage_reads_as_no_location() -> Result<()> {
        let dir = std::env::temp_dir().join(format!("order-buddy-{}", crate::domain::new_id()));
        std::fs::create_dir_all(&dir)?;
        let path = dir.join("storage.json");
        std::fs::write(&path, "{ not json")?;

        let fixture = OrderFixture::new().await?;
        let store = Store::new(Arc::new(SeaOrmBackend::new(fixture.db.clone())))
            .with_local_store(LocalStore::new(&path));
        store.load_restaurants().await;

        assert!(store.user_location().is_none());
        assert!(store.restaurants_near_user(50.0).is_empty());

        let home = SavedLocation {
            latitude: 40.7580,
            longitude: -73.9855,
            address: Some("Times Square".to_string()),
        };
        assert!(store.set_user_location(&home));
        assert_eq!(store.user_location(), Some(home));
        assert_eq!(store.restaurants_near_user(50.0).len(), 1);
        Ok(())
    }
}
