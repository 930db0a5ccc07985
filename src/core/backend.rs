//! The Data Access boundary.
//!
//! [`DataAccess`] is everything the state container needs from a backend:
//! CRUD per entity, auth, and the realtime order feed. [`SeaOrmBackend`]
//! implements it over a SeaORM connection and publishes order changes on a
//! [`ChangeFeed`] after each committed write. Another provider can be
//! plugged in by implementing the trait.

use super::feed::{ChangeFeed, FeedScope, OrderFeed};
use super::{auth, menu, order, payment, restaurant};
use crate::{
    domain::{
        CardInput, Category, MenuItem, MenuItemInput, Order, OrderChange, OrderDraft, OrderStatus,
        PaymentMethod, PaymentMethodUpdate, Restaurant, Role, Session, SignUp, User,
    },
    errors::Result,
};
use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use tracing::debug;

#[async_trait]
pub trait DataAccess: Send + Sync {
    async fn list_restaurants(&self) -> Result<Vec<Restaurant>>;
    async fn get_restaurant(&self, id: &str) -> Result<Option<Restaurant>>;
    async fn save_restaurant(&self, restaurant: &Restaurant) -> Result<Restaurant>;

    async fn list_categories(&self, restaurant_id: &str) -> Result<Vec<Category>>;
    async fn create_category(&self, restaurant_id: &str, name: &str) -> Result<Category>;
    async fn update_category(&self, id: &str, name: &str) -> Result<Category>;
    /// Removes the category and, by cascade, its menu items.
    async fn delete_category(&self, id: &str) -> Result<bool>;

    async fn list_menu_items(&self, restaurant_id: &str) -> Result<Vec<MenuItem>>;
    async fn list_menu_items_in_category(&self, category_id: &str) -> Result<Vec<MenuItem>>;
    async fn create_menu_item(&self, input: &MenuItemInput) -> Result<MenuItem>;
    async fn update_menu_item(&self, id: &str, input: &MenuItemInput) -> Result<MenuItem>;
    async fn delete_menu_item(&self, id: &str) -> Result<bool>;

    /// Orders visible to the user: their own as a customer, their
    /// restaurant's as an owner.
    async fn list_orders(&self, user_id: &str, role: Role) -> Result<Vec<Order>>;
    /// Places the draft. Placing an id that already exists returns the
    /// stored order.
    async fn place_order(&self, draft: &OrderDraft) -> Result<Order>;
    /// Returns `true` when a new status was written, `false` when the order
    /// already had it.
    async fn set_order_status(&self, order_id: &str, status: OrderStatus) -> Result<bool>;
    /// Opens a realtime subscription to order changes within `scope`.
    fn subscribe(&self, scope: FeedScope) -> OrderFeed;

    async fn list_payment_methods(&self, user_id: &str) -> Result<Vec<PaymentMethod>>;
    async fn add_payment_method(&self, user_id: &str, card: &CardInput) -> Result<PaymentMethod>;
    /// Fails with `Unauthorized` when the method is not `user_id`'s.
    async fn update_payment_method(
        &self,
        user_id: &str,
        id: &str,
        changes: &PaymentMethodUpdate,
    ) -> Result<PaymentMethod>;
    async fn delete_payment_method(&self, user_id: &str, id: &str) -> Result<bool>;

    async fn sign_up(&self, form: &SignUp) -> Result<Session>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;
    async fn sign_out(&self, token: &str) -> Result<()>;
    async fn current_user(&self, token: &str) -> Result<Option<User>>;
    /// Starts a password reset. Unknown emails succeed silently.
    async fn reset_password(&self, email: &str) -> Result<()>;
    async fn complete_password_reset(&self, ticket: &str, new_password: &str) -> Result<()>;
    async fn update_profile(&self, user_id: &str, name: &str, email: &str) -> Result<User>;
}

/// [`DataAccess`] over a SeaORM database.
#[derive(Debug, Clone)]
pub struct SeaOrmBackend {
    db: DatabaseConnection,
    feed: ChangeFeed,
}

impl SeaOrmBackend {
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self::with_feed(db, ChangeFeed::default())
    }

    #[must_use]
    pub const fn with_feed(db: DatabaseConnection, feed: ChangeFeed) -> Self {
        Self { db, feed }
    }

    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    #[must_use]
    pub const fn feed(&self) -> &ChangeFeed {
        &self.feed
    }
}

#[async_trait]
impl DataAccess for SeaOrmBackend {
    async fn list_restaurants(&self) -> Result<Vec<Restaurant>> {
        restaurant::list_restaurants(&self.db).await
    }

    async fn get_restaurant(&self, id: &str) -> Result<Option<Restaurant>> {
        restaurant::get_restaurant(&self.db, id).await
    }

    async fn save_restaurant(&self, value: &Restaurant) -> Result<Restaurant> {
        restaurant::save_restaurant(&self.db, value).await
    }

    async fn list_categories(&self, restaurant_id: &str) -> Result<Vec<Category>> {
        menu::list_categories(&self.db, restaurant_id).await
    }

    async fn create_category(&self, restaurant_id: &str, name: &str) -> Result<Category> {
        menu::create_category(&self.db, restaurant_id, name).await
    }

    async fn update_category(&self, id: &str, name: &str) -> Result<Category> {
        menu::update_category(&self.db, id, name).await
    }

    async fn delete_category(&self, id: &str) -> Result<bool> {
        menu::delete_category(&self.db, id).await
    }

    async fn list_menu_items(&self, restaurant_id: &str) -> Result<Vec<MenuItem>> {
        menu::list_menu_items(&self.db, restaurant_id).await
    }

    async fn list_menu_items_in_category(&self, category_id: &str) -> Result<Vec<MenuItem>> {
        menu::list_menu_items_in_category(&self.db, category_id).await
    }

    async fn create_menu_item(&self, input: &MenuItemInput) -> Result<MenuItem> {
        menu::create_menu_item(&self.db, input).await
    }

    async fn update_menu_item(&self, id: &str, input: &MenuItemInput) -> Result<MenuItem> {
        menu::update_menu_item(&self.db, id, input).await
    }

    async fn delete_menu_item(&self, id: &str) -> Result<bool> {
        menu::delete_menu_item(&self.db, id).await
    }

    async fn list_orders(&self, user_id: &str, role: Role) -> Result<Vec<Order>> {
        order::list_orders(&self.db, user_id, role).await
    }

    async fn place_order(&self, draft: &OrderDraft) -> Result<Order> {
        let (placed, created) = order::place_order(&self.db, draft).await?;
        if created {
            self.feed.publish(OrderChange::Placed(Box::new(placed.clone())));
        }
        Ok(placed)
    }

    async fn set_order_status(&self, order_id: &str, status: OrderStatus) -> Result<bool> {
        match order::set_order_status(&self.db, order_id, status).await? {
            Some(change) => {
                self.feed.publish(OrderChange::StatusChanged(change));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn subscribe(&self, scope: FeedScope) -> OrderFeed {
        self.feed.subscribe(scope)
    }

    async fn list_payment_methods(&self, user_id: &str) -> Result<Vec<PaymentMethod>> {
        payment::list_payment_methods(&self.db, user_id).await
    }

    async fn add_payment_method(&self, user_id: &str, card: &CardInput) -> Result<PaymentMethod> {
        payment::add_payment_method(&self.db, user_id, card).await
    }

    async fn update_payment_method(
        &self,
        user_id: &str,
        id: &str,
        changes: &PaymentMethodUpdate,
    ) -> Result<PaymentMethod> {
        payment::update_payment_method(&self.db, user_id, id, changes).await
    }

    async fn delete_payment_method(&self, user_id: &str, id: &str) -> Result<bool> {
        payment::delete_payment_method(&self.db, user_id, id).await
    }

    async fn sign_up(&self, form: &SignUp) -> Result<Session> {
        auth::sign_up(&self.db, form).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        auth::sign_in(&self.db, email, password).await
    }

    async fn sign_out(&self, token: &str) -> Result<()> {
        auth::sign_out(&self.db, token).await
    }

    async fn current_user(&self, token: &str) -> Result<Option<User>> {
        auth::current_user(&self.db, token).await
    }

    async fn reset_password(&self, email: &str) -> Result<()> {
        // Delivering the ticket (e.g. by mail) belongs to the hosting service
        if auth::issue_password_reset(&self.db, email).await?.is_some() {
            debug!("Password reset ticket issued");
        }
        Ok(())
    }

    async fn complete_password_reset(&self, ticket: &str, new_password: &str) -> Result<()> {
        auth::complete_password_reset(&self.db, ticket, new_password).await
    }

    async fn update_profile(&self, user_id: &str, name: &str, email: &str) -> Result<User> {
        auth::update_profile(&self.db, user_id, name, email).await
    }
}
