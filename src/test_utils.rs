//! Shared test utilities for `order-buddy`.
//!
//! This module provides helpers for setting up test databases and creating
//! test entities with sensible defaults.

use crate::{
    core::{DataAccess, FeedScope, OrderFeed, SeaOrmBackend, auth, menu, restaurant},
    domain::{
        CardInput, CardType, CartItem, Category, MenuItem, MenuItemInput, Order, OrderDraft,
        OrderStatus, PaymentKind, PaymentMethod, PaymentMethodUpdate, Restaurant, Role, Session,
        SignUp, User, new_id, restaurant::default_opening_hours,
    },
    errors::Result,
    geo::Coordinates,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tokio::sync::Notify;

/// Password used by every test account.
pub const TEST_PASSWORD: &str = "hunter22";
/// Email of the owner created by [`OrderFixture`].
pub const OWNER_EMAIL: &str = "owner@example.com";
/// Email of the customer created by [`OrderFixture`].
pub const CUSTOMER_EMAIL: &str = "ana@example.com";

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// An in-memory database without any tables: every request fails, which
/// stands in for an unreachable backend.
pub async fn offline_db() -> Result<DatabaseConnection> {
    Ok(sea_orm::Database::connect("sqlite::memory:").await?)
}

/// Sign-up form for a customer account.
pub fn customer_sign_up(email: &str) -> SignUp {
    SignUp {
        email: email.to_string(),
        password: TEST_PASSWORD.to_string(),
        name: "Test Customer".to_string(),
        role: Role::Customer,
        restaurant_id: None,
    }
}

/// Registers a restaurant owner without a restaurant.
pub async fn create_test_owner(db: &DatabaseConnection, email: &str) -> Result<Session> {
    auth::sign_up(
        db,
        &SignUp {
            email: email.to_string(),
            password: TEST_PASSWORD.to_string(),
            name: "Test Owner".to_string(),
            role: Role::RestaurantOwner,
            restaurant_id: None,
        },
    )
    .await
}

/// A valid, unsaved restaurant with default hours.
///
/// # Defaults
/// * location: New York City
/// * active and accepting online orders
pub fn sample_restaurant(name: &str) -> Restaurant {
    Restaurant {
        id: new_id(),
        owner_id: None,
        name: name.to_string(),
        description: format!("{name} test kitchen"),
        address: "1 Test Street".to_string(),
        location: Coordinates::new(40.7128, -74.0060),
        rating: 4.5,
        image_url: None,
        cover_image_url: None,
        is_active: true,
        accepts_online_orders: true,
        opening_hours: default_opening_hours(),
        social_links: Vec::new(),
    }
}

/// Sets up a database with one saved restaurant.
pub async fn setup_with_restaurant() -> Result<(DatabaseConnection, Restaurant)> {
    let db = setup_test_db().await?;
    let saved = restaurant::save_restaurant(&db, &sample_restaurant("Burger Barn")).await?;
    Ok((db, saved))
}

/// Menu item form with a price given in cents.
pub fn menu_input(category_id: &str, name: &str, cents: i64) -> MenuItemInput {
    MenuItemInput {
        category_id: category_id.to_string(),
        name: name.to_string(),
        description: format!("{name}, freshly made"),
        price: Decimal::new(cents, 2),
        image_url: None,
    }
}

/// Creates a menu item with a price given in cents.
pub async fn create_test_menu_item(
    db: &DatabaseConnection,
    category_id: &str,
    name: &str,
    cents: i64,
) -> Result<MenuItem> {
    menu::create_menu_item(db, &menu_input(category_id, name, cents)).await
}

/// Card form that passes validation for any Luhn-valid number.
pub fn test_card(number: &str, is_default: bool) -> CardInput {
    CardInput {
        card_type: CardType::CreditCard,
        number: number.to_string(),
        expiry: "12/39".to_string(),
        cvv: "123".to_string(),
        cardholder_name: "Ana Diaz".to_string(),
        is_default,
    }
}

/// A restaurant with an owner, one customer and a small menu.
///
/// The owner signs in as [`OWNER_EMAIL`] and the customer as
/// [`CUSTOMER_EMAIL`], both with [`TEST_PASSWORD`].
pub struct OrderFixture {
    pub db: DatabaseConnection,
    pub owner: User,
    pub customer: User,
    pub restaurant: Restaurant,
    /// Classic Burger, $8.99
    pub burger: MenuItem,
    /// Cola, $1.99
    pub cola: MenuItem,
}

impl OrderFixture {
    pub async fn new() -> Result<Self> {
        let db = setup_test_db().await?;
        let owner = create_test_owner(&db, OWNER_EMAIL).await?;
        let mut sample = sample_restaurant("Burger Barn");
        sample.owner_id = Some(owner.user.id.clone());
        let restaurant = restaurant::save_restaurant(&db, &sample).await?;

        let burgers = menu::create_category(&db, &restaurant.id, "Burgers").await?;
        let drinks = menu::create_category(&db, &restaurant.id, "Drinks").await?;
        let burger = create_test_menu_item(&db, &burgers.id, "Classic Burger", 899).await?;
        let cola = create_test_menu_item(&db, &drinks.id, "Cola", 199).await?;

        let customer = auth::sign_up(&db, &customer_sign_up(CUSTOMER_EMAIL)).await?.user;
        let owner = auth::current_user(&db, &owner.token)
            .await?
            .unwrap_or(owner.user);

        Ok(Self {
            db,
            owner,
            customer,
            restaurant,
            burger,
            cola,
        })
    }

    /// A fresh draft for `quantity` burgers ordered by the customer.
    pub fn draft(&self, quantity: u32, payment_method: PaymentKind) -> OrderDraft {
        OrderDraft {
            id: new_id(),
            user_id: self.customer.id.clone(),
            restaurant_id: self.restaurant.id.clone(),
            restaurant_name: self.restaurant.name.clone(),
            items: vec![CartItem {
                menu_item: self.burger.clone(),
                quantity,
            }],
            payment_method,
        }
    }

    /// A second restaurant with one item, for cross-restaurant cart tests.
    pub async fn other_restaurant_item(&self) -> Result<MenuItem> {
        let other = restaurant::save_restaurant(&self.db, &sample_restaurant("Pizza Place")).await?;
        let pizzas = menu::create_category(&self.db, &other.id, "Pizza").await?;
        create_test_menu_item(&self.db, &pizzas.id, "Margherita", 1200).await
    }
}

/// A backend whose `list_orders` and `list_payment_methods` calls wait for
/// [`GatedBackend::release`], so a response can be made to arrive late.
pub struct GatedBackend {
    inner: SeaOrmBackend,
    gate: Arc<Notify>,
}

impl GatedBackend {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            inner: SeaOrmBackend::new(db),
            gate: Arc::new(Notify::new()),
        }
    }

    /// Handle that lets one waiting (or the next) list call through.
    pub fn gate(&self) -> Arc<Notify> {
        Arc::clone(&self.gate)
    }
}

#[async_trait]
impl DataAccess for GatedBackend {
    async fn list_restaurants(&self) -> Result<Vec<Restaurant>> {
        self.inner.list_restaurants().await
    }
    async fn get_restaurant(&self, id: &str) -> Result<Option<Restaurant>> {
        self.inner.get_restaurant(id).await
    }
    async fn save_restaurant(&self, restaurant: &Restaurant) -> Result<Restaurant> {
        self.inner.save_restaurant(restaurant).await
    }
    async fn list_categories(&self, restaurant_id: &str) -> Result<Vec<Category>> {
        self.inner.list_categories(restaurant_id).await
    }
    async fn create_category(&self, restaurant_id: &str, name: &str) -> Result<Category> {
        self.inner.create_category(restaurant_id, name).await
    }
    async fn update_category(&self, id: &str, name: &str) -> Result<Category> {
        self.inner.update_category(id, name).await
    }
    async fn delete_category(&self, id: &str) -> Result<bool> {
        self.inner.delete_category(id).await
    }
    async fn list_menu_items(&self, restaurant_id: &str) -> Result<Vec<MenuItem>> {
        self.inner.list_menu_items(restaurant_id).await
    }
    async fn list_menu_items_in_category(&self, category_id: &str) -> Result<Vec<MenuItem>> {
        self.inner.list_menu_items_in_category(category_id).await
    }
    async fn create_menu_item(&self, input: &MenuItemInput) -> Result<MenuItem> {
        self.inner.create_menu_item(input).await
    }
    async fn update_menu_item(&self, id: &str, input: &MenuItemInput) -> Result<MenuItem> {
        self.inner.update_menu_item(id, input).await
    }
    async fn delete_menu_item(&self, id: &str) -> Result<bool> {
        self.inner.delete_menu_item(id).await
    }
    async fn list_orders(&self, user_id: &str, role: Role) -> Result<Vec<Order>> {
        self.gate.notified().await;
        self.inner.list_orders(user_id, role).await
    }
    async fn place_order(&self, draft: &OrderDraft) -> Result<Order> {
        self.inner.place_order(draft).await
    }
    async fn set_order_status(&self, order_id: &str, status: OrderStatus) -> Result<bool> {
        self.inner.set_order_status(order_id, status).await
    }
    fn subscribe(&self, scope: FeedScope) -> OrderFeed {
        self.inner.subscribe(scope)
    }
    async fn list_payment_methods(&self, user_id: &str) -> Result<Vec<PaymentMethod>> {
        self.gate.notified().await;
        self.inner.list_payment_methods(user_id).await
    }
    async fn add_payment_method(&self, user_id: &str, card: &CardInput) -> Result<PaymentMethod> {
        self.inner.add_payment_method(user_id, card).await
    }
    async fn update_payment_method(
        &self,
        user_id: &str,
        id: &str,
        changes: &PaymentMethodUpdate,
    ) -> Result<PaymentMethod> {
        self.inner.update_payment_method(user_id, id, changes).await
    }
    async fn delete_payment_method(&self, user_id: &str, id: &str) -> Result<bool> {
        self.inner.delete_payment_method(user_id, id).await
    }
    async fn sign_up(&self, form: &SignUp) -> Result<Session> {
        self.inner.sign_up(form).await
    }
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        self.inner.sign_in(email, password).await
    }
    async fn sign_out(&self, token: &str) -> Result<()> {
        self.inner.sign_out(token).await
    }
    async fn current_user(&self, token: &str) -> Result<Option<User>> {
        self.inner.current_user(token).await
    }
    async fn reset_password(&self, email: &str) -> Result<()> {
        self.inner.reset_password(email).await
    }
    async fn complete_password_reset(&self, ticket: &str, new_password: &str) -> Result<()> {
        self.inner.complete_password_reset(ticket, new_password).await
    }
    async fn update_profile(&self, user_id: &str, name: &str, email: &str) -> Result<User> {
        self.inner.update_profile(user_id, name, email).await
    }
}
