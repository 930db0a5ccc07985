//! Entity module - Contains all SeaORM entity definitions for the backend tables.
//! These are the wire rows; only [`crate::core`] maps them to domain types.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod auth_tokens;
pub mod categories;
pub mod menu_items;
pub mod order_items;
pub mod orders;
pub mod payment_methods;
pub mod restaurant_opening_hours;
pub mod restaurant_social_media;
pub mod restaurants;
pub mod users;

// Re-export specific types to avoid conflicts
pub use auth_tokens::Entity as AuthToken;
pub use categories::Entity as Category;
pub use menu_items::Entity as MenuItem;
pub use order_items::Entity as OrderItem;
pub use orders::Entity as Order;
pub use payment_methods::Entity as PaymentMethod;
pub use restaurant_opening_hours::Entity as OpeningHours;
pub use restaurant_social_media::Entity as SocialMedia;
pub use restaurants::Entity as Restaurant;
pub use users::Entity as User;
