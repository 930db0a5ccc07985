//! Domain model - the in-memory types the rest of the crate works with.
//!
//! Nothing in here knows about backend tables or column names; the
//! translation from wire rows lives in [`crate::core`].

pub mod cart;
pub mod menu;
pub mod order;
pub mod payment;
pub mod restaurant;
pub mod user;

pub use cart::{AddOutcome, Cart, CartConflict, CartItem};
pub use menu::{Category, MenuItem, MenuItemInput};
pub use order::{
    Order, OrderChange, OrderDraft, OrderStatus, OrderStatusChanged, PaymentKind, PaymentStatus,
};
pub use payment::{
    CardBrand, CardInput, CardType, NewPaymentMethod, PaymentMethod, PaymentMethodUpdate,
};
pub use restaurant::{DayHours, Restaurant, SocialLink};
pub use user::{Role, Session, SignUp, User};

/// Generates a fresh entity id (UUID v4, hyphenated).
#[must_use]
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
