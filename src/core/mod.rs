//! Domain Data Access - the only code that knows the backend's wire schema.
//!
//! Each submodule maps one group of tables to domain types. [`backend`]
//! ties them together behind the [`DataAccess`] trait.

pub mod auth;
pub mod backend;
pub mod feed;
pub mod menu;
pub mod order;
pub mod payment;
pub mod restaurant;

pub use backend::{DataAccess, SeaOrmBackend};
pub use feed::{ChangeFeed, FeedScope, OrderFeed};
