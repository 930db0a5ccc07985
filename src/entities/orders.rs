//! Order entity - Placed orders and their progress.
//!
//! Everything except `status`, `payment_status` and `updated_at` is written
//! once at placement.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Order database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    /// Client-generated UUID, doubles as the idempotency key
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Customer who placed the order
    pub user_id: String,
    pub restaurant_id: String,
    /// Restaurant name at placement time
    pub restaurant_name: String,
    /// `"pending"`, `"preparing"`, `"ready"`, `"completed"` or `"cancelled"`
    pub status: String,
    /// Sum of the order lines
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub total: Decimal,
    /// `"credit_card"` or `"cash"`
    pub payment_method: String,
    /// `"paid"`, `"pending"` or `"failed"`
    pub payment_status: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Order and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One order has many lines
    #[sea_orm(has_many = "super::order_items::Entity")]
    OrderItems,
}

impl Related<super::order_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
