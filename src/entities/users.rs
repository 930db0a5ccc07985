//! User entity - One row per account, customers and restaurant owners alike.
//!
//! The password is stored only as an argon2 PHC string.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// UUID of the account
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Login email, lower-cased
    #[sea_orm(unique)]
    pub email: String,
    /// Display name
    pub name: String,
    /// `"customer"` or `"restaurant_owner"`
    pub role: String,
    /// Restaurant owned by this user, if any
    pub restaurant_id: Option<String>,
    /// Argon2 hash of the password
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// When the account was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between User and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One user has many auth tokens
    #[sea_orm(has_many = "super::auth_tokens::Entity")]
    AuthTokens,
    /// One user has many payment methods
    #[sea_orm(has_many = "super::payment_methods::Entity")]
    PaymentMethods,
}

impl Related<super::auth_tokens::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AuthTokens.def()
    }
}

impl Related<super::payment_methods::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PaymentMethods.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
