//! Payment method entity - Saved cards, reduced to display metadata.
//!
//! Full card numbers and CVVs are never written; only brand, last four
//! digits, expiry and holder name.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Payment method database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_methods")]
pub struct Model {
    /// UUID of the payment method
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// `"credit_card"` or `"debit_card"`
    pub card_type: String,
    /// Display brand, e.g. `"Visa"`
    pub brand: String,
    pub last_four: String,
    /// `MM/YY`
    pub expiry: String,
    pub cardholder_name: String,
    /// At most one row per user has this set
    pub is_default: bool,
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `PaymentMethod` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each payment method belongs to one user
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
