//! Auth token entity - Session and password-reset tokens issued to users.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Purpose value for sign-in sessions
pub const PURPOSE_SESSION: &str = "session";
/// Purpose value for password reset tickets
pub const PURPOSE_PASSWORD_RESET: &str = "password_reset";

/// Auth token database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "auth_tokens")]
pub struct Model {
    /// Opaque random token
    #[sea_orm(primary_key, auto_increment = false)]
    pub token: String,
    /// Owner of the token
    pub user_id: String,
    /// `"session"` or `"password_reset"`
    pub purpose: String,
    /// When the token was issued
    pub created_at: DateTimeUtc,
    /// After this instant the token is rejected
    pub expires_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each token belongs to one user
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
