//! Restaurant entity - Listing and settings data for a restaurant.
//!
//! Opening hours and social links live in their own tables and are loaded
//! alongside the row.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Restaurant database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "restaurants")]
pub struct Model {
    /// UUID of the restaurant
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Owning user (role `restaurant_owner`)
    pub owner_id: Option<String>,
    pub name: String,
    pub description: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Average rating, 0 to 5
    pub rating: f64,
    pub image_url: Option<String>,
    pub cover_image_url: Option<String>,
    /// Inactive restaurants are hidden from listings
    pub is_active: bool,
    pub accepts_online_orders: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Restaurant and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::restaurant_opening_hours::Entity")]
    OpeningHours,
    #[sea_orm(has_many = "super::restaurant_social_media::Entity")]
    SocialMedia,
    #[sea_orm(has_many = "super::categories::Entity")]
    Categories,
}

impl Related<super::restaurant_opening_hours::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OpeningHours.def()
    }
}

impl Related<super::restaurant_social_media::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SocialMedia.def()
    }
}

impl Related<super::categories::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Categories.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
