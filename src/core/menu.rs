//! Menu data access - categories and menu items.
//!
//! A menu item's `restaurant_id` is always taken from its category, never
//! from the caller. Deleting a category relies on the foreign key cascade to
//! remove its items.

use crate::{
    domain::{Category, MenuItem, MenuItemInput, menu},
    entities::{
        Category as CategoryEntity, MenuItem as MenuItemEntity, Restaurant as RestaurantEntity,
        categories, menu_items,
    },
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::info;

/// Lists a restaurant's categories in creation order.
pub async fn list_categories(db: &DatabaseConnection, restaurant_id: &str) -> Result<Vec<Category>> {
    Ok(CategoryEntity::find()
        .filter(categories::Column::RestaurantId.eq(restaurant_id))
        .order_by_asc(categories::Column::CreatedAt)
        .order_by_asc(categories::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(category_to_domain)
        .collect())
}

/// Creates a category under an existing restaurant.
pub async fn create_category(
    db: &DatabaseConnection,
    restaurant_id: &str,
    name: &str,
) -> Result<Category> {
    menu::validate_category_name(name)?;
    if RestaurantEntity::find_by_id(restaurant_id.to_string())
        .one(db)
        .await?
        .is_none()
    {
        return Err(Error::not_found("restaurant", restaurant_id));
    }

    let row = categories::ActiveModel {
        id: Set(crate::domain::new_id()),
        restaurant_id: Set(restaurant_id.to_string()),
        name: Set(name.trim().to_string()),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await?;
    info!("Category {} created for restaurant {}", row.id, restaurant_id);
    Ok(category_to_domain(row))
}

/// Renames a category.
pub async fn update_category(db: &DatabaseConnection, id: &str, name: &str) -> Result<Category> {
    menu::validate_category_name(name)?;
    let mut row: categories::ActiveModel = CategoryEntity::find_by_id(id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("category", id))?
        .into();
    row.name = Set(name.trim().to_string());
    Ok(category_to_domain(row.update(db).await?))
}

/// Deletes a category (and, through the cascade, its menu items).
/// Returns false when nothing was deleted.
pub async fn delete_category(db: &DatabaseConnection, id: &str) -> Result<bool> {
    let result = CategoryEntity::delete_by_id(id.to_string()).exec(db).await?;
    if result.rows_affected > 0 {
        info!("Category {} deleted", id);
    }
    Ok(result.rows_affected > 0)
}

/// Lists every menu item of a restaurant in creation order.
pub async fn list_menu_items(db: &DatabaseConnection, restaurant_id: &str) -> Result<Vec<MenuItem>> {
    MenuItemEntity::find()
        .filter(menu_items::Column::RestaurantId.eq(restaurant_id))
        .order_by_asc(menu_items::Column::CreatedAt)
        .order_by_asc(menu_items::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(item_to_domain)
        .collect()
}

/// Lists the menu items of one category in creation order.
pub async fn list_menu_items_in_category(
    db: &DatabaseConnection,
    category_id: &str,
) -> Result<Vec<MenuItem>> {
    MenuItemEntity::find()
        .filter(menu_items::Column::CategoryId.eq(category_id))
        .order_by_asc(menu_items::Column::CreatedAt)
        .order_by_asc(menu_items::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(item_to_domain)
        .collect()
}

/// Finds menu items by id; ids that do not exist are skipped.
pub async fn get_menu_items<C>(db: &C, ids: Vec<String>) -> Result<Vec<MenuItem>>
where
    C: ConnectionTrait,
{
    MenuItemEntity::find()
        .filter(menu_items::Column::Id.is_in(ids))
        .all(db)
        .await?
        .into_iter()
        .map(item_to_domain)
        .collect()
}

/// Creates a menu item in an existing category.
pub async fn create_menu_item(db: &DatabaseConnection, input: &MenuItemInput) -> Result<MenuItem> {
    input.validate()?;
    let category = find_category(db, &input.category_id).await?;

    let row = menu_items::ActiveModel {
        id: Set(crate::domain::new_id()),
        restaurant_id: Set(category.restaurant_id),
        category_id: Set(category.id),
        name: Set(input.name.trim().to_string()),
        description: Set(input.description.clone()),
        price: Set(to_wire_price(input.price)),
        image_url: Set(input.image_url.clone()),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await?;
    info!("Menu item {} created in category {}", row.id, row.category_id);
    item_to_domain(row)
}

/// Updates a menu item. Moving it to a category of another restaurant is rejected.
pub async fn update_menu_item(
    db: &DatabaseConnection,
    id: &str,
    input: &MenuItemInput,
) -> Result<MenuItem> {
    input.validate()?;
    let existing = MenuItemEntity::find_by_id(id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("menu item", id))?;

    let category = find_category(db, &input.category_id).await?;
    if category.restaurant_id != existing.restaurant_id {
        return Err(Error::validation(
            "category_id",
            format!(
                "category {} belongs to another restaurant than item {}",
                category.id, id
            ),
        ));
    }

    let mut row: menu_items::ActiveModel = existing.into();
    row.category_id = Set(category.id);
    row.name = Set(input.name.trim().to_string());
    row.description = Set(input.description.clone());
    row.price = Set(to_wire_price(input.price));
    row.image_url = Set(input.image_url.clone());
    item_to_domain(row.update(db).await?)
}

/// Deletes a menu item. Returns false when nothing was deleted.
pub async fn delete_menu_item(db: &DatabaseConnection, id: &str) -> Result<bool> {
    let result = MenuItemEntity::delete_by_id(id.to_string()).exec(db).await?;
    Ok(result.rows_affected > 0)
}

async fn find_category(db: &DatabaseConnection, id: &str) -> Result<categories::Model> {
    CategoryEntity::find_by_id(id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("category", id))
}

fn category_to_domain(row: categories::Model) -> Category {
    Category {
        id: row.id,
        restaurant_id: row.restaurant_id,
        name: row.name,
        created_at: row.created_at,
    }
}

pub(crate) fn item_to_domain(row: menu_items::Model) -> Result<MenuItem> {
    let price = from_wire_price(row.price)?;
    Ok(MenuItem {
        id: row.id,
        restaurant_id: row.restaurant_id,
        category_id: row.category_id,
        name: row.name,
        description: row.description,
        price,
        image_url: row.image_url,
    })
}

/// Prices are stored with two decimal places.
pub(crate) fn to_wire_price(price: Decimal) -> Decimal {
    price.round_dp(2)
}

pub(crate) fn from_wire_price(price: Decimal) -> Result<Decimal> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(Error::mapping(format!("negative price {price}")));
    }
    Ok(price.round_dp(2))
}
