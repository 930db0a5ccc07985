//! Menu categories and items.

use crate::errors::{Error, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A menu section such as "Burgers" or "Drinks".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub restaurant_id: String,
    pub name: String,
    /// Categories are listed in creation order
    pub created_at: DateTime<Utc>,
}

/// Something a customer can order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: String,
    /// Always equal to the owning category's restaurant id
    pub restaurant_id: String,
    pub category_id: String,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub image_url: Option<String>,
}

/// Fields an owner fills in when creating or editing a menu item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItemInput {
    pub category_id: String,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub image_url: Option<String>,
}

impl MenuItemInput {
    /// Rejects blank names and negative prices.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("name", "menu item name cannot be empty"));
        }
        if self.price < Decimal::ZERO {
            return Err(Error::validation(
                "price",
                format!("price cannot be negative ({})", self.price),
            ));
        }
        Ok(())
    }
}

/// Rejects blank category names.
pub fn validate_category_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::validation("name", "category name cannot be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str, price: Decimal) -> MenuItemInput {
        MenuItemInput {
            category_id: "cat1".to_string(),
            name: name.to_string(),
            description: String::new(),
            price,
            image_url: None,
        }
    }

    #[test]
    fn test_menu_item_input_validation() {
        assert!(input("Classic Burger", Decimal::new(899, 2)).validate().is_ok());
        assert!(input("Water", Decimal::ZERO).validate().is_ok());
        assert!(input("  ", Decimal::ONE).validate().is_err());
        assert!(matches!(
            input("Refund", Decimal::new(-1, 2)).validate(),
            Err(Error::Validation { field: "price", .. })
        ));
    }

    #[test]
    fn test_category_name_validation() {
        assert!(validate_category_name("Burgers").is_ok());
        assert!(validate_category_name("").is_err());
    }
}
