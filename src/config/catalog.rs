//! Seed catalog loading from a TOML file
//!
//! A catalog lists restaurants with their categories and menu items. It is
//! loaded into a backend that has no restaurants yet, so a fresh local
//! database has something to browse.

use crate::{
    core::DataAccess,
    domain::{MenuItemInput, Restaurant, new_id, restaurant::default_opening_hours},
    errors::{Error, Result},
    geo::Coordinates,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Configuration structure representing the entire catalog file
#[derive(Debug, Deserialize)]
pub struct Catalog {
    /// Restaurants to seed
    #[serde(default)]
    pub restaurants: Vec<RestaurantSeed>,
}

/// A restaurant with its menu
#[derive(Debug, Deserialize, Clone)]
pub struct RestaurantSeed {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub rating: f64,
    pub image_url: Option<String>,
    #[serde(default)]
    pub categories: Vec<CategorySeed>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CategorySeed {
    pub name: String,
    #[serde(default)]
    pub items: Vec<ItemSeed>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ItemSeed {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Price in currency units, e.g. `8.99`
    pub price: f64,
    pub image_url: Option<String>,
}

impl RestaurantSeed {
    fn to_restaurant(&self) -> Restaurant {
        Restaurant {
            id: new_id(),
            owner_id: None,
            name: self.name.clone(),
            description: self.description.clone(),
            address: self.address.clone(),
            location: Coordinates::new(self.latitude, self.longitude),
            rating: self.rating,
            image_url: self.image_url.clone(),
            cover_image_url: None,
            is_active: true,
            accepts_online_orders: true,
            opening_hours: default_opening_hours(),
            social_links: Vec::new(),
        }
    }
}

impl ItemSeed {
    fn to_input(&self, category_id: &str) -> Result<MenuItemInput> {
        let price = Decimal::from_f64_retain(self.price)
            .ok_or_else(|| Error::validation("price", format!("{} is not a price", self.price)))?
            .round_dp(2);
        Ok(MenuItemInput {
            category_id: category_id.to_string(),
            name: self.name.clone(),
            description: self.description.clone(),
            price,
            image_url: self.image_url.clone(),
        })
    }
}

/// Loads a catalog from a TOML file
///
/// # Errors
/// Returns [`Error::Config`] if the file cannot be read or parsed.
pub fn load_catalog<P: AsRef<Path>>(path: P) -> Result<Catalog> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read catalog file: {e}"),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse catalog: {e}"),
    })
}

/// Inserts every restaurant of `catalog` through `backend`, unless the
/// backend already lists restaurants. Returns how many were created.
pub async fn seed_catalog(backend: &dyn DataAccess, catalog: &Catalog) -> Result<usize> {
    if !backend.list_restaurants().await?.is_empty() {
        debug!("Backend already has restaurants, skipping catalog");
        return Ok(0);
    }

    for seed in &catalog.restaurants {
        let restaurant = seed.to_restaurant();
        restaurant.validate()?;
        let restaurant = backend.save_restaurant(&restaurant).await?;
        for category_seed in &seed.categories {
            let category = backend
                .create_category(&restaurant.id, &category_seed.name)
                .await?;
            for item in &category_seed.items {
                let input = item.to_input(&category.id)?;
                input.validate()?;
                backend.create_menu_item(&input).await?;
            }
        }
        debug!("Seeded restaurant {}", restaurant.name);
    }

    info!("Seeded {} restaurants from catalog", catalog.restaurants.len());
    Ok(catalog.restaurants.len())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::{core::SeaOrmBackend, test_utils::setup_test_db};

    const CATALOG: &str = r#"
        [[restaurants]]
        name = "Burger Barn"
        address = "12 Main Street"
        latitude = 40.7128
        longitude = -74.0060
        rating = 4.5

        [[restaurants.categories]]
        name = "Burgers"

        [[restaurants.categories.items]]
        name = "Classic Burger"
        price = 8.99

        [[restaurants.categories.items]]
        name = "Veggie Burger"
        description = "Black bean patty"
        price = 9.5

        [[restaurants.categories]]
        name = "Drinks"

        [[restaurants.categories.items]]
        name = "Cola"
        price = 1.99

        [[restaurants]]
        name = "Pizza Place"
        address = "3 Elm Street"
        latitude = 40.73
        longitude = -73.99
    "#;

    #[test]
    fn test_parse_catalog() {
        let catalog: Catalog = toml::from_str(CATALOG).unwrap();
        assert_eq!(catalog.restaurants.len(), 2);
        let burgers = &catalog.restaurants[0];
        assert_eq!(burgers.categories.len(), 2);
        assert_eq!(burgers.categories[0].items[1].price, 9.5);
        assert!(catalog.restaurants[1].categories.is_empty());
        assert_eq!(catalog.restaurants[1].rating, 0.0);
    }

    #[test]
    fn test_missing_file_is_a_config_error() {
        let result = load_catalog("does/not/exist.toml");
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[tokio::test]
    async fn test_seed_into_empty_backend() -> Result<()> {
        let backend = SeaOrmBackend::new(setup_test_db().await?);
        let catalog: Catalog = toml::from_str(CATALOG).unwrap();

        assert_eq!(seed_catalog(&backend, &catalog).await?, 2);

        let restaurants = backend.list_restaurants().await?;
        assert_eq!(restaurants.len(), 2);
        let barn = restaurants.iter().find(|r| r.name == "Burger Barn").unwrap();
        assert_eq!(backend.list_categories(&barn.id).await?.len(), 2);
        let menu = backend.list_menu_items(&barn.id).await?;
        assert_eq!(menu.len(), 3);
        let burger = menu.iter().find(|m| m.name == "Classic Burger").unwrap();
        assert_eq!(burger.price, Decimal::new(899, 2));
        Ok(())
    }

    #[tokio::test]
    async fn test_seed_skips_populated_backend() -> Result<()> {
        let backend = SeaOrmBackend::new(setup_test_db().await?);
        let catalog: Catalog = toml::from_str(CATALOG).unwrap();
        seed_catalog(&backend, &catalog).await?;

        assert_eq!(seed_catalog(&backend, &catalog).await?, 0);
        assert_eq!(backend.list_restaurants().await?.len(), 2);
        Ok(())
    }
}
