//! Restaurant, category and menu item operations of the store.

use super::{Resource, Store};
use crate::{
    domain::{Category, MenuItem, MenuItemInput, Restaurant, Role, User},
    errors::Error,
};
use tracing::debug;

impl Store {
    /// Fetches the active restaurants and replaces the cached list.
    pub async fn load_restaurants(&self) -> Vec<Restaurant> {
        let _loading = self.start_loading(Resource::Restaurants);
        match self.backend.list_restaurants().await {
            Ok(restaurants) => {
                debug!("Loaded {} restaurant(s)", restaurants.len());
                self.write().restaurants.clone_from(&restaurants);
                restaurants
            }
            Err(e) => {
                self.report("Loading restaurants", &e);
                Vec::new()
            }
        }
    }

    /// Makes `id` the selected restaurant and loads its menu.
    pub async fn select_restaurant(&self, id: &str) -> Option<Restaurant> {
        let restaurant = match self.restaurant(id) {
            Some(cached) => cached,
            None => self.fetch_restaurant(id).await?,
        };
        self.write().selected_restaurant = Some(restaurant.id.clone());
        self.load_categories(&restaurant.id).await;
        self.load_menu_items(&restaurant.id).await;
        Some(restaurant)
    }

    async fn fetch_restaurant(&self, id: &str) -> Option<Restaurant> {
        let _loading = self.start_loading(Resource::Restaurants);
        match self.backend.get_restaurant(id).await {
            Ok(Some(restaurant)) => {
                upsert(&mut self.write().restaurants, restaurant.clone(), |r| &r.id);
                Some(restaurant)
            }
            Ok(None) => {
                self.report("Opening restaurant", &Error::not_found("restaurant", id));
                None
            }
            Err(e) => {
                self.report("Opening restaurant", &e);
                None
            }
        }
    }

    /// Fetches a restaurant's categories, replacing its cached ones.
    pub async fn load_categories(&self, restaurant_id: &str) -> Vec<Category> {
        let _loading = self.start_loading(Resource::Categories);
        match self.backend.list_categories(restaurant_id).await {
            Ok(categories) => {
                let mut state = self.write();
                state.categories.retain(|c| c.restaurant_id != restaurant_id);
                state.categories.extend(categories.iter().cloned());
                categories
            }
            Err(e) => {
                self.report("Loading categories", &e);
                Vec::new()
            }
        }
    }

    /// Fetches a restaurant's menu items, replacing its cached ones.
    pub async fn load_menu_items(&self, restaurant_id: &str) -> Vec<MenuItem> {
        let _loading = self.start_loading(Resource::MenuItems);
        match self.backend.list_menu_items(restaurant_id).await {
            Ok(items) => {
                let mut state = self.write();
                state.menu_items.retain(|m| m.restaurant_id != restaurant_id);
                state.menu_items.extend(items.iter().cloned());
                items
            }
            Err(e) => {
                self.report("Loading menu", &e);
                Vec::new()
            }
        }
    }

    /// Saves the owner's restaurant settings. An owner without a restaurant
    /// may create one that names them as owner.
    pub async fn save_restaurant(&self, restaurant: &Restaurant) -> Option<Restaurant> {
        if let Err(e) = restaurant.validate() {
            self.report("Saving restaurant", &e);
            return None;
        }
        let user = self.require_user("Saving restaurant")?;
        let allowed = user.role == Role::RestaurantOwner
            && restaurant.owner_id.as_deref() == Some(user.id.as_str())
            && user
                .restaurant_id
                .as_deref()
                .is_none_or(|id| id == restaurant.id);
        if !allowed {
            self.report("Saving restaurant", &Error::Unauthorized);
            return None;
        }
        match self.backend.save_restaurant(restaurant).await {
            Ok(saved) => {
                let mut state = self.write();
                if saved.is_active {
                    upsert(&mut state.restaurants, saved.clone(), |r| &r.id);
                } else {
                    state.restaurants.retain(|r| r.id != saved.id);
                }
                if let Some(session) = state.session.as_mut() {
                    if saved.owner_id.as_deref() == Some(session.user.id.as_str()) {
                        session.user.restaurant_id = Some(saved.id.clone());
                    }
                }
                drop(state);
                self.announce(format!("{} saved", saved.name));
                Some(saved)
            }
            Err(e) => {
                self.report("Saving restaurant", &e);
                None
            }
        }
    }

    pub async fn create_category(&self, restaurant_id: &str, name: &str) -> Option<Category> {
        if let Err(e) = crate::domain::menu::validate_category_name(name) {
            self.report("Adding category", &e);
            return None;
        }
        self.require_owner("Adding category", restaurant_id)?;
        match self.backend.create_category(restaurant_id, name).await {
            Ok(category) => {
                self.write().categories.push(category.clone());
                Some(category)
            }
            Err(e) => {
                self.report("Adding category", &e);
                None
            }
        }
    }

    pub async fn rename_category(&self, id: &str, name: &str) -> Option<Category> {
        if let Err(e) = crate::domain::menu::validate_category_name(name) {
            self.report("Renaming category", &e);
            return None;
        }
        self.owner_of_category("Renaming category", id)?;
        match self.backend.update_category(id, name).await {
            Ok(category) => {
                upsert(&mut self.write().categories, category.clone(), |c| &c.id);
                Some(category)
            }
            Err(e) => {
                self.report("Renaming category", &e);
                None
            }
        }
    }

    /// Deletes a category; its cached menu items go with it.
    pub async fn delete_category(&self, id: &str) -> bool {
        if self.owner_of_category("Deleting category", id).is_none() {
            return false;
        }
        match self.backend.delete_category(id).await {
            Ok(deleted) => {
                let mut state = self.write();
                state.categories.retain(|c| c.id != id);
                state.menu_items.retain(|m| m.category_id != id);
                deleted
            }
            Err(e) => {
                self.report("Deleting category", &e);
                false
            }
        }
    }

    pub async fn create_menu_item(&self, input: &MenuItemInput) -> Option<MenuItem> {
        if let Err(e) = input.validate() {
            self.report("Adding menu item", &e);
            return None;
        }
        self.owner_of_category("Adding menu item", &input.category_id)?;
        match self.backend.create_menu_item(input).await {
            Ok(item) => {
                self.write().menu_items.push(item.clone());
                Some(item)
            }
            Err(e) => {
                self.report("Adding menu item", &e);
                None
            }
        }
    }

    pub async fn update_menu_item(&self, id: &str, input: &MenuItemInput) -> Option<MenuItem> {
        if let Err(e) = input.validate() {
            self.report("Updating menu item", &e);
            return None;
        }
        self.owner_of_item("Updating menu item", id)?;
        self.owner_of_category("Updating menu item", &input.category_id)?;
        match self.backend.update_menu_item(id, input).await {
            Ok(item) => {
                upsert(&mut self.write().menu_items, item.clone(), |m| &m.id);
                Some(item)
            }
            Err(e) => {
                self.report("Updating menu item", &e);
                None
            }
        }
    }

    pub async fn delete_menu_item(&self, id: &str) -> bool {
        if self.owner_of_item("Deleting menu item", id).is_none() {
            return false;
        }
        match self.backend.delete_menu_item(id).await {
            Ok(deleted) => {
                self.write().menu_items.retain(|m| m.id != id);
                deleted
            }
            Err(e) => {
                self.report("Deleting menu item", &e);
                false
            }
        }
    }
}

impl Store {
    /// The signed-in owner of `restaurant_id`, or `None` after queuing an
    /// "unauthorized" notice.
    fn require_owner(&self, action: &str, restaurant_id: &str) -> Option<User> {
        let user = self.require_user(action)?;
        if user.owns(restaurant_id) {
            Some(user)
        } else {
            self.report(action, &Error::Unauthorized);
            None
        }
    }

    /// [`Self::require_owner`] for the restaurant of a cached category.
    fn owner_of_category(&self, action: &str, category_id: &str) -> Option<User> {
        let restaurant_id = self
            .read()
            .categories
            .iter()
            .find(|c| c.id == category_id)
            .map(|c| c.restaurant_id.clone());
        match restaurant_id {
            Some(restaurant_id) => self.require_owner(action, &restaurant_id),
            None => {
                self.report(action, &Error::not_found("category", category_id));
                None
            }
        }
    }

    /// [`Self::require_owner`] for the restaurant of a cached menu item.
    fn owner_of_item(&self, action: &str, item_id: &str) -> Option<User> {
        match self.menu_item(item_id) {
            Some(item) => self.require_owner(action, &item.restaurant_id),
            None => {
                self.report(action, &Error::not_found("menu item", item_id));
                None
            }
        }
    }
}

/// Replaces the entry with the same key, or appends.
pub(super) fn upsert<T>(items: &mut Vec<T>, value: T, key: impl Fn(&T) -> &String) {
    match items.iter().position(|existing| key(existing) == key(&value)) {
        Some(index) => items[index] = value,
        None => items.push(value),
    }
}
