//! Restaurant data access - listing, lookup and owner settings.
//!
//! A restaurant is stored across three tables (`restaurants`,
//! `restaurant_opening_hours`, `restaurant_social_media`); this module
//! assembles and disassembles the domain [`Restaurant`] from them.

use crate::{
    domain::{DayHours, Restaurant, SocialLink},
    entities::{
        OpeningHours, Restaurant as RestaurantEntity, SocialMedia, restaurant_opening_hours,
        restaurant_social_media, restaurants,
    },
    errors::{Error, Result},
    geo::Coordinates,
};
use chrono::{Datelike, NaiveTime, Utc, Weekday};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use std::collections::HashMap;
use tracing::{info, warn};

/// Retrieves all active restaurants, ordered alphabetically by name.
pub async fn list_restaurants(db: &DatabaseConnection) -> Result<Vec<Restaurant>> {
    let rows = RestaurantEntity::find()
        .filter(restaurants::Column::IsActive.eq(true))
        .order_by_asc(restaurants::Column::Name)
        .all(db)
        .await?;
    load_details(db, rows).await
}

/// Finds a restaurant by id, active or not.
pub async fn get_restaurant(db: &DatabaseConnection, id: &str) -> Result<Option<Restaurant>> {
    let Some(row) = RestaurantEntity::find_by_id(id.to_string()).one(db).await? else {
        return Ok(None);
    };
    Ok(load_details(db, vec![row]).await?.pop())
}

/// Finds the restaurant managed by an owner.
pub async fn get_restaurant_by_owner(
    db: &DatabaseConnection,
    owner_id: &str,
) -> Result<Option<Restaurant>> {
    let Some(row) = RestaurantEntity::find()
        .filter(restaurants::Column::OwnerId.eq(owner_id))
        .one(db)
        .await?
    else {
        return Ok(None);
    };
    Ok(load_details(db, vec![row]).await?.pop())
}

/// Creates or updates a restaurant together with its hours and social links.
///
/// Hours and links are replaced wholesale. When the restaurant has an owner,
/// the owner account is linked to it in the same transaction.
///
/// # Errors
/// [`Error::Unauthorized`] when an existing restaurant would change owner.
pub async fn save_restaurant(db: &DatabaseConnection, restaurant: &Restaurant) -> Result<Restaurant> {
    restaurant.validate()?;
    let now = Utc::now();

    let txn = db.begin().await?;
    let existing = RestaurantEntity::find_by_id(restaurant.id.clone())
        .one(&txn)
        .await?;
    if let Some(stored) = &existing {
        if stored.owner_id != restaurant.owner_id {
            warn!("Refusing to change the owner of restaurant {}", restaurant.id);
            return Err(Error::Unauthorized);
        }
    }

    let mut row = restaurants::ActiveModel {
        id: Set(restaurant.id.clone()),
        owner_id: Set(restaurant.owner_id.clone()),
        name: Set(restaurant.name.trim().to_string()),
        description: Set(restaurant.description.clone()),
        address: Set(restaurant.address.clone()),
        latitude: Set(restaurant.location.latitude),
        longitude: Set(restaurant.location.longitude),
        rating: Set(restaurant.rating),
        image_url: Set(restaurant.image_url.clone()),
        cover_image_url: Set(restaurant.cover_image_url.clone()),
        is_active: Set(restaurant.is_active),
        accepts_online_orders: Set(restaurant.accepts_online_orders),
        updated_at: Set(now),
        ..Default::default()
    };
    if existing.is_some() {
        row.update(&txn).await?;
    } else {
        row.created_at = Set(now);
        row.insert(&txn).await?;
    }

    OpeningHours::delete_many()
        .filter(restaurant_opening_hours::Column::RestaurantId.eq(restaurant.id.clone()))
        .exec(&txn)
        .await?;
    for hours in &restaurant.opening_hours {
        restaurant_opening_hours::ActiveModel {
            restaurant_id: Set(restaurant.id.clone()),
            day_of_week: Set(i32::try_from(hours.weekday.num_days_from_monday()).unwrap_or_default()),
            open_time: Set(hours.open.format(TIME_FORMAT).to_string()),
            close_time: Set(hours.close.format(TIME_FORMAT).to_string()),
            is_open: Set(hours.is_open),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }

    SocialMedia::delete_many()
        .filter(restaurant_social_media::Column::RestaurantId.eq(restaurant.id.clone()))
        .exec(&txn)
        .await?;
    for link in &restaurant.social_links {
        restaurant_social_media::ActiveModel {
            restaurant_id: Set(restaurant.id.clone()),
            platform: Set(link.platform.trim().to_lowercase()),
            url: Set(link.url.trim().to_string()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }

    if let Some(owner_id) = &restaurant.owner_id {
        super::auth::link_restaurant(&txn, owner_id, &restaurant.id).await?;
    }
    txn.commit().await?;

    info!(
        "Restaurant {} {}",
        restaurant.id,
        if existing.is_some() { "updated" } else { "created" }
    );
    get_restaurant(db, &restaurant.id)
        .await?
        .ok_or_else(|| Error::not_found("restaurant", restaurant.id.clone()))
}

const TIME_FORMAT: &str = "%H:%M";

/// Loads hours and social links for a batch of restaurant rows, keeping row order.
async fn load_details(
    db: &DatabaseConnection,
    rows: Vec<restaurants::Model>,
) -> Result<Vec<Restaurant>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();

    let mut hours: HashMap<String, Vec<restaurant_opening_hours::Model>> = HashMap::new();
    for row in OpeningHours::find()
        .filter(restaurant_opening_hours::Column::RestaurantId.is_in(ids.clone()))
        .order_by_asc(restaurant_opening_hours::Column::DayOfWeek)
        .all(db)
        .await?
    {
        hours.entry(row.restaurant_id.clone()).or_default().push(row);
    }

    let mut links: HashMap<String, Vec<restaurant_social_media::Model>> = HashMap::new();
    for row in SocialMedia::find()
        .filter(restaurant_social_media::Column::RestaurantId.is_in(ids))
        .order_by_asc(restaurant_social_media::Column::Id)
        .all(db)
        .await?
    {
        links.entry(row.restaurant_id.clone()).or_default().push(row);
    }

    rows.into_iter()
        .map(|row| {
            let hours = hours.remove(&row.id).unwrap_or_default();
            let links = links.remove(&row.id).unwrap_or_default();
            to_domain(row, hours, links)
        })
        .collect()
}

fn to_domain(
    row: restaurants::Model,
    hours: Vec<restaurant_opening_hours::Model>,
    links: Vec<restaurant_social_media::Model>,
) -> Result<Restaurant> {
    let opening_hours = hours
        .into_iter()
        .map(|h| {
            Ok(DayHours {
                weekday: weekday_from_index(h.day_of_week)?,
                open: parse_time(&h.open_time)?,
                close: parse_time(&h.close_time)?,
                is_open: h.is_open,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Restaurant {
        id: row.id,
        owner_id: row.owner_id,
        name: row.name,
        description: row.description,
        address: row.address,
        location: Coordinates::new(row.latitude, row.longitude),
        rating: row.rating,
        image_url: row.image_url,
        cover_image_url: row.cover_image_url,
        is_active: row.is_active,
        accepts_online_orders: row.accepts_online_orders,
        opening_hours,
        social_links: links
            .into_iter()
            .map(|l| SocialLink {
                platform: l.platform,
                url: l.url,
            })
            .collect(),
    })
}

fn weekday_from_index(index: i32) -> Result<Weekday> {
    match index {
        0 => Ok(Weekday::Mon),
        1 => Ok(Weekday::Tue),
        2 => Ok(Weekday::Wed),
        3 => Ok(Weekday::Thu),
        4 => Ok(Weekday::Fri),
        5 => Ok(Weekday::Sat),
        6 => Ok(Weekday::Sun),
        other => Err(Error::mapping(format!("day_of_week {other} out of range"))),
    }
}

/// Accepts `HH:MM` and `HH:MM:SS`.
fn parse_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|e| Error::mapping(format!("bad time `{value}`: {e}")))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_save_and_get_restaurant() -> Result<()> {
        let db = setup_test_db().await?;
        let mut restaurant = sample_restaurant("Burger Barn");
        restaurant.social_links.push(SocialLink {
            platform: "Instagram".to_string(),
            url: "https://instagram.com/burgerbarn".to_string(),
        });

        let saved = save_restaurant(&db, &restaurant).await?;
        assert_eq!(saved.name, "Burger Barn");
        assert_eq!(saved.opening_hours, restaurant.opening_hours);
        assert_eq!(saved.social_links.len(), 1);
        assert_eq!(saved.social_links[0].platform, "instagram");

        let found = get_restaurant(&db, &restaurant.id).await?.unwrap();
        assert_eq!(found, saved);
        assert!(get_restaurant(&db, "missing").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_update_replaces_hours_and_links() -> Result<()> {
        let db = setup_test_db().await?;
        let mut restaurant = save_restaurant(&db, &sample_restaurant("Burger Barn")).await?;

        restaurant.description = "Now with milkshakes".to_string();
        restaurant.opening_hours.truncate(5);
        restaurant.opening_hours[0].is_open = false;
        let updated = save_restaurant(&db, &restaurant).await?;

        assert_eq!(updated.description, "Now with milkshakes");
        assert_eq!(updated.opening_hours.len(), 5);
        assert!(!updated.opening_hours[0].is_open);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_hides_inactive_restaurants() -> Result<()> {
        let db = setup_test_db().await?;
        save_restaurant(&db, &sample_restaurant("Zeta Pizza")).await?;
        save_restaurant(&db, &sample_restaurant("Alpha Sushi")).await?;
        let mut closed = sample_restaurant("Closed Diner");
        closed.is_active = false;
        save_restaurant(&db, &closed).await?;

        let listed = list_restaurants(&db).await?;
        let names: Vec<&str> = listed.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha Sushi", "Zeta Pizza"]);

        // Still reachable directly
        assert!(get_restaurant(&db, &closed.id).await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_saving_links_owner_account() -> Result<()> {
        let db = setup_test_db().await?;
        let owner = create_test_owner(&db, "owner@example.com").await?;
        let mut restaurant = sample_restaurant("Burger Barn");
        restaurant.owner_id = Some(owner.user.id.clone());
        save_restaurant(&db, &restaurant).await?;

        let owner = crate::core::auth::current_user(&db, &owner.token).await?.unwrap();
        assert_eq!(owner.restaurant_id.as_deref(), Some(restaurant.id.as_str()));
        let by_owner = get_restaurant_by_owner(&db, &owner.id).await?.unwrap();
        assert_eq!(by_owner.id, restaurant.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_owner_cannot_be_changed_by_saving() -> Result<()> {
        let db = setup_test_db().await?;
        let owner = create_test_owner(&db, "owner@example.com").await?;
        let rival = create_test_owner(&db, "rival@example.com").await?;
        let mut restaurant = sample_restaurant("Burger Barn");
        restaurant.owner_id = Some(owner.user.id.clone());
        save_restaurant(&db, &restaurant).await?;

        let mut taken = restaurant.clone();
        taken.owner_id = Some(rival.user.id.clone());
        taken.name = "Stolen Barn".to_string();
        assert!(matches!(save_restaurant(&db, &taken).await, Err(Error::Unauthorized)));

        let stored = get_restaurant(&db, &restaurant.id).await?.unwrap();
        assert_eq!(stored.name, "Burger Barn");
        assert_eq!(stored.owner_id, Some(owner.user.id));
        let rival = crate::core::auth::current_user(&db, &rival.token).await?.unwrap();
        assert!(rival.restaurant_id.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_restaurant_is_rejected_before_writing() -> Result<()> {
        let db = setup_test_db().await?;
        let mut restaurant = sample_restaurant("Burger Barn");
        restaurant.rating = 9.0;
        assert!(matches!(
            save_restaurant(&db, &restaurant).await,
            Err(Error::Validation { field: "rating", .. })
        ));
        assert!(list_restaurants(&db).await?.is_empty());
        Ok(())
    }

    #[test]
    fn test_parse_time_accepts_seconds() {
        assert_eq!(parse_time("09:30").unwrap(), NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(parse_time("21:00:00").unwrap(), NaiveTime::from_hms_opt(21, 0, 0).unwrap());
        assert!(parse_time("9am").is_err());
        assert!(weekday_from_index(7).is_err());
    }
}
