//! Restaurants, their weekly opening hours and social links.

use crate::{
    errors::{Error, Result},
    geo::Coordinates,
};
use chrono::{Datelike, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// Opening hours for one weekday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayHours {
    pub weekday: Weekday,
    pub open: NaiveTime,
    pub close: NaiveTime,
    /// False means closed all day regardless of the times
    pub is_open: bool,
}

impl DayHours {
    /// Close time at or before the open time means the window runs past midnight.
    #[must_use]
    pub fn is_overnight(&self) -> bool {
        self.open >= self.close
    }

    /// Whether `time` on this weekday falls inside the window.
    #[must_use]
    pub fn covers_same_day(&self, time: NaiveTime) -> bool {
        if !self.is_open {
            return false;
        }
        if self.is_overnight() {
            time >= self.open
        } else {
            self.open <= time && time < self.close
        }
    }

    /// Whether `time` on the following weekday is still inside an overnight window.
    #[must_use]
    pub fn covers_next_morning(&self, time: NaiveTime) -> bool {
        self.is_open && self.is_overnight() && time < self.close
    }
}

/// A link to one of the restaurant's social media pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLink {
    /// e.g. `facebook`, `instagram`
    pub platform: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: String,
    pub owner_id: Option<String>,
    pub name: String,
    pub description: String,
    pub address: String,
    pub location: Coordinates,
    pub rating: f64,
    pub image_url: Option<String>,
    pub cover_image_url: Option<String>,
    /// Inactive restaurants are hidden from listings
    pub is_active: bool,
    pub accepts_online_orders: bool,
    /// One entry per weekday, Monday first
    pub opening_hours: Vec<DayHours>,
    pub social_links: Vec<SocialLink>,
}

impl Restaurant {
    /// Hours entry for a weekday, if one is configured.
    #[must_use]
    pub fn hours_for(&self, weekday: Weekday) -> Option<&DayHours> {
        self.opening_hours.iter().find(|h| h.weekday == weekday)
    }

    /// Whether the restaurant is open at the given local time.
    #[must_use]
    pub fn is_open_at(&self, at: NaiveDateTime) -> bool {
        let time = at.time();
        self.hours_for(at.weekday())
            .is_some_and(|h| h.covers_same_day(time))
            || self
                .hours_for(at.weekday().pred())
                .is_some_and(|h| h.covers_next_morning(time))
    }

    /// Whether an online order can be placed at the given local time.
    #[must_use]
    pub fn accepts_orders_at(&self, at: NaiveDateTime) -> bool {
        self.is_active && self.accepts_online_orders && self.is_open_at(at)
    }

    /// Checks the fields an owner can edit from the settings screen.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("name", "restaurant name cannot be empty"));
        }
        if !self.location.is_valid() {
            return Err(Error::validation("location", "coordinates out of range"));
        }
        if !(0.0..=5.0).contains(&self.rating) {
            return Err(Error::validation("rating", "rating must be between 0 and 5"));
        }
        let mut seen = Vec::with_capacity(self.opening_hours.len());
        for hours in &self.opening_hours {
            if seen.contains(&hours.weekday) {
                return Err(Error::validation(
                    "opening_hours",
                    format!("{} listed twice", hours.weekday),
                ));
            }
            seen.push(hours.weekday);
        }
        Ok(())
    }
}

/// Seven open days from 09:00 to 22:00, the hours a new restaurant starts with.
#[must_use]
pub fn default_opening_hours() -> Vec<DayHours> {
    let open = NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN);
    let close = NaiveTime::from_hms_opt(22, 0, 0).unwrap_or(NaiveTime::MIN);
    [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ]
    .into_iter()
    .map(|weekday| DayHours {
        weekday,
        open,
        close,
        is_open: true,
    })
    .collect()
}
