//! Users, roles and sign-in sessions.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Minimum accepted password length at sign-up and reset.
pub const MIN_PASSWORD_LEN: usize = 6;

/// What a user is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Browses restaurants and places orders
    Customer,
    /// Manages one restaurant's menu and processes its orders
    RestaurantOwner,
}

impl Role {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::RestaurantOwner => "restaurant_owner",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "customer" => Ok(Self::Customer),
            "restaurant_owner" => Ok(Self::RestaurantOwner),
            other => Err(Error::mapping(format!("unknown role `{other}`"))),
        }
    }
}

/// An authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    /// Set for restaurant owners once their restaurant exists
    pub restaurant_id: Option<String>,
}

impl User {
    /// Whether this user owns the given restaurant.
    #[must_use]
    pub fn owns(&self, restaurant_id: &str) -> bool {
        self.role == Role::RestaurantOwner && self.restaurant_id.as_deref() == Some(restaurant_id)
    }
}

/// A signed-in user plus the opaque token identifying the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user: User,
}

/// Sign-up form input.
#[derive(Debug, Clone)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: Role,
    pub restaurant_id: Option<String>,
}

impl SignUp {
    /// Checks the form before anything reaches the backend.
    pub fn validate(&self) -> Result<()> {
        validate_email(&self.email)?;
        validate_password(&self.password)?;
        if self.name.trim().is_empty() {
            return Err(Error::validation("name", "name cannot be empty"));
        }
        Ok(())
    }
}

/// Rejects anything that is obviously not an email address.
pub fn validate_email(email: &str) -> Result<()> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(Error::validation("email", format!("`{email}` is not an email address"))),
    }
}

/// Enforces the minimum password length.
pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::validation(
            "password",
            format!("must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
    Ok(())
}
