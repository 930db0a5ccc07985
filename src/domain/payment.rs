//! Saved payment methods and card input validation.
//!
//! Card numbers and CVVs are only ever held in [`CardInput`] long enough to
//! validate them. What reaches the backend is a [`NewPaymentMethod`]: brand,
//! last four digits, expiry and holder name.

use crate::errors::{Error, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardType {
    CreditCard,
    DebitCard,
}

impl CardType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreditCard => "credit_card",
            Self::DebitCard => "debit_card",
        }
    }
}

impl FromStr for CardType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "credit_card" => Ok(Self::CreditCard),
            "debit_card" => Ok(Self::DebitCard),
            other => Err(Error::mapping(format!("unknown card type `{other}`"))),
        }
    }
}

/// Card network, derived from the number's prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardBrand {
    Visa,
    Mastercard,
    Amex,
    Discover,
    Unknown,
}

impl CardBrand {
    /// Detects the brand from the leading digits of a card number.
    #[must_use]
    pub fn detect(digits: &str) -> Self {
        let prefix = |len: usize| -> u32 {
            digits
                .get(..len)
                .and_then(|p| p.parse().ok())
                .unwrap_or(0)
        };
        if digits.starts_with('4') {
            Self::Visa
        } else if (51..=55).contains(&prefix(2)) || (2221..=2720).contains(&prefix(4)) {
            Self::Mastercard
        } else if matches!(prefix(2), 34 | 37) {
            Self::Amex
        } else if prefix(4) == 6011 || prefix(2) == 65 || (644..=649).contains(&prefix(3)) {
            Self::Discover
        } else {
            Self::Unknown
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Visa => "Visa",
            Self::Mastercard => "Mastercard",
            Self::Amex => "American Express",
            Self::Discover => "Discover",
            Self::Unknown => "Card",
        }
    }
}

impl fmt::Display for CardBrand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CardBrand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Visa" => Ok(Self::Visa),
            "Mastercard" => Ok(Self::Mastercard),
            "American Express" => Ok(Self::Amex),
            "Discover" => Ok(Self::Discover),
            "Card" => Ok(Self::Unknown),
            other => Err(Error::mapping(format!("unknown card brand `{other}`"))),
        }
    }
}

/// A stored payment method. At most one per user has `is_default` set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
    pub user_id: String,
    pub card_type: CardType,
    pub brand: CardBrand,
    pub last_four: String,
    /// `MM/YY`
    pub expiry: String,
    pub cardholder_name: String,
    pub is_default: bool,
}

impl PaymentMethod {
    /// e.g. `Visa •••• 4242`
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} •••• {}", self.brand, self.last_four)
    }
}

/// Raw card form input.
#[derive(Debug, Clone)]
pub struct CardInput {
    pub card_type: CardType,
    /// Spaces and dashes are ignored
    pub number: String,
    /// `MM/YY`
    pub expiry: String,
    pub cvv: String,
    pub cardholder_name: String,
    pub is_default: bool,
}

/// The persistable part of a validated card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPaymentMethod {
    pub card_type: CardType,
    pub brand: CardBrand,
    pub last_four: String,
    pub expiry: String,
    pub cardholder_name: String,
    pub is_default: bool,
}

/// Editable fields of a stored payment method; `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentMethodUpdate {
    pub expiry: Option<String>,
    pub cardholder_name: Option<String>,
    pub is_default: Option<bool>,
}

impl PaymentMethodUpdate {
    /// Validates any supplied field against `today`.
    pub fn validate(&self, today: NaiveDate) -> Result<()> {
        if let Some(expiry) = &self.expiry {
            validate_expiry(expiry, today)?;
        }
        if let Some(name) = &self.cardholder_name {
            validate_holder(name)?;
        }
        Ok(())
    }
}

impl CardInput {
    /// Validates the form against `today` and strips it down to what may be stored.
    pub fn validate(&self, today: NaiveDate) -> Result<NewPaymentMethod> {
        let digits: String = self
            .number
            .chars()
            .filter(|c| !matches!(c, ' ' | '-'))
            .collect();
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::validation("number", "card number must be digits only"));
        }
        if !(13..=19).contains(&digits.len()) {
            return Err(Error::validation("number", "card number must be 13 to 19 digits"));
        }
        if !luhn_valid(&digits) {
            return Err(Error::validation("number", "card number failed checksum"));
        }
        validate_expiry(&self.expiry, today)?;
        let cvv_ok = (3..=4).contains(&self.cvv.len()) && self.cvv.chars().all(|c| c.is_ascii_digit());
        if !cvv_ok {
            return Err(Error::validation("cvv", "CVV must be 3 or 4 digits"));
        }
        validate_holder(&self.cardholder_name)?;

        Ok(NewPaymentMethod {
            card_type: self.card_type,
            brand: CardBrand::detect(&digits),
            last_four: digits[digits.len() - 4..].to_string(),
            expiry: self.expiry.trim().to_string(),
            cardholder_name: self.cardholder_name.trim().to_string(),
            is_default: self.is_default,
        })
    }
}

fn validate_holder(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::validation("cardholder_name", "cardholder name cannot be empty"));
    }
    Ok(())
}

/// Accepts `MM/YY` for the current month or later.
pub fn validate_expiry(expiry: &str, today: NaiveDate) -> Result<()> {
    let invalid = || Error::validation("expiry", format!("`{expiry}` is not a valid MM/YY date"));
    let (month, year) = expiry.trim().split_once('/').ok_or_else(invalid)?;
    if month.len() != 2 || year.len() != 2 {
        return Err(invalid());
    }
    let month: u32 = month.parse().map_err(|_| invalid())?;
    let year: i32 = year.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }
    let year = 2000 + year;
    if (year, month) < (today.year(), today.month()) {
        return Err(Error::validation("expiry", "card has expired"));
    }
    Ok(())
}

/// Luhn mod-10 checksum over an all-digit string.
#[must_use]
pub fn luhn_valid(digits: &str) -> bool {
    let mut sum = 0;
    for (i, c) in digits.chars().rev().enumerate() {
        let Some(mut d) = c.to_digit(10) else {
            return false;
        };
        if i % 2 == 1 {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
    }
    sum % 10 == 0
}
