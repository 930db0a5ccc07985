//! Orders and the status machine they move through.
//!
//! ```text
//! pending ──▶ preparing ──▶ ready ──▶ completed
//!    │
//!    └──────▶ cancelled
//! ```
//!
//! Progress along the main line may skip steps but never goes back;
//! `completed` and `cancelled` are terminal.

use super::CartItem;
use crate::errors::{Error, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Preparing,
    Ready,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Preparing => "preparing",
            Self::Ready => "ready",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Position on the main line; `None` for `cancelled`.
    const fn rank(self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Preparing => Some(1),
            Self::Ready => Some(2),
            Self::Completed => Some(3),
            Self::Cancelled => None,
        }
    }

    /// The next step an owner would normally take.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::Preparing),
            Self::Preparing => Some(Self::Ready),
            Self::Ready => Some(Self::Completed),
            Self::Completed | Self::Cancelled => None,
        }
    }

    /// Whether moving from `self` to `to` is a forward transition.
    /// Staying on the same status is not a transition.
    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        match (self, to) {
            (Self::Pending, Self::Cancelled) => true,
            (from, to) => match (from.rank(), to.rank()) {
                (Some(from), Some(to)) => to > from,
                _ => false,
            },
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "preparing" => Ok(Self::Preparing),
            "ready" => Ok(Self::Ready),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(Error::mapping(format!("unknown order status `{other}`"))),
        }
    }
}

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    CreditCard,
    Cash,
}

impl PaymentKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreditCard => "credit_card",
            Self::Cash => "cash",
        }
    }

    /// Card payments are simulated as captured at placement; cash is
    /// collected on hand-over.
    #[must_use]
    pub const fn initial_payment_status(self) -> PaymentStatus {
        match self {
            Self::CreditCard => PaymentStatus::Paid,
            Self::Cash => PaymentStatus::Pending,
        }
    }
}

impl FromStr for PaymentKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "credit_card" => Ok(Self::CreditCard),
            "cash" => Ok(Self::Cash),
            other => Err(Error::mapping(format!("unknown payment method `{other}`"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Pending,
    Failed,
}

impl PaymentStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::Pending => "pending",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "paid" => Ok(Self::Paid),
            "pending" => Ok(Self::Pending),
            "failed" => Ok(Self::Failed),
            other => Err(Error::mapping(format!("unknown payment status `{other}`"))),
        }
    }
}

/// A placed order. Only `status` and `payment_status` change after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub restaurant_id: String,
    pub restaurant_name: String,
    /// Snapshot of the cart at placement
    pub items: Vec<CartItem>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub total: Decimal,
    pub payment_method: PaymentKind,
    pub payment_status: PaymentStatus,
}

impl Order {
    /// Sum of the snapshotted line totals.
    #[must_use]
    pub fn items_total(&self) -> Decimal {
        self.items.iter().map(CartItem::line_total).sum()
    }
}

/// Everything needed to submit an order. The id is chosen client-side so a
/// retried submit of the same draft cannot create a second order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    pub id: String,
    pub user_id: String,
    pub restaurant_id: String,
    pub restaurant_name: String,
    pub items: Vec<CartItem>,
    pub payment_method: PaymentKind,
}

impl OrderDraft {
    /// Recomputed from the lines; never taken from the caller.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Non-empty, single-restaurant, positive quantities.
    pub fn validate(&self) -> Result<()> {
        if self.items.is_empty() {
            return Err(Error::EmptyCart);
        }
        if let Some(line) = self
            .items
            .iter()
            .find(|line| line.menu_item.restaurant_id != self.restaurant_id)
        {
            return Err(Error::validation(
                "items",
                format!(
                    "`{}` belongs to restaurant {}, not {}",
                    line.menu_item.name, line.menu_item.restaurant_id, self.restaurant_id
                ),
            ));
        }
        if self.items.iter().any(|line| line.quantity == 0) {
            return Err(Error::validation("items", "quantities must be at least 1"));
        }
        Ok(())
    }
}

/// A status change pushed by the backend's change feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChanged {
    pub order_id: String,
    pub restaurant_id: String,
    pub status: OrderStatus,
}

/// Row-level change on the orders table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderChange {
    Placed(Box<Order>),
    StatusChanged(OrderStatusChanged),
}

impl OrderChange {
    #[must_use]
    pub fn order_id(&self) -> &str {
        match self {
            Self::Placed(order) => &order.id,
            Self::StatusChanged(change) => &change.order_id,
        }
    }

    #[must_use]
    pub fn restaurant_id(&self) -> &str {
        match self {
            Self::Placed(order) => &order.restaurant_id,
            Self::StatusChanged(change) => &change.restaurant_id,
        }
    }
}
