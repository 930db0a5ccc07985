//! Order data access - placement, listing and status updates.
//!
//! Placement is keyed by the client-generated draft id: placing a draft
//! whose id already exists returns the stored order instead of inserting a
//! second one. Lines are re-priced from the menu table, the client's prices
//! are never trusted.

use crate::{
    domain::{
        CartItem, MenuItem, Order, OrderDraft, OrderStatus, OrderStatusChanged, Role,
    },
    entities::{
        Order as OrderEntity, OrderItem, Restaurant as RestaurantEntity, User as UserEntity,
        order_items, orders,
    },
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Lists the orders visible to a user, newest first.
///
/// Customers see the orders they placed. Owners see every order of the
/// restaurant linked to their account, or nothing when none is linked.
pub async fn list_orders(db: &DatabaseConnection, user_id: &str, role: Role) -> Result<Vec<Order>> {
    let query = match role {
        Role::Customer => OrderEntity::find().filter(orders::Column::UserId.eq(user_id)),
        Role::RestaurantOwner => {
            let owner = UserEntity::find_by_id(user_id.to_string())
                .one(db)
                .await?
                .ok_or_else(|| Error::not_found("user", user_id))?;
            let Some(restaurant_id) = owner.restaurant_id else {
                debug!("Owner {} has no restaurant, no orders to list", user_id);
                return Ok(Vec::new());
            };
            OrderEntity::find().filter(orders::Column::RestaurantId.eq(restaurant_id))
        }
    };
    let rows = query
        .order_by_desc(orders::Column::CreatedAt)
        .order_by_desc(orders::Column::Id)
        .all(db)
        .await?;
    load_items(db, rows).await
}

/// Finds one order with its lines.
pub async fn get_order<C>(db: &C, id: &str) -> Result<Option<Order>>
where
    C: ConnectionTrait,
{
    let Some(row) = OrderEntity::find_by_id(id.to_string()).one(db).await? else {
        return Ok(None);
    };
    Ok(load_items(db, vec![row]).await?.pop())
}

/// Places an order. Returns the stored order and whether it was created by
/// this call (`false` when the draft id had already been placed).
///
/// # Errors
/// - [`Error::EmptyCart`] for a draft without lines
/// - a validation error when a line is unknown, from another restaurant, or
///   the restaurant is inactive or not taking online orders
/// - [`Error::Unauthorized`] when the id belongs to another customer's order
pub async fn place_order(db: &DatabaseConnection, draft: &OrderDraft) -> Result<(Order, bool)> {
    draft.validate()?;

    let txn = db.begin().await?;
    if let Some(existing) = get_order(&txn, &draft.id).await? {
        if existing.user_id != draft.user_id {
            warn!("Order id {} is taken by another customer", draft.id);
            return Err(Error::Unauthorized);
        }
        txn.commit().await?;
        info!("Order {} was already placed, returning stored copy", draft.id);
        return Ok((existing, false));
    }

    if UserEntity::find_by_id(draft.user_id.clone()).one(&txn).await?.is_none() {
        return Err(Error::not_found("user", draft.user_id.clone()));
    }
    let restaurant = RestaurantEntity::find_by_id(draft.restaurant_id.clone())
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("restaurant", draft.restaurant_id.clone()))?;
    if !restaurant.is_active || !restaurant.accepts_online_orders {
        return Err(Error::validation(
            "restaurant_id",
            format!("{} is not taking online orders", restaurant.name),
        ));
    }

    let ids: Vec<String> = draft.items.iter().map(|l| l.menu_item.id.clone()).collect();
    let current: HashMap<String, MenuItem> = super::menu::get_menu_items(&txn, ids)
        .await?
        .into_iter()
        .map(|item| (item.id.clone(), item))
        .collect();

    let mut lines = Vec::with_capacity(draft.items.len());
    for line in &draft.items {
        let item = current
            .get(&line.menu_item.id)
            .filter(|item| item.restaurant_id == restaurant.id)
            .ok_or_else(|| {
                Error::validation(
                    "items",
                    format!("`{}` is no longer on the menu", line.menu_item.name),
                )
            })?;
        lines.push(CartItem {
            menu_item: item.clone(),
            quantity: line.quantity,
        });
    }
    let total: Decimal = lines.iter().map(CartItem::line_total).sum();
    let now = Utc::now();
    let payment_status = draft.payment_method.initial_payment_status();

    orders::ActiveModel {
        id: Set(draft.id.clone()),
        user_id: Set(draft.user_id.clone()),
        restaurant_id: Set(restaurant.id.clone()),
        restaurant_name: Set(restaurant.name.clone()),
        status: Set(OrderStatus::Pending.as_str().to_string()),
        total: Set(super::menu::to_wire_price(total)),
        payment_method: Set(draft.payment_method.as_str().to_string()),
        payment_status: Set(payment_status.as_str().to_string()),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await?;

    for (line_no, line) in lines.iter().enumerate() {
        order_items::ActiveModel {
            order_id: Set(draft.id.clone()),
            line_no: Set(i32::try_from(line_no).unwrap_or(i32::MAX)),
            menu_item_id: Set(line.menu_item.id.clone()),
            category_id: Set(line.menu_item.category_id.clone()),
            name: Set(line.menu_item.name.clone()),
            description: Set(line.menu_item.description.clone()),
            price: Set(super::menu::to_wire_price(line.menu_item.price)),
            image_url: Set(line.menu_item.image_url.clone()),
            quantity: Set(i32::try_from(line.quantity).unwrap_or(i32::MAX)),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }

    let order = get_order(&txn, &draft.id)
        .await?
        .ok_or_else(|| Error::not_found("order", draft.id.clone()))?;
    txn.commit().await?;

    info!(
        "Order {} placed at {} for {} ({} line(s))",
        order.id,
        order.restaurant_name,
        order.total,
        order.items.len()
    );
    Ok((order, true))
}

/// Moves an order to `status`.
///
/// Returns the change that was written, or `None` when the order already
/// had that status and nothing was written.
///
/// # Errors
/// [`Error::InvalidTransition`] when the move is not forward along the
/// status pipeline.
pub async fn set_order_status(
    db: &DatabaseConnection,
    id: &str,
    status: OrderStatus,
) -> Result<Option<OrderStatusChanged>> {
    let row = OrderEntity::find_by_id(id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("order", id))?;
    let current: OrderStatus = row.status.parse()?;

    if current == status {
        debug!("Order {} already {}", id, status);
        return Ok(None);
    }
    if !current.can_transition_to(status) {
        return Err(Error::InvalidTransition {
            from: current,
            to: status,
        });
    }

    let restaurant_id = row.restaurant_id.clone();
    let mut row: orders::ActiveModel = row.into();
    row.status = Set(status.as_str().to_string());
    row.updated_at = Set(Utc::now());
    row.update(db).await?;

    info!("Order {} moved from {} to {}", id, current, status);
    Ok(Some(OrderStatusChanged {
        order_id: id.to_string(),
        restaurant_id,
        status,
    }))
}

/// Loads the lines of a batch of order rows, keeping row order.
async fn load_items<C>(db: &C, rows: Vec<orders::Model>) -> Result<Vec<Order>>
where
    C: ConnectionTrait,
{
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    let mut lines: HashMap<String, Vec<order_items::Model>> = HashMap::new();
    for line in OrderItem::find()
        .filter(order_items::Column::OrderId.is_in(ids))
        .order_by_asc(order_items::Column::LineNo)
        .all(db)
        .await?
    {
        lines.entry(line.order_id.clone()).or_default().push(line);
    }

    rows.into_iter()
        .map(|row| {
            let items = lines.remove(&row.id).unwrap_or_default();
            to_domain(row, items)
        })
        .collect()
}

fn to_domain(row: orders::Model, lines: Vec<order_items::Model>) -> Result<Order> {
    let items = lines
        .into_iter()
        .map(|line| {
            let quantity = u32::try_from(line.quantity)
                .map_err(|_| Error::mapping(format!("order line {} has quantity {}", line.id, line.quantity)))?;
            Ok(CartItem {
                menu_item: MenuItem {
                    id: line.menu_item_id,
                    restaurant_id: row.restaurant_id.clone(),
                    category_id: line.category_id,
                    name: line.name,
                    description: line.description,
                    price: super::menu::from_wire_price(line.price)?,
                    image_url: line.image_url,
                },
                quantity,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Order {
        status: row.status.parse()?,
        payment_method: row.payment_method.parse()?,
        payment_status: row.payment_status.parse()?,
        total: super::menu::from_wire_price(row.total)?,
        id: row.id,
        user_id: row.user_id,
        restaurant_id: row.restaurant_id,
        restaurant_name: row.restaurant_name,
        items,
        created_at: row.created_at,
    })
}
