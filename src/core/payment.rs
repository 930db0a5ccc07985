//! Payment method data access.
//!
//! Only display metadata is stored (brand, last four digits, expiry and
//! holder name). Changing the default card runs in one transaction: the
//! user's other defaults are cleared before the new row is written.

use crate::{
    domain::{CardInput, NewPaymentMethod, PaymentMethod, PaymentMethodUpdate},
    entities::{PaymentMethod as PaymentMethodEntity, User as UserEntity, payment_methods},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::{info, warn};

/// Lists a user's payment methods, default first, then oldest first.
pub async fn list_payment_methods(db: &DatabaseConnection, user_id: &str) -> Result<Vec<PaymentMethod>> {
    PaymentMethodEntity::find()
        .filter(payment_methods::Column::UserId.eq(user_id))
        .order_by_desc(payment_methods::Column::IsDefault)
        .order_by_asc(payment_methods::Column::CreatedAt)
        .order_by_asc(payment_methods::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(to_domain)
        .collect()
}

/// Validates card input and stores it.
///
/// # Errors
/// Card validation errors are returned before anything is written.
pub async fn add_payment_method(
    db: &DatabaseConnection,
    user_id: &str,
    card: &CardInput,
) -> Result<PaymentMethod> {
    let card: NewPaymentMethod = card.validate(Utc::now().date_naive())?;

    let txn = db.begin().await?;
    if UserEntity::find_by_id(user_id.to_string()).one(&txn).await?.is_none() {
        return Err(Error::not_found("user", user_id));
    }
    if card.is_default {
        clear_defaults(&txn, user_id, None).await?;
    }
    let row = payment_methods::ActiveModel {
        id: Set(crate::domain::new_id()),
        user_id: Set(user_id.to_string()),
        card_type: Set(card.card_type.as_str().to_string()),
        brand: Set(card.brand.as_str().to_string()),
        last_four: Set(card.last_four),
        expiry: Set(card.expiry),
        cardholder_name: Set(card.cardholder_name),
        is_default: Set(card.is_default),
        created_at: Set(Utc::now()),
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    info!("Payment method {} added for user {}", row.id, user_id);
    to_domain(row)
}

/// Applies the given changes to one of `user_id`'s payment methods.
///
/// # Errors
/// [`Error::Unauthorized`] when the method belongs to another user.
pub async fn update_payment_method(
    db: &DatabaseConnection,
    user_id: &str,
    id: &str,
    changes: &PaymentMethodUpdate,
) -> Result<PaymentMethod> {
    changes.validate(Utc::now().date_naive())?;

    let txn = db.begin().await?;
    let existing = find_owned(&txn, user_id, id)
        .await?
        .ok_or_else(|| Error::not_found("payment method", id))?;
    if changes.is_default == Some(true) {
        clear_defaults(&txn, user_id, Some(id)).await?;
    }

    let mut row: payment_methods::ActiveModel = existing.into();
    if let Some(expiry) = &changes.expiry {
        row.expiry = Set(expiry.trim().to_string());
    }
    if let Some(name) = &changes.cardholder_name {
        row.cardholder_name = Set(name.trim().to_string());
    }
    if let Some(is_default) = changes.is_default {
        row.is_default = Set(is_default);
    }
    let row = row.update(&txn).await?;
    txn.commit().await?;
    to_domain(row)
}

/// Deletes one of `user_id`'s payment methods. No other card is promoted
/// to default.
pub async fn delete_payment_method(db: &DatabaseConnection, user_id: &str, id: &str) -> Result<bool> {
    if find_owned(db, user_id, id).await?.is_none() {
        return Ok(false);
    }
    let result = PaymentMethodEntity::delete_many()
        .filter(payment_methods::Column::Id.eq(id))
        .filter(payment_methods::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected > 0)
}

/// The method with `id`, `None` if there is none, or `Unauthorized` if it
/// belongs to someone else.
async fn find_owned<C>(db: &C, user_id: &str, id: &str) -> Result<Option<payment_methods::Model>>
where
    C: ConnectionTrait,
{
    match PaymentMethodEntity::find_by_id(id.to_string()).one(db).await? {
        Some(row) if row.user_id != user_id => {
            warn!("User {} tried to change payment method {} of another user", user_id, id);
            Err(Error::Unauthorized)
        }
        found => Ok(found),
    }
}

async fn clear_defaults<C>(db: &C, user_id: &str, except: Option<&str>) -> Result<()>
where
    C: ConnectionTrait,
{
    let mut query = PaymentMethodEntity::update_many()
        .col_expr(payment_methods::Column::IsDefault, Expr::value(false))
        .filter(payment_methods::Column::UserId.eq(user_id))
        .filter(payment_methods::Column::IsDefault.eq(true));
    if let Some(except) = except {
        query = query.filter(payment_methods::Column::Id.ne(except));
    }
    query.exec(db).await?;
    Ok(())
}

fn to_domain(row: payment_methods::Model) -> Result<PaymentMethod> {
    Ok(PaymentMethod {
        card_type: row.card_type.parse()?,
        brand: row.brand.parse()?,
        id: row.id,
        user_id: row.user_id,
        last_four: row.last_four,
        expiry: row.expiry,
        cardholder_name: row.cardholder_name,
        is_default: row.is_default,
    })
}
