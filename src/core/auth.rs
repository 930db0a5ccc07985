//! Authentication - accounts, sign-in sessions and password resets.
//!
//! Passwords are hashed with argon2. Sessions and reset tickets are opaque
//! random tokens stored in `auth_tokens` with an expiry; a token is only
//! accepted for the purpose it was issued for.

use crate::{
    domain::{Role, Session, SignUp, User, user},
    entities::{AuthToken, User as UserEntity, auth_tokens, users},
    errors::{Error, Result},
};
use chrono::{Duration, Utc};
use sea_orm::{Set, TransactionTrait, prelude::*};
use tracing::{debug, info, warn};

/// How long a sign-in session stays valid.
pub const SESSION_TTL_DAYS: i64 = 30;
/// How long a password reset ticket stays valid.
pub const RESET_TTL_HOURS: i64 = 1;

/// Creates an account and signs it in.
///
/// # Errors
/// Returns a validation error for malformed input or an email that is
/// already registered.
pub async fn sign_up(db: &DatabaseConnection, form: &SignUp) -> Result<Session> {
    form.validate()?;
    let email = normalize_email(&form.email);

    if find_user_by_email(db, &email).await?.is_some() {
        return Err(Error::validation("email", "an account with this email already exists"));
    }

    let account = users::ActiveModel {
        id: Set(crate::domain::new_id()),
        email: Set(email),
        name: Set(form.name.trim().to_string()),
        role: Set(form.role.as_str().to_string()),
        restaurant_id: Set(form.restaurant_id.clone()),
        password_hash: Set(hash_password(&form.password)?),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await?;

    info!("New {} account {}", form.role, account.id);
    let user = to_domain(account)?;
    let token = issue_token(db, &user.id, auth_tokens::PURPOSE_SESSION, session_ttl()).await?;
    Ok(Session { token, user })
}

/// Verifies credentials and opens a new session.
pub async fn sign_in(db: &DatabaseConnection, email: &str, password: &str) -> Result<Session> {
    let Some(account) = find_user_by_email(db, &normalize_email(email)).await? else {
        debug!("Sign-in for unknown email");
        return Err(Error::InvalidCredentials);
    };
    if !verify_password(&account.password_hash, password)? {
        debug!("Wrong password for user {}", account.id);
        return Err(Error::InvalidCredentials);
    }

    let user = to_domain(account)?;
    let token = issue_token(db, &user.id, auth_tokens::PURPOSE_SESSION, session_ttl()).await?;
    info!("User {} signed in", user.id);
    Ok(Session { token, user })
}

/// Revokes a session token. Unknown tokens are ignored.
pub async fn sign_out(db: &DatabaseConnection, token: &str) -> Result<()> {
    let result = AuthToken::delete_many()
        .filter(auth_tokens::Column::Token.eq(token))
        .filter(auth_tokens::Column::Purpose.eq(auth_tokens::PURPOSE_SESSION))
        .exec(db)
        .await?;
    debug!("Signed out ({} session row(s) removed)", result.rows_affected);
    Ok(())
}

/// Resolves a session token to its user; `None` for unknown or expired tokens.
pub async fn current_user(db: &DatabaseConnection, token: &str) -> Result<Option<User>> {
    let Some(row) = live_token(db, token, auth_tokens::PURPOSE_SESSION).await? else {
        return Ok(None);
    };
    UserEntity::find_by_id(row.user_id)
        .one(db)
        .await?
        .map(to_domain)
        .transpose()
}

/// Issues a password reset ticket for `email`.
///
/// Returns `None` for unknown emails so callers can answer identically
/// either way; delivering the ticket is up to the caller.
pub async fn issue_password_reset(db: &DatabaseConnection, email: &str) -> Result<Option<String>> {
    let Some(account) = find_user_by_email(db, &normalize_email(email)).await? else {
        debug!("Password reset requested for unknown email");
        return Ok(None);
    };
    let ticket = issue_token(
        db,
        &account.id,
        auth_tokens::PURPOSE_PASSWORD_RESET,
        Duration::hours(RESET_TTL_HOURS),
    )
    .await?;
    info!("Password reset issued for user {}", account.id);
    Ok(Some(ticket))
}

/// Sets a new password using a reset ticket. The ticket and every open
/// session of the user are revoked.
pub async fn complete_password_reset(
    db: &DatabaseConnection,
    ticket: &str,
    new_password: &str,
) -> Result<()> {
    user::validate_password(new_password)?;
    let row = live_token(db, ticket, auth_tokens::PURPOSE_PASSWORD_RESET)
        .await?
        .ok_or(Error::Unauthorized)?;
    let password_hash = hash_password(new_password)?;

    let txn = db.begin().await?;
    let mut account: users::ActiveModel = UserEntity::find_by_id(row.user_id.clone())
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("user", row.user_id.clone()))?
        .into();
    account.password_hash = Set(password_hash);
    account.update(&txn).await?;

    AuthToken::delete_many()
        .filter(auth_tokens::Column::UserId.eq(row.user_id.clone()))
        .exec(&txn)
        .await?;
    txn.commit().await?;

    info!("Password reset completed for user {}", row.user_id);
    Ok(())
}

/// Changes a user's display name and email, the only user fields that are mutable.
pub async fn update_profile(
    db: &DatabaseConnection,
    user_id: &str,
    name: &str,
    email: &str,
) -> Result<User> {
    if name.trim().is_empty() {
        return Err(Error::validation("name", "name cannot be empty"));
    }
    user::validate_email(email)?;
    let email = normalize_email(email);

    let existing = UserEntity::find_by_id(user_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))?;
    let taken = find_user_by_email(db, &email)
        .await?
        .is_some_and(|other| other.id != existing.id);
    if taken {
        return Err(Error::validation("email", "an account with this email already exists"));
    }

    let mut account: users::ActiveModel = existing.into();
    account.name = Set(name.trim().to_string());
    account.email = Set(email);
    to_domain(account.update(db).await?)
}

/// Links an owner account to the restaurant it manages.
pub async fn link_restaurant<C>(db: &C, owner_id: &str, restaurant_id: &str) -> Result<()>
where
    C: ConnectionTrait,
{
    let Some(owner) = UserEntity::find_by_id(owner_id.to_string()).one(db).await? else {
        warn!("Restaurant {} names unknown owner {}", restaurant_id, owner_id);
        return Ok(());
    };
    if owner.restaurant_id.as_deref() == Some(restaurant_id) {
        return Ok(());
    }
    let mut owner: users::ActiveModel = owner.into();
    owner.restaurant_id = Set(Some(restaurant_id.to_string()));
    owner.update(db).await?;
    Ok(())
}

pub(crate) fn to_domain(row: users::Model) -> Result<User> {
    Ok(User {
        role: row.role.parse::<Role>()?,
        id: row.id,
        email: row.email,
        name: row.name,
        restaurant_id: row.restaurant_id,
    })
}

async fn find_user_by_email(db: &DatabaseConnection, email: &str) -> Result<Option<users::Model>> {
    UserEntity::find()
        .filter(users::Column::Email.eq(email))
        .one(db)
        .await
        .map_err(Into::into)
}

async fn issue_token(
    db: &DatabaseConnection,
    user_id: &str,
    purpose: &str,
    ttl: Duration,
) -> Result<String> {
    let now = Utc::now();
    let token = new_token();
    auth_tokens::ActiveModel {
        token: Set(token.clone()),
        user_id: Set(user_id.to_string()),
        purpose: Set(purpose.to_string()),
        created_at: Set(now),
        expires_at: Set(now + ttl),
    }
    .insert(db)
    .await?;
    Ok(token)
}

async fn live_token(
    db: &DatabaseConnection,
    token: &str,
    purpose: &str,
) -> Result<Option<auth_tokens::Model>> {
    let row = AuthToken::find_by_id(token.to_string()).one(db).await?;
    Ok(row.filter(|row| row.purpose == purpose && row.expires_at > Utc::now()))
}

fn session_ttl() -> Duration {
    Duration::days(SESSION_TTL_DAYS)
}

fn new_token() -> String {
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Hash password using argon2
fn hash_password(password: &str) -> Result<String> {
    use argon2::{
        Argon2,
        password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
    };

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify password using argon2
fn verify_password(hash: &str, password: &str) -> Result<bool> {
    use argon2::{
        Argon2,
        password_hash::{PasswordHash, PasswordVerifier},
    };

    let parsed = PasswordHash::new(hash)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_sign_up_then_sign_in() -> Result<()> {
        let db = setup_test_db().await?;
        let session = sign_up(&db, &customer_sign_up("Ana@Example.com")).await?;
        assert_eq!(session.user.email, "ana@example.com");
        assert_eq!(session.user.role, Role::Customer);

        let again = sign_in(&db, "ana@example.com", TEST_PASSWORD).await?;
        assert_eq!(again.user, session.user);
        assert_ne!(again.token, session.token);
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected() -> Result<()> {
        let db = setup_test_db().await?;
        sign_up(&db, &customer_sign_up("ana@example.com")).await?;
        let result = sign_up(&db, &customer_sign_up("ANA@example.com")).await;
        assert!(matches!(result, Err(Error::Validation { field: "email", .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_email() -> Result<()> {
        let db = setup_test_db().await?;
        sign_up(&db, &customer_sign_up("ana@example.com")).await?;
        assert!(matches!(
            sign_in(&db, "ana@example.com", "not-the-password").await,
            Err(Error::InvalidCredentials)
        ));
        assert!(matches!(
            sign_in(&db, "bob@example.com", TEST_PASSWORD).await,
            Err(Error::InvalidCredentials)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_sign_out_revokes_session() -> Result<()> {
        let db = setup_test_db().await?;
        let session = sign_up(&db, &customer_sign_up("ana@example.com")).await?;
        assert_eq!(current_user(&db, &session.token).await?, Some(session.user.clone()));

        sign_out(&db, &session.token).await?;
        assert_eq!(current_user(&db, &session.token).await?, None);
        // Unknown token is not an error
        sign_out(&db, "nope").await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_password_reset_flow() -> Result<()> {
        let db = setup_test_db().await?;
        let session = sign_up(&db, &customer_sign_up("ana@example.com")).await?;

        assert_eq!(issue_password_reset(&db, "nobody@example.com").await?, None);
        let ticket = issue_password_reset(&db, "ana@example.com").await?.unwrap();

        // A reset ticket is not a session
        assert_eq!(current_user(&db, &ticket).await?, None);

        complete_password_reset(&db, &ticket, "brand-new-secret").await?;
        assert!(sign_in(&db, "ana@example.com", TEST_PASSWORD).await.is_err());
        sign_in(&db, "ana@example.com", "brand-new-secret").await?;

        // Old sessions and the used ticket are gone
        assert_eq!(current_user(&db, &session.token).await?, None);
        assert!(matches!(
            complete_password_reset(&db, &ticket, "another-secret").await,
            Err(Error::Unauthorized)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_profile() -> Result<()> {
        let db = setup_test_db().await?;
        let ana = sign_up(&db, &customer_sign_up("ana@example.com")).await?;
        sign_up(&db, &customer_sign_up("bob@example.com")).await?;

        let updated = update_profile(&db, &ana.user.id, "Ana Maria", "ana.maria@example.com").await?;
        assert_eq!(updated.name, "Ana Maria");
        assert_eq!(updated.email, "ana.maria@example.com");

        let taken = update_profile(&db, &ana.user.id, "Ana", "bob@example.com").await;
        assert!(matches!(taken, Err(Error::Validation { field: "email", .. })));
        Ok(())
    }
}
