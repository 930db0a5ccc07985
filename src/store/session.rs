//! Account and payment method operations of the store.

use super::Store;
use crate::{
    domain::{CardInput, PaymentMethod, PaymentMethodUpdate, Session, SignUp, User},
    errors::Error,
};
use chrono::Utc;
use tracing::{debug, info, warn};

impl Store {
    pub async fn sign_up(&self, form: &SignUp) -> bool {
        if let Err(e) = form.validate() {
            self.report("Sign up", &e);
            return false;
        }
        match self.backend.sign_up(form).await {
            Ok(session) => {
                self.start_session(session, false);
                true
            }
            Err(e) => {
                self.report("Sign up", &e);
                false
            }
        }
    }

    /// Signs in and records the remember-me choice in local storage.
    pub async fn sign_in(&self, email: &str, password: &str, remember_me: bool) -> bool {
        match self.backend.sign_in(email, password).await {
            Ok(session) => {
                self.start_session(session, remember_me);
                true
            }
            Err(e) => {
                self.report("Sign in", &e);
                false
            }
        }
    }

    /// Resumes a session from a token issued earlier.
    pub async fn restore_session(&self, token: &str) -> bool {
        match self.backend.current_user(token).await {
            Ok(Some(user)) => {
                self.install_session(Session {
                    token: token.to_string(),
                    user,
                });
                true
            }
            Ok(None) => {
                info!("Stored session is no longer valid");
                false
            }
            Err(e) => {
                self.report("Restoring session", &e);
                false
            }
        }
    }

    /// Ends the session and forgets everything that belonged to the user.
    pub async fn sign_out(&self) {
        let Some(session) = self.write().session.take() else {
            return;
        };
        self.forget_user_data();
        self.remember(false);
        if let Err(e) = self.backend.sign_out(&session.token).await {
            // The local session is gone either way
            warn!("Sign-out request failed: {}", e);
        }
        info!("User {} signed out", session.user.id);
    }

    /// Asks the backend to start a password reset for `email`.
    pub async fn reset_password(&self, email: &str) -> bool {
        if let Err(e) = crate::domain::user::validate_email(email) {
            self.report("Password reset", &e);
            return false;
        }
        match self.backend.reset_password(email).await {
            Ok(()) => {
                self.announce("Check your inbox for a password reset link");
                true
            }
            Err(e) => {
                self.report("Password reset", &e);
                false
            }
        }
    }

    pub async fn complete_password_reset(&self, ticket: &str, new_password: &str) -> bool {
        if let Err(e) = crate::domain::user::validate_password(new_password) {
            self.report("Password reset", &e);
            return false;
        }
        match self.backend.complete_password_reset(ticket, new_password).await {
            Ok(()) => {
                self.announce("Password updated, please sign in again");
                true
            }
            Err(e) => {
                self.report("Password reset", &e);
                false
            }
        }
    }

    pub async fn update_profile(&self, name: &str, email: &str) -> Option<User> {
        let user_id = self.require_user("Updating profile")?.id;
        match self.backend.update_profile(&user_id, name, email).await {
            Ok(user) => {
                if let Some(session) = self.write().session.as_mut() {
                    session.user = user.clone();
                }
                self.announce("Profile updated");
                Some(user)
            }
            Err(e) => {
                self.report("Updating profile", &e);
                None
            }
        }
    }

    pub async fn load_payment_methods(&self) -> Vec<PaymentMethod> {
        let Some(user) = self.require_user("Loading payment methods") else {
            return Vec::new();
        };
        match self.backend.list_payment_methods(&user.id).await {
            Ok(methods) => {
                let mut state = self.write();
                // A response for a user who has signed out since is dropped
                if state.session.as_ref().map(|s| s.user.id.as_str()) == Some(user.id.as_str()) {
                    state.payment_methods.clone_from(&methods);
                }
                methods
            }
            Err(e) => {
                self.report("Loading payment methods", &e);
                Vec::new()
            }
        }
    }

    /// Validates the card locally, stores it and refreshes the cached list.
    pub async fn add_payment_method(&self, card: &CardInput) -> Option<PaymentMethod> {
        let user = self.require_user("Adding card")?;
        if let Err(e) = card.validate(Utc::now().date_naive()) {
            self.report("Adding card", &e);
            return None;
        }
        match self.backend.add_payment_method(&user.id, card).await {
            Ok(method) => {
                self.load_payment_methods().await;
                self.announce(format!("{} added", method.display_name()));
                Some(method)
            }
            Err(e) => {
                self.report("Adding card", &e);
                None
            }
        }
    }

    pub async fn update_payment_method(
        &self,
        id: &str,
        changes: &PaymentMethodUpdate,
    ) -> Option<PaymentMethod> {
        let user = self.require_user("Updating card")?;
        if let Err(e) = changes.validate(Utc::now().date_naive()) {
            self.report("Updating card", &e);
            return None;
        }
        match self.backend.update_payment_method(&user.id, id, changes).await {
            Ok(method) => {
                self.load_payment_methods().await;
                Some(method)
            }
            Err(e) => {
                self.report("Updating card", &e);
                None
            }
        }
    }

    pub async fn delete_payment_method(&self, id: &str) -> bool {
        let Some(user) = self.require_user("Removing card") else {
            return false;
        };
        match self.backend.delete_payment_method(&user.id, id).await {
            Ok(deleted) => {
                self.write().payment_methods.retain(|m| m.id != id);
                deleted
            }
            Err(e) => {
                self.report("Removing card", &e);
                false
            }
        }
    }

    /// The signed-in user, or `None` after queuing an "unauthorized" notice.
    pub(super) fn require_user(&self, action: &str) -> Option<User> {
        let user = self.current_user();
        if user.is_none() {
            self.report(action, &Error::Unauthorized);
        }
        user
    }

    fn start_session(&self, session: Session, remember_me: bool) {
        info!("User {} signed in as {}", session.user.id, session.user.role);
        self.install_session(session);
        self.remember(remember_me);
    }

    /// Stores `session`. Switching to another user first drops everything
    /// cached for the previous one.
    fn install_session(&self, session: Session) {
        let previous = self.current_user().map(|u| u.id);
        if previous.is_some_and(|id| id != session.user.id) {
            debug!("Switching user, clearing cached orders and cards");
            self.forget_user_data();
        }
        self.write().session = Some(session);
    }

    /// Drops the realtime watch and every cache that belongs to one user.
    fn forget_user_data(&self) {
        self.unwatch();
        let mut state = self.write();
        state.orders.clear();
        state.payment_methods.clear();
        state.pending_order_id = None;
    }

    fn remember(&self, remember_me: bool) {
        if let Some(local) = &self.local {
            if let Err(e) = local.set_remember_me(remember_me) {
                warn!("Could not store remember-me flag: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{
        core::SeaOrmBackend,
        domain::{PaymentKind, Role},
        errors::Result,
        storage::LocalStore,
        store::NoticeLevel,
        test_utils::*,
    };
    use std::sync::Arc;

    async fn store() -> Result<Store> {
        Ok(Store::new(Arc::new(SeaOrmBackend::new(setup_test_db().await?))))
    }

    #[tokio::test]
    async fn test_sign_up_sign_out_sign_in() -> Result<()> {
        let store = store().await?;
        assert!(store.sign_up(&customer_sign_up("ana@example.com")).await);
        assert_eq!(store.current_user().map(|u| u.role), Some(Role::Customer));

        store.sign_out().await;
        assert!(store.current_user().is_none());

        assert!(!store.sign_in("ana@example.com", "wrong-password", false).await);
        assert!(store.current_user().is_none());
        assert!(store.sign_in("ana@example.com", TEST_PASSWORD, false).await);
        assert!(store.current_user().is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_remember_me_is_persisted_locally() -> Result<()> {
        let path = std::env::temp_dir()
            .join(format!("order-buddy-{}", crate::domain::new_id()))
            .join("storage.json");
        let local = LocalStore::new(&path);
        let store = store().await?.with_local_store(local.clone());
        store.sign_up(&customer_sign_up("ana@example.com")).await;
        store.sign_out().await;

        assert!(store.sign_in("ana@example.com", TEST_PASSWORD, true).await);
        assert!(local.remember_me());
        store.sign_out().await;
        assert!(!local.remember_me());
        Ok(())
    }

    #[tokio::test]
    async fn test_restore_session_from_token() -> Result<()> {
        let db = setup_test_db().await?;
        let session = crate::core::auth::sign_up(&db, &customer_sign_up("ana@example.com")).await?;
        let store = Store::new(Arc::new(SeaOrmBackend::new(db)));

        assert!(store.restore_session(&session.token).await);
        assert_eq!(store.current_user(), Some(session.user));
        assert!(!Store::new(store.backend.clone()).restore_session("stale").await);
        Ok(())
    }

    #[tokio::test]
    async fn test_profile_update_requires_session() -> Result<()> {
        let store = store().await?;
        assert!(store.update_profile("Ana", "ana@example.com").await.is_none());
        assert_eq!(store.take_notices()[0].level, NoticeLevel::Error);

        store.sign_up(&customer_sign_up("ana@example.com")).await;
        let updated = store.update_profile("Ana Diaz", "ana.diaz@example.com").await.unwrap();
        assert_eq!(store.current_user(), Some(updated));
        Ok(())
    }

    #[tokio::test]
    async fn test_two_default_cards_leave_one_default() -> Result<()> {
        let store = store().await?;
        store.sign_up(&customer_sign_up("ana@example.com")).await;

        store.add_payment_method(&test_card("4242424242424242", true)).await.unwrap();
        let second = store
            .add_payment_method(&test_card("5555555555554444", true))
            .await
            .unwrap();

        let defaults: Vec<_> = store
            .payment_methods()
            .into_iter()
            .filter(|m| m.is_default)
            .collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].id, second.id);
        assert_eq!(store.default_payment_method().map(|m| m.id), Some(second.id));
        Ok(())
    }

    #[tokio::test]
    async fn test_bad_card_is_rejected_before_the_backend() -> Result<()> {
        let store = store().await?;
        store.sign_up(&customer_sign_up("ana@example.com")).await;
        store.take_notices();

        let mut card = test_card("4242424242424242", true);
        card.expiry = "01/20".to_string();
        assert!(store.add_payment_method(&card).await.is_none());
        assert!(store.load_payment_methods().await.is_empty());
        assert_eq!(store.take_notices().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_removing_a_card() -> Result<()> {
        let store = store().await?;
        store.sign_up(&customer_sign_up("ana@example.com")).await;
        let card = store
            .add_payment_method(&test_card("4242424242424242", false))
            .await
            .unwrap();
        assert!(store.delete_payment_method(&card.id).await);
        assert!(store.payment_methods().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_switching_user_drops_previous_user_data() -> Result<()> {
        let fixture = OrderFixture::new().await?;
        let store = Store::new(Arc::new(SeaOrmBackend::new(fixture.db.clone())));
        store.sign_in(CUSTOMER_EMAIL, TEST_PASSWORD, false).await;
        store.select_restaurant(&fixture.restaurant.id).await;
        store.add_to_cart(fixture.burger.clone(), 1, |_| true);
        let order = store.place_order(PaymentKind::Cash).await.unwrap();
        store.add_payment_method(&test_card("4242424242424242", true)).await.unwrap();
        assert!(store.watch_order(&order.id));

        assert!(store.sign_up(&customer_sign_up("bob@example.com")).await);
        assert!(store.orders().is_empty());
        assert!(store.payment_methods().is_empty());
        assert!(store.watched_scope().is_none());

        // Signing in again as the same user keeps what is cached
        store.add_payment_method(&test_card("5555555555554444", true)).await.unwrap();
        assert!(store.sign_in("bob@example.com", TEST_PASSWORD, false).await);
        assert_eq!(store.payment_methods().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_cards_of_other_users_cannot_be_changed() -> Result<()> {
        let store = store().await?;
        store.sign_up(&customer_sign_up("ana@example.com")).await;
        let card = store
            .add_payment_method(&test_card("4242424242424242", false))
            .await
            .unwrap();
        store.sign_out().await;

        let changes = PaymentMethodUpdate {
            is_default: Some(true),
            ..Default::default()
        };
        assert!(store.update_payment_method(&card.id, &changes).await.is_none());
        assert!(!store.delete_payment_method(&card.id).await);

        store.sign_up(&customer_sign_up("bob@example.com")).await;
        store.take_notices();
        assert!(store.update_payment_method(&card.id, &changes).await.is_none());
        assert!(!store.delete_payment_method(&card.id).await);
        let notices = store.take_notices();
        assert_eq!(notices.len(), 2);
        assert!(notices.iter().all(|n| n.level == NoticeLevel::Error));

        store.sign_out().await;
        store.sign_in("ana@example.com", TEST_PASSWORD, false).await;
        assert_eq!(store.load_payment_methods().await, vec![card]);
        Ok(())
    }

    #[tokio::test]
    async fn test_cards_arriving_after_sign_out_are_dropped() -> Result<()> {
        let backend = GatedBackend::new(setup_test_db().await?);
        let gate = backend.gate();
        let store = Store::new(Arc::new(backend));
        store.sign_up(&customer_sign_up("ana@example.com")).await;
        gate.notify_one();
        store.add_payment_method(&test_card("4242424242424242", true)).await.unwrap();
        assert_eq!(store.payment_methods().len(), 1);

        let (loaded, ()) = tokio::join!(store.load_payment_methods(), async {
            store.sign_out().await;
            gate.notify_one();
        });

        assert_eq!(loaded.len(), 1);
        assert!(store.current_user().is_none());
        assert!(store.payment_methods().is_empty());
        Ok(())
    }
}
