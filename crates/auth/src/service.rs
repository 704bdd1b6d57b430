//! Auth service (§3, §4.3)
//!
//! Central entry point for account provisioning (admin CLI) and login/logout.
//! There is no self-service registration message in the wire protocol, but a
//! `LoginRequest` for an unknown username can still provision one: when
//! `auto_register` is enabled the first login for a username creates the
//! account (§3, "created by admin CLI or first-login auto-registration,
//! configurable"); otherwise an unknown username is rejected the same as a
//! wrong password.

use std::sync::Arc;

use uuid::Uuid;
use whispr_db::{
    models::{NewUser, UserRecord},
    repository::UserRepository,
};

use crate::{
    error::{AuthError, AuthResult},
    password::{hash_password, verify_password},
    session::{Session, SessionStore},
};

pub struct AuthService<U: UserRepository> {
    user_repo: Arc<U>,
    session_store: Arc<SessionStore>,
    auto_register: bool,
}

impl<U: UserRepository> AuthService<U> {
    /// Strict mode: unknown usernames are rejected at login, matching
    /// `validate_credentials`. Accounts must come from [`Self::create_user`].
    pub fn new(user_repo: Arc<U>, session_store: Arc<SessionStore>) -> Self {
        Self { user_repo, session_store, auto_register: false }
    }

    /// `auto_register` gates whether [`Self::login`] provisions an account
    /// for an unrecognized username instead of rejecting it (`validate_or_register`).
    pub fn with_auto_register(user_repo: Arc<U>, session_store: Arc<SessionStore>, auto_register: bool) -> Self {
        Self { user_repo, session_store, auto_register }
    }

    /// Creates a new account. Used by the `add-user` CLI command and by
    /// seeded-test-user bootstrap.
    pub async fn create_user(&self, username: &str, password: &str, is_admin: bool) -> AuthResult<UserRecord> {
        if self.user_repo.get_by_username(username).await?.is_some() {
            return Err(AuthError::UsernameTaken(username.to_string()));
        }

        let password_hash = hash_password(password)?;
        let user = self.user_repo.create(NewUser { username, password_hash: &password_hash, is_admin }).await?;

        tracing::info!(user_id = %user.id, username = %user.username, "account created");
        Ok(user)
    }

    /// Verifies credentials and issues a session. Rejects with
    /// `AlreadyLoggedIn` if the user already holds an active session (§3).
    ///
    /// `validate_or_register` when `auto_register` is enabled: an unknown
    /// username provisions a new (non-admin) account instead of failing.
    /// Otherwise this is strict `validate_credentials` — unknown username or
    /// wrong password both yield `InvalidCredentials`.
    pub async fn login(&self, username: &str, password: &str) -> AuthResult<(UserRecord, Session)> {
        let user = match self.user_repo.get_by_username(username).await? {
            Some(user) => {
                let correct = verify_password(password, &user.password_hash)?;
                if !correct {
                    tracing::warn!(username = %username, "failed login attempt");
                    return Err(AuthError::InvalidCredentials);
                }
                user
            }
            None if self.auto_register => {
                tracing::info!(username = %username, "auto-registering account on first login");
                self.create_user(username, password, false).await?
            }
            None => return Err(AuthError::InvalidCredentials),
        };

        let session = self.session_store.create(user.id).await?;
        self.user_repo.update_last_login(user.id).await?;

        tracing::info!(user_id = %user.id, username = %user.username, "user logged in");
        Ok((user, session))
    }

    pub async fn logout(&self, session_token: &str) -> AuthResult<()> {
        self.session_store.revoke(session_token).await;
        Ok(())
    }

    pub async fn validate_session(&self, token: &str) -> AuthResult<UserRecord> {
        let session = self.session_store.validate(token).await?;
        self.user_repo
            .get_by_id(session.user_id)
            .await?
            .ok_or_else(|| AuthError::UserNotFound(session.user_id.to_string()))
    }

    pub fn session_store(&self) -> &Arc<SessionStore> {
        &self.session_store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;
    use whispr_db::DbResult;

    #[derive(Default)]
    struct TestUserRepo {
        users: Mutex<Vec<UserRecord>>,
    }

    impl UserRepository for TestUserRepo {
        async fn create(&self, data: NewUser<'_>) -> DbResult<UserRecord> {
            let record = UserRecord {
                id: Uuid::new_v4(),
                username: data.username.to_string(),
                password_hash: data.password_hash.to_string(),
                is_admin: data.is_admin,
                created_at: Utc::now(),
                last_login: None,
            };
            self.users.lock().unwrap().push(record.clone());
            Ok(record)
        }

        async fn get_by_id(&self, id: Uuid) -> DbResult<Option<UserRecord>> {
            Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
        }

        async fn get_by_username(&self, username: &str) -> DbResult<Option<UserRecord>> {
            Ok(self.users.lock().unwrap().iter().find(|u| u.username == username).cloned())
        }

        async fn list(&self) -> DbResult<Vec<UserRecord>> {
            Ok(self.users.lock().unwrap().clone())
        }

        async fn update_last_login(&self, id: Uuid) -> DbResult<()> {
            let mut users = self.users.lock().unwrap();
            if let Some(u) = users.iter_mut().find(|u| u.id == id) {
                u.last_login = Some(Utc::now());
            }
            Ok(())
        }
    }

    fn test_service() -> AuthService<TestUserRepo> {
        AuthService::new(Arc::new(TestUserRepo::default()), SessionStore::new(24))
    }

    #[tokio::test]
    async fn create_and_login() {
        let service = test_service();
        let user = service.create_user("admin", "admin", true).await.expect("create failed");
        assert!(user.is_admin);

        let (logged_in, session) = service.login("admin", "admin").await.expect("login failed");
        assert_eq!(logged_in.id, user.id);
        assert!(!session.token.is_empty());
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let service = test_service();
        service.create_user("dup", "pw", false).await.unwrap();
        let result = service.create_user("dup", "other", false).await;
        assert!(matches!(result, Err(AuthError::UsernameTaken(_))));
    }

    #[tokio::test]
    async fn unknown_username_is_rejected_in_strict_mode() {
        let service = test_service();
        let result = service.login("ghost", "pw").await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn auto_register_provisions_account_on_first_login() {
        let service =
            AuthService::with_auto_register(Arc::new(TestUserRepo::default()), SessionStore::new(24), true);

        let (user, _) = service.login("newcomer", "pw").await.expect("auto-register login failed");
        assert_eq!(user.username, "newcomer");
        assert!(!user.is_admin);

        let result = service.login("newcomer", "wrong").await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let service = test_service();
        service.create_user("user", "right", false).await.unwrap();
        let result = service.login("user", "wrong").await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn second_login_while_active_is_rejected() {
        let service = test_service();
        service.create_user("single", "pw", false).await.unwrap();
        service.login("single", "pw").await.unwrap();

        let result = service.login("single", "pw").await;
        assert!(matches!(result, Err(AuthError::AlreadyLoggedIn)));
    }

    #[tokio::test]
    async fn session_validation_round_trips() {
        let service = test_service();
        service.create_user("sess", "pw", false).await.unwrap();
        let (_, session) = service.login("sess", "pw").await.unwrap();

        let validated = service.validate_session(&session.token).await.unwrap();
        assert_eq!(validated.username, "sess");
    }

    #[tokio::test]
    async fn logout_revokes_session() {
        let service = test_service();
        service.create_user("out", "pw", false).await.unwrap();
        let (_, session) = service.login("out", "pw").await.unwrap();

        service.logout(&session.token).await.unwrap();
        let result = service.validate_session(&session.token).await;
        assert!(matches!(result, Err(AuthError::SessionInvalid)));
    }
}
