//! Session management (§3)
//!
//! Tokens are opaque 128-bit random values, base64url-encoded. The store
//! enforces at most one active session per user (§3): creating a second
//! session for an already-logged-in user is rejected with `AlreadyLoggedIn`.

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use rand::RngCore;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};

const DEFAULT_TOKEN_LIFETIME_HOURS: i64 = 24;
const CLEANUP_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_valid(&self) -> bool {
        Utc::now() < self.expires_at
    }
}

#[derive(Debug)]
pub struct SessionStore {
    token_lifetime_hours: i64,
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new(token_lifetime_hours: i64) -> Arc<Self> {
        Arc::new(Self {
            token_lifetime_hours: if token_lifetime_hours > 0 {
                token_lifetime_hours
            } else {
                DEFAULT_TOKEN_LIFETIME_HOURS
            },
            sessions: RwLock::new(HashMap::new()),
        })
    }

    pub fn with_cleanup_task(store: Arc<Self>) -> Arc<Self> {
        let clone = Arc::clone(&store);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(CLEANUP_INTERVAL).await;
                let removed = clone.cleanup_expired().await;
                if removed > 0 {
                    tracing::debug!(count = removed, "cleaned up expired sessions");
                }
            }
        });
        store
    }

    /// Creates a session for `user_id`, rejecting it if one is already active
    /// for that user (§3, "at most one active session per user").
    pub async fn create(&self, user_id: Uuid) -> AuthResult<Session> {
        let mut sessions = self.sessions.write().await;

        if sessions.values().any(|s| s.user_id == user_id && s.is_valid()) {
            return Err(AuthError::AlreadyLoggedIn);
        }

        let token = generate_token();
        let now = Utc::now();
        let session = Session {
            token: token.clone(),
            user_id,
            issued_at: now,
            expires_at: now + chrono::Duration::hours(self.token_lifetime_hours),
        };

        sessions.insert(token, session.clone());
        tracing::debug!(user_id = %user_id, "session created");
        Ok(session)
    }

    pub async fn validate(&self, token: &str) -> AuthResult<Session> {
        let sessions = self.sessions.read().await;
        match sessions.get(token) {
            None => Err(AuthError::SessionInvalid),
            Some(session) if !session.is_valid() => Err(AuthError::SessionExpired),
            Some(session) => Ok(session.clone()),
        }
    }

    pub async fn revoke(&self, token: &str) {
        let mut sessions = self.sessions.write().await;
        sessions.remove(token);
        tracing::debug!("session revoked");
    }

    pub async fn revoke_all_for_user(&self, user_id: Uuid) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.user_id != user_id);
        before - sessions.len()
    }

    pub async fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now);
        before - sessions.len()
    }

    pub async fn active_count(&self) -> usize {
        let now = Utc::now();
        self.sessions.read().await.values().filter(|s| s.expires_at > now).count()
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_and_validate_session() {
        let store = SessionStore::new(24);
        let user_id = Uuid::new_v4();

        let session = store.create(user_id).await.expect("create failed");
        assert_eq!(session.user_id, user_id);
        assert!(session.is_valid());

        let validated = store.validate(&session.token).await.expect("validate failed");
        assert_eq!(validated.user_id, user_id);
    }

    #[tokio::test]
    async fn second_login_for_same_user_is_rejected() {
        let store = SessionStore::new(24);
        let user_id = Uuid::new_v4();

        store.create(user_id).await.unwrap();
        let second = store.create(user_id).await;
        assert!(matches!(second, Err(AuthError::AlreadyLoggedIn)));
    }

    #[tokio::test]
    async fn distinct_users_can_both_log_in() {
        let store = SessionStore::new(24);
        store.create(Uuid::new_v4()).await.unwrap();
        store.create(Uuid::new_v4()).await.unwrap();
        assert_eq!(store.active_count().await, 2);
    }

    #[tokio::test]
    async fn invalid_token_is_rejected() {
        let store = SessionStore::new(24);
        let result = store.validate("not-a-real-token").await;
        assert!(matches!(result, Err(AuthError::SessionInvalid)));
    }

    #[tokio::test]
    async fn revoking_a_session_frees_the_slot_for_relogin() {
        let store = SessionStore::new(24);
        let user_id = Uuid::new_v4();
        let session = store.create(user_id).await.unwrap();

        store.revoke(&session.token).await;
        let result = store.validate(&session.token).await;
        assert!(matches!(result, Err(AuthError::SessionInvalid)));

        // Now a fresh login for the same user succeeds.
        store.create(user_id).await.unwrap();
    }

    #[tokio::test]
    async fn revoke_all_for_user_clears_only_that_users_sessions() {
        let store = SessionStore::new(24);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store.create(a).await.unwrap();
        store.create(b).await.unwrap();

        let removed = store.revoke_all_for_user(a).await;
        assert_eq!(removed, 1);
        assert_eq!(store.active_count().await, 1);
    }
}
