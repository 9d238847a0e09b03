//! Login sessions.
//!
//! A session token is 32 random bytes handed to the browser in the
//! `auth_session` cookie. Only the SHA-256 digest of the token is persisted,
//! so a leaked sessions table cannot be replayed as cookies.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use tokio::task::JoinHandle;

use crate::entity::session;
use crate::error::{SessionError, StorageError};
use crate::storage::spawn_sweeper;
use crate::utils::generate_token;

pub type Session = session::Model;

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn insert(&self, session: &Session) -> Result<(), StorageError>;
    async fn find(&self, token_hash: &str) -> Result<Option<Session>, StorageError>;
    async fn delete(&self, token_hash: &str) -> Result<(), StorageError>;
    /// Remove every session expired at `now`, returning how many were removed.
    async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64, StorageError>;
}

fn digest(token: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes()))
}

#[derive(Clone)]
pub struct SessionManager {
    repo: Arc<dyn SessionRepository>,
    lifetime: Duration,
}

impl SessionManager {
    pub fn new(repo: Arc<dyn SessionRepository>, lifetime_secs: u64) -> Self {
        Self {
            repo,
            lifetime: Duration::seconds(i64::try_from(lifetime_secs).unwrap_or(i64::MAX)),
        }
    }

    /// Session lifetime in whole seconds, used for the cookie `Max-Age`.
    pub fn lifetime_secs(&self) -> u64 {
        self.lifetime.whole_seconds().max(0) as u64
    }

    /// Mint a session for `user_id` and return the opaque token.
    pub async fn create_session(&self, user_id: &str) -> Result<String, StorageError> {
        let token = generate_token();
        let now = OffsetDateTime::now_utc();
        self.repo
            .insert(&Session {
                token_hash: digest(&token),
                user_id: user_id.to_string(),
                created_at: now,
                expires_at: now + self.lifetime,
            })
            .await?;
        Ok(token)
    }

    /// The user bound to `token`. Unknown and expired tokens are both `NotFound`.
    pub async fn resolve_session(&self, token: &str) -> Result<String, SessionError> {
        if token.is_empty() {
            return Err(SessionError::NotFound);
        }
        match self.repo.find(&digest(token)).await? {
            Some(session) if !session.is_expired_at(OffsetDateTime::now_utc()) => {
                Ok(session.user_id)
            }
            _ => Err(SessionError::NotFound),
        }
    }

    /// Forget `token`. Unknown tokens are ignored.
    pub async fn invalidate_session(&self, token: &str) -> Result<(), StorageError> {
        self.repo.delete(&digest(token)).await
    }

    pub async fn purge_expired(&self) -> Result<u64, StorageError> {
        self.repo.delete_expired(OffsetDateTime::now_utc()).await
    }
}

/// Periodically delete expired sessions until the returned handle is aborted.
pub fn spawn_purge_task(sessions: SessionManager, every: std::time::Duration) -> JoinHandle<()> {
    spawn_sweeper("sessions", every, move || {
        let sessions = sessions.clone();
        async move { sessions.purge_expired().await }
    })
}
