//! In-memory account repositories.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use time::OffsetDateTime;

use crate::accounts::credentials::CredentialRepository;
use crate::accounts::email::normalize_email;
use crate::accounts::sessions::{Session, SessionRepository};
use crate::accounts::users::{User, UserRepository};
use crate::error::StorageError;

/// Users, credentials and sessions held in process memory.
#[derive(Debug, Default)]
pub struct MemoryAccounts {
    users: DashMap<String, User>,
    // normalized email -> user id
    emails: DashMap<String, String>,
    credentials: DashMap<String, String>,
    sessions: DashMap<String, Session>,
}

impl MemoryAccounts {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryAccounts {
    async fn lookup_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        let Some(id) = self.emails.get(&normalize_email(email)).map(|id| id.clone()) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StorageError> {
        Ok(self.users.get(id).map(|u| u.clone()))
    }

    async fn upsert(&self, user: &User) -> Result<(), StorageError> {
        match self.emails.entry(user.email_normalized.clone()) {
            Entry::Occupied(owner) if *owner.get() != user.id => {
                return Err(StorageError::Conflict(format!(
                    "email {} already registered",
                    user.email_normalized
                )));
            }
            Entry::Occupied(_) => {}
            Entry::Vacant(slot) => {
                slot.insert(user.id.clone());
            }
        }
        if let Some(previous) = self.users.insert(user.id.clone(), user.clone())
            && previous.email_normalized != user.email_normalized
        {
            self.emails.remove(&previous.email_normalized);
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialRepository for MemoryAccounts {
    async fn password_hash(&self, user_id: &str) -> Result<Option<String>, StorageError> {
        Ok(self.credentials.get(user_id).map(|h| h.clone()))
    }

    async fn set_password_hash(&self, user_id: &str, hash: &str) -> Result<(), StorageError> {
        self.credentials
            .insert(user_id.to_string(), hash.to_string());
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for MemoryAccounts {
    async fn insert(&self, session: &Session) -> Result<(), StorageError> {
        self.sessions
            .insert(session.token_hash.clone(), session.clone());
        Ok(())
    }

    async fn find(&self, token_hash: &str) -> Result<Option<Session>, StorageError> {
        Ok(self.sessions.get(token_hash).map(|s| s.clone()))
    }

    async fn delete(&self, token_hash: &str) -> Result<(), StorageError> {
        self.sessions.remove(token_hash);
        Ok(())
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64, StorageError> {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_expired_at(now));
        Ok(before.saturating_sub(self.sessions.len()) as u64)
    }
}
