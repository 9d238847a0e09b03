//! Password credentials and verification.

use std::sync::Arc;

use async_trait::async_trait;

use crate::accounts::password::{hash_blocking, verify_blocking};
use crate::accounts::users::UserRepository;
use crate::error::{CredentialError, StorageError};
use crate::metrics::{AUTH_FAILURES, AUTH_SUCCESSES, MetricsSink};

#[async_trait]
pub trait CredentialRepository: Send + Sync {
    async fn password_hash(&self, user_id: &str) -> Result<Option<String>, StorageError>;
    /// Replaces any hash already stored for `user_id`.
    async fn set_password_hash(&self, user_id: &str, hash: &str) -> Result<(), StorageError>;
}

/// Email/password verification over a user and credential repository.
#[derive(Clone)]
pub struct CredentialStore {
    users: Arc<dyn UserRepository>,
    credentials: Arc<dyn CredentialRepository>,
    metrics: Arc<dyn MetricsSink>,
}

impl CredentialStore {
    pub fn new(
        users: Arc<dyn UserRepository>,
        credentials: Arc<dyn CredentialRepository>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            users,
            credentials,
            metrics,
        }
    }

    /// Resolve `email` and check `password`, returning the user id.
    ///
    /// Unknown email, missing credential and wrong password all yield
    /// [`CredentialError::AuthFailure`].
    pub async fn verify_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<String, CredentialError> {
        let user = self.users.lookup_by_email(email).await?;
        let stored = match &user {
            Some(user) => self.credentials.password_hash(&user.id).await?,
            None => None,
        };

        let matched = verify_blocking(password.to_string(), stored).await?;

        match user {
            Some(user) if matched => {
                self.metrics.increment(AUTH_SUCCESSES, &[("method", "password")]);
                Ok(user.id)
            }
            _ => {
                self.metrics.increment(AUTH_FAILURES, &[("method", "password")]);
                Err(CredentialError::AuthFailure)
            }
        }
    }

    /// Hash `password` with a fresh salt and store it for `user_id`.
    pub async fn write_password(&self, user_id: &str, password: &str) -> Result<(), StorageError> {
        let hash = hash_blocking(password.to_string()).await?;
        self.credentials.set_password_hash(user_id, &hash).await
    }
}
