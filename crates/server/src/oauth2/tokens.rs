//! Issued access/refresh tokens.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use sea_orm::{ColumnTrait, Condition, EntityTrait, QueryFilter, Set};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::entity::oauth2_token;
use crate::error::StorageError;
use crate::storage::{DbHandle, spawn_sweeper};

pub type TokenInfo = oauth2_token::Model;

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn create(&self, token: &TokenInfo) -> Result<(), StorageError>;
    async fn get_by_access(&self, access: &str) -> Result<Option<TokenInfo>, StorageError>;
    async fn get_by_refresh(&self, refresh: &str) -> Result<Option<TokenInfo>, StorageError>;
    /// Remove the record holding `access`, reporting whether one was removed.
    ///
    /// Of several concurrent calls for the same token at most one sees `true`.
    async fn remove_by_access(&self, access: &str) -> Result<bool, StorageError>;
    /// Remove every record whose access and refresh windows have both passed at `now`.
    async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64, StorageError>;
    async fn close(&self) -> Result<(), StorageError>;
}

/// Periodically delete dead tokens until the returned handle is aborted.
pub fn spawn_purge_task(tokens: Arc<dyn TokenStore>, every: std::time::Duration) -> JoinHandle<()> {
    spawn_sweeper("oauth2 tokens", every, move || {
        let tokens = tokens.clone();
        async move { tokens.delete_expired(OffsetDateTime::now_utc()).await }
    })
}

/// `oauth2_token` table in its own database.
#[derive(Clone, Debug)]
pub struct SqlTokenStore {
    db: DbHandle,
}

impl SqlTokenStore {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TokenStore for SqlTokenStore {
    async fn create(&self, token: &TokenInfo) -> Result<(), StorageError> {
        let conn = self.db.conn().await?;
        let row = oauth2_token::ActiveModel {
            id: Set(token.id.clone()),
            access_token: Set(token.access_token.clone()),
            refresh_token: Set(token.refresh_token.clone()),
            token_type: Set(token.token_type.clone()),
            client_id: Set(token.client_id.clone()),
            user_id: Set(token.user_id.clone()),
            scope: Set(token.scope.clone()),
            access_token_expires_at: Set(token.access_token_expires_at),
            refresh_token_expires_at: Set(token.refresh_token_expires_at),
            created_at: Set(token.created_at),
        };
        oauth2_token::Entity::insert(row).exec(&conn).await?;
        Ok(())
    }

    async fn get_by_access(&self, access: &str) -> Result<Option<TokenInfo>, StorageError> {
        let conn = self.db.conn().await?;
        Ok(oauth2_token::Entity::find()
            .filter(oauth2_token::Column::AccessToken.eq(access))
            .one(&conn)
            .await?)
    }

    async fn get_by_refresh(&self, refresh: &str) -> Result<Option<TokenInfo>, StorageError> {
        let conn = self.db.conn().await?;
        Ok(oauth2_token::Entity::find()
            .filter(oauth2_token::Column::RefreshToken.eq(refresh))
            .one(&conn)
            .await?)
    }

    async fn remove_by_access(&self, access: &str) -> Result<bool, StorageError> {
        let conn = self.db.conn().await?;
        let result = oauth2_token::Entity::delete_many()
            .filter(oauth2_token::Column::AccessToken.eq(access))
            .exec(&conn)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64, StorageError> {
        let conn = self.db.conn().await?;
        let result = oauth2_token::Entity::delete_many()
            .filter(oauth2_token::Column::AccessTokenExpiresAt.lte(now))
            .filter(
                Condition::any()
                    .add(oauth2_token::Column::RefreshTokenExpiresAt.is_null())
                    .add(oauth2_token::Column::RefreshTokenExpiresAt.lte(now)),
            )
            .exec(&conn)
            .await?;
        Ok(result.rows_affected)
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.db.close().await
    }
}

/// Tokens held in process memory, indexed by access token.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    by_access: DashMap<String, TokenInfo>,
    // refresh token -> access token
    by_refresh: DashMap<String, String>,
    closed: RwLock<bool>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_access.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_access.is_empty()
    }

    async fn ensure_open(&self) -> Result<(), StorageError> {
        if *self.closed.read().await {
            return Err(StorageError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn create(&self, token: &TokenInfo) -> Result<(), StorageError> {
        self.ensure_open().await?;
        if let Some(refresh) = &token.refresh_token {
            self.by_refresh
                .insert(refresh.clone(), token.access_token.clone());
        }
        self.by_access
            .insert(token.access_token.clone(), token.clone());
        Ok(())
    }

    async fn get_by_access(&self, access: &str) -> Result<Option<TokenInfo>, StorageError> {
        self.ensure_open().await?;
        Ok(self.by_access.get(access).map(|t| t.clone()))
    }

    async fn get_by_refresh(&self, refresh: &str) -> Result<Option<TokenInfo>, StorageError> {
        self.ensure_open().await?;
        let Some(access) = self.by_refresh.get(refresh).map(|a| a.clone()) else {
            return Ok(None);
        };
        Ok(self.by_access.get(&access).map(|t| t.clone()))
    }

    async fn remove_by_access(&self, access: &str) -> Result<bool, StorageError> {
        self.ensure_open().await?;
        let Some((_, token)) = self.by_access.remove(access) else {
            return Ok(false);
        };
        if let Some(refresh) = token.refresh_token {
            self.by_refresh.remove(&refresh);
        }
        Ok(true)
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64, StorageError> {
        self.ensure_open().await?;
        let dead: Vec<String> = self
            .by_access
            .iter()
            .filter(|entry| entry.is_expired_at(now))
            .map(|entry| entry.key().clone())
            .collect();
        let mut removed = 0;
        for access in dead {
            if self.remove_by_access(&access).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn close(&self) -> Result<(), StorageError> {
        *self.closed.write().await = true;
        Ok(())
    }
}
