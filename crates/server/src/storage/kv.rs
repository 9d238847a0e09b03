//! Swappable key/value backend for the OAuth2 client store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sea_orm::sea_query::OnConflict;
use sea_orm::{EntityTrait, QueryOrder, Set};
use tokio::sync::RwLock;

use crate::entity::kv_entry;
use crate::error::StorageError;
use crate::storage::DbHandle;

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    /// Insert or replace.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    /// Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
    /// Every pair, ordered by key.
    async fn scan(&self) -> Result<Vec<(String, String)>, StorageError>;
    /// Release the backend. Subsequent calls fail with [`StorageError::Closed`].
    async fn close(&self) -> Result<(), StorageError>;
}

/// `kv_entry` table accessed through sea-orm.
#[derive(Clone, Debug)]
pub struct SqlKvStore {
    db: DbHandle,
}

impl SqlKvStore {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }
}

#[async_trait]
impl KvStore for SqlKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.db.conn().await?;
        let row = kv_entry::Entity::find_by_id(key.to_string())
            .one(&conn)
            .await?;
        Ok(row.map(|r| r.value))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let conn = self.db.conn().await?;
        let row = kv_entry::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value.to_string()),
        };
        kv_entry::Entity::insert(row)
            .on_conflict(
                OnConflict::column(kv_entry::Column::Key)
                    .update_column(kv_entry::Column::Value)
                    .to_owned(),
            )
            .exec(&conn)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let conn = self.db.conn().await?;
        kv_entry::Entity::delete_by_id(key.to_string())
            .exec(&conn)
            .await?;
        Ok(())
    }

    async fn scan(&self) -> Result<Vec<(String, String)>, StorageError> {
        let conn = self.db.conn().await?;
        let rows = kv_entry::Entity::find()
            .order_by_asc(kv_entry::Column::Key)
            .all(&conn)
            .await?;
        Ok(rows.into_iter().map(|r| (r.key, r.value)).collect())
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.db.close().await
    }
}

/// In-process backend for tests and ephemeral deployments.
#[derive(Debug)]
pub struct MemoryKvStore {
    // None once closed
    entries: RwLock<Option<BTreeMap<String, String>>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Some(BTreeMap::new())),
        }
    }
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self.entries.read().await;
        let map = guard.as_ref().ok_or(StorageError::Closed)?;
        Ok(map.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self.entries.write().await;
        let map = guard.as_mut().ok_or(StorageError::Closed)?;
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut guard = self.entries.write().await;
        let map = guard.as_mut().ok_or(StorageError::Closed)?;
        map.remove(key);
        Ok(())
    }

    async fn scan(&self) -> Result<Vec<(String, String)>, StorageError> {
        let guard = self.entries.read().await;
        let map = guard.as_ref().ok_or(StorageError::Closed)?;
        Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.entries.write().await.take();
        Ok(())
    }
}
