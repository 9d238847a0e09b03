//! OAuth2 client records.
//!
//! Clients are stored as JSON values keyed by client id in a [`KvStore`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::StorageError;
use crate::storage::kv::KvStore;

/// Credentials a user's application presents at the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: String,
    pub secret: String,
    pub domain: String,
    pub user_id: String,
}

#[derive(Clone)]
pub struct ClientStore {
    kv: Arc<dyn KvStore>,
}

impl ClientStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<Client>, StorageError> {
        match self.kv.get(id).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Every client owned by `user_id`, ordered by client id. Empty when there are none.
    pub async fn get_by_user_id(&self, user_id: &str) -> Result<Vec<Client>, StorageError> {
        let mut clients = Vec::new();
        for (key, raw) in self.kv.scan().await? {
            match serde_json::from_str::<Client>(&raw) {
                Ok(client) if client.user_id == user_id => clients.push(client),
                Ok(_) => {}
                Err(e) => tracing::warn!(key = %key, error = %e, "skipping unreadable client record"),
            }
        }
        Ok(clients)
    }

    /// Store `client` under its id, replacing any record with the same id.
    pub async fn create(&self, client: &Client) -> Result<(), StorageError> {
        let raw = serde_json::to_string(client)?;
        self.kv.set(&client.id, &raw).await
    }

    /// Deleting an unknown id succeeds.
    pub async fn delete_by_id(&self, id: &str) -> Result<(), StorageError> {
        self.kv.delete(id).await
    }

    pub async fn close(&self) -> Result<(), StorageError> {
        self.kv.close().await
    }
}
