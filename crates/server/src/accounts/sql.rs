//! Account repositories backed by sea-orm.

use async_trait::async_trait;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Set};
use time::OffsetDateTime;

use crate::accounts::credentials::CredentialRepository;
use crate::accounts::email::normalize_email;
use crate::accounts::sessions::{Session, SessionRepository};
use crate::accounts::users::{User, UserRepository};
use crate::entity::{credential, session, user};
use crate::error::StorageError;
use crate::storage::DbHandle;

/// Users, credentials and sessions in the account database.
#[derive(Clone, Debug)]
pub struct SqlAccounts {
    db: DbHandle,
}

impl SqlAccounts {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for SqlAccounts {
    async fn lookup_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        let conn = self.db.conn().await?;
        Ok(user::Entity::find()
            .filter(user::Column::EmailNormalized.eq(normalize_email(email)))
            .one(&conn)
            .await?)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StorageError> {
        let conn = self.db.conn().await?;
        Ok(user::Entity::find_by_id(id.to_string()).one(&conn).await?)
    }

    async fn upsert(&self, u: &User) -> Result<(), StorageError> {
        let conn = self.db.conn().await?;
        let row = user::ActiveModel {
            id: Set(u.id.clone()),
            email: Set(u.email.clone()),
            email_normalized: Set(u.email_normalized.clone()),
            first_name: Set(u.first_name.clone()),
            last_name: Set(u.last_name.clone()),
            phone: Set(u.phone.clone()),
            company_url: Set(u.company_url.clone()),
            created_at: Set(u.created_at),
        };
        user::Entity::insert(row)
            .on_conflict(
                OnConflict::column(user::Column::Id)
                    .update_columns([
                        user::Column::Email,
                        user::Column::EmailNormalized,
                        user::Column::FirstName,
                        user::Column::LastName,
                        user::Column::Phone,
                        user::Column::CompanyUrl,
                    ])
                    .to_owned(),
            )
            .exec(&conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CredentialRepository for SqlAccounts {
    async fn password_hash(&self, user_id: &str) -> Result<Option<String>, StorageError> {
        let conn = self.db.conn().await?;
        Ok(credential::Entity::find_by_id(user_id.to_string())
            .one(&conn)
            .await?
            .map(|c| c.password_hash))
    }

    async fn set_password_hash(&self, user_id: &str, hash: &str) -> Result<(), StorageError> {
        let conn = self.db.conn().await?;
        let row = credential::ActiveModel {
            user_id: Set(user_id.to_string()),
            password_hash: Set(hash.to_string()),
            updated_at: Set(OffsetDateTime::now_utc()),
        };
        credential::Entity::insert(row)
            .on_conflict(
                OnConflict::column(credential::Column::UserId)
                    .update_columns([
                        credential::Column::PasswordHash,
                        credential::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for SqlAccounts {
    async fn insert(&self, s: &Session) -> Result<(), StorageError> {
        let conn = self.db.conn().await?;
        let row = session::ActiveModel {
            token_hash: Set(s.token_hash.clone()),
            user_id: Set(s.user_id.clone()),
            created_at: Set(s.created_at),
            expires_at: Set(s.expires_at),
        };
        session::Entity::insert(row).exec(&conn).await?;
        Ok(())
    }

    async fn find(&self, token_hash: &str) -> Result<Option<Session>, StorageError> {
        let conn = self.db.conn().await?;
        Ok(session::Entity::find_by_id(token_hash.to_string())
            .one(&conn)
            .await?)
    }

    async fn delete(&self, token_hash: &str) -> Result<(), StorageError> {
        let conn = self.db.conn().await?;
        session::Entity::delete_by_id(token_hash.to_string())
            .exec(&conn)
            .await?;
        Ok(())
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64, StorageError> {
        let conn = self.db.conn().await?;
        let result = session::Entity::delete_many()
            .filter(session::Column::ExpiresAt.lte(now))
            .exec(&conn)
            .await?;
        Ok(result.rows_affected)
    }
}
