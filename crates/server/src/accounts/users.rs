//! User identity records.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::accounts::email::normalize_email;
use crate::entity::user;
use crate::error::StorageError;
use crate::utils::generate_id;

pub type User = user::Model;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find the user owning `email`. The address is normalized before the lookup.
    async fn lookup_by_email(&self, email: &str) -> Result<Option<User>, StorageError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StorageError>;
    /// Insert, or replace the record with the same id.
    async fn upsert(&self, user: &User) -> Result<(), StorageError>;
}

/// Profile fields collected at signup.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub company_url: Option<String>,
}

impl NewUser {
    /// Assign a fresh id and creation time.
    pub fn into_user(self, now: OffsetDateTime) -> User {
        User {
            id: generate_id(),
            email_normalized: normalize_email(&self.email),
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            phone: self.phone,
            company_url: self.company_url.filter(|u| !u.is_empty()),
            created_at: now,
        }
    }
}

/// Public JSON representation of a user.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: OffsetDateTime,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            phone: user.phone,
            company_url: user.company_url,
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_gets_id_and_normalized_email() {
        let user = NewUser {
            email: "Jane.Doe+work@Example.com".into(),
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            phone: "+1-6174443000".into(),
            company_url: Some(String::new()),
        }
        .into_user(OffsetDateTime::UNIX_EPOCH);

        assert_eq!(user.id.len(), 40);
        assert_eq!(user.email, "Jane.Doe+work@Example.com");
        assert_eq!(user.email_normalized, "janedoe@example.com");
        assert_eq!(user.company_url, None);
    }

    #[test]
    fn view_uses_camel_case() {
        let user = NewUser {
            email: "a@b.c".into(),
            first_name: "A".into(),
            last_name: "B".into(),
            phone: "10".into(),
            company_url: Some("https://moov.io".into()),
        }
        .into_user(OffsetDateTime::UNIX_EPOCH);
        let json = serde_json::to_value(UserView::from(user)).unwrap();
        assert_eq!(json["firstName"], "A");
        assert_eq!(json["companyUrl"], "https://moov.io");
        assert_eq!(json["createdAt"], "1970-01-01T00:00:00Z");
        assert!(json.get("email_normalized").is_none());
    }
}
