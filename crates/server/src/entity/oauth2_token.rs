//! OAuth2 Token entity - access and refresh tokens.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "oauth2_token")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub access_token: String,
    #[sea_orm(unique)]
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub client_id: String,
    pub user_id: String,
    pub scope: String,
    pub access_token_expires_at: OffsetDateTime,
    pub refresh_token_expires_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// The access token is accepted strictly before its expiry.
    pub fn is_access_valid_at(&self, now: OffsetDateTime) -> bool {
        now < self.access_token_expires_at
    }

    /// A missing refresh token counts as expired.
    pub fn is_refresh_valid_at(&self, now: OffsetDateTime) -> bool {
        match (&self.refresh_token, self.refresh_token_expires_at) {
            (Some(_), Some(expires_at)) => now < expires_at,
            _ => false,
        }
    }

    /// Neither token can be used any more.
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        !self.is_access_valid_at(now) && !self.is_refresh_valid_at(now)
    }

    /// Seconds until the access token expires, never negative.
    pub fn expires_in(&self, now: OffsetDateTime) -> i64 {
        (self.access_token_expires_at - now).whole_seconds().max(0)
    }
}
