//! User entity - identity records created by signup.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Email exactly as submitted at signup
    pub email: String,
    /// Canonical form used for lookups, see [`crate::accounts::email::normalize_email`]
    #[sea_orm(unique)]
    pub email_normalized: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub company_url: Option<String>,
    pub created_at: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
