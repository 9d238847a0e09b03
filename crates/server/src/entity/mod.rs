//! SeaORM entities for the account, client and token databases.

pub mod credential;
pub mod kv_entry;
pub mod oauth2_token;
pub mod session;
pub mod user;
