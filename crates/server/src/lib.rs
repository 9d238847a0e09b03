//! Credential and token issuance service.
//!
//! Authenticates users by email and password, keeps them logged in with a
//! session cookie, and lets a logged-in user mint OAuth2 client credentials
//! that are exchanged for bearer tokens downstream services can validate.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::metrics::Recorder;

pub mod accounts;
pub mod api;
pub mod config;
pub mod entity;
pub mod error;
pub mod metrics;
pub mod oauth2;
pub mod storage;
pub mod utils;

#[derive(Clone, Debug)]
pub struct AppResources {
    pub config: Arc<AppConfig>,
    pub metrics: Arc<Recorder>,
}
