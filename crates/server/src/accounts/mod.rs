//! User accounts: signup, password login and cookie sessions.
//!
//! - `users` / `credentials` / `sessions` - repository traits and the services over them
//! - `sql` / `memory` - the two repository backends
//! - `signup` / `login` - HTTP handlers mounted under `/users`

pub mod cookie;
pub mod credentials;
pub mod email;
pub mod login;
pub mod memory;
pub mod password;
pub mod sessions;
pub mod signup;
pub mod sql;
pub mod users;

use std::sync::Arc;

use utoipa_axum::{router::OpenApiRouter, routes};

use crate::accounts::credentials::{CredentialRepository, CredentialStore};
use crate::accounts::sessions::{SessionManager, SessionRepository};
use crate::accounts::users::UserRepository;
use crate::config::SessionConfig;
use crate::metrics::MetricsSink;

/// Tag for OpenAPI documentation.
pub const ACCOUNTS_TAG: &str = "Accounts";

/// Everything the account handlers need.
#[derive(Clone)]
pub struct AccountsState {
    pub users: Arc<dyn UserRepository>,
    pub credentials: CredentialStore,
    pub sessions: SessionManager,
    pub metrics: Arc<dyn MetricsSink>,
    pub cookie_secure: bool,
}

impl AccountsState {
    /// Wire every account service to a single backend.
    pub fn new<R>(repo: Arc<R>, metrics: Arc<dyn MetricsSink>, session: &SessionConfig) -> Self
    where
        R: UserRepository + CredentialRepository + SessionRepository + 'static,
    {
        Self {
            users: repo.clone(),
            credentials: CredentialStore::new(repo.clone(), repo.clone(), metrics.clone()),
            sessions: SessionManager::new(repo, session.lifetime),
            metrics,
            cookie_secure: session.cookie_secure,
        }
    }
}

/// Creates the `/users` router.
pub fn router(state: AccountsState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(signup::create_user))
        .routes(routes!(login::login))
        .routes(routes!(login::logout))
        .with_state(state)
}
