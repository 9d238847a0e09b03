//! OAuth2 state management.

use std::sync::Arc;

use time::Duration;

use crate::accounts::sessions::SessionManager;
use crate::config::OAuth2Config;
use crate::metrics::MetricsSink;
use crate::oauth2::clients::ClientStore;
use crate::oauth2::tokens::TokenStore;

/// Token endpoint behaviour derived from [`OAuth2Config`].
#[derive(Debug, Clone)]
pub struct OAuth2Settings {
    /// Domain stamped on generated clients
    pub domain: String,
    pub access_token_lifetime: Duration,
    pub refresh_token_lifetime: Duration,
    pub allow_get_access_request: bool,
    pub issue_refresh_tokens: bool,
}

fn seconds(secs: u64) -> Duration {
    Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX))
}

impl From<&OAuth2Config> for OAuth2Settings {
    fn from(cfg: &OAuth2Config) -> Self {
        Self {
            domain: cfg.domain.clone(),
            access_token_lifetime: seconds(cfg.access_token_lifetime),
            refresh_token_lifetime: seconds(cfg.refresh_token_lifetime),
            allow_get_access_request: cfg.allow_get_access_request,
            issue_refresh_tokens: cfg.issue_refresh_tokens,
        }
    }
}

impl Default for OAuth2Settings {
    fn default() -> Self {
        Self::from(&OAuth2Config::default())
    }
}

/// Everything the token issuance and validation engine needs.
///
/// The engine itself holds no state; all of it lives in the stores.
#[derive(Clone)]
pub struct OAuth2State {
    pub clients: ClientStore,
    pub tokens: Arc<dyn TokenStore>,
    pub sessions: SessionManager,
    pub metrics: Arc<dyn MetricsSink>,
    pub settings: Arc<OAuth2Settings>,
}

impl OAuth2State {
    pub fn new(
        clients: ClientStore,
        tokens: Arc<dyn TokenStore>,
        sessions: SessionManager,
        metrics: Arc<dyn MetricsSink>,
        settings: OAuth2Settings,
    ) -> Self {
        Self {
            clients,
            tokens,
            sessions,
            metrics,
            settings: Arc::new(settings),
        }
    }
}
