use config::{Config, Environment, File};
use serde::Deserialize;
use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    /// Listen address. A bare `:port` binds every interface.
    #[serde(default = "default_http_addr")]
    pub http_addr: String,
    /// Connection string of the account database (users, credentials, sessions).
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default)]
    pub oauth2: OAuth2Config,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct OAuth2Config {
    /// sqlite file (or full connection string) for issued tokens
    pub tokens_db_path: String,
    /// sqlite file (or full connection string) for the client key/value store
    pub clients_db_path: String,
    /// Domain stamped on every generated client.
    pub domain: String,
    /// Seconds an access token stays valid.
    pub access_token_lifetime: u64,
    /// Seconds a refresh token stays valid.
    pub refresh_token_lifetime: u64,
    /// Accept token requests sent as GET with query parameters.
    pub allow_get_access_request: bool,
    pub issue_refresh_tokens: bool,
}

impl Default for OAuth2Config {
    fn default() -> Self {
        Self {
            tokens_db_path: "oauth2_tokens.db".to_string(),
            clients_db_path: "oauth2_clients.db".to_string(),
            domain: "localhost".to_string(),
            access_token_lifetime: 2 * 60 * 60,
            refresh_token_lifetime: 3 * 24 * 60 * 60,
            allow_get_access_request: true,
            issue_refresh_tokens: true,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seconds a login session (and its cookie) lives.
    pub lifetime: u64,
    /// Add the `Secure` attribute to the session cookie.
    pub cookie_secure: bool,
    /// Seconds between sweeps of expired sessions and OAuth2 tokens.
    pub purge_interval: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lifetime: 30 * 24 * 60 * 60,
            cookie_secure: false,
            purge_interval: 5 * 60,
        }
    }
}

fn default_http_addr() -> String {
    ":8080".to_string()
}

fn default_database_url() -> String {
    "sqlite://auth.db?mode=rwc".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            database_url: default_database_url(),
            oauth2: OAuth2Config::default(),
            session: SessionConfig::default(),
        }
    }
}

impl AppConfig {
    /// Resolve `http_addr` into a bindable socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = if self.http_addr.starts_with(':') {
            format!("0.0.0.0{}", self.http_addr)
        } else {
            self.http_addr.clone()
        };
        addr.parse()
            .map_err(|e| ConfigError::Validation(format!("http_addr {:?}: {e}", self.http_addr)))
    }
}

/// Flat environment variables that predate the nested `SECTION__KEY` form.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("OAUTH2_TOKENS_DB_PATH", "oauth2.tokens_db_path"),
    ("OAUTH2_CLIENTS_DB_PATH", "oauth2.clients_db_path"),
    ("OAUTH2_DOMAIN", "oauth2.domain"),
    ("HTTP_ADDR", "http_addr"),
    ("DATABASE_URL", "database_url"),
];

/// Load application configuration from an optional `config.yaml` plus environment overrides.
///
/// Any variable matching the key path separated by double underscores (e.g.
/// `SESSION__LIFETIME`) overrides the file value. The legacy flat variables in
/// [`LEGACY_ENV`] win over both. Every key has a default, so an empty
/// environment yields a working configuration.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_with(|key| std::env::var(key).ok())
}

/// Same as [`load_config`], with the legacy variables read through `lookup`.
pub fn load_config_with<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut builder = Config::builder()
        .add_source(File::with_name("config.yaml").required(false))
        .add_source(Environment::default().separator("__"));

    for (var, key) in LEGACY_ENV {
        builder = builder.set_override_option(*key, lookup(var).filter(|v| !v.is_empty()))?;
    }

    from_config(builder.build()?)
}

/// Deserialize and validate an already assembled [`Config`].
pub fn from_config(cfg: Config) -> Result<AppConfig, ConfigError> {
    let app: AppConfig = cfg.try_deserialize()?;

    if app.oauth2.access_token_lifetime == 0 {
        return Err(ConfigError::Validation(
            "oauth2.access_token_lifetime must be > 0".into(),
        ));
    }
    if app.oauth2.issue_refresh_tokens && app.oauth2.refresh_token_lifetime == 0 {
        return Err(ConfigError::Validation(
            "oauth2.refresh_token_lifetime must be > 0".into(),
        ));
    }
    if app.session.lifetime == 0 {
        return Err(ConfigError::Validation("session.lifetime must be > 0".into()));
    }
    if app.session.purge_interval == 0 {
        return Err(ConfigError::Validation(
            "session.purge_interval must be > 0".into(),
        ));
    }
    app.socket_addr()?;

    Ok(app)
}
