use std::sync::Arc;
use std::time::Duration;

use auth_server::AppResources;
use auth_server::accounts::AccountsState;
use auth_server::accounts::sessions;
use auth_server::accounts::sql::SqlAccounts;
use auth_server::api::{build_router, start_webserver};
use auth_server::config::{AppConfig, load_config};
use auth_server::metrics::Recorder;
use auth_server::oauth2::clients::ClientStore;
use auth_server::oauth2::tokens::{self, SqlTokenStore, TokenStore};
use auth_server::oauth2::{OAuth2Settings, OAuth2State};
use auth_server::storage::kv::SqlKvStore;
use auth_server::storage::{DbHandle, sqlite_url};
use color_eyre::eyre::{Result, WrapErr};
use migration::{AccountsMigrator, ClientsMigrator, TokensMigrator};
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_standard_tracing() {
    let default_directives = "auth_server=info,tower_http=info,sea_orm=warn";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(true).with_level(true);

    registry.with(layer).init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    initialize_standard_tracing();

    let config = Arc::new(load_config().wrap_err("Failed to load configuration")?);

    // Every database opened by `run` lands here so it is closed on any exit path.
    let mut handles: Vec<DbHandle> = Vec::new();
    let result = run(config, &mut handles).await;

    for handle in handles {
        if let Err(e) = handle.close().await {
            tracing::warn!(error = %e, "failed to close database");
        }
    }
    result
}

async fn open<M: migration::MigratorTrait>(
    url: &str,
    what: &'static str,
    handles: &mut Vec<DbHandle>,
) -> Result<DbHandle> {
    let handle = DbHandle::open::<M>(url)
        .await
        .wrap_err_with(|| format!("problem opening {what} database"))?;
    handles.push(handle.clone());
    Ok(handle)
}

async fn run(config: Arc<AppConfig>, handles: &mut Vec<DbHandle>) -> Result<()> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting auth server");

    let accounts_db = open::<AccountsMigrator>(&config.database_url, "account", handles).await?;
    let clients_db = open::<ClientsMigrator>(
        &sqlite_url(&config.oauth2.clients_db_path),
        "oauth2 clients",
        handles,
    )
    .await?;
    let tokens_db = open::<TokensMigrator>(
        &sqlite_url(&config.oauth2.tokens_db_path),
        "oauth2 tokens",
        handles,
    )
    .await?;

    let token_store: Arc<dyn TokenStore> = Arc::new(SqlTokenStore::new(tokens_db));
    let metrics = Arc::new(Recorder::new());
    let accounts = AccountsState::new(
        Arc::new(SqlAccounts::new(accounts_db)),
        metrics.clone(),
        &config.session,
    );
    let oauth2 = OAuth2State::new(
        ClientStore::new(Arc::new(SqlKvStore::new(clients_db))),
        token_store.clone(),
        accounts.sessions.clone(),
        metrics.clone(),
        OAuth2Settings::from(&config.oauth2),
    );
    tracing::info!(
        domain = %config.oauth2.domain,
        allow_get = config.oauth2.allow_get_access_request,
        refresh_tokens = config.oauth2.issue_refresh_tokens,
        "oauth2 configuration"
    );

    let purge_every = Duration::from_secs(config.session.purge_interval);
    let session_purge = sessions::spawn_purge_task(accounts.sessions.clone(), purge_every);
    let token_purge = tokens::spawn_purge_task(token_store, purge_every);

    let resources = AppResources {
        config: config.clone(),
        metrics,
    };
    let router = build_router(resources, accounts, oauth2.clone());

    let addr = config.socket_addr()?;
    let served = match TcpListener::bind(addr).await {
        Ok(listener) => start_webserver(listener, router, shutdown_signal()).await,
        Err(e) => Err(color_eyre::Report::new(e).wrap_err(format!("failed to bind {addr}"))),
    };

    session_purge.abort();
    token_purge.abort();
    if let Err(e) = oauth2.shutdown().await {
        tracing::warn!(error = %e, "problem closing oauth2 stores");
    }
    served
}
