use config::Config;
use migration::{AccountsMigrator, ClientsMigrator, TokensMigrator};
use sea_orm_migration::prelude::*;
use std::env;

/// Turn a bare file path into a sqlite connection string.
fn sqlite_url(path: &str) -> String {
    if path.contains("://") || path.starts_with("sqlite:") {
        path.to_string()
    } else {
        format!("sqlite://{path}?mode=rwc")
    }
}

#[tokio::main]
async fn main() {
    // Which database to migrate: accounts (default), clients or tokens.
    let target = env::var("MIGRATION_TARGET").unwrap_or_else(|_| "accounts".to_string());

    if env::var("DATABASE_URL").is_err() {
        // Fallback: load from config.yaml, then the service defaults
        let settings = Config::builder()
            .add_source(config::File::with_name("config.yaml").required(false))
            .build()
            .unwrap();
        let url = match target.as_str() {
            "clients" => sqlite_url(
                &settings
                    .get_string("oauth2.clients_db_path")
                    .unwrap_or_else(|_| "oauth2_clients.db".to_string()),
            ),
            "tokens" => sqlite_url(
                &settings
                    .get_string("oauth2.tokens_db_path")
                    .unwrap_or_else(|_| "oauth2_tokens.db".to_string()),
            ),
            _ => settings
                .get_string("database_url")
                .unwrap_or_else(|_| sqlite_url("auth.db")),
        };
        env::set_var("DATABASE_URL", url);
    }

    match target.as_str() {
        "clients" => cli::run_cli(ClientsMigrator).await,
        "tokens" => cli::run_cli(TokensMigrator).await,
        _ => cli::run_cli(AccountsMigrator).await,
    }
}
