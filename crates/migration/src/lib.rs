pub use sea_orm_migration::prelude::*;

mod m20250601_000001_create_accounts;
mod m20250601_000002_create_client_kv;
mod m20250601_000003_create_oauth2_token;

/// Users, credentials and sessions.
pub struct AccountsMigrator;

#[async_trait::async_trait]
impl MigratorTrait for AccountsMigrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20250601_000001_create_accounts::Migration)]
    }

    fn migration_table_name() -> DynIden {
        Alias::new("accounts_migrations").into_iden()
    }
}

/// Key/value table backing the OAuth2 client store.
pub struct ClientsMigrator;

#[async_trait::async_trait]
impl MigratorTrait for ClientsMigrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20250601_000002_create_client_kv::Migration)]
    }

    fn migration_table_name() -> DynIden {
        Alias::new("clients_migrations").into_iden()
    }
}

/// Issued OAuth2 tokens.
pub struct TokensMigrator;

#[async_trait::async_trait]
impl MigratorTrait for TokensMigrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20250601_000003_create_oauth2_token::Migration)]
    }

    fn migration_table_name() -> DynIden {
        Alias::new("tokens_migrations").into_iden()
    }
}
