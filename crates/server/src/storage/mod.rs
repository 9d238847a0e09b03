//! Database handles shared by the account, client and token stores.
//!
//! Each store owns its own database (the account tables, the client
//! key/value table and the token table live in separate sqlite files by
//! default). A [`DbHandle`] wraps the connection so it can be closed exactly
//! once at shutdown while other clones observe [`StorageError::Closed`].

pub mod kv;

use std::sync::Arc;
use std::time::Duration;

use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

use crate::error::StorageError;

/// Turn a bare file path into a sqlite connection string.
///
/// Values that already carry a scheme pass through untouched.
pub fn sqlite_url(path: &str) -> String {
    if path.contains("://") || path.starts_with("sqlite:") {
        path.to_string()
    } else {
        format!("sqlite://{path}?mode=rwc")
    }
}

/// Shared, closable database connection.
#[derive(Clone, Debug)]
pub struct DbHandle {
    conn: Arc<RwLock<Option<DatabaseConnection>>>,
}

impl DbHandle {
    /// Connect and bring the schema up to date with migrator `M`.
    pub async fn open<M: MigratorTrait>(url: &str) -> Result<Self, StorageError> {
        let conn = Database::connect(url).await?;
        M::up(&conn, None).await?;
        tracing::debug!(url = %redact(url), "database ready");
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: DatabaseConnection) -> Self {
        Self {
            conn: Arc::new(RwLock::new(Some(conn))),
        }
    }

    /// A clone of the live connection, or `Closed` once [`DbHandle::close`] ran.
    pub async fn conn(&self) -> Result<DatabaseConnection, StorageError> {
        self.conn.read().await.clone().ok_or(StorageError::Closed)
    }

    /// Close the underlying pool. Calling it again is a no-op.
    pub async fn close(&self) -> Result<(), StorageError> {
        let taken = self.conn.write().await.take();
        if let Some(conn) = taken {
            conn.close().await?;
        }
        Ok(())
    }

    pub async fn is_closed(&self) -> bool {
        self.conn.read().await.is_none()
    }
}

/// Run `sweep` every `every` until the handle is aborted or the store reports
/// [`StorageError::Closed`]. `what` names the swept records in log lines.
pub fn spawn_sweeper<F, Fut>(what: &'static str, every: Duration, sweep: F) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<u64, StorageError>> + Send,
{
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match sweep().await {
                Ok(0) => {}
                Ok(removed) => tracing::debug!(removed, what, "purged expired records"),
                Err(StorageError::Closed) => {
                    tracing::debug!(what, "store closed, stopping purge task");
                    break;
                }
                Err(e) => tracing::warn!(error = %e, what, "purge failed"),
            }
        }
    })
}

/// Strip credentials from a connection string before logging it.
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}***{}", &url[..scheme_end + 3], &url[at..])
        }
        _ => url.to_string(),
    }
}
