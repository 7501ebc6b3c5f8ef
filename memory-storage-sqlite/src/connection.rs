//! Connection management: opening a database and the `Tx` plumbing shared
//! by every [`crate::SqliteStorage`] method.

use std::sync::Arc;

use libsql::{Builder, Connection, Database};
use memory_core::{Error, Result};
use memory_core::store::Tx;
use tracing::{debug, info};

use crate::schema;

/// libSQL-backed [`memory_core::store::Repository`].
///
/// Wraps a single [`Database`] handle. `file:`/`:memory:` URLs connect
/// locally; `libsql://` URLs connect to a remote Turso/sqld server and
/// require a non-empty auth token, mirroring the protocol checks a
/// production deployment needs before it will hand out a connection.
pub struct SqliteStorage {
    db: Arc<Database>,
}

impl SqliteStorage {
    /// Open (creating if absent) a local database file.
    pub async fn open_local(path: &str) -> Result<Self> {
        debug!(path, "opening local libsql database");
        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(|e| Error::Store(format!("failed to open local database {path}: {e}")))?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Open a transient in-memory database. Useful for tests and examples.
    pub async fn open_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| Error::Store(format!("failed to open in-memory database: {e}")))?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Connect to a remote Turso/sqld database over `libsql://`.
    pub async fn open_remote(url: &str, token: &str) -> Result<Self> {
        if !url.starts_with("libsql://") {
            return Err(Error::Configuration(format!(
                "remote database url must use the libsql:// scheme, got {url}"
            )));
        }
        if token.trim().is_empty() {
            return Err(Error::Configuration(
                "authentication token required for remote libsql connections".to_string(),
            ));
        }
        info!(url, "connecting to remote libsql database");
        let db = Builder::new_remote(url.to_string(), token.to_string())
            .build()
            .await
            .map_err(|e| Error::Store(format!("failed to connect to {url}: {e}")))?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Create every table and index the schema needs. Safe to call on an
    /// already-provisioned database; every statement is `IF NOT EXISTS`.
    pub async fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        for statement in schema::ALL_STATEMENTS {
            conn.execute(statement, ())
                .await
                .map_err(|e| Error::Store(format!("schema statement failed: {e}")))?;
        }
        Ok(())
    }

    pub(crate) fn connect(&self) -> Result<Connection> {
        self.db
            .connect()
            .map_err(|e| Error::Store(format!("failed to open connection: {e}")))
    }

    pub(crate) fn conn<'a>(tx: &'a Tx) -> Result<&'a Connection> {
        tx.downcast_ref::<Connection>()
            .ok_or_else(|| Error::Internal("tx handed to the wrong repository backend".to_string()))
    }

    pub(crate) async fn begin_tx(&self) -> Result<Tx> {
        let conn = self.connect()?;
        conn.execute("BEGIN TRANSACTION", ())
            .await
            .map_err(|e| Error::Store(format!("failed to begin transaction: {e}")))?;
        Ok(Tx::new(conn))
    }

    pub(crate) async fn commit_tx(&self, tx: Tx) -> Result<()> {
        let conn = Self::conn(&tx)?;
        conn.execute("COMMIT", ())
            .await
            .map_err(|e| Error::Store(format!("failed to commit transaction: {e}")))?;
        Ok(())
    }

    pub(crate) async fn rollback_tx(&self, tx: Tx) -> Result<()> {
        let conn = Self::conn(&tx)?;
        conn.execute("ROLLBACK", ())
            .await
            .map_err(|e| Error::Store(format!("failed to roll back transaction: {e}")))?;
        Ok(())
    }
}
