//! SQLite connection pool, schema, and transaction scoping.
//!
//! ## Transaction discipline
//!
//! Every write operation runs in exactly one transaction obtained from
//! [`Database::begin`] and is closed by [`finish`]: committed when the body
//! succeeded, explicitly rolled back otherwise. No store method returns with a
//! transaction still open, so a failed request never leaves partial writes
//! behind on the connection it used.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};

use crate::error::PersistenceError;

/// Transaction handle passed to store helpers.
pub type Tx = Transaction<'static, Sqlite>;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL UNIQUE,
        username TEXT NOT NULL UNIQUE,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        hashed_password TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1,
        role TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS todos (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        description TEXT,
        priority INTEGER NOT NULL,
        completed INTEGER NOT NULL DEFAULT 0,
        owner_id INTEGER NOT NULL REFERENCES users(id),
        CONSTRAINT todo_priority_range CHECK (priority BETWEEN 1 AND 5)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS todos_owner_idx ON todos (owner_id)",
];

/// Handle to the service database.
///
/// Cheap to clone; all clones share one pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open a pool for `url` and make sure the schema exists.
    ///
    /// In-memory URLs keep their connections alive forever, since closing the
    /// last connection drops the database.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, PersistenceError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| PersistenceError::from_sqlx("connect", e))?
            .create_if_missing(true)
            .foreign_keys(true);

        let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections.max(1));
        if url.contains(":memory:") {
            pool_options = pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| PersistenceError::from_sqlx("connect", e))?;

        let db = Self { pool };
        db.migrate().await?;
        tracing::info!(url, "database ready");
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create tables and indexes if they do not exist.
    pub async fn migrate(&self) -> Result<(), PersistenceError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| PersistenceError::from_sqlx("migrate", e))?;
        }
        Ok(())
    }

    pub(crate) async fn begin(&self, operation: &'static str) -> Result<Tx, PersistenceError> {
        self.pool
            .begin()
            .await
            .map_err(|e| PersistenceError::from_sqlx(operation, e))
    }
}

/// Close `tx` according to `result`.
///
/// A failed rollback is logged and the original error returned; SQLx discards
/// the connection in that case, so nothing uncommitted survives it.
pub(crate) async fn finish<T>(
    tx: Tx,
    operation: &'static str,
    result: Result<T, PersistenceError>,
) -> Result<T, PersistenceError> {
    match result {
        Ok(value) => {
            tx.commit()
                .await
                .map_err(|e| PersistenceError::from_sqlx(operation, e))?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(operation, error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}
