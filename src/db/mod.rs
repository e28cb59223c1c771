//! SQLite persistence
//!
//! One connection guarded by a mutex. Reads borrow the connection; writes
//! run inside a transaction that commits only when the closure succeeds, so
//! a failed stock check or validation leaves no partial rows behind.

pub mod codec;
mod migrations;

use crate::error::{AppError, AppResult};
use rusqlite::{Connection, Transaction};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

pub use migrations::CURRENT_SCHEMA_VERSION;

/// Shared database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    /// Open (or create) the database file and apply pending migrations
    pub fn open(path: &str) -> AppResult<Self> {
        if path == ":memory:" {
            return Self::in_memory();
        }
        info!("Opening database at {}", path);
        let conn = Connection::open(path)?;
        Self::bootstrap(conn)
    }

    /// Fresh in-memory database, used by tests and ephemeral runs
    pub fn in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::bootstrap(conn)
    }

    fn bootstrap(mut conn: Connection) -> AppResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let applied = migrations::apply_pending(&mut conn)?;
        if applied > 0 {
            info!("Applied {} database migration(s)", applied);
        }
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::internal("database connection lock poisoned"))
    }

    /// Run read-only work against the connection
    pub fn read<T, F>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&Connection) -> AppResult<T>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Run work inside a transaction; rolls back if the closure fails
    pub fn write<T, F>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> AppResult<T>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                debug!("Rolling back transaction: {}", err);
                // Dropping the transaction rolls it back
                drop(tx);
                Err(err)
            }
        }
    }

    /// Cheap liveness query for health checks
    pub fn ping(&self) -> AppResult<()> {
        self.read(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
    }

    /// Highest applied migration version
    pub fn schema_version(&self) -> AppResult<u32> {
        self.read(|conn| migrations::current_version(conn))
    }
}
