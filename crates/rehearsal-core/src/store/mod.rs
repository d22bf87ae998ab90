//! SQLite-backed schedule and pending-change stores.
//!
//! Runtime defaults:
//! - `journal_mode = WAL` so readers in other processes never block on a cutover
//! - `busy_timeout = 5s` to absorb transient lock failures under contention
//! - `foreign_keys = ON` so slot rows cascade with their date rows
//!
//! Every store function takes a borrowed connection. Reads accept any
//! `&Connection`; mutations demand a `&Transaction` so a delete-then-insert can
//! never run outside a transaction. [`Database`] owns the single shared
//! connection and hands out scoped read snapshots and IMMEDIATE write
//! transactions.

pub mod migrations;
pub mod pending;
pub mod schedule;
pub mod schema;

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::error::{Error, Result, StoreContext};

/// Busy timeout used for booking DB connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared handle to the booking database.
///
/// Cloning is cheap; all clones share one connection guarded by a mutex, which
/// serializes HTTP handlers and the weekly cutover task.
#[derive(Debug, Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file, apply runtime pragmas, and migrate
    /// the schema to the latest version.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or the
    /// database cannot be opened, configured, or migrated.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| Error::StoreIo {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let conn = Connection::open(path)
            .store_context(&format!("open booking database {}", path.display()))?;
        tracing::debug!(path = %path.display(), "opened booking database");
        Self::from_connection(conn)
    }

    /// Open a private in-memory database. Used by tests and dry runs.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot allocate or migrate the database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().store_context("open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        configure_connection(&conn).store_context("configure sqlite pragmas")?;
        migrations::migrate(&mut conn).store_context("apply schema migrations")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::LockPoisoned)
    }

    /// Run `f` against one consistent snapshot of the database.
    ///
    /// # Errors
    ///
    /// Propagates errors from `f` and from beginning or ending the snapshot.
    pub fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Deferred)
            .store_context("begin read snapshot")?;
        let value = f(&*tx)?;
        tx.finish().store_context("end read snapshot")?;
        Ok(value)
    }

    /// Run `f` inside an IMMEDIATE transaction. The transaction commits when
    /// `f` returns `Ok` and rolls back entirely when it returns `Err`.
    ///
    /// # Errors
    ///
    /// Propagates errors from `f`, and from beginning or committing.
    pub fn write<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .store_context("begin write transaction")?;
        let value = f(&tx)?;
        tx.commit().store_context("commit write transaction")?;
        Ok(value)
    }
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}

/// Current wall-clock time in microseconds, used for row bookkeeping columns.
pub(crate) fn now_us() -> i64 {
    chrono::Utc::now().timestamp_micros()
}
