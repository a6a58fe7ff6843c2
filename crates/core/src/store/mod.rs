//! SQLite persistence for paused batches and batch history.
//!
//! A paused batch must survive the process that paused it: the CLI pauses
//! in one invocation and resumes in the next. Finished batches are kept as
//! history for `git-multimerge history`.

pub mod queries;
pub mod schema;

pub use queries::HistoryEntry;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, TransactionBehavior};
use tracing::{debug, info};

use crate::errors::StoreError;

/// File name of the store inside the configured data directory.
pub const STORE_FILE_NAME: &str = "multimerge.db";

/// Handle wrapping a SQLite connection.
///
/// The connection sits behind a `Mutex` so the store is `Send + Sync` and
/// can be shared with the orchestrator through an `Arc`.
pub struct BatchStore {
    conn: Mutex<Connection>,
}

impl BatchStore {
    /// Open (or create) the store at `path` in WAL mode.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        info!(path = %path.display(), "opening batch store");

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;

        debug!("batch store opened with WAL mode");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open the store file inside `data_dir` and bring its schema up to date.
    pub fn open_in_dir<P: AsRef<Path>>(data_dir: P) -> Result<Self, StoreError> {
        let store = Self::open(Self::path_in(data_dir))?;
        store.initialize()?;
        Ok(store)
    }

    pub fn path_in<P: AsRef<Path>>(data_dir: P) -> PathBuf {
        data_dir.as_ref().join(STORE_FILE_NAME)
    }

    /// Open an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run all schema migrations.
    pub fn initialize(&self) -> Result<(), StoreError> {
        let conn = self.conn();
        schema::run_migrations(&conn)?;
        debug!("batch store schema is up to date");
        Ok(())
    }

    /// Lock the connection, recovering it if a previous holder panicked.
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("batch store mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Run `f` inside a transaction, committing only on `Ok`.
    ///
    /// The write lock is taken up front so read-then-write sequences from
    /// two processes serialize instead of failing on upgrade.
    pub fn transaction<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }
}

impl std::fmt::Debug for BatchStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchStore").finish_non_exhaustive()
    }
}
