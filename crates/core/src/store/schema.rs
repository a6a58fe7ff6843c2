//! Store schema and migration runner.
//!
//! Applied migrations are tracked in the SQLite `user_version` pragma.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::errors::StoreError;

/// `(version, description, sql)`, applied in order starting at 1.
static MIGRATIONS: &[(u32, &str, &str)] = &[
    (
        1,
        "initial schema",
        r#"
        CREATE TABLE IF NOT EXISTS paused_batches (
            batch_id    TEXT PRIMARY KEY,
            repository  TEXT NOT NULL,
            branch      TEXT NOT NULL,
            state_json  TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_paused_batches_repository ON paused_batches (repository);

        CREATE TABLE IF NOT EXISTS batch_history (
            batch_id     TEXT PRIMARY KEY,
            repository   TEXT NOT NULL,
            source_ref   TEXT NOT NULL,
            status       TEXT NOT NULL,
            cancelled    INTEGER NOT NULL DEFAULT 0,
            result_json  TEXT NOT NULL,
            started_at   TEXT NOT NULL,
            finished_at  TEXT
        );
        "#,
    ),
    (
        2,
        "history ordering index",
        r#"
        CREATE INDEX IF NOT EXISTS idx_batch_history_finished_at ON batch_history (finished_at);
        "#,
    ),
    (
        3,
        "cross-process repository locks",
        r#"
        CREATE TABLE IF NOT EXISTS repository_locks (
            repository   TEXT PRIMARY KEY,
            holder       TEXT NOT NULL,
            pid          INTEGER NOT NULL,
            acquired_at  INTEGER NOT NULL
        );
        "#,
    ),
];

pub fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    let current_version = get_schema_version(conn)?;
    info!(
        current_version,
        target_version = MIGRATIONS.last().map(|m| m.0).unwrap_or(0),
        "checking store migrations"
    );

    for &(version, description, sql) in MIGRATIONS {
        if version > current_version {
            info!(version, description, "applying migration");
            conn.execute_batch(sql)
                .map_err(|e| StoreError::MigrationFailed {
                    version,
                    detail: e.to_string(),
                })?;
            set_schema_version(conn, version)?;
            debug!(version, "migration applied");
        }
    }

    Ok(())
}

fn get_schema_version(conn: &Connection) -> Result<u32, StoreError> {
    let version: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

fn set_schema_version(conn: &Connection, version: u32) -> Result<(), StoreError> {
    conn.pragma_update(None, "user_version", version)?;
    Ok(())
}
