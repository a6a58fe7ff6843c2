//! Typed query helpers for the batch store.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use tracing::{debug, warn};

use super::BatchStore;
use crate::errors::StoreError;
use crate::models::{BatchResult, ContinuationToken};
use crate::orchestrator::PausedBatch;

/// A repository lock older than this is taken to belong to a process that
/// died without releasing it.
pub const LOCK_STALE_AFTER_SECS: i64 = 6 * 60 * 60;

/// A row from the `batch_history` table with its decoded result.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub repository: String,
    pub status: String,
    pub result: BatchResult,
}

impl BatchStore {
    // -- paused_batches -----------------------------------------------------

    /// Persist a paused batch, replacing any earlier save of the same batch.
    pub fn save_paused(&self, paused: &PausedBatch) -> Result<(), StoreError> {
        let json = serde_json::to_string(paused)?;
        let token = paused.token().to_string();
        let now = Utc::now().to_rfc3339();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO paused_batches (batch_id, repository, branch, state_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(batch_id) DO UPDATE SET state_json = excluded.state_json",
            params![token, paused.repository(), paused.branch(), json, now],
        )?;
        debug!(batch_id = %token, branch = paused.branch(), "saved paused batch");
        Ok(())
    }

    pub fn load_paused(&self, token: &ContinuationToken) -> Result<Option<PausedBatch>, StoreError> {
        let conn = self.conn();
        let json: Option<String> = conn
            .query_row(
                "SELECT state_json FROM paused_batches WHERE batch_id = ?1",
                params![token.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        json.map(|j| serde_json::from_str(&j))
            .transpose()
            .map_err(StoreError::from)
    }

    /// The paused batch holding `repository`, if any. At most one exists
    /// because a paused batch blocks every new run on its repository.
    pub fn paused_for_repository(&self, repository: &str) -> Result<Option<PausedBatch>, StoreError> {
        let conn = self.conn();
        let json: Option<String> = conn
            .query_row(
                "SELECT state_json FROM paused_batches WHERE repository = ?1
                 ORDER BY created_at DESC LIMIT 1",
                params![repository],
                |row| row.get(0),
            )
            .optional()?;
        json.map(|j| serde_json::from_str(&j))
            .transpose()
            .map_err(StoreError::from)
    }

    /// Remove a paused batch. Returns whether a row was deleted.
    pub fn delete_paused(&self, token: &ContinuationToken) -> Result<bool, StoreError> {
        let conn = self.conn();
        let deleted = conn.execute(
            "DELETE FROM paused_batches WHERE batch_id = ?1",
            params![token.to_string()],
        )?;
        debug!(batch_id = %token, deleted, "deleted paused batch");
        Ok(deleted > 0)
    }

    // -- batch_history ------------------------------------------------------

    /// Record a finished batch. Any paused state left for it is removed in
    /// the same transaction.
    pub fn record_batch(&self, repository: &str, result: &BatchResult) -> Result<(), StoreError> {
        let json = serde_json::to_string(result)?;
        let batch_id = result.batch_id.to_string();
        self.transaction(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO batch_history
                    (batch_id, repository, source_ref, status, cancelled, result_json, started_at, finished_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    batch_id,
                    repository,
                    result.source_ref,
                    result.batch_status().to_string(),
                    result.cancelled,
                    json,
                    result.started_at.to_rfc3339(),
                    result.finished_at.map(|t| t.to_rfc3339()),
                ],
            )?;
            conn.execute(
                "DELETE FROM paused_batches WHERE batch_id = ?1",
                params![batch_id],
            )?;
            Ok(())
        })?;
        debug!(batch_id = %result.batch_id, status = %result.batch_status(), "recorded batch");
        Ok(())
    }

    /// Most recent finished batches, newest first.
    pub fn list_history(&self, limit: u32) -> Result<Vec<HistoryEntry>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT repository, status, result_json FROM batch_history
             ORDER BY finished_at DESC, rowid DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(repository, status, json)| {
                Ok(HistoryEntry {
                    repository,
                    status,
                    result: serde_json::from_str(&json)?,
                })
            })
            .collect()
    }

    // -- repository_locks ---------------------------------------------------

    /// Claim `repository` for `holder`. Returns `false` while another live
    /// holder has it; a claim older than [`LOCK_STALE_AFTER_SECS`] is taken
    /// over.
    pub fn acquire_repository_lock(&self, repository: &str, holder: &str) -> Result<bool, StoreError> {
        let now = Utc::now().timestamp();
        let acquired = self.transaction(|conn| {
            let existing: Option<(String, u32, i64)> = conn
                .query_row(
                    "SELECT holder, pid, acquired_at FROM repository_locks WHERE repository = ?1",
                    params![repository],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;
            if let Some((current, pid, acquired_at)) = existing {
                if current != holder {
                    if now - acquired_at < LOCK_STALE_AFTER_SECS {
                        debug!(repository, pid, "repository is locked by another process");
                        return Ok(false);
                    }
                    warn!(repository, pid, acquired_at, "taking over stale repository lock");
                }
            }
            conn.execute(
                "INSERT OR REPLACE INTO repository_locks (repository, holder, pid, acquired_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![repository, holder, std::process::id(), now],
            )?;
            Ok(true)
        })?;
        debug!(repository, holder, acquired, "repository lock requested");
        Ok(acquired)
    }

    /// Drop `holder`'s claim on `repository`. Returns whether it held one.
    pub fn release_repository_lock(&self, repository: &str, holder: &str) -> Result<bool, StoreError> {
        let conn = self.conn();
        let deleted = conn.execute(
            "DELETE FROM repository_locks WHERE repository = ?1 AND holder = ?2",
            params![repository, holder],
        )?;
        debug!(repository, holder, deleted, "repository lock released");
        Ok(deleted > 0)
    }

    pub fn count_history(&self) -> Result<i64, StoreError> {
        let conn = self.conn();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM batch_history", [], |row| row.get(0))?;
        Ok(count)
    }
}
