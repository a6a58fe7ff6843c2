//! Error types for the git-multimerge core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.
//!
//! Merge conflicts are deliberately absent here: a conflicting merge is an
//! outcome recorded in a [`BranchMergeResult`](crate::models::BranchMergeResult),
//! not a failure.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Gateway errors
// ---------------------------------------------------------------------------

/// Errors from the version-control gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The repository path does not exist or is not a git repo.
    #[error("git repository not found at '{0}'")]
    RepositoryNotFound(String),

    /// A `git2` library error.
    #[error("git2 error: {0}")]
    Git2Error(#[from] git2::Error),

    /// A ref (branch, tag, SHA) could not be resolved.
    #[error("git ref not found: {0}")]
    RefNotFound(String),

    /// Uncommitted local modifications block a checkout or merge.
    #[error("dirty working tree")]
    DirtyWorkingTree,

    /// A fast-forward-only merge was requested but the histories diverged.
    #[error("cannot fast-forward '{target}' to '{source_ref}'")]
    NotFastForward {
        source_ref: String,
        target: String,
    },

    /// Push was rejected (e.g. non-fast-forward).
    #[error("git push rejected for branch '{branch}': {detail}")]
    PushRejected {
        branch: String,
        detail: String,
    },

    /// A merge cannot be concluded while the index still has conflicts.
    #[error("merge still has {0} unresolved conflict(s)")]
    UnresolvedConflicts(usize),

    /// Generic I/O wrapper.
    #[error("git I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Orchestrator errors
// ---------------------------------------------------------------------------

/// Errors raised by the merge orchestrator itself.
///
/// Per-branch gateway failures do not surface here; they are captured in
/// the batch result. Only failures that prevent the batch from being
/// processed at all are returned as errors.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The batch was rejected before any repository mutation.
    #[error("invalid merge batch: {0}")]
    Validation(String),

    /// Another batch holds the repository lock.
    #[error("repository is busy: {0}")]
    RepositoryBusy(String),

    /// A resume/abandon request does not match the orchestrator state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Gateway failure outside of a per-branch step (validation, restore).
    #[error("orchestrator gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Persistence failure.
    #[error("orchestrator store error: {0}")]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

/// Errors from the SQLite persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying rusqlite error.
    #[error("database error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// A migration failed.
    #[error("database migration failed (version {version}): {detail}")]
    MigrationFailed {
        version: u32,
        detail: String,
    },

    /// A stored batch could not be (de)serialized.
    #[error("batch serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic I/O error (e.g. creating the data directory).
    #[error("database I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
