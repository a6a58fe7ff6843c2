//! git-multimerge core library.
//!
//! Merges one source ref into several target branches of a repository, in
//! order, recording a per-branch outcome and applying a conflict policy
//! without leaving the repository half-merged. The crate provides the
//! request and result models, conflict reports, the repository gateway
//! (with a `git2` implementation), the orchestrator, persistence of paused
//! batches and history, and configuration.

pub mod config;
pub mod conflict;
pub mod errors;
pub mod gateway;
pub mod models;
pub mod orchestrator;
pub mod store;

// Re-exports for convenience.
pub use config::MultiMergeConfig;
pub use gateway::{GitGateway, VcsGateway};
pub use models::{
    BatchOptions, BatchResult, BranchMergeResult, ConflictPolicy, ContinuationToken, MergeBatch,
    MergeStatus, MergeStrategy, MergeTask,
};
pub use orchestrator::{CancelHandle, MergeOrchestrator, PausedBatch, RepositoryHandle};
pub use store::BatchStore;
