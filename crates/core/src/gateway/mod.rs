//! Version-control gateway.
//!
//! The orchestrator never touches repository storage directly. Every read
//! and every mutation goes through [`VcsGateway`], which is what lets the
//! orchestration logic run against an in-memory fake under test and
//! against `git2` in production ([`GitGateway`]).

pub mod git;

#[cfg(test)]
pub(crate) mod fake;

pub use git::GitGateway;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::conflict::ConflictReport;
use crate::errors::GatewayError;
use crate::models::MergeStrategy;

/// A full commit id as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitId(String);

impl CommitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CommitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<git2::Oid> for CommitId {
    fn from(oid: git2::Oid) -> Self {
        Self(oid.to_string())
    }
}

/// What HEAD pointed at when a snapshot was taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadRef {
    Branch(String),
    Detached(CommitId),
}

/// A capturable repository state enabling exact rollback.
///
/// Records HEAD and the tip of every local branch, so restoring resets
/// exactly the refs a merge attempt moved and nothing else. Serializable so
/// a paused batch can be resumed or abandoned from another process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub head: HeadRef,
    pub branch_tips: BTreeMap<String, CommitId>,
}

/// Result of asking the gateway to merge a source into the checked-out
/// branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The target already contains the source; nothing was done.
    UpToDate,
    /// The merge completed and the gateway finalized the commit (or moved
    /// the branch for a fast-forward).
    Clean(CommitId),
    /// The merge stopped with conflicts; the conflicted state is left in
    /// the working tree until the snapshot is restored or the merge is
    /// concluded.
    Conflicts(ConflictReport),
}

/// Result of bringing a local branch up to date with its remote copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    /// The remote has no branch of that name.
    NoRemoteBranch,
    /// The local branch already contains the remote tip.
    UpToDate,
    /// The local branch was fast-forwarded to the remote tip.
    FastForwarded(CommitId),
}

/// Abstraction over the repository the orchestrator drives.
///
/// Mutating operations act on the currently checked-out branch.
pub trait VcsGateway: Send {
    /// A stable identifier for the repository (its path for `git2`).
    fn repository_id(&self) -> String;

    /// Resolve a branch, tag, or commit expression; `None` when unknown.
    fn resolve_ref(&self, name: &str) -> Result<Option<CommitId>, GatewayError>;

    /// Whether a local branch with this exact name exists.
    fn branch_exists(&self, name: &str) -> Result<bool, GatewayError>;

    /// The checked-out local branch, or `None` for a detached or unborn HEAD.
    fn current_branch(&self) -> Result<Option<String>, GatewayError>;

    /// No uncommitted modifications and no merge in progress.
    fn is_working_tree_clean(&self) -> Result<bool, GatewayError>;

    fn checkout(&mut self, branch: &str) -> Result<(), GatewayError>;

    /// Merge `source` into the checked-out branch.
    fn merge(
        &mut self,
        source: &str,
        strategy: MergeStrategy,
        message: &str,
    ) -> Result<MergeOutcome, GatewayError>;

    fn commit_snapshot(&mut self) -> Result<Snapshot, GatewayError>;

    /// Discard any in-progress merge and put HEAD and every recorded branch
    /// back where the snapshot found them.
    fn restore_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), GatewayError>;

    /// Whether conflicts are still unresolved for `branch`: any index
    /// conflict, or a marker block left in one of `paths` (the paths the
    /// merge reported as conflicting), uncommitted or committed on the tip.
    fn has_unresolved_conflict_markers(
        &self,
        branch: &str,
        paths: &[String],
    ) -> Result<bool, GatewayError>;

    /// Commit a merge whose conflicts were resolved but not yet committed.
    /// Returns `None` when no merge is in progress.
    fn conclude_merge(
        &mut self,
        strategy: MergeStrategy,
        message: &str,
    ) -> Result<Option<CommitId>, GatewayError>;

    /// Fetch from the configured remote and fast-forward the local `branch`
    /// to its remote copy. A local branch that has diverged from the remote
    /// is an error.
    fn pull(&mut self, branch: &str) -> Result<PullOutcome, GatewayError>;

    /// Whether the configured remote has a branch of this name, as of the
    /// last fetch or push.
    fn remote_branch_exists(&self, branch: &str) -> Result<bool, GatewayError>;

    /// Publish a local branch to the configured remote, setting it as the
    /// branch's upstream when none is configured.
    fn push(&mut self, branch: &str) -> Result<(), GatewayError>;

    fn delete_branch(&mut self, name: &str) -> Result<(), GatewayError>;

    /// Delete `branch` on the configured remote.
    fn delete_remote_branch(&mut self, branch: &str) -> Result<(), GatewayError>;
}
