//! Domain model types used throughout git-multimerge.
//!
//! These types bridge the orchestrator, the persistence layer, and the CLI
//! host that renders results.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conflict::ConflictReport;
use crate::errors::OrchestratorError;

/// Default commit message template for merge and squash commits.
pub const DEFAULT_COMMIT_MESSAGE: &str = "Merge {source} into {target}";

// ---------------------------------------------------------------------------
// Strategy and policy
// ---------------------------------------------------------------------------

/// How the source is merged into a target branch.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum MergeStrategy {
    /// Only move the target ref forward; diverged histories fail.
    #[serde(rename = "ff-only")]
    FastForwardOnly,
    /// Fast-forward when possible, otherwise create a merge commit.
    #[default]
    Recursive,
    /// Create a single-parent commit with the combined changes.
    Squash,
}

impl std::fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FastForwardOnly => write!(f, "ff-only"),
            Self::Recursive => write!(f, "recursive"),
            Self::Squash => write!(f, "squash"),
        }
    }
}

impl std::str::FromStr for MergeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ff-only" | "fast-forward-only" => Ok(Self::FastForwardOnly),
            "recursive" | "auto" => Ok(Self::Recursive),
            "squash" => Ok(Self::Squash),
            other => Err(format!("unknown merge strategy '{other}'")),
        }
    }
}

/// What happens to the rest of the batch when a task conflicts or fails.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Roll back the task, mark every later task aborted, stop.
    #[default]
    AbortBatch,
    /// Roll back the task and continue with the next one.
    SkipAndContinue,
    /// Leave the conflicted merge in place and suspend the batch.
    PauseForManual,
}

impl std::fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AbortBatch => write!(f, "abort-batch"),
            Self::SkipAndContinue => write!(f, "skip-and-continue"),
            Self::PauseForManual => write!(f, "pause-for-manual"),
        }
    }
}

impl std::str::FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "abort-batch" | "abort" => Ok(Self::AbortBatch),
            "skip-and-continue" | "skip" => Ok(Self::SkipAndContinue),
            "pause-for-manual" | "pause" => Ok(Self::PauseForManual),
            other => Err(format!("unknown conflict policy '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// One requested merge of a source ref into a single target branch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MergeTask {
    pub source_ref: String,
    pub target_branch: String,
    pub strategy: MergeStrategy,
    pub conflict_policy: ConflictPolicy,
}

impl MergeTask {
    pub fn new(
        source_ref: impl Into<String>,
        target_branch: impl Into<String>,
        strategy: MergeStrategy,
        conflict_policy: ConflictPolicy,
    ) -> Self {
        Self {
            source_ref: source_ref.into(),
            target_branch: target_branch.into(),
            strategy,
            conflict_policy,
        }
    }
}

/// Batch-wide flags that are not tied to a single task.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchOptions {
    /// Stay on the last merged target instead of returning to the
    /// branch that was checked out before the run.
    #[serde(default)]
    pub leave_checked_out: bool,

    /// Commit message template; `{source}` and `{target}` are substituted.
    #[serde(default)]
    pub commit_message: Option<String>,

    /// Push each successfully merged target to the remote.
    #[serde(default)]
    pub push_after_merge: bool,

    /// Delete the source branch once every task merged cleanly, locally
    /// and on the remote when a remote copy exists.
    #[serde(default)]
    pub delete_source_branch: bool,

    /// Fast-forward each target to its remote copy before merging into it.
    /// A target with no remote copy is published first when
    /// `push_after_merge` is set.
    #[serde(default)]
    pub sync_with_remote: bool,

    /// Publish the source branch to the remote before the first task.
    #[serde(default)]
    pub push_source_branch: bool,
}

impl BatchOptions {
    /// Render the commit message for one target.
    pub fn commit_message_for(&self, source: &str, target: &str) -> String {
        self.commit_message
            .as_deref()
            .unwrap_or(DEFAULT_COMMIT_MESSAGE)
            .replace("{source}", source)
            .replace("{target}", target)
    }
}

/// An ordered sequence of merge tasks sharing one source ref.
///
/// The task order is part of the contract: the first-listed target is
/// merged first and reported first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MergeBatch {
    pub source_ref: String,
    pub tasks: Vec<MergeTask>,
    #[serde(default)]
    pub options: BatchOptions,
}

impl MergeBatch {
    /// Build a batch merging `source_ref` into each of `targets` with the
    /// same strategy and policy.
    pub fn new<I, S>(
        source_ref: impl Into<String>,
        targets: I,
        strategy: MergeStrategy,
        conflict_policy: ConflictPolicy,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let source_ref = source_ref.into();
        let tasks = targets
            .into_iter()
            .map(|t| MergeTask::new(source_ref.clone(), t, strategy, conflict_policy))
            .collect();
        Self {
            source_ref,
            tasks,
            options: BatchOptions::default(),
        }
    }

    /// Replace the batch options.
    pub fn with_options(mut self, options: BatchOptions) -> Self {
        self.options = options;
        self
    }

    /// Check the structural invariants that need no repository access.
    pub fn validate_shape(&self) -> Result<(), OrchestratorError> {
        if self.tasks.is_empty() {
            return Err(OrchestratorError::Validation("batch has no tasks".into()));
        }
        if self.source_ref.trim().is_empty() {
            return Err(OrchestratorError::Validation(
                "source ref must not be empty".into(),
            ));
        }

        let mut seen = HashSet::new();
        for task in &self.tasks {
            if task.source_ref != self.source_ref {
                return Err(OrchestratorError::Validation(format!(
                    "task for '{}' uses source '{}' but the batch source is '{}'",
                    task.target_branch, task.source_ref, self.source_ref
                )));
            }
            if task.target_branch.trim().is_empty() {
                return Err(OrchestratorError::Validation(
                    "target branch must not be empty".into(),
                ));
            }
            if task.target_branch == task.source_ref {
                return Err(OrchestratorError::Validation(format!(
                    "'{}' cannot be merged into itself",
                    task.target_branch
                )));
            }
            if !seen.insert(task.target_branch.as_str()) {
                return Err(OrchestratorError::Validation(format!(
                    "target branch '{}' is listed more than once",
                    task.target_branch
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Per-branch result
// ---------------------------------------------------------------------------

/// Outcome of one task, ordered by severity (least severe first).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MergeStatus {
    Succeeded,
    /// Not merged because the target already contains the source.
    Skipped,
    ConflictsDetected,
    Failed,
    /// Never attempted because the batch stopped earlier.
    Aborted,
}

impl std::fmt::Display for MergeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Skipped => write!(f, "skipped"),
            Self::ConflictsDetected => write!(f, "conflicts_detected"),
            Self::Failed => write!(f, "failed"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// The recorded outcome of one task.
///
/// Fields are private so the presence rules hold: a conflict report
/// exists iff the status is `ConflictsDetected`, an error detail iff the
/// status is `Failed`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BranchMergeResult {
    target_branch: String,
    status: MergeStatus,
    conflict_report: Option<ConflictReport>,
    error_detail: Option<String>,
    commit: Option<String>,
    timestamp: DateTime<Utc>,
}

impl BranchMergeResult {
    fn with_status(target_branch: &str, status: MergeStatus) -> Self {
        Self {
            target_branch: target_branch.to_string(),
            status,
            conflict_report: None,
            error_detail: None,
            commit: None,
            timestamp: Utc::now(),
        }
    }

    pub fn succeeded(target_branch: &str, commit: Option<String>) -> Self {
        Self {
            commit,
            ..Self::with_status(target_branch, MergeStatus::Succeeded)
        }
    }

    pub fn skipped(target_branch: &str) -> Self {
        Self::with_status(target_branch, MergeStatus::Skipped)
    }

    pub fn conflicts(target_branch: &str, report: ConflictReport) -> Self {
        Self {
            conflict_report: Some(report),
            ..Self::with_status(target_branch, MergeStatus::ConflictsDetected)
        }
    }

    pub fn failed(target_branch: &str, detail: impl Into<String>) -> Self {
        Self {
            error_detail: Some(detail.into()),
            ..Self::with_status(target_branch, MergeStatus::Failed)
        }
    }

    pub fn aborted(target_branch: &str) -> Self {
        Self::with_status(target_branch, MergeStatus::Aborted)
    }

    pub fn target_branch(&self) -> &str {
        &self.target_branch
    }

    pub fn status(&self) -> MergeStatus {
        self.status
    }

    pub fn conflict_report(&self) -> Option<&ConflictReport> {
        self.conflict_report.as_ref()
    }

    pub fn error_detail(&self) -> Option<&str> {
        self.error_detail.as_deref()
    }

    /// Id of the commit the merge produced, when one was created.
    pub fn commit(&self) -> Option<&str> {
        self.commit.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

// ---------------------------------------------------------------------------
// Batch result
// ---------------------------------------------------------------------------

/// Opaque handle identifying a paused batch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ContinuationToken(Uuid);

impl ContinuationToken {
    pub fn new(batch_id: Uuid) -> Self {
        Self(batch_id)
    }

    pub fn batch_id(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl std::str::FromStr for ContinuationToken {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Lifecycle of a batch: `Running -> Paused -> Running -> Completed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Running,
    Paused,
    Completed,
}

impl std::fmt::Display for BatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// Where a paused batch is waiting for manual action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PauseInfo {
    pub token: ContinuationToken,
    pub branch: String,
}

/// Aggregated, ordered outcome of a batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchResult {
    pub batch_id: Uuid,
    pub source_ref: String,
    results: Vec<BranchMergeResult>,
    pub state: BatchState,
    /// Set when the batch was stopped by an explicit cancel request.
    pub cancelled: bool,
    pub paused: Option<PauseInfo>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl BatchResult {
    pub(crate) fn start(batch_id: Uuid, source_ref: &str) -> Self {
        Self {
            batch_id,
            source_ref: source_ref.to_string(),
            results: Vec::new(),
            state: BatchState::Running,
            cancelled: false,
            paused: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub(crate) fn push(&mut self, result: BranchMergeResult) {
        self.results.push(result);
    }

    /// Swap the last recorded result (the paused task) for its final one.
    pub(crate) fn replace_last(&mut self, result: BranchMergeResult) {
        if let Some(last) = self.results.last_mut() {
            *last = result;
        } else {
            self.results.push(result);
        }
    }

    pub(crate) fn pause(&mut self, token: ContinuationToken, branch: &str) {
        self.state = BatchState::Paused;
        self.paused = Some(PauseInfo {
            token,
            branch: branch.to_string(),
        });
    }

    pub(crate) fn unpause(&mut self) {
        self.state = BatchState::Running;
        self.paused = None;
    }

    pub(crate) fn finalize(&mut self) {
        self.state = BatchState::Completed;
        self.paused = None;
        self.finished_at = Some(Utc::now());
    }

    /// Per-branch results in task order.
    pub fn results(&self) -> &[BranchMergeResult] {
        &self.results
    }

    /// The worst individual status; `Succeeded` for an empty result.
    pub fn batch_status(&self) -> MergeStatus {
        self.results
            .iter()
            .map(BranchMergeResult::status)
            .max()
            .unwrap_or(MergeStatus::Succeeded)
    }

    pub fn is_paused(&self) -> bool {
        self.state == BatchState::Paused
    }

    /// Target branches that ended with the given status.
    pub fn branches_with(&self, status: MergeStatus) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| r.status() == status)
            .map(BranchMergeResult::target_branch)
            .collect()
    }
}
