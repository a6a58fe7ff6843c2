//! Merge orchestration.
//!
//! [`MergeOrchestrator`] drives a [`MergeBatch`] against one repository,
//! one target branch at a time. Each task runs between a snapshot and
//! either a finished merge or a restore, so the repository is never left
//! half-merged unless the batch is deliberately paused for manual conflict
//! resolution.
//!
//! A batch moves through `Running -> Paused -> Running -> Completed`. A
//! paused batch keeps the repository lock and is identified by a
//! [`ContinuationToken`]; with a [`BatchStore`] attached it also survives
//! the process that paused it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::conflict::ConflictReport;
use crate::errors::{GatewayError, OrchestratorError};
use crate::gateway::{CommitId, MergeOutcome, PullOutcome, Snapshot, VcsGateway};
use crate::models::{
    BatchOptions, BatchResult, BranchMergeResult, ConflictPolicy, ContinuationToken, MergeBatch,
    MergeStatus, MergeTask,
};
use crate::store::BatchStore;

// ---------------------------------------------------------------------------
// Repository handle and lock
// ---------------------------------------------------------------------------

/// The single exclusively-locked resource wrapping one repository gateway.
///
/// Clones share the gateway and the lock, so two orchestrators built from
/// the same handle exclude each other while separate handles (e.g. two
/// fakes under test) never interfere.
///
/// The flag only covers this process. Other processes are excluded by the
/// lease row an orchestrator with a [`BatchStore`] claims for each batch.
pub struct RepositoryHandle<G> {
    inner: Arc<HandleInner<G>>,
}

struct HandleInner<G> {
    gateway: Mutex<G>,
    busy: Arc<AtomicBool>,
}

impl<G> Clone for RepositoryHandle<G> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<G: VcsGateway> RepositoryHandle<G> {
    pub fn new(gateway: G) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                gateway: Mutex::new(gateway),
                busy: Arc::new(AtomicBool::new(false)),
            }),
        }
    }

    /// Access the gateway, recovering the lock if a previous holder panicked.
    pub fn gateway(&self) -> MutexGuard<'_, G> {
        self.inner.gateway.lock().unwrap_or_else(|poisoned| {
            warn!("gateway mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Whether a batch is running or paused on this handle.
    pub fn is_busy(&self) -> bool {
        self.inner.busy.load(Ordering::SeqCst)
    }

    fn try_lock(&self) -> Result<RepositoryLock, OrchestratorError> {
        if self
            .inner
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(OrchestratorError::RepositoryBusy(
                "another batch is running or paused on this repository".into(),
            ));
        }
        Ok(RepositoryLock {
            busy: self.inner.busy.clone(),
            lease: None,
        })
    }
}

/// Releases the repository when dropped.
struct RepositoryLock {
    busy: Arc<AtomicBool>,
    /// Claim in the batch store, excluding other processes.
    lease: Option<StoreLease>,
}

impl Drop for RepositoryLock {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

struct StoreLease {
    store: Arc<BatchStore>,
    repository: String,
    holder: String,
}

impl Drop for StoreLease {
    fn drop(&mut self) {
        if let Err(e) = self
            .store
            .release_repository_lock(&self.repository, &self.holder)
        {
            warn!(repository = %self.repository, error = %e, "failed to release repository lock");
        }
    }
}

/// Requests cancellation of a running batch.
///
/// Checked between tasks, never in the middle of a merge.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Run state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RunState {
    batch: MergeBatch,
    /// Index of the next task to attempt.
    next_task: usize,
    result: BatchResult,
    /// Branch checked out when the batch started.
    original_branch: String,
    /// Most recent target that ended `Succeeded`.
    last_merged: Option<String>,
}

impl RunState {
    fn abort_remaining(&mut self) {
        for task in &self.batch.tasks[self.next_task..] {
            self.result
                .push(BranchMergeResult::aborted(&task.target_branch));
        }
        self.next_task = self.batch.tasks.len();
    }
}

/// Everything needed to resume or abandon a paused batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PausedBatch {
    repository: String,
    branch: String,
    run: RunState,
    /// Taken before the paused task touched the repository.
    snapshot: Snapshot,
    /// Tip of the paused branch before the merge; a resume that finds it
    /// unchanged means the merge was aborted instead of resolved.
    target_tip: CommitId,
}

impl PausedBatch {
    pub fn token(&self) -> ContinuationToken {
        ContinuationToken::new(self.run.result.batch_id)
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// The branch waiting for manual conflict resolution.
    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn batch(&self) -> &MergeBatch {
        &self.run.batch
    }

    pub fn result(&self) -> &BatchResult {
        &self.run.result
    }

    /// Tasks that will run after the paused one.
    pub fn remaining_targets(&self) -> Vec<&str> {
        self.run.batch.tasks[self.run.next_task..]
            .iter()
            .map(|t| t.target_branch.as_str())
            .collect()
    }

    /// Paths the paused merge reported as conflicting.
    fn conflicted_paths(&self) -> Vec<String> {
        self.run
            .result
            .results()
            .last()
            .and_then(|r| r.conflict_report())
            .map(|report| report.paths().map(str::to_string).collect())
            .unwrap_or_default()
    }

    fn paused_task(&self) -> Option<&MergeTask> {
        self.run
            .next_task
            .checked_sub(1)
            .and_then(|idx| self.run.batch.tasks.get(idx))
    }
}

struct PausedRun {
    state: PausedBatch,
    lock: RepositoryLock,
}

enum Drive {
    Completed(BatchResult),
    Paused(PausedBatch),
}

enum Attempt {
    Done(BranchMergeResult),
    Conflicted {
        report: ConflictReport,
        snapshot: Snapshot,
        target_tip: CommitId,
    },
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct MergeOrchestrator<G: VcsGateway> {
    repo: RepositoryHandle<G>,
    store: Option<Arc<BatchStore>>,
    cancel: CancelHandle,
    paused: Option<PausedRun>,
}

impl<G: VcsGateway> MergeOrchestrator<G> {
    pub fn new(repo: RepositoryHandle<G>) -> Self {
        Self {
            repo,
            store: None,
            cancel: CancelHandle::default(),
            paused: None,
        }
    }

    /// Persist paused batches and history in `store`.
    pub fn with_store(mut self, store: Arc<BatchStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn repository(&self) -> &RepositoryHandle<G> {
        &self.repo
    }

    /// The batch this orchestrator currently holds paused, if any.
    pub fn paused_batch(&self) -> Option<&PausedBatch> {
        self.paused.as_ref().map(|p| &p.state)
    }

    /// Run a batch to completion or to its first pause.
    ///
    /// Validation problems and a busy repository are errors, raised before
    /// the repository is touched. Per-branch problems are recorded in the
    /// returned result.
    #[instrument(skip(self, batch), fields(source = %batch.source_ref, tasks = batch.tasks.len()))]
    pub fn run(&mut self, batch: MergeBatch) -> Result<BatchResult, OrchestratorError> {
        if let Some(paused) = &self.paused {
            return Err(OrchestratorError::RepositoryBusy(format!(
                "batch {} is paused on '{}'",
                paused.state.token(),
                paused.state.branch()
            )));
        }

        let mut lock = self.repo.try_lock()?;
        let repo = self.repo.clone();
        let mut gw = repo.gateway();
        let repository = gw.repository_id();
        self.ensure_not_paused_in_store(&repository)?;

        batch.validate_shape()?;
        validate_refs(&*gw, &batch)?;
        let original_branch = gw.current_branch()?.ok_or_else(|| {
            OrchestratorError::Validation(
                "HEAD is detached; check out a branch before running a batch".into(),
            )
        })?;
        self.claim(&mut lock, &repository)?;

        if batch.options.push_source_branch {
            publish_source(&mut *gw, &batch.source_ref)?;
        }

        let batch_id = Uuid::new_v4();
        info!(%batch_id, %original_branch, "starting merge batch");
        let run = RunState {
            result: BatchResult::start(batch_id, &batch.source_ref),
            batch,
            next_task: 0,
            original_branch,
            last_merged: None,
        };

        let outcome = drive(&mut *gw, &self.cancel, run, &repository)?;
        drop(gw);
        self.settle(outcome, lock, &repository)
    }

    /// Continue a paused batch after its conflict was resolved.
    ///
    /// A resolved but uncommitted merge is committed with the batch
    /// message. The paused task is then recorded `Succeeded` and the
    /// remaining tasks run.
    #[instrument(skip(self), fields(token = %token))]
    pub fn resume(&mut self, token: &ContinuationToken) -> Result<BatchResult, OrchestratorError> {
        let (mut paused, lock) = self.take_paused(token)?;
        let repo = self.repo.clone();
        let mut gw = repo.gateway();
        let branch = paused.branch.clone();

        let Some(task) = paused.paused_task().cloned() else {
            return Err(OrchestratorError::InvalidState(format!(
                "batch {token} has no paused task"
            )));
        };

        match gw.has_unresolved_conflict_markers(&branch, &paused.conflicted_paths()) {
            Ok(false) => {}
            Ok(true) => {
                self.keep_paused(paused, lock);
                return Err(OrchestratorError::InvalidState(format!(
                    "'{branch}' still has unresolved conflict markers"
                )));
            }
            Err(e) => {
                self.keep_paused(paused, lock);
                return Err(e.into());
            }
        }

        let options = paused.run.batch.options.clone();
        let message = options.commit_message_for(&task.source_ref, &branch);
        match gw.conclude_merge(task.strategy, &message) {
            Ok(Some(commit)) => info!(%commit, branch = %branch, "committed resolved merge"),
            Ok(None) => debug!("no merge in progress; expecting a committed resolution"),
            Err(GatewayError::UnresolvedConflicts(n)) => {
                self.keep_paused(paused, lock);
                return Err(OrchestratorError::InvalidState(format!(
                    "'{branch}' still has {n} unresolved conflict(s)"
                )));
            }
            Err(e) => {
                self.keep_paused(paused, lock);
                return Err(e.into());
            }
        }

        let tip = match gw.resolve_ref(&branch) {
            Ok(Some(tip)) if tip != paused.target_tip => tip,
            Ok(_) => {
                self.keep_paused(paused, lock);
                return Err(OrchestratorError::InvalidState(format!(
                    "'{branch}' has no resolution commit; was the merge aborted?"
                )));
            }
            Err(e) => {
                self.keep_paused(paused, lock);
                return Err(e.into());
            }
        };

        let resolved = if options.push_after_merge {
            match gw.push(&branch) {
                Ok(()) => BranchMergeResult::succeeded(&branch, Some(tip.to_string())),
                Err(e) => {
                    warn!(error = %e, "push of resolved merge failed");
                    BranchMergeResult::failed(&branch, e.to_string())
                }
            }
        } else {
            BranchMergeResult::succeeded(&branch, Some(tip.to_string()))
        };
        if resolved.status() == MergeStatus::Succeeded {
            paused.run.last_merged = Some(branch.clone());
        }
        paused.run.result.replace_last(resolved);
        paused.run.result.unpause();
        self.forget_stored(token);
        info!(branch = %branch, remaining = paused.remaining_targets().len(), "resuming batch");

        let repository = paused.repository.clone();
        let outcome = drive(&mut *gw, &self.cancel, paused.run, &repository)?;
        drop(gw);
        self.settle(outcome, lock, &repository)
    }

    /// Cancel a paused batch: discard the in-progress merge, mark the
    /// remaining tasks `Aborted` and return to the pre-run branch.
    #[instrument(skip(self), fields(token = %token))]
    pub fn abandon(&mut self, token: &ContinuationToken) -> Result<BatchResult, OrchestratorError> {
        let (mut paused, lock) = self.take_paused(token)?;
        let repo = self.repo.clone();
        let mut gw = repo.gateway();

        if let Err(e) = gw.restore_snapshot(&paused.snapshot) {
            self.keep_paused(paused, lock);
            return Err(e.into());
        }

        let run = &mut paused.run;
        run.result.unpause();
        run.result.cancelled = true;
        run.abort_remaining();
        finish(&mut *gw, run)?;
        run.result.finalize();
        drop(gw);

        self.forget_stored(token);
        let result = paused.run.result;
        info!(status = %result.batch_status(), "abandoned paused batch");
        self.record(&paused.repository, &result);
        drop(lock);
        Ok(result)
    }

    fn settle(
        &mut self,
        outcome: Drive,
        lock: RepositoryLock,
        repository: &str,
    ) -> Result<BatchResult, OrchestratorError> {
        match outcome {
            Drive::Completed(result) => {
                self.cancel.reset();
                info!(
                    batch_id = %result.batch_id,
                    status = %result.batch_status(),
                    cancelled = result.cancelled,
                    "merge batch completed"
                );
                self.record(repository, &result);
                drop(lock);
                Ok(result)
            }
            Drive::Paused(paused) => {
                let result = paused.result().clone();
                info!(
                    token = %paused.token(),
                    branch = paused.branch(),
                    "batch paused for manual conflict resolution"
                );
                let saved = match &self.store {
                    Some(store) => store.save_paused(&paused),
                    None => Ok(()),
                };
                self.keep_paused(paused, lock);
                saved?;
                Ok(result)
            }
        }
    }

    fn take_paused(
        &mut self,
        token: &ContinuationToken,
    ) -> Result<(PausedBatch, RepositoryLock), OrchestratorError> {
        match self.paused.take() {
            Some(run) if run.state.token() == *token => Ok((run.state, run.lock)),
            Some(run) => {
                let held = run.state.token();
                self.paused = Some(run);
                Err(OrchestratorError::InvalidState(format!(
                    "token {token} does not match the paused batch {held}"
                )))
            }
            None => {
                let not_paused =
                    || OrchestratorError::InvalidState(format!("no paused batch for token {token}"));
                let store = self.store.as_ref().ok_or_else(not_paused)?;
                let paused = store.load_paused(token)?.ok_or_else(not_paused)?;
                let repository = self.repo.gateway().repository_id();
                if paused.repository != repository {
                    return Err(OrchestratorError::InvalidState(format!(
                        "batch {token} belongs to '{}', not '{repository}'",
                        paused.repository
                    )));
                }
                let mut lock = self.repo.try_lock()?;
                self.claim(&mut lock, &repository)?;
                Ok((paused, lock))
            }
        }
    }

    /// Extend `lock` to other processes sharing the store.
    fn claim(&self, lock: &mut RepositoryLock, repository: &str) -> Result<(), OrchestratorError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let holder = Uuid::new_v4().to_string();
        if !store.acquire_repository_lock(repository, &holder)? {
            return Err(OrchestratorError::RepositoryBusy(format!(
                "another process is running a batch on '{repository}'"
            )));
        }
        lock.lease = Some(StoreLease {
            store: store.clone(),
            repository: repository.to_string(),
            holder,
        });
        Ok(())
    }

    fn keep_paused(&mut self, state: PausedBatch, lock: RepositoryLock) {
        self.paused = Some(PausedRun { state, lock });
    }

    fn ensure_not_paused_in_store(&self, repository: &str) -> Result<(), OrchestratorError> {
        if let Some(store) = &self.store {
            if let Some(paused) = store.paused_for_repository(repository)? {
                return Err(OrchestratorError::RepositoryBusy(format!(
                    "batch {} is paused on '{}'; resume or abandon it first",
                    paused.token(),
                    paused.branch()
                )));
            }
        }
        Ok(())
    }

    fn forget_stored(&self, token: &ContinuationToken) {
        if let Some(store) = &self.store {
            if let Err(e) = store.delete_paused(token) {
                warn!(error = %e, "failed to remove paused batch from store");
            }
        }
    }

    fn record(&self, repository: &str, result: &BatchResult) {
        if let Some(store) = &self.store {
            if let Err(e) = store.record_batch(repository, result) {
                warn!(error = %e, "failed to record batch history");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Batch loop
// ---------------------------------------------------------------------------

fn validate_refs<G: VcsGateway>(gw: &G, batch: &MergeBatch) -> Result<(), OrchestratorError> {
    if gw.resolve_ref(&batch.source_ref)?.is_none() {
        return Err(OrchestratorError::Validation(format!(
            "source ref '{}' does not resolve",
            batch.source_ref
        )));
    }
    let mut missing = Vec::new();
    for task in &batch.tasks {
        if !gw.branch_exists(&task.target_branch)? {
            missing.push(task.target_branch.as_str());
        }
    }
    if !missing.is_empty() {
        return Err(OrchestratorError::Validation(format!(
            "target branch(es) not found: {}",
            missing.join(", ")
        )));
    }
    Ok(())
}

fn drive<G: VcsGateway>(
    gw: &mut G,
    cancel: &CancelHandle,
    mut run: RunState,
    repository: &str,
) -> Result<Drive, OrchestratorError> {
    while let Some(task) = run.batch.tasks.get(run.next_task).cloned() {
        if cancel.is_cancelled() {
            info!(remaining = run.batch.tasks.len() - run.next_task, "batch cancelled");
            run.result.cancelled = true;
            run.abort_remaining();
            break;
        }
        run.next_task += 1;

        match attempt_task(gw, &task, &run.batch.options)? {
            Attempt::Done(result) => {
                let status = result.status();
                if status == MergeStatus::Succeeded {
                    run.last_merged = Some(task.target_branch.clone());
                }
                run.result.push(result);
                if status == MergeStatus::Failed && task.conflict_policy == ConflictPolicy::AbortBatch
                {
                    run.abort_remaining();
                    break;
                }
            }
            Attempt::Conflicted {
                report,
                snapshot,
                target_tip,
            } => {
                let target = task.target_branch.as_str();
                match task.conflict_policy {
                    ConflictPolicy::PauseForManual => {
                        run.result.push(BranchMergeResult::conflicts(target, report));
                        let token = ContinuationToken::new(run.result.batch_id);
                        run.result.pause(token, target);
                        return Ok(Drive::Paused(PausedBatch {
                            repository: repository.to_string(),
                            branch: target.to_string(),
                            run,
                            snapshot,
                            target_tip,
                        }));
                    }
                    ConflictPolicy::AbortBatch => {
                        gw.restore_snapshot(&snapshot)?;
                        run.result.push(BranchMergeResult::conflicts(target, report));
                        run.abort_remaining();
                        break;
                    }
                    ConflictPolicy::SkipAndContinue => {
                        gw.restore_snapshot(&snapshot)?;
                        run.result.push(BranchMergeResult::conflicts(target, report));
                    }
                }
            }
        }
    }

    finish(gw, &mut run)?;
    run.result.finalize();
    Ok(Drive::Completed(run.result))
}

#[instrument(skip(gw, task, options), fields(branch = %task.target_branch, strategy = %task.strategy))]
fn attempt_task<G: VcsGateway>(
    gw: &mut G,
    task: &MergeTask,
    options: &BatchOptions,
) -> Result<Attempt, OrchestratorError> {
    let target = task.target_branch.as_str();

    let snapshot = match gw.commit_snapshot() {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!(error = %e, "could not snapshot repository");
            return Ok(Attempt::Done(BranchMergeResult::failed(target, e.to_string())));
        }
    };

    match gw.is_working_tree_clean() {
        Ok(true) => {}
        Ok(false) => {
            warn!("working tree is dirty; not merging");
            return Ok(Attempt::Done(BranchMergeResult::failed(
                target,
                GatewayError::DirtyWorkingTree.to_string(),
            )));
        }
        Err(e) => return Ok(Attempt::Done(BranchMergeResult::failed(target, e.to_string()))),
    }

    match merge_into_target(gw, task, options) {
        Ok((MergeOutcome::UpToDate, _)) => {
            info!("already up to date");
            Ok(Attempt::Done(BranchMergeResult::skipped(target)))
        }
        Ok((MergeOutcome::Clean(commit), _)) => {
            info!(%commit, "merged");
            Ok(Attempt::Done(BranchMergeResult::succeeded(
                target,
                Some(commit.to_string()),
            )))
        }
        Ok((MergeOutcome::Conflicts(report), target_tip)) => {
            info!(paths = report.len(), "merge conflicts");
            Ok(Attempt::Conflicted {
                report,
                snapshot,
                target_tip,
            })
        }
        Err(e) => {
            warn!(error = %e, "merge failed; restoring snapshot");
            gw.restore_snapshot(&snapshot)?;
            Ok(Attempt::Done(BranchMergeResult::failed(target, e.to_string())))
        }
    }
}

fn publish_source<G: VcsGateway>(gw: &mut G, source: &str) -> Result<(), OrchestratorError> {
    if !gw.branch_exists(source)? {
        warn!(source, "source is not a local branch; not pushing it");
        return Ok(());
    }
    gw.push(source)?;
    info!(source, "published source branch");
    Ok(())
}

/// Check out the target, bring it up to date with the remote and merge,
/// pushing when asked. Returns the outcome with the target tip from before
/// the merge.
fn merge_into_target<G: VcsGateway>(
    gw: &mut G,
    task: &MergeTask,
    options: &BatchOptions,
) -> Result<(MergeOutcome, CommitId), GatewayError> {
    gw.checkout(&task.target_branch)?;
    if options.sync_with_remote {
        match gw.pull(&task.target_branch)? {
            PullOutcome::NoRemoteBranch if options.push_after_merge => {
                info!("target has no remote branch; publishing it");
                gw.push(&task.target_branch)?;
            }
            outcome => debug!(?outcome, "synced with remote"),
        }
    }
    let tip = gw
        .resolve_ref(&task.target_branch)?
        .ok_or_else(|| GatewayError::RefNotFound(task.target_branch.clone()))?;
    let message = options.commit_message_for(&task.source_ref, &task.target_branch);
    let outcome = gw.merge(&task.source_ref, task.strategy, &message)?;
    if matches!(outcome, MergeOutcome::Clean(_)) && options.push_after_merge {
        gw.push(&task.target_branch)?;
    }
    Ok((outcome, tip))
}

/// Post-batch steps: leave the right branch checked out and optionally
/// delete the source branch.
fn finish<G: VcsGateway>(gw: &mut G, run: &mut RunState) -> Result<(), OrchestratorError> {
    let options = &run.batch.options;
    let destination = match (&run.last_merged, options.leave_checked_out) {
        (Some(branch), true) => branch.clone(),
        _ => run.original_branch.clone(),
    };
    if gw.current_branch()?.as_deref() != Some(destination.as_str()) {
        gw.checkout(&destination)?;
    }
    debug!(branch = %destination, "checked out after batch");

    let all_merged = run
        .result
        .results()
        .iter()
        .all(|r| matches!(r.status(), MergeStatus::Succeeded | MergeStatus::Skipped));
    if options.delete_source_branch && all_merged && !run.result.cancelled {
        delete_source(gw, &run.batch.source_ref);
    }
    Ok(())
}

fn delete_source<G: VcsGateway>(gw: &mut G, source: &str) {
    match gw.branch_exists(source) {
        Ok(true) => {}
        Ok(false) => {
            debug!(source, "source is not a local branch; nothing to delete");
            return;
        }
        Err(e) => {
            warn!(source, error = %e, "could not look up source branch");
            return;
        }
    }
    if let Ok(Some(current)) = gw.current_branch() {
        if current == source {
            warn!(source, "source branch is checked out; not deleting it");
            return;
        }
    }
    if let Err(e) = gw.delete_branch(source) {
        warn!(source, error = %e, "failed to delete source branch");
        return;
    }
    info!(source, "deleted source branch");

    match gw.remote_branch_exists(source) {
        Ok(true) => {
            if let Err(e) = gw.delete_remote_branch(source) {
                warn!(source, error = %e, "failed to delete remote source branch");
            }
        }
        Ok(false) => {}
        Err(e) => warn!(source, error = %e, "could not look up remote source branch"),
    }
}
