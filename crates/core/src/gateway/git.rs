//! [`VcsGateway`] implementation over a local repository via `git2`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use git2::build::CheckoutBuilder;
use git2::{
    AnnotatedCommit, BranchType, Commit, Cred, ErrorCode, FetchOptions, FetchPrune, Index, Oid,
    PushOptions, RemoteCallbacks, Repository, RepositoryState, ResetType, Signature,
    StatusOptions,
};
use tracing::{debug, info, instrument, warn};

use super::{CommitId, HeadRef, MergeOutcome, PullOutcome, Snapshot, VcsGateway};
use crate::conflict::{contains_conflict_markers, scan_conflict_markers, ConflictEntry, ConflictReport};
use crate::errors::GatewayError;
use crate::models::MergeStrategy;

/// Identity used for merge commits when the repository has no
/// `user.name` / `user.email` configured.
const FALLBACK_NAME: &str = "git-multimerge";
const FALLBACK_EMAIL: &str = "git-multimerge@localhost";

/// Gateway wrapping a `git2::Repository` with a working tree.
pub struct GitGateway {
    repo: Repository,
    repo_path: PathBuf,
    remote: String,
    token: Option<String>,
}

impl std::fmt::Debug for GitGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitGateway")
            .field("repo_path", &self.repo_path)
            .field("remote", &self.remote)
            .finish_non_exhaustive()
    }
}

impl GitGateway {
    /// Open an existing non-bare Git repository at `repo_path`.
    pub fn open<P: AsRef<Path>>(repo_path: P) -> Result<Self, GatewayError> {
        let path = repo_path.as_ref();
        info!(path = %path.display(), "opening git repository");
        let repo = Repository::open(path)
            .map_err(|_| GatewayError::RepositoryNotFound(path.display().to_string()))?;
        if repo.is_bare() {
            return Err(GatewayError::RepositoryNotFound(format!(
                "{} (bare repositories have no working tree)",
                path.display()
            )));
        }
        Ok(Self {
            repo,
            repo_path: path.to_path_buf(),
            remote: "origin".to_string(),
            token: None,
        })
    }

    /// Set the remote used by [`VcsGateway::push`] and an optional access
    /// token for HTTPS remotes.
    pub fn with_remote(mut self, remote: impl Into<String>, token: Option<String>) -> Self {
        self.remote = remote.into();
        self.token = token;
        self
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    fn workdir(&self) -> Result<&Path, GatewayError> {
        self.repo
            .workdir()
            .ok_or_else(|| GatewayError::RepositoryNotFound(self.repo_path.display().to_string()))
    }

    fn signature(&self) -> Result<Signature<'static>, GatewayError> {
        match self.repo.signature() {
            Ok(sig) => Ok(sig),
            Err(_) => Ok(Signature::now(FALLBACK_NAME, FALLBACK_EMAIL)?),
        }
    }

    fn resolve_oid(&self, name: &str) -> Result<Oid, GatewayError> {
        self.resolve_ref(name)?
            .and_then(|id| Oid::from_str(id.as_str()).ok())
            .ok_or_else(|| GatewayError::RefNotFound(name.to_string()))
    }

    fn fast_forward(&self, source: &str, oid: Oid) -> Result<MergeOutcome, GatewayError> {
        let commit = self.repo.find_commit(oid)?;
        self.repo
            .checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().safe()))
            .map_err(map_checkout_error)?;
        let mut head = self.repo.head()?;
        head.set_target(oid, &format!("git-multimerge: fast-forward to {source}"))?;
        info!(source, commit = %oid, "fast-forwarded");
        Ok(MergeOutcome::Clean(oid.into()))
    }

    fn three_way(
        &self,
        annotated: &AnnotatedCommit<'_>,
        source_oid: Oid,
        strategy: MergeStrategy,
        message: &str,
    ) -> Result<MergeOutcome, GatewayError> {
        self.repo
            .merge(&[annotated], None, None)
            .map_err(map_checkout_error)?;

        let mut index = self.repo.index()?;
        if index.has_conflicts() {
            let report = self.conflict_report(&index)?;
            info!(paths = report.len(), "merge stopped with conflicts");
            return Ok(MergeOutcome::Conflicts(report));
        }

        index.write()?;
        let tree = self.repo.find_tree(index.write_tree()?)?;
        let head = self.repo.head()?.peel_to_commit()?;
        let source_commit = self.repo.find_commit(source_oid)?;
        let parents: Vec<&Commit<'_>> = match strategy {
            MergeStrategy::Squash => vec![&head],
            _ => vec![&head, &source_commit],
        };
        let sig = self.signature()?;
        let oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?;
        self.repo.cleanup_state()?;
        info!(commit = %oid, %strategy, "created merge commit");
        Ok(MergeOutcome::Clean(oid.into()))
    }

    fn conflict_report(&self, index: &Index) -> Result<ConflictReport, GatewayError> {
        let mut paths = BTreeSet::new();
        for conflict in index.conflicts()? {
            let conflict = conflict?;
            let entry = conflict
                .our
                .as_ref()
                .or(conflict.their.as_ref())
                .or(conflict.ancestor.as_ref());
            if let Some(entry) = entry {
                paths.insert(String::from_utf8_lossy(&entry.path).into_owned());
            }
        }

        let workdir = self.workdir()?;
        let entries = paths
            .into_iter()
            .map(|path| {
                let hunks = read_text(&workdir.join(&path))
                    .map(|content| scan_conflict_markers(&content))
                    .unwrap_or_default();
                ConflictEntry::new(path, hunks)
            })
            .collect();
        Ok(ConflictReport::new(entries))
    }

    /// Whether the committed version of any of `paths` on `branch` still
    /// carries a marker block.
    fn tip_has_markers(&self, branch: &str, paths: &[String]) -> Result<bool, GatewayError> {
        let tree = self
            .repo
            .find_branch(branch, BranchType::Local)?
            .get()
            .peel_to_tree()?;
        for path in paths {
            let entry = match tree.get_path(Path::new(path)) {
                Ok(entry) => entry,
                Err(e) if e.code() == ErrorCode::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            let Ok(blob) = self.repo.find_blob(entry.id()) else {
                continue;
            };
            if blob.is_binary() {
                continue;
            }
            if std::str::from_utf8(blob.content()).is_ok_and(contains_conflict_markers) {
                debug!(branch, path = %path, "committed conflict markers");
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Credentials for the configured remote.
    fn remote_callbacks(&self) -> RemoteCallbacks<'static> {
        let mut callbacks = RemoteCallbacks::new();
        if let Some(tok) = self.token.clone() {
            callbacks.credentials(move |_url, _username, _allowed| {
                Cred::userpass_plaintext("x-access-token", &tok)
            });
        }
        callbacks
    }

    /// Update every `refs/remotes/<remote>/*` ref, pruning deleted branches.
    fn fetch(&self) -> Result<(), GatewayError> {
        let mut remote = self.repo.find_remote(&self.remote)?;
        let mut opts = FetchOptions::new();
        opts.remote_callbacks(self.remote_callbacks());
        opts.prune(FetchPrune::On);
        let refspec = format!("+refs/heads/*:refs/remotes/{}/*", self.remote);
        remote.fetch(&[refspec.as_str()], Some(&mut opts), None)?;
        debug!(remote = %self.remote, "fetched");
        Ok(())
    }

    fn remote_tip(&self, branch: &str) -> Result<Option<Oid>, GatewayError> {
        let refname = format!("refs/remotes/{}/{}", self.remote, branch);
        match self.repo.find_reference(&refname) {
            Ok(reference) => Ok(reference.target()),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Push one refspec, turning a server-side rejection into an error.
    fn push_refspec(&self, refspec: &str, branch: &str) -> Result<(), GatewayError> {
        let mut remote = self.repo.find_remote(&self.remote)?;
        let mut callbacks = self.remote_callbacks();
        let push_error = Arc::new(Mutex::new(None::<String>));
        let push_error_clone = push_error.clone();
        callbacks.push_update_reference(move |refname, status| {
            if let Some(msg) = status {
                warn!(refname, msg, "push rejected");
                if let Ok(mut slot) = push_error_clone.lock() {
                    *slot = Some(msg.to_string());
                }
            }
            Ok(())
        });
        let mut push_opts = PushOptions::new();
        push_opts.remote_callbacks(callbacks);
        remote.push(&[refspec], Some(&mut push_opts))?;

        let rejected = push_error.lock().ok().and_then(|mut slot| slot.take());
        if let Some(detail) = rejected {
            return Err(GatewayError::PushRejected {
                branch: branch.to_string(),
                detail,
            });
        }
        Ok(())
    }

    /// Track `<remote>/<branch>` when the local branch has no upstream yet.
    fn ensure_upstream(&self, branch: &str) {
        let Ok(mut local) = self.repo.find_branch(branch, BranchType::Local) else {
            return;
        };
        if local.upstream().is_ok() {
            return;
        }
        let upstream = format!("{}/{}", self.remote, branch);
        match local.set_upstream(Some(&upstream)) {
            Ok(()) => debug!(branch, upstream = %upstream, "upstream set"),
            Err(e) => warn!(branch, error = %e, "could not set upstream"),
        }
    }

    fn reset_to_head(&self) -> Result<(), GatewayError> {
        match self.repo.head() {
            Ok(head) => {
                let commit = head.peel_to_commit()?;
                self.repo.reset(commit.as_object(), ResetType::Hard, None)?;
                Ok(())
            }
            Err(e) if e.code() == ErrorCode::UnbornBranch => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl VcsGateway for GitGateway {
    fn repository_id(&self) -> String {
        self.repo_path
            .canonicalize()
            .unwrap_or_else(|_| self.repo_path.clone())
            .display()
            .to_string()
    }

    fn resolve_ref(&self, name: &str) -> Result<Option<CommitId>, GatewayError> {
        match self.repo.revparse_single(name) {
            Ok(object) => Ok(object.peel_to_commit().ok().map(|c| c.id().into())),
            Err(e)
                if matches!(
                    e.code(),
                    ErrorCode::NotFound | ErrorCode::InvalidSpec | ErrorCode::Ambiguous
                ) =>
            {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn branch_exists(&self, name: &str) -> Result<bool, GatewayError> {
        match self.repo.find_branch(name, BranchType::Local) {
            Ok(_) => Ok(true),
            Err(e) if matches!(e.code(), ErrorCode::NotFound | ErrorCode::InvalidSpec) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn current_branch(&self) -> Result<Option<String>, GatewayError> {
        match self.repo.head() {
            Ok(head) if head.is_branch() => Ok(head.shorthand().map(str::to_string)),
            Ok(_) => Ok(None),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn is_working_tree_clean(&self) -> Result<bool, GatewayError> {
        if self.repo.state() != RepositoryState::Clean {
            return Ok(false);
        }
        let mut opts = StatusOptions::new();
        opts.include_untracked(false).include_ignored(false);
        Ok(self.repo.statuses(Some(&mut opts))?.is_empty())
    }

    #[instrument(skip(self))]
    fn checkout(&mut self, branch: &str) -> Result<(), GatewayError> {
        let refname = format!("refs/heads/{branch}");
        let object = self
            .repo
            .revparse_single(&refname)
            .map_err(|_| GatewayError::RefNotFound(branch.to_string()))?;
        self.repo
            .checkout_tree(&object, Some(CheckoutBuilder::new().safe()))
            .map_err(map_checkout_error)?;
        self.repo.set_head(&refname)?;
        debug!("checked out");
        Ok(())
    }

    #[instrument(skip(self, message))]
    fn merge(
        &mut self,
        source: &str,
        strategy: MergeStrategy,
        message: &str,
    ) -> Result<MergeOutcome, GatewayError> {
        let source_oid = self.resolve_oid(source)?;
        let annotated = self.repo.find_annotated_commit(source_oid)?;
        let (analysis, _) = self.repo.merge_analysis(&[&annotated])?;

        if analysis.is_up_to_date() {
            info!("target already contains source");
            return Ok(MergeOutcome::UpToDate);
        }

        match strategy {
            MergeStrategy::FastForwardOnly if analysis.is_fast_forward() => {
                self.fast_forward(source, source_oid)
            }
            MergeStrategy::FastForwardOnly => Err(GatewayError::NotFastForward {
                source_ref: source.to_string(),
                target: self.current_branch()?.unwrap_or_else(|| "HEAD".into()),
            }),
            MergeStrategy::Recursive if analysis.is_fast_forward() => {
                self.fast_forward(source, source_oid)
            }
            _ => self.three_way(&annotated, source_oid, strategy, message),
        }
    }

    fn commit_snapshot(&mut self) -> Result<Snapshot, GatewayError> {
        let head = self.repo.head()?;
        let head = if head.is_branch() {
            HeadRef::Branch(head.shorthand().unwrap_or_default().to_string())
        } else {
            let oid = head
                .target()
                .ok_or_else(|| GatewayError::RefNotFound("HEAD".into()))?;
            HeadRef::Detached(oid.into())
        };

        let mut branch_tips = BTreeMap::new();
        for branch in self.repo.branches(Some(BranchType::Local))? {
            let (branch, _) = branch?;
            if let (Some(name), Some(oid)) = (branch.name()?, branch.get().target()) {
                branch_tips.insert(name.to_string(), oid.into());
            }
        }
        debug!(branches = branch_tips.len(), "captured snapshot");
        Ok(Snapshot { head, branch_tips })
    }

    #[instrument(skip(self, snapshot))]
    fn restore_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), GatewayError> {
        self.repo.cleanup_state()?;
        self.reset_to_head()?;

        for (name, tip) in &snapshot.branch_tips {
            let oid = Oid::from_str(tip.as_str())?;
            match self.repo.find_branch(name, BranchType::Local) {
                Ok(mut branch) => {
                    if branch.get().target() != Some(oid) {
                        branch
                            .get_mut()
                            .set_target(oid, "git-multimerge: restore snapshot")?;
                        debug!(branch = %name, tip = %tip, "branch tip restored");
                    }
                }
                Err(e) if e.code() == ErrorCode::NotFound => {
                    warn!(branch = %name, "branch vanished since snapshot; not recreated");
                }
                Err(e) => return Err(e.into()),
            }
        }

        match &snapshot.head {
            HeadRef::Branch(name) => self.repo.set_head(&format!("refs/heads/{name}"))?,
            HeadRef::Detached(id) => self.repo.set_head_detached(Oid::from_str(id.as_str())?)?,
        }
        self.reset_to_head()?;
        info!("snapshot restored");
        Ok(())
    }

    fn has_unresolved_conflict_markers(
        &self,
        branch: &str,
        paths: &[String],
    ) -> Result<bool, GatewayError> {
        let mut index = self.repo.index()?;
        index.read(true)?;
        if index.has_conflicts() {
            return Ok(true);
        }

        let workdir = self.workdir()?;
        for path in paths {
            if read_text(&workdir.join(path)).is_some_and(|c| contains_conflict_markers(&c)) {
                debug!(path = %path, "uncommitted conflict markers");
                return Ok(true);
            }
        }

        self.tip_has_markers(branch, paths)
    }

    #[instrument(skip(self, message))]
    fn conclude_merge(
        &mut self,
        strategy: MergeStrategy,
        message: &str,
    ) -> Result<Option<CommitId>, GatewayError> {
        if self.repo.state() != RepositoryState::Merge {
            return Ok(None);
        }

        let mut index = self.repo.index()?;
        index.read(true)?;
        if index.has_conflicts() {
            let count = index.conflicts()?.count();
            return Err(GatewayError::UnresolvedConflicts(count));
        }

        let mut merge_heads = Vec::new();
        if strategy != MergeStrategy::Squash {
            self.repo.mergehead_foreach(|oid| {
                merge_heads.push(*oid);
                true
            })?;
        }

        let tree = self.repo.find_tree(index.write_tree()?)?;
        let mut parents = vec![self.repo.head()?.peel_to_commit()?];
        for oid in merge_heads {
            parents.push(self.repo.find_commit(oid)?);
        }
        let parent_refs: Vec<&Commit<'_>> = parents.iter().collect();
        let sig = self.signature()?;
        let oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)?;
        self.repo.cleanup_state()?;
        info!(commit = %oid, "concluded resolved merge");
        Ok(Some(oid.into()))
    }

    #[instrument(skip(self))]
    fn pull(&mut self, branch: &str) -> Result<PullOutcome, GatewayError> {
        self.fetch()?;
        let Some(remote_oid) = self.remote_tip(branch)? else {
            debug!("no remote branch");
            return Ok(PullOutcome::NoRemoteBranch);
        };
        let local_oid = self
            .repo
            .find_branch(branch, BranchType::Local)?
            .get()
            .target()
            .ok_or_else(|| GatewayError::RefNotFound(branch.to_string()))?;

        if local_oid == remote_oid || self.repo.graph_descendant_of(local_oid, remote_oid)? {
            return Ok(PullOutcome::UpToDate);
        }
        let upstream = format!("{}/{}", self.remote, branch);
        if !self.repo.graph_descendant_of(remote_oid, local_oid)? {
            return Err(GatewayError::NotFastForward {
                source_ref: upstream,
                target: branch.to_string(),
            });
        }

        if self.current_branch()?.as_deref() == Some(branch) {
            self.fast_forward(&upstream, remote_oid)?;
        } else {
            self.repo
                .find_reference(&format!("refs/heads/{branch}"))?
                .set_target(remote_oid, &format!("git-multimerge: fast-forward to {upstream}"))?;
        }
        info!(commit = %remote_oid, "pulled remote changes");
        Ok(PullOutcome::FastForwarded(remote_oid.into()))
    }

    fn remote_branch_exists(&self, branch: &str) -> Result<bool, GatewayError> {
        Ok(self.remote_tip(branch)?.is_some())
    }

    #[instrument(skip(self))]
    fn push(&mut self, branch: &str) -> Result<(), GatewayError> {
        info!(remote = %self.remote, "pushing");
        self.push_refspec(&format!("refs/heads/{branch}:refs/heads/{branch}"), branch)?;
        self.ensure_upstream(branch);
        info!("push completed");
        Ok(())
    }

    #[instrument(skip(self))]
    fn delete_branch(&mut self, name: &str) -> Result<(), GatewayError> {
        let mut branch = self.repo.find_branch(name, BranchType::Local)?;
        branch.delete()?;
        info!("deleted branch");
        Ok(())
    }

    #[instrument(skip(self))]
    fn delete_remote_branch(&mut self, branch: &str) -> Result<(), GatewayError> {
        self.push_refspec(&format!(":refs/heads/{branch}"), branch)?;
        let tracking = format!("refs/remotes/{}/{}", self.remote, branch);
        if let Ok(mut reference) = self.repo.find_reference(&tracking) {
            if let Err(e) = reference.delete() {
                warn!(error = %e, "could not remove remote-tracking ref");
            }
        }
        info!(remote = %self.remote, "deleted remote branch");
        Ok(())
    }
}

/// A checkout refused because of local modifications is a dirty tree, not
/// a generic git failure.
fn map_checkout_error(e: git2::Error) -> GatewayError {
    if e.code() == ErrorCode::Conflict {
        GatewayError::DirtyWorkingTree
    } else {
        GatewayError::Git2Error(e)
    }
}

fn read_text(path: &Path) -> Option<String> {
    std::fs::read(path)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
}
