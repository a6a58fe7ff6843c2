//! In-memory gateway for orchestrator unit tests.
//!
//! Branches are a name -> tip map; merges follow a per-target script.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use super::{CommitId, HeadRef, MergeOutcome, PullOutcome, Snapshot, VcsGateway};
use crate::conflict::{ConflictEntry, ConflictHunk, ConflictReport};
use crate::errors::GatewayError;
use crate::models::MergeStrategy;
use crate::orchestrator::CancelHandle;

/// What merging into a given target does.
#[derive(Debug, Clone)]
pub(crate) enum Scripted {
    Clean,
    UpToDate,
    Conflict(Vec<&'static str>),
    /// Moves the target tip, then fails, so rollback is observable.
    Diverged,
}

#[derive(Debug)]
pub(crate) struct FakeGateway {
    pub branches: BTreeMap<String, CommitId>,
    pub head: HeadRef,
    pub dirty: bool,
    pub fail_restore: bool,
    pub push_fails: HashSet<String>,
    /// Branches whose local copy has diverged from the remote.
    pub pull_fails: HashSet<String>,
    pub calls: Vec<String>,
    /// Branches on the remote and their tips.
    pub remote: BTreeMap<String, CommitId>,
    scripts: HashMap<String, Scripted>,
    merging: Option<String>,
    /// Paths currently holding conflict markers left by a merge.
    markers_left: BTreeSet<String>,
    /// Paths whose committed content legitimately contains marker blocks.
    fixture_markers: BTreeSet<String>,
    cancel_after: Option<(String, CancelHandle)>,
    counter: u64,
}

impl FakeGateway {
    /// Repository with `main` checked out plus the given branches, all at
    /// distinct tips.
    pub fn new(branches: &[&str]) -> Self {
        let mut map = BTreeMap::new();
        map.insert("main".to_string(), CommitId::new("c-main"));
        for name in branches {
            map.insert(name.to_string(), CommitId::new(format!("c-{name}")));
        }
        Self {
            branches: map,
            head: HeadRef::Branch("main".into()),
            dirty: false,
            fail_restore: false,
            push_fails: HashSet::new(),
            pull_fails: HashSet::new(),
            calls: Vec::new(),
            remote: BTreeMap::new(),
            scripts: HashMap::new(),
            merging: None,
            markers_left: BTreeSet::new(),
            fixture_markers: BTreeSet::new(),
            cancel_after: None,
            counter: 0,
        }
    }

    pub fn script(mut self, target: &str, outcome: Scripted) -> Self {
        self.scripts.insert(target.to_string(), outcome);
        self
    }

    /// A file that contains marker blocks as ordinary content.
    pub fn with_marker_fixture(mut self, path: &str) -> Self {
        self.fixture_markers.insert(path.to_string());
        self
    }

    /// Request cancellation once the merge into `target` has run.
    pub fn cancel_after(&mut self, target: &str, cancel: CancelHandle) {
        self.cancel_after = Some((target.to_string(), cancel));
    }

    /// Copy local branches to the remote at their current tips.
    pub fn publish(&mut self, branches: &[&str]) {
        for name in branches {
            if let Some(tip) = self.branches.get(*name) {
                self.remote.insert(name.to_string(), tip.clone());
            }
        }
    }

    pub fn tip(&self, branch: &str) -> Option<&CommitId> {
        self.branches.get(branch)
    }

    pub fn head_branch(&self) -> Option<&str> {
        match &self.head {
            HeadRef::Branch(name) => Some(name),
            HeadRef::Detached(_) => None,
        }
    }

    pub fn is_merging(&self) -> bool {
        self.merging.is_some()
    }

    /// The user fixed the files and staged them but did not commit.
    pub fn resolve_manually(&mut self) {
        self.markers_left.clear();
    }

    /// The user fixed the files and committed the merge.
    pub fn commit_resolution(&mut self) {
        self.markers_left.clear();
        if let Some(target) = self.merging.take() {
            let id = self.next_commit();
            self.branches.insert(target, id);
        }
    }

    /// The user ran `git merge --abort` instead of resolving.
    pub fn abort_externally(&mut self) {
        self.markers_left.clear();
        self.merging = None;
    }

    fn next_commit(&mut self) -> CommitId {
        self.counter += 1;
        CommitId::new(format!("m{}", self.counter))
    }

    fn checked_out(&self) -> Result<String, GatewayError> {
        self.head_branch()
            .map(str::to_string)
            .ok_or_else(|| GatewayError::RefNotFound("HEAD".into()))
    }
}

impl VcsGateway for FakeGateway {
    fn repository_id(&self) -> String {
        "fake".into()
    }

    fn resolve_ref(&self, name: &str) -> Result<Option<CommitId>, GatewayError> {
        Ok(self.branches.get(name).cloned())
    }

    fn branch_exists(&self, name: &str) -> Result<bool, GatewayError> {
        Ok(self.branches.contains_key(name))
    }

    fn current_branch(&self) -> Result<Option<String>, GatewayError> {
        Ok(self.head_branch().map(str::to_string))
    }

    fn is_working_tree_clean(&self) -> Result<bool, GatewayError> {
        Ok(!self.dirty && self.merging.is_none())
    }

    fn checkout(&mut self, branch: &str) -> Result<(), GatewayError> {
        if self.dirty {
            return Err(GatewayError::DirtyWorkingTree);
        }
        if !self.branches.contains_key(branch) {
            return Err(GatewayError::RefNotFound(branch.to_string()));
        }
        self.calls.push(format!("checkout {branch}"));
        self.head = HeadRef::Branch(branch.to_string());
        Ok(())
    }

    fn merge(
        &mut self,
        source: &str,
        _strategy: MergeStrategy,
        _message: &str,
    ) -> Result<MergeOutcome, GatewayError> {
        let target = self.checked_out()?;
        self.calls.push(format!("merge {source} -> {target}"));
        if let Some((after, cancel)) = &self.cancel_after {
            if *after == target {
                cancel.cancel();
            }
        }
        match self.scripts.get(&target).cloned().unwrap_or(Scripted::Clean) {
            Scripted::Clean => {
                let id = self.next_commit();
                self.branches.insert(target, id.clone());
                Ok(MergeOutcome::Clean(id))
            }
            Scripted::UpToDate => Ok(MergeOutcome::UpToDate),
            Scripted::Conflict(paths) => {
                self.merging = Some(target);
                self.markers_left = paths.iter().map(|p| p.to_string()).collect();
                let entries = paths
                    .into_iter()
                    .map(|p| {
                        ConflictEntry::new(
                            p,
                            vec![ConflictHunk {
                                start_line: 1,
                                end_line: 5,
                            }],
                        )
                    })
                    .collect();
                Ok(MergeOutcome::Conflicts(ConflictReport::new(entries)))
            }
            Scripted::Diverged => {
                let id = self.next_commit();
                self.branches.insert(target.clone(), id);
                Err(GatewayError::NotFastForward {
                    source_ref: source.to_string(),
                    target,
                })
            }
        }
    }

    fn commit_snapshot(&mut self) -> Result<Snapshot, GatewayError> {
        Ok(Snapshot {
            head: self.head.clone(),
            branch_tips: self.branches.clone(),
        })
    }

    fn restore_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), GatewayError> {
        if self.fail_restore {
            return Err(GatewayError::IoError(std::io::Error::other("restore failed")));
        }
        self.calls.push("restore".into());
        self.merging = None;
        self.markers_left.clear();
        for (name, tip) in &snapshot.branch_tips {
            if let Some(current) = self.branches.get_mut(name) {
                *current = tip.clone();
            }
        }
        self.head = snapshot.head.clone();
        Ok(())
    }

    fn has_unresolved_conflict_markers(
        &self,
        _branch: &str,
        paths: &[String],
    ) -> Result<bool, GatewayError> {
        Ok(paths
            .iter()
            .any(|p| self.markers_left.contains(p) || self.fixture_markers.contains(p)))
    }

    fn conclude_merge(
        &mut self,
        _strategy: MergeStrategy,
        _message: &str,
    ) -> Result<Option<CommitId>, GatewayError> {
        if !self.markers_left.is_empty() {
            return Err(GatewayError::UnresolvedConflicts(self.markers_left.len()));
        }
        match self.merging.take() {
            Some(target) => {
                let id = self.next_commit();
                self.branches.insert(target, id.clone());
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    /// A remote tip differing from the local one is treated as ahead.
    fn pull(&mut self, branch: &str) -> Result<PullOutcome, GatewayError> {
        self.calls.push(format!("pull {branch}"));
        if self.pull_fails.contains(branch) {
            return Err(GatewayError::NotFastForward {
                source_ref: format!("origin/{branch}"),
                target: branch.to_string(),
            });
        }
        let Some(remote_tip) = self.remote.get(branch).cloned() else {
            return Ok(PullOutcome::NoRemoteBranch);
        };
        if self.branches.get(branch) == Some(&remote_tip) {
            return Ok(PullOutcome::UpToDate);
        }
        self.branches.insert(branch.to_string(), remote_tip.clone());
        Ok(PullOutcome::FastForwarded(remote_tip))
    }

    fn remote_branch_exists(&self, branch: &str) -> Result<bool, GatewayError> {
        Ok(self.remote.contains_key(branch))
    }

    fn push(&mut self, branch: &str) -> Result<(), GatewayError> {
        if self.push_fails.contains(branch) {
            return Err(GatewayError::PushRejected {
                branch: branch.to_string(),
                detail: "non-fast-forward".into(),
            });
        }
        let tip = self
            .branches
            .get(branch)
            .cloned()
            .ok_or_else(|| GatewayError::RefNotFound(branch.to_string()))?;
        self.remote.insert(branch.to_string(), tip);
        self.calls.push(format!("push {branch}"));
        Ok(())
    }

    fn delete_branch(&mut self, name: &str) -> Result<(), GatewayError> {
        self.branches
            .remove(name)
            .ok_or_else(|| GatewayError::RefNotFound(name.to_string()))?;
        self.calls.push(format!("delete {name}"));
        Ok(())
    }

    fn delete_remote_branch(&mut self, branch: &str) -> Result<(), GatewayError> {
        self.remote
            .remove(branch)
            .ok_or_else(|| GatewayError::RefNotFound(branch.to_string()))?;
        self.calls.push(format!("delete remote {branch}"));
        Ok(())
    }
}
