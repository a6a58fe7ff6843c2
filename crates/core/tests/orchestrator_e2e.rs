//! End-to-end tests for the merge orchestrator against real repositories.
//!
//! Each test builds a repository with `git2` in a temporary directory:
//!
//! ```text
//! base ── main change (main)
//!    ├── feat1 change (feat1)   conflicts with main on shared.txt
//!    └── feat2 change (feat2)   touches other.txt only
//! ```
//!
//! No git binary and no network are needed.

use std::path::Path;
use std::sync::Arc;

use git2::build::CheckoutBuilder;
use git2::{Commit, Oid, Repository, RepositoryInitOptions, RepositoryState};
use tempfile::TempDir;

use multimerge_core::errors::OrchestratorError;
use multimerge_core::{
    BatchOptions, BatchResult, BatchStore, ConflictPolicy, GitGateway, MergeBatch,
    MergeOrchestrator, MergeStatus, MergeStrategy, RepositoryHandle,
};

// ===========================================================================
// Helpers
// ===========================================================================

fn init_repo(dir: &Path) -> Repository {
    let mut opts = RepositoryInitOptions::new();
    opts.initial_head("main");
    let repo = Repository::init_opts(dir, &opts).unwrap();
    let mut cfg = repo.config().unwrap();
    cfg.set_str("user.name", "Test User").unwrap();
    cfg.set_str("user.email", "test@example.com").unwrap();
    repo
}

fn commit_file(repo: &Repository, name: &str, content: &str, message: &str) -> Oid {
    let workdir = repo.workdir().unwrap();
    std::fs::write(workdir.join(name), content).unwrap();
    let mut index = repo.index().unwrap();
    index.add_path(Path::new(name)).unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let sig = repo.signature().unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&Commit<'_>> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .unwrap()
}

fn switch(repo: &Repository, branch: &str) {
    let refname = format!("refs/heads/{branch}");
    let object = repo.revparse_single(&refname).unwrap();
    repo.checkout_tree(&object, Some(CheckoutBuilder::new().force()))
        .unwrap();
    repo.set_head(&refname).unwrap();
}

fn create_branch(repo: &Repository, name: &str) {
    let head = repo.head().unwrap().peel_to_commit().unwrap();
    repo.branch(name, &head, false).unwrap();
}

/// The three-branch layout described in the module docs, with `main`
/// checked out.
fn diverged_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    let repo = init_repo(dir.path());
    commit_file(&repo, "shared.txt", "line\n", "base");
    create_branch(&repo, "feat1");
    create_branch(&repo, "feat2");

    switch(&repo, "feat1");
    commit_file(&repo, "shared.txt", "feat1 change\n", "feat1 change");
    switch(&repo, "feat2");
    commit_file(&repo, "other.txt", "feat2\n", "feat2 change");
    switch(&repo, "main");
    commit_file(&repo, "shared.txt", "main change\n", "main change");
    dir
}

fn orchestrator(dir: &Path) -> MergeOrchestrator<GitGateway> {
    MergeOrchestrator::new(RepositoryHandle::new(GitGateway::open(dir).unwrap()))
}

fn batch(targets: &[&str], strategy: MergeStrategy, policy: ConflictPolicy) -> MergeBatch {
    MergeBatch::new("main", targets.iter().copied(), strategy, policy)
}

fn statuses(result: &BatchResult) -> Vec<(String, MergeStatus)> {
    result
        .results()
        .iter()
        .map(|r| (r.target_branch().to_string(), r.status()))
        .collect()
}

fn expect(pairs: &[(&str, MergeStatus)]) -> Vec<(String, MergeStatus)> {
    pairs.iter().map(|(b, s)| (b.to_string(), *s)).collect()
}

fn tip(dir: &Path, branch: &str) -> Oid {
    let repo = Repository::open(dir).unwrap();
    let tip = repo
        .find_branch(branch, git2::BranchType::Local)
        .unwrap()
        .get()
        .target()
        .unwrap();
    tip
}

fn head_branch(dir: &Path) -> String {
    let repo = Repository::open(dir).unwrap();
    let head = repo.head().unwrap();
    head.shorthand().unwrap().to_string()
}

fn assert_clean(dir: &Path) {
    let repo = Repository::open(dir).unwrap();
    assert_eq!(repo.state(), RepositoryState::Clean);
    let mut opts = git2::StatusOptions::new();
    opts.include_untracked(false);
    assert!(repo.statuses(Some(&mut opts)).unwrap().is_empty());
}

fn parent_count(dir: &Path, oid: Oid) -> usize {
    let repo = Repository::open(dir).unwrap();
    let count = repo.find_commit(oid).unwrap().parent_count();
    count
}

// ===========================================================================
// Scenarios
// ===========================================================================

#[test]
fn abort_batch_stops_at_conflict_and_restores() {
    let dir = diverged_repo();
    let feat1_before = tip(dir.path(), "feat1");
    let feat2_before = tip(dir.path(), "feat2");
    let mut orch = orchestrator(dir.path());

    let result = orch
        .run(batch(
            &["feat1", "feat2"],
            MergeStrategy::Recursive,
            ConflictPolicy::AbortBatch,
        ))
        .unwrap();

    assert_eq!(
        statuses(&result),
        expect(&[
            ("feat1", MergeStatus::ConflictsDetected),
            ("feat2", MergeStatus::Aborted)
        ])
    );
    let report = result.results()[0].conflict_report().unwrap();
    assert_eq!(report.paths().collect::<Vec<_>>(), vec!["shared.txt"]);
    assert_eq!(report.hunk_count(), 1);

    assert_eq!(head_branch(dir.path()), "main");
    assert_eq!(tip(dir.path(), "feat1"), feat1_before);
    assert_eq!(tip(dir.path(), "feat2"), feat2_before);
    assert_clean(dir.path());
    let shared = std::fs::read_to_string(dir.path().join("shared.txt")).unwrap();
    assert_eq!(shared, "main change\n");
}

#[test]
fn skip_and_continue_merges_the_clean_branch() {
    let dir = diverged_repo();
    let feat1_before = tip(dir.path(), "feat1");
    let main_tip = tip(dir.path(), "main");
    let mut orch = orchestrator(dir.path());

    let result = orch
        .run(batch(
            &["feat1", "feat2"],
            MergeStrategy::Recursive,
            ConflictPolicy::SkipAndContinue,
        ))
        .unwrap();

    assert_eq!(
        statuses(&result),
        expect(&[
            ("feat1", MergeStatus::ConflictsDetected),
            ("feat2", MergeStatus::Succeeded)
        ])
    );
    assert_eq!(tip(dir.path(), "feat1"), feat1_before);

    let merged = tip(dir.path(), "feat2");
    assert_eq!(result.results()[1].commit(), Some(merged.to_string().as_str()));
    assert_eq!(parent_count(dir.path(), merged), 2);
    let repo = Repository::open(dir.path()).unwrap();
    assert!(repo.graph_descendant_of(merged, main_tip).unwrap());
    let message = repo.find_commit(merged).unwrap().summary().unwrap().to_string();
    assert_eq!(message, "Merge main into feat2");

    assert_eq!(head_branch(dir.path()), "main");
    assert_clean(dir.path());
}

#[test]
fn identical_batches_on_unmodified_repo_agree() {
    let dir = diverged_repo();
    let b = batch(
        &["feat1", "feat2"],
        MergeStrategy::Recursive,
        ConflictPolicy::AbortBatch,
    );
    let mut orch = orchestrator(dir.path());

    let first = orch.run(b.clone()).unwrap();
    let second = orch.run(b).unwrap();
    assert_eq!(statuses(&first), statuses(&second));
}

#[test]
fn already_merged_target_is_skipped() {
    let dir = diverged_repo();
    let mut orch = orchestrator(dir.path());
    let b = batch(
        &["feat2"],
        MergeStrategy::Recursive,
        ConflictPolicy::AbortBatch,
    );

    let first = orch.run(b.clone()).unwrap();
    assert_eq!(first.batch_status(), MergeStatus::Succeeded);
    let merged = tip(dir.path(), "feat2");

    let second = orch.run(b).unwrap();
    assert_eq!(statuses(&second), expect(&[("feat2", MergeStatus::Skipped)]));
    assert_eq!(tip(dir.path(), "feat2"), merged);
}

#[test]
fn fast_forward_and_ff_only() {
    let dir = diverged_repo();
    {
        let repo = Repository::open(dir.path()).unwrap();
        let base = repo.revparse_single("main~1").unwrap().peel_to_commit().unwrap();
        repo.branch("stale", &base, false).unwrap();
    }
    let main_tip = tip(dir.path(), "main");
    let feat2_before = tip(dir.path(), "feat2");
    let mut orch = orchestrator(dir.path());

    let result = orch
        .run(batch(
            &["stale", "feat2"],
            MergeStrategy::FastForwardOnly,
            ConflictPolicy::SkipAndContinue,
        ))
        .unwrap();

    assert_eq!(
        statuses(&result),
        expect(&[("stale", MergeStatus::Succeeded), ("feat2", MergeStatus::Failed)])
    );
    assert_eq!(tip(dir.path(), "stale"), main_tip);
    assert!(result.results()[1]
        .error_detail()
        .unwrap()
        .contains("cannot fast-forward"));
    assert_eq!(tip(dir.path(), "feat2"), feat2_before);
    assert_clean(dir.path());
}

#[test]
fn squash_creates_single_parent_commit() {
    let dir = diverged_repo();
    let feat2_before = tip(dir.path(), "feat2");
    let mut orch = orchestrator(dir.path());
    let b = batch(&["feat2"], MergeStrategy::Squash, ConflictPolicy::AbortBatch).with_options(
        BatchOptions {
            commit_message: Some("Squash {source} onto {target}".into()),
            ..Default::default()
        },
    );

    let result = orch.run(b).unwrap();
    assert_eq!(result.batch_status(), MergeStatus::Succeeded);

    let squashed = tip(dir.path(), "feat2");
    let repo = Repository::open(dir.path()).unwrap();
    let commit = repo.find_commit(squashed).unwrap();
    assert_eq!(commit.parent_count(), 1);
    assert_eq!(commit.parent_id(0).unwrap(), feat2_before);
    assert_eq!(commit.summary(), Some("Squash main onto feat2"));
    let blob = commit
        .tree()
        .unwrap()
        .get_path(Path::new("shared.txt"))
        .unwrap()
        .to_object(&repo)
        .unwrap()
        .peel_to_blob()
        .unwrap();
    assert_eq!(blob.content(), b"main change\n");
}

#[test]
fn dirty_working_tree_fails_tasks() {
    let dir = diverged_repo();
    std::fs::write(dir.path().join("shared.txt"), "uncommitted\n").unwrap();
    let mut orch = orchestrator(dir.path());

    let result = orch
        .run(batch(
            &["feat1", "feat2"],
            MergeStrategy::Recursive,
            ConflictPolicy::AbortBatch,
        ))
        .unwrap();

    assert_eq!(
        statuses(&result),
        expect(&[("feat1", MergeStatus::Failed), ("feat2", MergeStatus::Aborted)])
    );
    assert_eq!(result.results()[0].error_detail(), Some("dirty working tree"));
    let shared = std::fs::read_to_string(dir.path().join("shared.txt")).unwrap();
    assert_eq!(shared, "uncommitted\n");
    assert_eq!(head_branch(dir.path()), "main");
}

#[test]
fn unknown_target_rejects_whole_batch() {
    let dir = diverged_repo();
    let main_before = tip(dir.path(), "main");
    let mut orch = orchestrator(dir.path());

    let err = orch
        .run(batch(
            &["feat2", "no-such-branch"],
            MergeStrategy::Recursive,
            ConflictPolicy::SkipAndContinue,
        ))
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::Validation(_)));
    assert_eq!(tip(dir.path(), "main"), main_before);
    assert_eq!(head_branch(dir.path()), "main");
}

#[test]
fn results_follow_task_order() {
    let dir = diverged_repo();
    let mut orch = orchestrator(dir.path());
    let result = orch
        .run(batch(
            &["feat2", "feat1"],
            MergeStrategy::Recursive,
            ConflictPolicy::SkipAndContinue,
        ))
        .unwrap();
    assert_eq!(
        statuses(&result),
        expect(&[
            ("feat2", MergeStatus::Succeeded),
            ("feat1", MergeStatus::ConflictsDetected)
        ])
    );
}

#[test]
fn leave_checked_out_ends_on_last_merged_target() {
    let dir = diverged_repo();
    let mut orch = orchestrator(dir.path());
    let b = batch(
        &["feat2", "feat1"],
        MergeStrategy::Recursive,
        ConflictPolicy::SkipAndContinue,
    )
    .with_options(BatchOptions {
        leave_checked_out: true,
        ..Default::default()
    });

    orch.run(b).unwrap();
    assert_eq!(head_branch(dir.path()), "feat2");
    assert_clean(dir.path());
}

// ===========================================================================
// Pause / resume
// ===========================================================================

fn resolve_shared(dir: &Path, content: &str) {
    std::fs::write(dir.join("shared.txt"), content).unwrap();
    let repo = Repository::open(dir).unwrap();
    let mut index = repo.index().unwrap();
    index.add_path(Path::new("shared.txt")).unwrap();
    index.write().unwrap();
}

#[test]
fn pause_resolve_resume_round_trip() {
    let dir = diverged_repo();
    let main_tip = tip(dir.path(), "main");
    let mut orch = orchestrator(dir.path());

    let paused = orch
        .run(batch(
            &["feat1", "feat2"],
            MergeStrategy::Recursive,
            ConflictPolicy::PauseForManual,
        ))
        .unwrap();
    assert!(paused.is_paused());
    let info = paused.paused.clone().unwrap();
    assert_eq!(info.branch, "feat1");
    assert_eq!(head_branch(dir.path()), "feat1");
    let conflicted = std::fs::read_to_string(dir.path().join("shared.txt")).unwrap();
    assert!(conflicted.contains("<<<<<<<"));

    // Unresolved: resume refuses and the batch stays paused.
    assert!(matches!(
        orch.resume(&info.token),
        Err(OrchestratorError::InvalidState(_))
    ));

    // Staged, but the markers were left in.
    resolve_shared(dir.path(), &conflicted);
    assert!(matches!(
        orch.resume(&info.token),
        Err(OrchestratorError::InvalidState(_))
    ));

    resolve_shared(dir.path(), "resolved\n");
    let done = orch.resume(&info.token).unwrap();

    assert_eq!(
        statuses(&done),
        expect(&[
            ("feat1", MergeStatus::Succeeded),
            ("feat2", MergeStatus::Succeeded)
        ])
    );
    let resolved = tip(dir.path(), "feat1");
    assert_eq!(parent_count(dir.path(), resolved), 2);
    let repo = Repository::open(dir.path()).unwrap();
    assert!(repo.graph_descendant_of(resolved, main_tip).unwrap());
    assert_eq!(head_branch(dir.path()), "main");
    assert_clean(dir.path());
}

#[test]
fn abandon_discards_paused_merge() {
    let dir = diverged_repo();
    let feat1_before = tip(dir.path(), "feat1");
    let mut orch = orchestrator(dir.path());

    let paused = orch
        .run(batch(
            &["feat1", "feat2"],
            MergeStrategy::Recursive,
            ConflictPolicy::PauseForManual,
        ))
        .unwrap();
    let token = paused.paused.unwrap().token;

    let result = orch.abandon(&token).unwrap();
    assert!(result.cancelled);
    assert_eq!(
        statuses(&result),
        expect(&[
            ("feat1", MergeStatus::ConflictsDetected),
            ("feat2", MergeStatus::Aborted)
        ])
    );
    assert_eq!(tip(dir.path(), "feat1"), feat1_before);
    assert_eq!(head_branch(dir.path()), "main");
    assert_clean(dir.path());
    assert!(!orch.repository().is_busy());
}

#[test]
fn paused_batch_resumes_from_a_new_process() {
    let dir = diverged_repo();
    let state = TempDir::new().unwrap();

    let token = {
        let store = Arc::new(BatchStore::open_in_dir(state.path()).unwrap());
        let mut orch = orchestrator(dir.path()).with_store(store);
        let paused = orch
            .run(batch(
                &["feat1", "feat2"],
                MergeStrategy::Recursive,
                ConflictPolicy::PauseForManual,
            ))
            .unwrap();
        paused.paused.unwrap().token
    };

    let store = Arc::new(BatchStore::open_in_dir(state.path()).unwrap());
    let mut orch = orchestrator(dir.path()).with_store(store.clone());

    assert!(matches!(
        orch.run(batch(
            &["feat2"],
            MergeStrategy::Recursive,
            ConflictPolicy::AbortBatch
        )),
        Err(OrchestratorError::RepositoryBusy(_))
    ));

    resolve_shared(dir.path(), "resolved\n");
    let done = orch.resume(&token).unwrap();
    assert_eq!(done.batch_status(), MergeStatus::Succeeded);
    assert!(store.load_paused(&token).unwrap().is_none());

    let history = store.list_history(5).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].result.batch_id, token.batch_id());
}

/// Commit the staged resolution as a two-parent merge, the way
/// `git commit` would after a manual fix.
fn commit_resolution(dir: &Path) -> Oid {
    let repo = Repository::open(dir).unwrap();
    let mut index = repo.index().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let head = repo.head().unwrap().peel_to_commit().unwrap();
    let theirs = repo
        .revparse_single("MERGE_HEAD")
        .unwrap()
        .peel_to_commit()
        .unwrap();
    let sig = repo.signature().unwrap();
    let oid = repo
        .commit(Some("HEAD"), &sig, &sig, "manual resolution", &tree, &[&head, &theirs])
        .unwrap();
    repo.cleanup_state().unwrap();
    oid
}

const MARKER_FIXTURE: &str = "# Conflict markers\n\n<<<<<<< ours\nkept\n=======\nincoming\n>>>>>>> theirs\n";

/// `diverged_repo` plus a committed file on `main` whose content is a
/// complete conflict-marker block.
fn repo_with_marker_fixture() -> TempDir {
    let dir = diverged_repo();
    let repo = Repository::open(dir.path()).unwrap();
    commit_file(&repo, "CONFLICTS.md", MARKER_FIXTURE, "document conflict markers");
    dir
}

#[test]
fn committed_marker_block_does_not_block_resume() {
    let dir = repo_with_marker_fixture();
    let mut orch = orchestrator(dir.path());

    let paused = orch
        .run(batch(
            &["feat1", "feat2"],
            MergeStrategy::Recursive,
            ConflictPolicy::PauseForManual,
        ))
        .unwrap();
    let info = paused.paused.clone().unwrap();
    assert_eq!(info.branch, "feat1");
    let fixture = std::fs::read_to_string(dir.path().join("CONFLICTS.md")).unwrap();
    assert_eq!(fixture, MARKER_FIXTURE);

    resolve_shared(dir.path(), "resolved\n");
    let done = orch.resume(&info.token).unwrap();
    assert_eq!(
        statuses(&done),
        expect(&[
            ("feat1", MergeStatus::Succeeded),
            ("feat2", MergeStatus::Succeeded)
        ])
    );
    assert_eq!(parent_count(dir.path(), tip(dir.path(), "feat1")), 2);
    assert_clean(dir.path());
}

#[test]
fn committed_resolution_resumes_next_to_marker_fixture() {
    let dir = repo_with_marker_fixture();
    let mut orch = orchestrator(dir.path());

    let paused = orch
        .run(batch(
            &["feat1", "feat2"],
            MergeStrategy::Recursive,
            ConflictPolicy::PauseForManual,
        ))
        .unwrap();
    let token = paused.paused.unwrap().token;

    resolve_shared(dir.path(), "resolved\n");
    let resolution = commit_resolution(dir.path());

    let done = orch.resume(&token).unwrap();
    assert_eq!(done.batch_status(), MergeStatus::Succeeded);
    assert_eq!(
        done.results()[0].commit(),
        Some(resolution.to_string().as_str())
    );
    assert_eq!(tip(dir.path(), "feat1"), resolution);
    assert_eq!(head_branch(dir.path()), "main");
}

// ===========================================================================
// Remote
// ===========================================================================

/// A bare repository registered as `origin`, with `branches` pushed to it
/// and remote-tracking refs fetched.
fn attach_remote(dir: &Path, branches: &[&str]) -> TempDir {
    let bare_dir = TempDir::new().unwrap();
    Repository::init_bare(bare_dir.path()).unwrap();
    let repo = Repository::open(dir).unwrap();
    let mut remote = repo
        .remote("origin", bare_dir.path().to_str().unwrap())
        .unwrap();
    let refspecs: Vec<String> = branches
        .iter()
        .map(|b| format!("refs/heads/{b}:refs/heads/{b}"))
        .collect();
    remote.push(&refspecs, None).unwrap();
    remote
        .fetch(&["+refs/heads/*:refs/remotes/origin/*"], None, None)
        .unwrap();
    bare_dir
}

fn bare_tip(bare: &Path, branch: &str) -> Option<Oid> {
    let repo = Repository::open_bare(bare).unwrap();
    let tip = repo
        .find_reference(&format!("refs/heads/{branch}"))
        .ok()
        .and_then(|r| r.target());
    tip
}

/// Advance `branch` on the bare remote with a commit adding `name`.
fn commit_on_remote(bare: &Path, branch: &str, name: &str) -> Oid {
    let repo = Repository::open_bare(bare).unwrap();
    let refname = format!("refs/heads/{branch}");
    let parent = repo.find_reference(&refname).unwrap().peel_to_commit().unwrap();
    let blob = repo.blob(b"from the remote\n").unwrap();
    let mut builder = repo.treebuilder(Some(&parent.tree().unwrap())).unwrap();
    builder.insert(name, blob, 0o100644).unwrap();
    let tree = repo.find_tree(builder.write().unwrap()).unwrap();
    let sig = git2::Signature::now("Remote", "remote@example.com").unwrap();
    let oid = repo
        .commit(Some(&refname), &sig, &sig, "remote change", &tree, &[&parent])
        .unwrap();
    oid
}

#[test]
fn sync_pulls_remote_changes_and_publishes_new_targets() {
    let dir = diverged_repo();
    let bare = attach_remote(dir.path(), &["main", "feat2"]);
    let remote_change = commit_on_remote(bare.path(), "feat2", "remote.txt");

    let mut orch = orchestrator(dir.path());
    let b = MergeBatch::new(
        "main",
        ["feat2", "feat1"],
        MergeStrategy::Recursive,
        ConflictPolicy::SkipAndContinue,
    )
    .with_options(BatchOptions {
        sync_with_remote: true,
        push_after_merge: true,
        ..Default::default()
    });
    assert_eq!(bare_tip(bare.path(), "feat1"), None);

    let result = orch.run(b).unwrap();
    assert_eq!(
        statuses(&result),
        expect(&[
            ("feat2", MergeStatus::Succeeded),
            ("feat1", MergeStatus::ConflictsDetected)
        ])
    );

    let feat2 = tip(dir.path(), "feat2");
    let repo = Repository::open(dir.path()).unwrap();
    assert!(repo.graph_descendant_of(feat2, remote_change).unwrap());
    assert_eq!(bare_tip(bare.path(), "feat2"), Some(feat2));

    // feat1 had no remote branch; it was published before its merge
    // conflicted, so the remote holds the untouched tip.
    assert_eq!(bare_tip(bare.path(), "feat1"), Some(tip(dir.path(), "feat1")));
    let upstream = repo
        .find_branch("feat1", git2::BranchType::Local)
        .unwrap()
        .upstream()
        .unwrap();
    assert_eq!(upstream.name().unwrap(), Some("origin/feat1"));
    assert_eq!(head_branch(dir.path()), "main");
    assert_clean(dir.path());
}

#[test]
fn diverged_remote_target_fails_and_is_left_alone() {
    let dir = diverged_repo();
    let bare = attach_remote(dir.path(), &["feat2"]);
    commit_on_remote(bare.path(), "feat2", "remote.txt");
    {
        let repo = Repository::open(dir.path()).unwrap();
        switch(&repo, "feat2");
        commit_file(&repo, "local.txt", "local\n", "local change");
        switch(&repo, "main");
    }
    let feat2_before = tip(dir.path(), "feat2");

    let mut orch = orchestrator(dir.path());
    let b = batch(&["feat2"], MergeStrategy::Recursive, ConflictPolicy::AbortBatch)
        .with_options(BatchOptions {
            sync_with_remote: true,
            ..Default::default()
        });

    let result = orch.run(b).unwrap();
    assert_eq!(statuses(&result), expect(&[("feat2", MergeStatus::Failed)]));
    assert!(result.results()[0]
        .error_detail()
        .unwrap()
        .contains("origin/feat2"));
    assert_eq!(tip(dir.path(), "feat2"), feat2_before);
    assert_eq!(head_branch(dir.path()), "main");
    assert_clean(dir.path());
}

#[test]
fn source_is_published_then_deleted_from_the_remote() {
    let dir = diverged_repo();
    {
        let repo = Repository::open(dir.path()).unwrap();
        create_branch(&repo, "release");
        switch(&repo, "release");
        commit_file(&repo, "release.txt", "1.0\n", "release notes");
        switch(&repo, "main");
    }
    let bare = attach_remote(dir.path(), &["main"]);

    let mut orch = orchestrator(dir.path());
    let b = MergeBatch::new(
        "release",
        ["feat2"],
        MergeStrategy::Recursive,
        ConflictPolicy::AbortBatch,
    )
    .with_options(BatchOptions {
        push_source_branch: true,
        delete_source_branch: true,
        ..Default::default()
    });

    let release = tip(dir.path(), "release");
    let result = orch.run(b).unwrap();
    assert_eq!(statuses(&result), expect(&[("feat2", MergeStatus::Succeeded)]));

    let repo = Repository::open(dir.path()).unwrap();
    assert!(repo
        .graph_descendant_of(tip(dir.path(), "feat2"), release)
        .unwrap());
    assert!(repo.find_branch("release", git2::BranchType::Local).is_err());
    assert!(repo
        .find_branch("origin/release", git2::BranchType::Remote)
        .is_err());
    assert_eq!(bare_tip(bare.path(), "release"), None);
    assert!(bare_tip(bare.path(), "main").is_some());
}
