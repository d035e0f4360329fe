//! Cross-module integration tests driving the public `Repository` facade
//! end-to-end, as opposed to the per-module unit tests living alongside
//! each `src/*.rs` file.

use std::fs;

use scm_mini::commit::CommitOutcome;
use scm_mini::remote::SyncOutcome;
use scm_mini::repo::Repository;
use scm_mini::stage::StageAddOutcome;
use tempfile::TempDir;

#[test]
fn a_full_stage_commit_branch_merge_cycle_produces_a_merge_commit() {
    let dir = TempDir::new().unwrap();
    let mut repo = Repository::init(dir.path()).unwrap();

    fs::write(dir.path().join("README.md"), b"base\n").unwrap();
    assert_eq!(repo.add("README.md").unwrap(), StageAddOutcome::Staged);
    assert!(matches!(repo.commit("base").unwrap(), CommitOutcome::Created(_)));

    repo.create_branch("feature").unwrap().unwrap();

    fs::write(dir.path().join("README.md"), b"master change\n").unwrap();
    repo.add("README.md").unwrap();
    repo.commit("master change").unwrap();

    assert_eq!(repo.checkout_branch("feature").unwrap().message(), None);
    fs::write(dir.path().join("README.md"), b"feature change\n").unwrap();
    repo.add("README.md").unwrap();
    repo.commit("feature change").unwrap();

    assert_eq!(repo.checkout_branch("master").unwrap().message(), None);
    let outcome = repo.merge("feature").unwrap();
    let crate_merge_outcome = format!("{outcome:?}");
    assert!(crate_merge_outcome.contains("had_conflict: true"), "{crate_merge_outcome}");

    let conflicted = fs::read(dir.path().join("README.md")).unwrap();
    assert_eq!(conflicted, b"<<<<<<< HEAD\nmaster change\n=======\nfeature change\n>>>>>>>\n");

    let log = repo.log().unwrap();
    assert!(log[0].record.is_merge());
}

#[test]
fn push_then_fetch_round_trips_a_commit_between_two_repositories() {
    let origin_dir = TempDir::new().unwrap();
    let clone_dir = TempDir::new().unwrap();
    let mut origin = Repository::init(origin_dir.path()).unwrap();
    Repository::init(clone_dir.path()).unwrap();

    fs::write(origin_dir.path().join("a.txt"), b"hello\n").unwrap();
    origin.add("a.txt").unwrap();
    origin.commit("add a").unwrap();

    let mut clone = Repository::open(clone_dir.path()).unwrap();
    clone.add_remote("origin", origin_dir.path().to_owned()).unwrap();
    origin.add_remote("downstream", clone_dir.path().to_owned()).unwrap();

    let outcome = origin.push("downstream", "master").unwrap();
    assert_eq!(outcome, SyncOutcome::Pushed);
    assert!(clone_dir.path().join("a.txt").exists());

    let refetched = Repository::open(clone_dir.path()).unwrap();
    let log = refetched.log().unwrap();
    assert_eq!(log[0].record.message, "add a");
    assert_eq!(log[1].record.message, "initial commit");
}

#[test]
fn checking_out_a_missing_commit_leaves_the_working_tree_untouched() {
    let dir = TempDir::new().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    fs::write(dir.path().join("keep.txt"), b"unchanged\n").unwrap();

    let outcome = repo
        .checkout_file(Some("0000000000000000000000000000000000000000"), "keep.txt")
        .unwrap();
    assert_eq!(outcome.message(), Some("No commit with that id exists."));
    assert_eq!(fs::read(dir.path().join("keep.txt")).unwrap(), b"unchanged\n");
}
