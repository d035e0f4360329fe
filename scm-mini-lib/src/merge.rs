//! The three-way merge engine (§4.6, §4.7).

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use tracing::instrument;

use crate::commit::{CommitEngine, CommitRecord};
use crate::dag::{find_split_point, SplitPointResult};
use crate::error::RepoError;
use crate::hash::Oid;
use crate::object::ObjectStore;
use crate::refs::RefIndex;
use crate::stage::StagingArea;
use crate::workdir::{self, materialize_tree, untracked_files};

/// Outcome of a `merge` attempt: the user-facing half of §4.6/§4.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Merged { commit: Oid, had_conflict: bool },
    NoOp,
    AncestorOfCurrent,
    FastForwarded,
    UncommittedChanges,
    UntrackedFileInWay,
    NoSuchBranch,
    CannotMergeSelf,
}

impl MergeOutcome {
    pub fn message(&self) -> Option<&'static str> {
        match self {
            MergeOutcome::Merged { had_conflict: true, .. } => Some("Encountered a merge conflict."),
            MergeOutcome::Merged { had_conflict: false, .. } | MergeOutcome::NoOp => None,
            MergeOutcome::AncestorOfCurrent => Some("Given branch is an ancestor of the current branch."),
            MergeOutcome::FastForwarded => Some("Current branch fast-forwarded."),
            MergeOutcome::UncommittedChanges => Some("You have uncommitted changes."),
            MergeOutcome::UntrackedFileInWay => {
                Some("There is an untracked file in the way; delete it, or add and commit it first.")
            }
            MergeOutcome::NoSuchBranch => Some("A branch with that name does not exist."),
            MergeOutcome::CannotMergeSelf => Some("Cannot merge a branch with itself."),
        }
    }
}

/// The byte-exact conflict marker format of §4.7.
fn conflict_marker(current_bytes: Option<&[u8]>, other_bytes: Option<&[u8]>) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"<<<<<<< HEAD\n");
    out.extend_from_slice(current_bytes.unwrap_or(&[]));
    out.extend_from_slice(b"=======\n");
    out.extend_from_slice(other_bytes.unwrap_or(&[]));
    out.extend_from_slice(b">>>>>>>\n");
    out
}

/// Apply the three-way classification table of §4.7 to every filename
/// mentioned by the split point, current head, or other head. Returns
/// whether a conflict was encountered.
fn apply_three_way(
    store: &mut ObjectStore,
    stage: &mut StagingArea,
    working_dir: &Path,
    split: &CommitRecord,
    current: &CommitRecord,
    other: &CommitRecord,
) -> Result<bool, RepoError> {
    let mut filenames: BTreeSet<&String> = BTreeSet::new();
    filenames.extend(split.tree.keys());
    filenames.extend(current.tree.keys());
    filenames.extend(other.tree.keys());

    let mut had_conflict = false;
    for filename in filenames {
        let in_split = split.tree.get(filename).copied();
        let in_current = current.tree.get(filename).copied();
        let in_other = other.tree.get(filename).copied();

        let current_changed = in_current != in_split;
        let other_changed = in_other != in_split;

        match (current_changed, other_changed) {
            (false, false) => {}
            (true, false) => {
                // Only the current side touched this file: keep it as-is.
            }
            (false, true) => match in_other {
                Some(oid) => {
                    let bytes = store.get_blob(&oid)?;
                    let path = working_dir.join(filename);
                    fs::write(&path, &bytes).map_err(|e| RepoError::io(&path, e))?;
                    stage.stage_bytes(filename.clone(), bytes);
                }
                None => {
                    let path = working_dir.join(filename);
                    let _ = fs::remove_file(&path);
                    stage.mark_removed(filename.clone());
                }
            },
            (true, true) => {
                if in_current == in_other {
                    // Both sides made the identical change.
                    continue;
                }
                had_conflict = true;
                let current_bytes = in_current.map(|oid| store.get_blob(&oid)).transpose()?;
                let other_bytes = in_other.map(|oid| store.get_blob(&oid)).transpose()?;
                let merged = conflict_marker(current_bytes.as_deref(), other_bytes.as_deref());
                let path = working_dir.join(filename);
                fs::write(&path, &merged).map_err(|e| RepoError::io(&path, e))?;
                stage.stage_bytes(filename.clone(), merged);
            }
        }
    }
    Ok(had_conflict)
}

/// Merge `other_branch` into the current branch, per §4.6/§4.7.
#[instrument(skip(store, stage, refs))]
pub fn merge(
    store: &mut ObjectStore,
    stage: &mut StagingArea,
    refs: &mut RefIndex,
    working_dir: &Path,
    other_branch: &str,
    now: i64,
) -> Result<MergeOutcome, RepoError> {
    let current_branch = refs.current_branch().to_owned();
    if !stage.is_empty() {
        return Ok(MergeOutcome::UncommittedChanges);
    }
    let current_head = refs.current_head();
    let current_record = store.get_commit(&current_head.to_string())?;
    let untracked = untracked_files(working_dir, &current_record.tree, stage)?;
    if !untracked.is_empty() {
        return Ok(MergeOutcome::UntrackedFileInWay);
    }
    let Some(other_head) = refs.head_of(other_branch) else {
        return Ok(MergeOutcome::NoSuchBranch);
    };
    if other_branch == current_branch {
        return Ok(MergeOutcome::CannotMergeSelf);
    }

    match find_split_point(store, current_head, other_head)? {
        SplitPointResult::NoOp => Ok(MergeOutcome::NoOp),
        SplitPointResult::AncestorOfCurrent => Ok(MergeOutcome::AncestorOfCurrent),
        SplitPointResult::FastForward => {
            let other_record = store.get_commit(&other_head.to_string())?;
            workdir::clear_working_tree(working_dir)?;
            materialize_tree(store, working_dir, &other_record.tree)?;
            refs.set_head(&current_branch, other_head)?;
            stage.clear();
            Ok(MergeOutcome::FastForwarded)
        }
        SplitPointResult::Found(split_oid) => {
            let split_record = store.get_commit(&split_oid.to_string())?;
            let other_record = store.get_commit(&other_head.to_string())?;
            let had_conflict = apply_three_way(
                store,
                stage,
                working_dir,
                &split_record,
                &current_record,
                &other_record,
            )?;
            let message = format!("Merged {other_branch} into {current_branch}.");
            let commit = CommitEngine::merge_commit(store, stage, current_head, other_head, &message, now)?;
            refs.set_head(&current_branch, commit)?;
            stage.clear();
            Ok(MergeOutcome::Merged { commit, had_conflict })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn commit_file(
        store: &mut ObjectStore,
        refs: &mut RefIndex,
        working_dir: &Path,
        filename: &str,
        contents: &[u8],
        message: &str,
        now: i64,
    ) -> Oid {
        fs::write(working_dir.join(filename), contents).unwrap();
        let head = refs.current_head();
        let head_tree = store.get_commit(&head.to_string()).unwrap().tree;
        let mut stage = StagingArea::new();
        stage.add(filename, Some(contents), &head_tree);
        let outcome = CommitEngine::commit(store, &stage, head, message, now).unwrap();
        let crate::commit::CommitOutcome::Created(oid) = outcome else {
            panic!("expected a commit");
        };
        let branch = refs.current_branch().to_owned();
        refs.set_head(&branch, oid).unwrap();
        oid
    }

    #[test]
    fn conflicting_edits_produce_conflict_markers_and_a_merge_commit() {
        let dir = TempDir::new().unwrap();
        let mut store = ObjectStore::open(dir.path()).unwrap();
        let initial = CommitEngine::init(&mut store).unwrap();
        let mut refs = RefIndex::init(dir.path(), initial).unwrap();

        refs.create_branch("other", initial).unwrap().unwrap();
        commit_file(&mut store, &mut refs, dir.path(), "x.txt", b"m", "on master", 10);

        refs.set_current("other").unwrap();
        refs.set_head("other", initial).unwrap();
        commit_file(&mut store, &mut refs, dir.path(), "x.txt", b"o", "on other", 20);

        refs.set_current("master").unwrap();
        let master_head = refs.head_of("master").unwrap();
        refs.set_head("master", master_head).unwrap();
        // Re-materialize master's tracked content before merging, since the
        // working directory currently holds `other`'s edit.
        let master_record = store.get_commit(&master_head.to_string()).unwrap();
        materialize_tree(&store, dir.path(), &master_record.tree).unwrap();

        let mut stage = StagingArea::new();
        let outcome = merge(&mut store, &mut stage, &mut refs, dir.path(), "other", 30).unwrap();
        let MergeOutcome::Merged { commit, had_conflict } = outcome else {
            panic!("expected a merge commit, got {outcome:?}");
        };
        assert!(had_conflict);
        let bytes = fs::read(dir.path().join("x.txt")).unwrap();
        assert_eq!(bytes, b"<<<<<<< HEAD\nm=======\no>>>>>>>\n");
        let record = store.get_commit(&commit.to_string()).unwrap();
        assert!(record.is_merge());
    }

    #[test]
    fn merging_a_branch_into_itself_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut store = ObjectStore::open(dir.path()).unwrap();
        let initial = CommitEngine::init(&mut store).unwrap();
        let mut refs = RefIndex::init(dir.path(), initial).unwrap();
        let mut stage = StagingArea::new();
        let outcome = merge(&mut store, &mut stage, &mut refs, dir.path(), "master", 1).unwrap();
        assert_eq!(outcome, MergeOutcome::CannotMergeSelf);
    }

    #[test]
    fn fast_forward_removes_files_deleted_along_the_fast_forwarded_path() {
        let dir = TempDir::new().unwrap();
        let mut store = ObjectStore::open(dir.path()).unwrap();
        let initial = CommitEngine::init(&mut store).unwrap();
        let mut refs = RefIndex::init(dir.path(), initial).unwrap();

        let kept = commit_file(&mut store, &mut refs, dir.path(), "a.txt", b"keep", "add a", 10);
        refs.create_branch("other", kept).unwrap().unwrap();
        refs.set_current("other").unwrap();
        refs.set_head("other", kept).unwrap();

        // Remove a.txt on `other`, advancing it past master's head.
        let head_tree = store.get_commit(&kept.to_string()).unwrap().tree;
        let mut stage = StagingArea::new();
        stage.remove("a.txt", &head_tree);
        let outcome = CommitEngine::commit(&mut store, &stage, kept, "remove a", 20).unwrap();
        let crate::commit::CommitOutcome::Created(after_removal) = outcome else {
            panic!("expected a commit");
        };
        refs.set_head("other", after_removal).unwrap();

        refs.set_current("master").unwrap();
        // The working directory still has the stale master-side copy on disk.
        fs::write(dir.path().join("a.txt"), b"keep").unwrap();

        let mut stage = StagingArea::new();
        let result = merge(&mut store, &mut stage, &mut refs, dir.path(), "other", 30).unwrap();
        assert_eq!(result, MergeOutcome::FastForwarded);
        assert!(!dir.path().join("a.txt").exists());
    }

    #[test]
    fn merging_an_ancestor_branch_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut store = ObjectStore::open(dir.path()).unwrap();
        let initial = CommitEngine::init(&mut store).unwrap();
        let mut refs = RefIndex::init(dir.path(), initial).unwrap();
        refs.create_branch("other", initial).unwrap().unwrap();
        commit_file(&mut store, &mut refs, dir.path(), "x.txt", b"m", "on master", 10);

        let mut stage = StagingArea::new();
        let outcome = merge(&mut store, &mut stage, &mut refs, dir.path(), "other", 20).unwrap();
        assert_eq!(outcome, MergeOutcome::AncestorOfCurrent);
    }
}
