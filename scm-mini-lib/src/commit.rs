//! Commit records and the commit engine (§4.4).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::RepoError;
use crate::hash::Oid;
use crate::object::ObjectStore;
use crate::stage::StagingArea;

/// The canonical, content-addressed representation of a commit.
///
/// Field order here is also the field order of the canonical serialization
/// ([`CommitRecord::canonical_bytes`]); changing it changes every
/// fingerprint computed from a commit (§3 invariant 7).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub message: String,
    pub timestamp: i64,
    pub tree: BTreeMap<String, Oid>,
    pub parent: Option<Oid>,
    pub second_parent: Option<Oid>,
}

impl CommitRecord {
    /// The exact byte sequence persisted to `commits/<fingerprint>`, and the
    /// exact input hashed to produce that fingerprint (§4.1).
    pub fn canonical_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("CommitRecord serialization cannot fail")
    }

    pub fn fingerprint(&self) -> Oid {
        Oid::hash(&self.canonical_bytes())
    }

    pub fn is_merge(&self) -> bool {
        self.second_parent.is_some()
    }
}

/// Outcome of a `commit` attempt: the user-facing half of §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Created(Oid),
    NothingToCommit,
    EmptyMessage,
}

impl CommitOutcome {
    /// The exact string this outcome prints, per §4.4.
    pub fn message(&self) -> Option<&'static str> {
        match self {
            CommitOutcome::Created(_) => None,
            CommitOutcome::NothingToCommit => Some("No changes added to the commit."),
            CommitOutcome::EmptyMessage => Some("Please enter a commit message."),
        }
    }
}

/// Builds commits from the current head plus a staging area.
pub struct CommitEngine;

impl CommitEngine {
    fn build_tree(
        parent_tree: &BTreeMap<String, Oid>,
        store: &mut ObjectStore,
        stage: &StagingArea,
    ) -> Result<BTreeMap<String, Oid>, RepoError> {
        let mut tree = parent_tree.clone();
        for filename in stage.iter_removals() {
            tree.remove(filename);
        }
        for (filename, bytes) in stage.iter_additions() {
            let oid = store.put_blob(bytes)?;
            tree.insert(filename.clone(), oid);
        }
        Ok(tree)
    }

    /// Build the very first commit of a repository: empty tree, no
    /// parents, epoch timestamp, the fixed message `initial commit` (§4.4,
    /// §8 scenario 1).
    #[instrument(skip(store))]
    pub fn init(store: &mut ObjectStore) -> Result<Oid, RepoError> {
        let record = CommitRecord {
            message: "initial commit".to_owned(),
            timestamp: 0,
            tree: BTreeMap::new(),
            parent: None,
            second_parent: None,
        };
        store.put_commit(&record)
    }

    /// Commit the current staging area on top of `parent`, per §4.4.
    #[instrument(skip(store, stage))]
    pub fn commit(
        store: &mut ObjectStore,
        stage: &StagingArea,
        parent: Oid,
        message: &str,
        now: i64,
    ) -> Result<CommitOutcome, RepoError> {
        if stage.is_empty() {
            return Ok(CommitOutcome::NothingToCommit);
        }
        if message.is_empty() {
            return Ok(CommitOutcome::EmptyMessage);
        }
        let parent_record = store.get_commit(&parent.to_string())?;
        let tree = Self::build_tree(&parent_record.tree, store, stage)?;
        let record = CommitRecord {
            message: message.to_owned(),
            timestamp: now,
            tree,
            parent: Some(parent),
            second_parent: None,
        };
        let oid = store.put_commit(&record)?;
        Ok(CommitOutcome::Created(oid))
    }

    /// Build a merge commit with two parents (§4.4), assuming the caller
    /// (the merge engine) has already reconciled the working tree and
    /// staging area.
    #[instrument(skip(store, stage))]
    pub fn merge_commit(
        store: &mut ObjectStore,
        stage: &StagingArea,
        parent: Oid,
        second_parent: Oid,
        message: &str,
        now: i64,
    ) -> Result<Oid, RepoError> {
        let parent_record = store.get_commit(&parent.to_string())?;
        let tree = Self::build_tree(&parent_record.tree, store, stage)?;
        let record = CommitRecord {
            message: message.to_owned(),
            timestamp: now,
            tree,
            parent: Some(parent),
            second_parent: Some(second_parent),
        };
        store.put_commit(&record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn new_store() -> (TempDir, ObjectStore) {
        let dir = TempDir::new().unwrap();
        let store = ObjectStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn init_produces_empty_tree_with_no_parents() {
        let (_dir, mut store) = new_store();
        let oid = CommitEngine::init(&mut store).unwrap();
        let record = store.get_commit(&oid.to_string()).unwrap();
        assert_eq!(record.message, "initial commit");
        assert!(record.tree.is_empty());
        assert!(record.parent.is_none());
        assert!(record.second_parent.is_none());
    }

    #[test]
    fn commit_with_empty_stage_is_rejected() {
        let (_dir, mut store) = new_store();
        let head = CommitEngine::init(&mut store).unwrap();
        let stage = StagingArea::new();
        let outcome = CommitEngine::commit(&mut store, &stage, head, "message", 1).unwrap();
        assert_eq!(outcome, CommitOutcome::NothingToCommit);
    }

    #[test]
    fn commit_with_empty_message_is_rejected() {
        let (_dir, mut store) = new_store();
        let head = CommitEngine::init(&mut store).unwrap();
        let mut stage = StagingArea::new();
        stage.stage_bytes("a.txt".to_owned(), b"hi".to_vec());
        let outcome = CommitEngine::commit(&mut store, &stage, head, "", 1).unwrap();
        assert_eq!(outcome, CommitOutcome::EmptyMessage);
    }

    #[test]
    fn commit_advances_tree_from_staged_additions() {
        let (_dir, mut store) = new_store();
        let head = CommitEngine::init(&mut store).unwrap();
        let mut stage = StagingArea::new();
        stage.stage_bytes("a.txt".to_owned(), b"hello\n".to_vec());
        let outcome = CommitEngine::commit(&mut store, &stage, head, "a", 100).unwrap();
        let CommitOutcome::Created(oid) = outcome else {
            panic!("expected a new commit");
        };
        let record = store.get_commit(&oid.to_string()).unwrap();
        assert_eq!(record.tree.len(), 1);
        assert_eq!(record.parent, Some(head));
        assert_eq!(record.tree.get("a.txt"), Some(&Oid::hash(b"hello\n")));
    }
}
