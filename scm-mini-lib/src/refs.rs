//! The branch/head index (§4.2).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::RepoError;
use crate::hash::Oid;

/// User-facing failures for branch management operations (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefError {
    BranchExists,
    BranchMissing,
    CannotRemoveCurrent,
}

impl RefError {
    pub fn message(&self) -> &'static str {
        match self {
            RefError::BranchExists => "A branch with that name already exists.",
            RefError::BranchMissing => "A branch with that name does not exist.",
            RefError::CannotRemoveCurrent => "Cannot remove the current branch.",
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HeadMap(BTreeMap<String, Oid>);

/// The persisted branch/head map plus the current-branch pointer.
pub struct RefIndex {
    gitlet_dir: PathBuf,
    branches: BTreeMap<String, Oid>,
    current: String,
}

impl RefIndex {
    const DEFAULT_BRANCH: &'static str = "master";

    /// Create a fresh ref index for a newly initialized repository: a
    /// single `master` branch pointing at the initial commit (§4.4).
    pub fn init(gitlet_dir: &Path, initial_commit: Oid) -> Result<Self, RepoError> {
        let mut branches = BTreeMap::new();
        branches.insert(Self::DEFAULT_BRANCH.to_owned(), initial_commit);
        let index = RefIndex {
            gitlet_dir: gitlet_dir.to_owned(),
            branches,
            current: Self::DEFAULT_BRANCH.to_owned(),
        };
        index.save()?;
        Ok(index)
    }

    /// Load the ref index of an already-initialized repository.
    pub fn open(gitlet_dir: &Path) -> Result<Self, RepoError> {
        let head_map_path = gitlet_dir.join("headMap");
        let text =
            fs::read_to_string(&head_map_path).map_err(|e| RepoError::io(&head_map_path, e))?;
        let HeadMap(branches) = serde_json::from_str(&text)
            .map_err(|e| RepoError::MalformedMetadata("headMap".to_owned(), e))?;
        let current_branch_path = gitlet_dir.join("currentBranch");
        let current = fs::read_to_string(&current_branch_path)
            .map_err(|e| RepoError::io(&current_branch_path, e))?
            .trim()
            .to_owned();
        Ok(RefIndex { gitlet_dir: gitlet_dir.to_owned(), branches, current })
    }

    fn save(&self) -> Result<(), RepoError> {
        let head_map_path = self.gitlet_dir.join("headMap");
        let text = serde_json::to_string_pretty(&HeadMap(self.branches.clone()))
            .expect("map serialization cannot fail");
        fs::write(&head_map_path, text).map_err(|e| RepoError::io(&head_map_path, e))?;
        let current_branch_path = self.gitlet_dir.join("currentBranch");
        fs::write(&current_branch_path, &self.current)
            .map_err(|e| RepoError::io(&current_branch_path, e))
    }

    pub fn current_branch(&self) -> &str {
        &self.current
    }

    pub fn head_of(&self, branch: &str) -> Option<Oid> {
        self.branches.get(branch).copied()
    }

    /// The head commit of the current branch. Panics only if an invariant
    /// (§3.4, the current branch is always a key of `branches`) has already
    /// been violated by corrupted on-disk state.
    pub fn current_head(&self) -> Oid {
        self.branches[&self.current]
    }

    pub fn list_branches(&self) -> impl Iterator<Item = &String> {
        self.branches.keys()
    }

    pub fn set_head(&mut self, branch: &str, oid: Oid) -> Result<(), RepoError> {
        self.branches.insert(branch.to_owned(), oid);
        self.save()
    }

    pub fn set_current(&mut self, branch: &str) -> Result<(), RepoError> {
        self.current = branch.to_owned();
        self.save()
    }

    /// `branch <name>` (§4.2).
    pub fn create_branch(
        &mut self,
        name: &str,
        oid: Oid,
    ) -> Result<Result<(), RefError>, RepoError> {
        if self.branches.contains_key(name) {
            return Ok(Err(RefError::BranchExists));
        }
        self.branches.insert(name.to_owned(), oid);
        self.save()?;
        Ok(Ok(()))
    }

    /// `rm-branch <name>` (§4.2).
    pub fn delete_branch(&mut self, name: &str) -> Result<Result<(), RefError>, RepoError> {
        if name == self.current {
            return Ok(Err(RefError::CannotRemoveCurrent));
        }
        if self.branches.remove(name).is_none() {
            return Ok(Err(RefError::BranchMissing));
        }
        self.save()?;
        Ok(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn init_creates_master_as_current() {
        let dir = TempDir::new().unwrap();
        let oid = Oid::hash(b"initial");
        let refs = RefIndex::init(dir.path(), oid).unwrap();
        assert_eq!(refs.current_branch(), "master");
        assert_eq!(refs.head_of("master"), Some(oid));
    }

    #[test]
    fn create_branch_rejects_duplicate_names() {
        let dir = TempDir::new().unwrap();
        let oid = Oid::hash(b"initial");
        let mut refs = RefIndex::init(dir.path(), oid).unwrap();
        assert_eq!(refs.create_branch("master", oid).unwrap(), Err(RefError::BranchExists));
        assert_eq!(refs.create_branch("feature", oid).unwrap(), Ok(()));
    }

    #[test]
    fn cannot_delete_current_branch() {
        let dir = TempDir::new().unwrap();
        let oid = Oid::hash(b"initial");
        let mut refs = RefIndex::init(dir.path(), oid).unwrap();
        assert_eq!(refs.delete_branch("master").unwrap(), Err(RefError::CannotRemoveCurrent));
    }

    #[test]
    fn open_recovers_saved_state() {
        let dir = TempDir::new().unwrap();
        let oid = Oid::hash(b"initial");
        {
            let mut refs = RefIndex::init(dir.path(), oid).unwrap();
            refs.create_branch("feature", oid).unwrap().unwrap();
            refs.set_current("feature").unwrap();
        }
        let reopened = RefIndex::open(dir.path()).unwrap();
        assert_eq!(reopened.current_branch(), "feature");
        assert_eq!(reopened.head_of("feature"), Some(oid));
    }
}
