//! The staging area (§4.3).

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use crate::error::RepoError;
use crate::hash::Oid;

const REMOVAL_MARKER_PREFIX: &str = "[[del[[";

/// Outcome of `stage_add` (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageAddOutcome {
    Staged,
    /// The working-tree content already matched the current commit; any
    /// pending addition or removal for this filename was cleared instead.
    Unstaged,
    FileMissing,
}

impl StageAddOutcome {
    pub fn message(&self) -> Option<&'static str> {
        match self {
            StageAddOutcome::Staged | StageAddOutcome::Unstaged => None,
            StageAddOutcome::FileMissing => Some("File does not exist."),
        }
    }
}

/// Outcome of `stage_remove` (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageRemoveOutcome {
    RemovedFromAdditions,
    MarkedForRemoval,
    NothingToRemove,
}

impl StageRemoveOutcome {
    pub fn message(&self) -> Option<&'static str> {
        match self {
            StageRemoveOutcome::RemovedFromAdditions | StageRemoveOutcome::MarkedForRemoval => None,
            StageRemoveOutcome::NothingToRemove => Some("No reason to remove the file."),
        }
    }
}

/// Pending additions and removals waiting to be folded into the next
/// commit. Additions and removals are kept disjoint by construction (§3
/// invariant 5): every mutator that inserts into one first removes the
/// filename from the other.
#[derive(Debug, Default)]
pub struct StagingArea {
    additions: BTreeMap<String, Vec<u8>>,
    removals: BTreeSet<String>,
}

impl StagingArea {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }

    pub fn clear(&mut self) {
        self.additions.clear();
        self.removals.clear();
    }

    pub fn iter_additions(&self) -> impl Iterator<Item = (&String, &Vec<u8>)> {
        self.additions.iter()
    }

    pub fn iter_removals(&self) -> impl Iterator<Item = &String> {
        self.removals.iter()
    }

    pub fn addition(&self, filename: &str) -> Option<&Vec<u8>> {
        self.additions.get(filename)
    }

    pub fn is_marked_for_removal(&self, filename: &str) -> bool {
        self.removals.contains(filename)
    }

    pub fn is_staged_for_addition(&self, filename: &str) -> bool {
        self.additions.contains_key(filename)
    }

    /// Directly insert a pending addition, bypassing the add-then-match
    /// reconciliation against HEAD. Used by the merge engine, which has
    /// already performed its own classification (§4.7).
    pub fn stage_bytes(&mut self, filename: String, bytes: Vec<u8>) {
        self.removals.remove(&filename);
        self.additions.insert(filename, bytes);
    }

    /// Directly mark a filename for removal, bypassing reconciliation.
    pub fn mark_removed(&mut self, filename: String) {
        self.additions.remove(&filename);
        self.removals.insert(filename);
    }

    /// `add <file>` (§4.3): reconciles `working_tree_bytes` for `filename`
    /// against its tracked blob in `head_tree`.
    pub fn add(
        &mut self,
        filename: &str,
        working_tree_bytes: Option<&[u8]>,
        head_tree: &BTreeMap<String, Oid>,
    ) -> StageAddOutcome {
        let Some(bytes) = working_tree_bytes else {
            return StageAddOutcome::FileMissing;
        };
        let matches_head = head_tree.get(filename) == Some(&Oid::hash(bytes));
        self.removals.remove(filename);
        if matches_head {
            self.additions.remove(filename);
            StageAddOutcome::Unstaged
        } else {
            self.additions.insert(filename.to_owned(), bytes.to_vec());
            StageAddOutcome::Staged
        }
    }

    /// `rm <file>` (§4.3).
    pub fn remove(
        &mut self,
        filename: &str,
        head_tree: &BTreeMap<String, Oid>,
    ) -> StageRemoveOutcome {
        if self.additions.remove(filename).is_some() {
            return StageRemoveOutcome::RemovedFromAdditions;
        }
        if head_tree.contains_key(filename) {
            self.removals.insert(filename.to_owned());
            return StageRemoveOutcome::MarkedForRemoval;
        }
        StageRemoveOutcome::NothingToRemove
    }

    /// Persist the staging area to `stage_dir`: one file per pending
    /// addition, plus a `[[del[[<filename>` marker per pending removal (§6,
    /// §9's removal-marker encoding).
    pub fn save(&self, stage_dir: &Path) -> Result<(), RepoError> {
        if stage_dir.exists() {
            fs::remove_dir_all(stage_dir).map_err(|e| RepoError::io(stage_dir, e))?;
        }
        fs::create_dir_all(stage_dir).map_err(|e| RepoError::io(stage_dir, e))?;
        for (filename, bytes) in &self.additions {
            let path = stage_dir.join(filename);
            fs::write(&path, bytes).map_err(|e| RepoError::io(&path, e))?;
        }
        for filename in &self.removals {
            let marker = format!("{REMOVAL_MARKER_PREFIX}{filename}");
            let path = stage_dir.join(marker);
            fs::write(&path, []).map_err(|e| RepoError::io(&path, e))?;
        }
        Ok(())
    }

    /// Reload the staging area from `stage_dir`.
    pub fn load(stage_dir: &Path) -> Result<Self, RepoError> {
        let mut area = StagingArea::new();
        if !stage_dir.exists() {
            return Ok(area);
        }
        for entry in fs::read_dir(stage_dir).map_err(|e| RepoError::io(stage_dir, e))? {
            let entry = entry.map_err(|e| RepoError::io(stage_dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(filename) = name.strip_prefix(REMOVAL_MARKER_PREFIX) {
                area.removals.insert(filename.to_owned());
            } else {
                let bytes = fs::read(entry.path()).map_err(|e| RepoError::io(entry.path(), e))?;
                area.additions.insert(name, bytes);
            }
        }
        Ok(area)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_twice_is_idempotent() {
        let mut stage = StagingArea::new();
        let head_tree = BTreeMap::new();
        stage.add("a.txt", Some(b"hi"), &head_tree);
        let before_additions = stage.additions.clone();
        stage.add("a.txt", Some(b"hi"), &head_tree);
        assert_eq!(stage.additions, before_additions);
    }

    #[test]
    fn add_matching_head_cancels_pending_state() {
        let mut stage = StagingArea::new();
        let mut head_tree = BTreeMap::new();
        head_tree.insert("a.txt".to_owned(), Oid::hash(b"hi"));
        let outcome = stage.add("a.txt", Some(b"hi"), &head_tree);
        assert_eq!(outcome, StageAddOutcome::Unstaged);
        assert!(!stage.is_staged_for_addition("a.txt"));
        assert!(!stage.is_marked_for_removal("a.txt"));
    }

    #[test]
    fn add_differing_content_stages_it() {
        let mut stage = StagingArea::new();
        let mut head_tree = BTreeMap::new();
        head_tree.insert("a.txt".to_owned(), Oid::hash(b"old"));
        let outcome = stage.add("a.txt", Some(b"new"), &head_tree);
        assert_eq!(outcome, StageAddOutcome::Staged);
        assert_eq!(stage.addition("a.txt"), Some(&b"new".to_vec()));
    }

    #[test]
    fn add_missing_file_is_reported() {
        let mut stage = StagingArea::new();
        let head_tree = BTreeMap::new();
        assert_eq!(stage.add("missing.txt", None, &head_tree), StageAddOutcome::FileMissing);
    }

    #[test]
    fn remove_with_no_trace_is_rejected() {
        let mut stage = StagingArea::new();
        let head_tree = BTreeMap::new();
        let outcome = stage.remove("missing.txt", &head_tree);
        assert_eq!(outcome, StageRemoveOutcome::NothingToRemove);
    }

    #[test]
    fn remove_tracked_file_marks_it_for_removal() {
        let mut stage = StagingArea::new();
        let mut head_tree = BTreeMap::new();
        head_tree.insert("a.txt".to_owned(), Oid::hash(b"hi"));
        let outcome = stage.remove("a.txt", &head_tree);
        assert_eq!(outcome, StageRemoveOutcome::MarkedForRemoval);
        assert!(stage.is_marked_for_removal("a.txt"));
    }

    #[test]
    fn save_and_load_round_trips_additions_and_removal_markers() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut stage = StagingArea::new();
        stage.stage_bytes("a.txt".to_owned(), b"hi".to_vec());
        stage.mark_removed("b.txt".to_owned());
        stage.save(dir.path()).unwrap();
        let loaded = StagingArea::load(dir.path()).unwrap();
        assert_eq!(loaded.addition("a.txt"), Some(&b"hi".to_vec()));
        assert!(loaded.is_marked_for_removal("b.txt"));
    }
}
