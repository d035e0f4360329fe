//! Working-tree status scanning and reconciliation (§4.5).

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::RepoError;
use crate::hash::Oid;
use crate::object::ObjectStore;
use crate::stage::StagingArea;

const GITLET_DIR_NAME: &str = ".gitlet";

/// The four classified status sections of §4.5, each already sorted.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Status {
    pub staged: Vec<String>,
    pub removed: Vec<String>,
    pub modifications_not_staged: Vec<String>,
    pub untracked: Vec<String>,
}

fn read_working_tree(working_dir: &Path) -> Result<BTreeMap<String, Vec<u8>>, RepoError> {
    let mut files = BTreeMap::new();
    for entry in fs::read_dir(working_dir).map_err(|e| RepoError::io(working_dir, e))? {
        let entry = entry.map_err(|e| RepoError::io(working_dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name == GITLET_DIR_NAME {
            continue;
        }
        let bytes = fs::read(&path).map_err(|e| RepoError::io(&path, e))?;
        files.insert(name.to_owned(), bytes);
    }
    Ok(files)
}

/// Compute the full status of the working directory against `head_tree` and
/// `stage` (§4.5).
pub fn status(
    working_dir: &Path,
    head_tree: &BTreeMap<String, Oid>,
    stage: &StagingArea,
) -> Result<Status, RepoError> {
    let working_tree = read_working_tree(working_dir)?;

    let mut result = Status {
        staged: stage.iter_additions().map(|(name, _)| name.clone()).collect(),
        removed: stage.iter_removals().cloned().collect(),
        ..Status::default()
    };

    let mut modified = Vec::new();
    for (name, staged_bytes) in stage.iter_additions() {
        match working_tree.get(name) {
            Some(bytes) if bytes != staged_bytes => modified.push(format!("{name} (modified)")),
            None => modified.push(format!("{name} (deleted)")),
            Some(_) => {}
        }
    }
    for (name, oid) in head_tree {
        if stage.is_staged_for_addition(name) || stage.is_marked_for_removal(name) {
            continue;
        }
        match working_tree.get(name) {
            Some(bytes) if Oid::hash(bytes) != *oid => modified.push(format!("{name} (modified)")),
            None => modified.push(format!("{name} (deleted)")),
            Some(_) => {}
        }
    }
    modified.sort();
    result.modifications_not_staged = modified;

    let mut untracked: Vec<String> = working_tree
        .keys()
        .filter(|name| {
            let not_tracked = !head_tree.contains_key(*name) && !stage.is_staged_for_addition(name);
            let recreated_after_removal = stage.is_marked_for_removal(name);
            not_tracked || recreated_after_removal
        })
        .cloned()
        .collect();
    untracked.sort();
    result.untracked = untracked;

    result.staged.sort();
    result.removed.sort();
    Ok(result)
}

/// Filenames present in the working directory that are neither tracked by
/// `head_tree` nor already staged for addition. Shared by the "untracked
/// file in the way" precondition checked by checkout/reset/merge (§4.6-§4.8).
pub fn untracked_files(
    working_dir: &Path,
    head_tree: &BTreeMap<String, Oid>,
    stage: &StagingArea,
) -> Result<Vec<String>, RepoError> {
    let working_tree = read_working_tree(working_dir)?;
    let mut names: Vec<String> = working_tree
        .keys()
        .filter(|name| !head_tree.contains_key(*name) && !stage.is_staged_for_addition(name))
        .cloned()
        .collect();
    names.sort();
    Ok(names)
}

/// Overwrite (or create) every file in `working_dir` per `tree`'s tracked
/// contents, fetching blob bytes from `store`. Used by checkout, reset, and
/// fast-forward/merge (§4.8).
pub fn materialize_tree(
    store: &ObjectStore,
    working_dir: &Path,
    tree: &BTreeMap<String, Oid>,
) -> Result<(), RepoError> {
    for (name, oid) in tree {
        let bytes = store.get_blob(oid)?;
        let path = working_dir.join(name);
        fs::write(&path, bytes).map_err(|e| RepoError::io(&path, e))?;
    }
    Ok(())
}

/// Delete every regular file in `working_dir` (best effort), leaving the
/// `.gitlet` directory untouched. Used before materializing a different
/// commit's tree (§4.8).
pub fn clear_working_tree(working_dir: &Path) -> Result<(), RepoError> {
    for entry in fs::read_dir(working_dir).map_err(|e| RepoError::io(working_dir, e))? {
        let entry = entry.map_err(|e| RepoError::io(working_dir, e))?;
        let path = entry.path();
        if path.is_file() {
            let _ = fs::remove_file(&path);
        }
    }
    Ok(())
}
