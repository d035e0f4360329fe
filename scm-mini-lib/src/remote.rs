//! Remote repository configuration and push/fetch/pull synchronization
//! (§4.9).

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::dag::is_ancestor;
use crate::error::RepoError;
use crate::hash::Oid;
use crate::merge::{self, MergeOutcome};
use crate::object::ObjectStore;
use crate::refs::RefIndex;
use crate::stage::StagingArea;
use crate::workdir::{clear_working_tree, materialize_tree};

const GITLET_DIR_NAME: &str = ".gitlet";

/// Outcome of `add-remote`/`rm-remote` (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteConfigOutcome {
    Added,
    Removed,
    AlreadyExists,
    Missing,
}

impl RemoteConfigOutcome {
    pub fn message(&self) -> Option<&'static str> {
        match self {
            RemoteConfigOutcome::Added | RemoteConfigOutcome::Removed => None,
            RemoteConfigOutcome::AlreadyExists => Some("A remote with that name already exists."),
            RemoteConfigOutcome::Missing => Some("A remote with that name does not exist."),
        }
    }
}

/// Outcome of `push`/`fetch` (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Pushed,
    UpToDate,
    NeedsPull,
    Fetched,
    UncommittedChanges,
    RemoteDirectoryNotFound,
    UnknownRemote,
    RemoteBranchMissing,
}

impl SyncOutcome {
    pub fn message(&self) -> Option<&'static str> {
        match self {
            SyncOutcome::Pushed | SyncOutcome::Fetched => None,
            SyncOutcome::UpToDate => Some("Remote is already up-to-date. No need to push."),
            SyncOutcome::NeedsPull => Some("Please pull down remote changes before pushing."),
            // Resolved Open Question (DESIGN.md): reuse merge's identical
            // precondition string rather than invent a new one.
            SyncOutcome::UncommittedChanges => Some("You have uncommitted changes."),
            SyncOutcome::RemoteDirectoryNotFound => Some("Remote directory not found."),
            SyncOutcome::UnknownRemote => Some("A remote with that name does not exist."),
            SyncOutcome::RemoteBranchMissing => Some("That remote does not have that branch."),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RemoteMap(BTreeMap<String, PathBuf>);

/// The `{name -> path}` table of configured remotes, persisted to
/// `remoteMap` (§6).
pub struct RemoteIndex {
    gitlet_dir: PathBuf,
    remotes: BTreeMap<String, PathBuf>,
}

impl RemoteIndex {
    fn path(gitlet_dir: &Path) -> PathBuf {
        gitlet_dir.join("remoteMap")
    }

    pub fn open(gitlet_dir: &Path) -> Result<Self, RepoError> {
        let path = Self::path(gitlet_dir);
        let remotes = if path.exists() {
            let text = fs::read_to_string(&path).map_err(|e| RepoError::io(&path, e))?;
            let RemoteMap(map) = serde_json::from_str(&text)
                .map_err(|e| RepoError::MalformedMetadata("remoteMap".to_owned(), e))?;
            map
        } else {
            BTreeMap::new()
        };
        Ok(RemoteIndex { gitlet_dir: gitlet_dir.to_owned(), remotes })
    }

    fn save(&self) -> Result<(), RepoError> {
        let path = Self::path(&self.gitlet_dir);
        let text = serde_json::to_string_pretty(&RemoteMap(self.remotes.clone()))
            .expect("map serialization cannot fail");
        fs::write(&path, text).map_err(|e| RepoError::io(&path, e))
    }

    /// `add-remote <name> <path>` (§4.9).
    pub fn add(&mut self, name: &str, path: PathBuf) -> Result<RemoteConfigOutcome, RepoError> {
        if self.remotes.contains_key(name) {
            return Ok(RemoteConfigOutcome::AlreadyExists);
        }
        self.remotes.insert(name.to_owned(), path);
        self.save()?;
        Ok(RemoteConfigOutcome::Added)
    }

    /// `rm-remote <name>` (§4.9).
    pub fn remove(&mut self, name: &str) -> Result<RemoteConfigOutcome, RepoError> {
        if self.remotes.remove(name).is_none() {
            return Ok(RemoteConfigOutcome::Missing);
        }
        self.save()?;
        Ok(RemoteConfigOutcome::Removed)
    }

    pub fn path_of(&self, name: &str) -> Option<&Path> {
        self.remotes.get(name).map(PathBuf::as_path)
    }
}

/// Copy every commit reachable from `head` that isn't already present in
/// `dest`, stopping at any commit `dest` already has, plus every blob those
/// commits' trees mention (§4.9).
fn copy_missing_history(src: &ObjectStore, dest: &mut ObjectStore, head: Oid) -> Result<(), RepoError> {
    let mut stack = vec![head];
    let mut visited: HashSet<Oid> = HashSet::new();
    while let Some(oid) = stack.pop() {
        if !visited.insert(oid) || dest.contains_commit(&oid) {
            continue;
        }
        let record = src.get_commit(&oid.to_string())?;
        for blob_oid in record.tree.values() {
            if !dest.contains_blob(blob_oid) {
                let bytes = src.get_blob(blob_oid)?;
                dest.put_blob(&bytes)?;
            }
        }
        dest.put_commit(&record)?;
        if let Some(parent) = record.parent {
            stack.push(parent);
        }
        if let Some(second_parent) = record.second_parent {
            stack.push(second_parent);
        }
    }
    Ok(())
}

/// `push <remote> <branch>` (§4.9).
#[instrument(skip(local_store, local_stage, local_refs, remotes))]
pub fn push(
    local_store: &mut ObjectStore,
    local_stage: &StagingArea,
    local_refs: &RefIndex,
    remotes: &RemoteIndex,
    remote_name: &str,
    branch: &str,
) -> Result<SyncOutcome, RepoError> {
    if !local_stage.is_empty() {
        return Ok(SyncOutcome::UncommittedChanges);
    }
    let Some(remote_path) = remotes.path_of(remote_name) else {
        return Ok(SyncOutcome::UnknownRemote);
    };
    let remote_path = remote_path.to_owned();
    let remote_gitlet = remote_path.join(GITLET_DIR_NAME);
    if !remote_gitlet.is_dir() {
        return Ok(SyncOutcome::RemoteDirectoryNotFound);
    }
    let local_head = local_refs.current_head();
    let mut remote_store = ObjectStore::open(&remote_gitlet)?;
    let mut remote_refs = RefIndex::open(&remote_gitlet)?;

    if let Some(remote_head) = remote_refs.head_of(branch) {
        if remote_head == local_head {
            return Ok(SyncOutcome::UpToDate);
        }
        if !is_ancestor(local_store, remote_head, local_head)? {
            return Ok(SyncOutcome::NeedsPull);
        }
    }

    copy_missing_history(local_store, &mut remote_store, local_head)?;
    remote_refs.set_head(branch, local_head)?;
    let head_record = remote_store.get_commit(&local_head.to_string())?;
    clear_working_tree(&remote_path)?;
    materialize_tree(&remote_store, &remote_path, &head_record.tree)?;
    Ok(SyncOutcome::Pushed)
}

/// `fetch <remote> <branch>` (§4.9). Creates or updates the local mirror
/// branch `<remote>/<branch>`.
#[instrument(skip(local_store, local_refs, remotes))]
pub fn fetch(
    local_store: &mut ObjectStore,
    local_refs: &mut RefIndex,
    remotes: &RemoteIndex,
    remote_name: &str,
    branch: &str,
) -> Result<SyncOutcome, RepoError> {
    let Some(remote_path) = remotes.path_of(remote_name) else {
        return Ok(SyncOutcome::UnknownRemote);
    };
    let remote_gitlet = remote_path.join(GITLET_DIR_NAME);
    if !remote_gitlet.is_dir() {
        return Ok(SyncOutcome::RemoteDirectoryNotFound);
    }
    let remote_store = ObjectStore::open(&remote_gitlet)?;
    let remote_refs = RefIndex::open(&remote_gitlet)?;
    let Some(remote_head) = remote_refs.head_of(branch) else {
        return Ok(SyncOutcome::RemoteBranchMissing);
    };

    copy_missing_history(&remote_store, local_store, remote_head)?;
    let mirror_branch = format!("{remote_name}/{branch}");
    if local_refs.head_of(&mirror_branch).is_some() {
        local_refs.set_head(&mirror_branch, remote_head)?;
    } else {
        local_refs
            .create_branch(&mirror_branch, remote_head)?
            .map_err(|_| RepoError::InvariantViolated("mirror branch already existed".to_owned()))?;
    }
    Ok(SyncOutcome::Fetched)
}

/// `pull <remote> <branch>` (§4.9): fetch, then merge the mirror branch into
/// the current branch.
#[instrument(skip(local_store, local_stage, local_refs, remotes, working_dir))]
pub fn pull(
    local_store: &mut ObjectStore,
    local_stage: &mut StagingArea,
    local_refs: &mut RefIndex,
    remotes: &RemoteIndex,
    working_dir: &Path,
    remote_name: &str,
    branch: &str,
    now: i64,
) -> Result<(SyncOutcome, Option<MergeOutcome>), RepoError> {
    let fetch_outcome = fetch(local_store, local_refs, remotes, remote_name, branch)?;
    if !matches!(fetch_outcome, SyncOutcome::Fetched) {
        return Ok((fetch_outcome, None));
    }
    let mirror_branch = format!("{remote_name}/{branch}");
    let merge_outcome = merge::merge(local_store, local_stage, local_refs, working_dir, &mirror_branch, now)?;
    Ok((fetch_outcome, Some(merge_outcome)))
}
