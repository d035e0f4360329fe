//! The repository facade: threads the object store, ref index, staging
//! area, and remote index through every user-facing operation (§4.8 and
//! the rest of §4 taken together).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::instrument;

use crate::commit::{CommitEngine, CommitOutcome, CommitRecord};
use crate::dag;
use crate::error::RepoError;
use crate::hash::Oid;
use crate::merge::{self, MergeOutcome};
use crate::object::ObjectStore;
use crate::refs::{RefError, RefIndex};
use crate::remote::{self, RemoteConfigOutcome, RemoteIndex, SyncOutcome};
use crate::stage::{StageAddOutcome, StageRemoveOutcome, StagingArea};
use crate::workdir::{self, Status};

const GITLET_DIR_NAME: &str = ".gitlet";

/// Outcome of `checkout_file` (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutFileOutcome {
    Checked,
    NoSuchCommit,
    FileNotInCommit,
}

impl CheckoutFileOutcome {
    pub fn message(&self) -> Option<&'static str> {
        match self {
            CheckoutFileOutcome::Checked => None,
            CheckoutFileOutcome::NoSuchCommit => Some("No commit with that id exists."),
            CheckoutFileOutcome::FileNotInCommit => Some("File does not exist in that commit."),
        }
    }
}

/// Outcome of `checkout_branch` (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutBranchOutcome {
    Checked,
    AlreadyOnBranch,
    NoSuchBranch,
    UntrackedFileInWay,
}

impl CheckoutBranchOutcome {
    pub fn message(&self) -> Option<&'static str> {
        match self {
            CheckoutBranchOutcome::Checked => None,
            CheckoutBranchOutcome::AlreadyOnBranch => Some("No need to checkout the current branch"),
            CheckoutBranchOutcome::NoSuchBranch => Some("No such branch exists."),
            CheckoutBranchOutcome::UntrackedFileInWay => {
                Some("There is an untracked file in the way; delete it, or add and commit it first.")
            }
        }
    }
}

/// Outcome of `reset` (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    Reset,
    NoSuchCommit,
    UntrackedFileInWay,
}

impl ResetOutcome {
    pub fn message(&self) -> Option<&'static str> {
        match self {
            ResetOutcome::Reset => None,
            ResetOutcome::NoSuchCommit => Some("No commit with that id exists."),
            ResetOutcome::UntrackedFileInWay => {
                Some("There is an untracked file in the way; delete it, or add and commit it first.")
            }
        }
    }
}

/// One entry of `log`/`global-log`: presentation (date formatting) is left
/// to the caller, per §6's log-format section.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub oid: Oid,
    pub record: CommitRecord,
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_secs() as i64
}

/// Threads every component together for a single `.gitlet` repository
/// rooted at `working_dir` (§4.8 and the overall data-flow diagram of §2).
pub struct Repository {
    working_dir: PathBuf,
    gitlet_dir: PathBuf,
    store: ObjectStore,
    refs: RefIndex,
    stage: StagingArea,
    remotes: RemoteIndex,
}

impl Repository {
    fn gitlet_dir_of(working_dir: &Path) -> PathBuf {
        working_dir.join(GITLET_DIR_NAME)
    }

    /// Whether `working_dir` already contains an initialized repository.
    pub fn is_repository(working_dir: &Path) -> bool {
        Self::gitlet_dir_of(working_dir).is_dir()
    }

    /// `init` (§4.4, §8 scenario 1).
    #[instrument(skip_all)]
    pub fn init(working_dir: &Path) -> Result<Self, RepoError> {
        let gitlet_dir = Self::gitlet_dir_of(working_dir);
        fs::create_dir_all(&gitlet_dir).map_err(|e| RepoError::io(&gitlet_dir, e))?;
        let mut store = ObjectStore::open(&gitlet_dir)?;
        let initial = CommitEngine::init(&mut store)?;
        let refs = RefIndex::init(&gitlet_dir, initial)?;
        let stage = StagingArea::new();
        stage.save(&gitlet_dir.join("stage"))?;
        let remotes = RemoteIndex::open(&gitlet_dir)?;
        Ok(Repository { working_dir: working_dir.to_owned(), gitlet_dir, store, refs, stage, remotes })
    }

    /// Open an already-initialized repository rooted at `working_dir`.
    pub fn open(working_dir: &Path) -> Result<Self, RepoError> {
        let gitlet_dir = Self::gitlet_dir_of(working_dir);
        let store = ObjectStore::open(&gitlet_dir)?;
        let refs = RefIndex::open(&gitlet_dir)?;
        let stage = StagingArea::load(&gitlet_dir.join("stage"))?;
        let remotes = RemoteIndex::open(&gitlet_dir)?;
        Ok(Repository { working_dir: working_dir.to_owned(), gitlet_dir, store, refs, stage, remotes })
    }

    fn save_stage(&self) -> Result<(), RepoError> {
        self.stage.save(&self.gitlet_dir.join("stage"))
    }

    fn head_tree(&self) -> Result<std::collections::BTreeMap<String, Oid>, RepoError> {
        let head = self.refs.current_head();
        Ok(self.store.get_commit(&head.to_string())?.tree)
    }

    fn working_tree_bytes(&self, filename: &str) -> Option<Vec<u8>> {
        fs::read(self.working_dir.join(filename)).ok()
    }

    /// `add <file>` (§4.3).
    #[instrument(skip(self))]
    pub fn add(&mut self, filename: &str) -> Result<StageAddOutcome, RepoError> {
        let head_tree = self.head_tree()?;
        let bytes = self.working_tree_bytes(filename);
        let outcome = self.stage.add(filename, bytes.as_deref(), &head_tree);
        if !matches!(outcome, StageAddOutcome::FileMissing) {
            self.save_stage()?;
        }
        Ok(outcome)
    }

    /// `rm <file>` (§4.3).
    #[instrument(skip(self))]
    pub fn remove(&mut self, filename: &str) -> Result<StageRemoveOutcome, RepoError> {
        let head_tree = self.head_tree()?;
        let outcome = self.stage.remove(filename, &head_tree);
        if outcome == StageRemoveOutcome::MarkedForRemoval {
            let _ = fs::remove_file(self.working_dir.join(filename));
        }
        if outcome != StageRemoveOutcome::NothingToRemove {
            self.save_stage()?;
        }
        Ok(outcome)
    }

    /// `commit <msg>` (§4.4).
    #[instrument(skip(self))]
    pub fn commit(&mut self, message: &str) -> Result<CommitOutcome, RepoError> {
        let head = self.refs.current_head();
        let outcome = CommitEngine::commit(&mut self.store, &self.stage, head, message, now())?;
        if let CommitOutcome::Created(oid) = outcome {
            let branch = self.refs.current_branch().to_owned();
            self.refs.set_head(&branch, oid)?;
            self.stage.clear();
            self.save_stage()?;
        }
        Ok(outcome)
    }

    /// `status` (§4.5).
    pub fn status(&self) -> Result<Status, RepoError> {
        let head_tree = self.head_tree()?;
        workdir::status(&self.working_dir, &head_tree, &self.stage)
    }

    pub fn list_branches(&self) -> Vec<String> {
        self.refs.list_branches().cloned().collect()
    }

    pub fn current_branch(&self) -> &str {
        self.refs.current_branch()
    }

    /// `branch <name>` (§4.2).
    pub fn create_branch(&mut self, name: &str) -> Result<Result<(), RefError>, RepoError> {
        let head = self.refs.current_head();
        self.refs.create_branch(name, head)
    }

    /// `rm-branch <name>` (§4.2).
    pub fn delete_branch(&mut self, name: &str) -> Result<Result<(), RefError>, RepoError> {
        self.refs.delete_branch(name)
    }

    fn log_from(&self, mut cursor: Option<Oid>) -> Result<Vec<LogEntry>, RepoError> {
        let mut entries = Vec::new();
        while let Some(oid) = cursor {
            let record = self.store.get_commit(&oid.to_string())?;
            cursor = record.parent;
            entries.push(LogEntry { oid, record });
        }
        Ok(entries)
    }

    /// `log`: first-parent history from the current head (§6).
    pub fn log(&self) -> Result<Vec<LogEntry>, RepoError> {
        self.log_from(Some(self.refs.current_head()))
    }

    /// `global-log`: every commit ever stored, in no particular guaranteed
    /// order (§8 invariant 5).
    pub fn global_log(&self) -> Result<Vec<LogEntry>, RepoError> {
        let mut entries = Vec::new();
        for oid in self.store.all_commit_ids()? {
            let record = self.store.get_commit(&oid.to_string())?;
            entries.push(LogEntry { oid, record });
        }
        Ok(entries)
    }

    /// `find <msg>`: every commit whose message matches exactly.
    pub fn find(&self, message: &str) -> Result<Vec<Oid>, RepoError> {
        let mut ids: Vec<Oid> = self
            .global_log()?
            .into_iter()
            .filter(|entry| entry.record.message == message)
            .map(|entry| entry.oid)
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// `checkout -- <file>` (current head) or `checkout <commit> -- <file>`.
    #[instrument(skip(self))]
    pub fn checkout_file(&self, commit_id: Option<&str>, filename: &str) -> Result<CheckoutFileOutcome, RepoError> {
        let id = commit_id.map(str::to_owned).unwrap_or_else(|| self.refs.current_head().to_string());
        let Some(oid) = self.store.resolve(&id) else {
            return Ok(CheckoutFileOutcome::NoSuchCommit);
        };
        let record = self.store.get_commit(&oid.to_string())?;
        let Some(blob_oid) = record.tree.get(filename) else {
            return Ok(CheckoutFileOutcome::FileNotInCommit);
        };
        let bytes = self.store.get_blob(blob_oid)?;
        let path = self.working_dir.join(filename);
        fs::write(&path, bytes).map_err(|e| RepoError::io(&path, e))?;
        Ok(CheckoutFileOutcome::Checked)
    }

    /// `checkout <branch>` (§4.8).
    #[instrument(skip(self))]
    pub fn checkout_branch(&mut self, branch: &str) -> Result<CheckoutBranchOutcome, RepoError> {
        let Some(target_head) = self.refs.head_of(branch) else {
            return Ok(CheckoutBranchOutcome::NoSuchBranch);
        };
        let head_tree = self.head_tree()?;
        let untracked = workdir::untracked_files(&self.working_dir, &head_tree, &self.stage)?;
        if !untracked.is_empty() {
            return Ok(CheckoutBranchOutcome::UntrackedFileInWay);
        }
        let target_record = self.store.get_commit(&target_head.to_string())?;
        workdir::clear_working_tree(&self.working_dir)?;
        workdir::materialize_tree(&self.store, &self.working_dir, &target_record.tree)?;
        if branch == self.refs.current_branch() {
            return Ok(CheckoutBranchOutcome::AlreadyOnBranch);
        }
        self.refs.set_current(branch)?;
        self.stage.clear();
        self.save_stage()?;
        Ok(CheckoutBranchOutcome::Checked)
    }

    /// `reset <commit>` (§4.8).
    #[instrument(skip(self))]
    pub fn reset(&mut self, commit_id: &str) -> Result<ResetOutcome, RepoError> {
        let Some(target) = self.store.resolve(commit_id) else {
            return Ok(ResetOutcome::NoSuchCommit);
        };
        let head_tree = self.head_tree()?;
        let untracked = workdir::untracked_files(&self.working_dir, &head_tree, &self.stage)?;
        if !untracked.is_empty() {
            return Ok(ResetOutcome::UntrackedFileInWay);
        }
        let target_record = self.store.get_commit(&target.to_string())?;
        workdir::clear_working_tree(&self.working_dir)?;
        workdir::materialize_tree(&self.store, &self.working_dir, &target_record.tree)?;
        let branch = self.refs.current_branch().to_owned();
        self.refs.set_head(&branch, target)?;
        self.stage.clear();
        self.save_stage()?;
        Ok(ResetOutcome::Reset)
    }

    /// `merge <branch>` (§4.6, §4.7).
    #[instrument(skip(self))]
    pub fn merge(&mut self, other_branch: &str) -> Result<MergeOutcome, RepoError> {
        let outcome = merge::merge(&mut self.store, &mut self.stage, &mut self.refs, &self.working_dir, other_branch, now())?;
        self.save_stage()?;
        Ok(outcome)
    }

    /// `add-remote <name> <path>` (§4.9).
    pub fn add_remote(&mut self, name: &str, path: PathBuf) -> Result<RemoteConfigOutcome, RepoError> {
        self.remotes.add(name, path)
    }

    /// `rm-remote <name>` (§4.9).
    pub fn remove_remote(&mut self, name: &str) -> Result<RemoteConfigOutcome, RepoError> {
        self.remotes.remove(name)
    }

    /// `push <remote> <branch>` (§4.9).
    #[instrument(skip(self))]
    pub fn push(&mut self, remote_name: &str, branch: &str) -> Result<SyncOutcome, RepoError> {
        remote::push(&mut self.store, &self.stage, &self.refs, &self.remotes, remote_name, branch)
    }

    /// `fetch <remote> <branch>` (§4.9).
    #[instrument(skip(self))]
    pub fn fetch(&mut self, remote_name: &str, branch: &str) -> Result<SyncOutcome, RepoError> {
        remote::fetch(&mut self.store, &mut self.refs, &self.remotes, remote_name, branch)
    }

    /// `pull <remote> <branch>` (§4.9).
    #[instrument(skip(self))]
    pub fn pull(&mut self, remote_name: &str, branch: &str) -> Result<(SyncOutcome, Option<MergeOutcome>), RepoError> {
        let result = remote::pull(
            &mut self.store,
            &mut self.stage,
            &mut self.refs,
            &self.remotes,
            &self.working_dir,
            remote_name,
            branch,
            now(),
        )?;
        self.save_stage()?;
        Ok(result)
    }

    /// Ancestry check exposed for CLI-level scenarios such as the
    /// checkout-then-reset round trip (§8).
    pub fn is_ancestor(&self, ancestor: Oid, descendant: Oid) -> Result<bool, RepoError> {
        dag::is_ancestor(&self.store, ancestor, descendant)
    }
}
