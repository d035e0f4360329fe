//! Persistent storage for blobs and commits (§4.1).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::instrument;

use crate::commit::CommitRecord;
use crate::error::RepoError;
use crate::hash::Oid;

const SHORT_ID_LEN: usize = 8;

/// Persists blobs and commit records under `<repo>/.gitlet/{blobs,commits}`
/// and resolves abbreviated 8-hex commit ids via an in-memory short-id
/// table that mirrors the on-disk `shortCommitIdMap` file (§6).
pub struct ObjectStore {
    root: PathBuf,
    short_ids: BTreeMap<String, Oid>,
}

impl ObjectStore {
    /// Open the object store rooted at `gitlet_dir` (the `.gitlet`
    /// directory itself), creating the `blobs`/`commits` subdirectories if
    /// needed.
    pub fn open(gitlet_dir: &Path) -> Result<Self, RepoError> {
        let blobs = gitlet_dir.join("blobs");
        let commits = gitlet_dir.join("commits");
        fs::create_dir_all(&blobs).map_err(|e| RepoError::io(&blobs, e))?;
        fs::create_dir_all(&commits).map_err(|e| RepoError::io(&commits, e))?;
        let short_ids = Self::load_short_ids(gitlet_dir)?;
        Ok(ObjectStore { root: gitlet_dir.to_owned(), short_ids })
    }

    fn short_id_map_path(&self) -> PathBuf {
        self.root.join("shortCommitIdMap")
    }

    fn load_short_ids(gitlet_dir: &Path) -> Result<BTreeMap<String, Oid>, RepoError> {
        let path = gitlet_dir.join("shortCommitIdMap");
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let text = fs::read_to_string(&path).map_err(|e| RepoError::io(&path, e))?;
        serde_json::from_str(&text)
            .map_err(|e| RepoError::MalformedMetadata("shortCommitIdMap".to_owned(), e))
    }

    fn save_short_ids(&self) -> Result<(), RepoError> {
        let path = self.short_id_map_path();
        let text =
            serde_json::to_string_pretty(&self.short_ids).expect("map serialization cannot fail");
        fs::write(&path, text).map_err(|e| RepoError::io(&path, e))
    }

    fn blob_path(&self, oid: &Oid) -> PathBuf {
        self.root.join("blobs").join(oid.to_string())
    }

    fn commit_path(&self, oid: &Oid) -> PathBuf {
        self.root.join("commits").join(oid.to_string())
    }

    /// Store `bytes` as a blob, returning its fingerprint. Idempotent.
    #[instrument(skip(self, bytes))]
    pub fn put_blob(&mut self, bytes: &[u8]) -> Result<Oid, RepoError> {
        let oid = Oid::hash(bytes);
        let path = self.blob_path(&oid);
        if !path.exists() {
            fs::write(&path, bytes).map_err(|e| RepoError::io(&path, e))?;
        }
        Ok(oid)
    }

    /// Fetch a blob's bytes by fingerprint.
    pub fn get_blob(&self, oid: &Oid) -> Result<Vec<u8>, RepoError> {
        let path = self.blob_path(oid);
        fs::read(&path).map_err(|_| RepoError::ObjectMissing(*oid))
    }

    /// Store a commit record, returning its fingerprint. Idempotent; also
    /// registers the commit's short id in `shortCommitIdMap`.
    #[instrument(skip(self, record))]
    pub fn put_commit(&mut self, record: &CommitRecord) -> Result<Oid, RepoError> {
        let oid = record.fingerprint();
        let path = self.commit_path(&oid);
        if !path.exists() {
            fs::write(&path, record.canonical_bytes()).map_err(|e| RepoError::io(&path, e))?;
        }
        let short = oid.to_string()[..SHORT_ID_LEN].to_owned();
        self.short_ids.insert(short, oid);
        self.save_short_ids()?;
        Ok(oid)
    }

    /// Resolve either a full 40-hex fingerprint or an 8-hex prefix from the
    /// short-id table.
    pub fn resolve(&self, id: &str) -> Option<Oid> {
        if id.len() == 40 {
            return id.parse().ok();
        }
        self.short_ids.get(id).copied()
    }

    /// Fetch a commit record by full fingerprint or 8-hex short id.
    pub fn get_commit(&self, id: &str) -> Result<CommitRecord, RepoError> {
        let oid = self
            .resolve(id)
            .ok_or_else(|| RepoError::UnresolvedCommitId(id.to_owned()))?;
        let path = self.commit_path(&oid);
        let bytes = fs::read(&path).map_err(|_| RepoError::ObjectMissing(oid))?;
        serde_json::from_slice(&bytes).map_err(|e| RepoError::MalformedCommit(oid, e))
    }

    /// Every commit fingerprint currently stored, for `global-log` (§6, §8
    /// invariant 5).
    pub fn all_commit_ids(&self) -> Result<Vec<Oid>, RepoError> {
        let dir = self.root.join("commits");
        let mut ids = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| RepoError::io(&dir, e))? {
            let entry = entry.map_err(|e| RepoError::io(&dir, e))?;
            if let Some(name) = entry.file_name().to_str() {
                if let Ok(oid) = name.parse::<Oid>() {
                    ids.push(oid);
                }
            }
        }
        Ok(ids)
    }

    pub fn contains_commit(&self, oid: &Oid) -> bool {
        self.commit_path(oid).exists()
    }

    pub fn contains_blob(&self, oid: &Oid) -> bool {
        self.blob_path(oid).exists()
    }
}
