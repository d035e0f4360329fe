//! Internal error type.
//!
//! Expected, user-facing conditions are modeled as plain enum return values
//! (see [`crate::commit::CommitOutcome`] and its siblings across this
//! crate) rather than as variants here. `RepoError` covers only the other
//! half of §7: failures the user cannot meaningfully act on, such as
//! corrupt storage, I/O failure, or a violated invariant.

use thiserror::Error;

use crate::hash::Oid;

/// Internal errors: I/O failure, corruption, or an invariant violation.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("object {0} not found in object store")]
    ObjectMissing(Oid),

    #[error("no commit could be resolved from id {0:?}")]
    UnresolvedCommitId(String),

    #[error("commit record {0} is malformed: {1}")]
    MalformedCommit(Oid, #[source] serde_json::Error),

    #[error("repository metadata file {0:?} is malformed: {1}")]
    MalformedMetadata(String, #[source] serde_json::Error),

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("repository invariant violated: {0}")]
    InvariantViolated(String),
}

impl RepoError {
    pub fn io(path: impl Into<std::path::PathBuf>, source: std::io::Error) -> Self {
        RepoError::Io { path: path.into(), source }
    }
}
