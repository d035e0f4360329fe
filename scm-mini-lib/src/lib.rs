//! Core engine for a miniature, content-addressed version control system:
//! object store and commit graph, staging area, working-tree status,
//! three-way merge, and remote synchronization.

pub mod commit;
pub mod config;
pub mod dag;
pub mod error;
pub mod hash;
pub mod merge;
pub mod object;
pub mod refs;
pub mod remote;
pub mod repo;
pub mod stage;
pub mod workdir;
