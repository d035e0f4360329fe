//! Command-line argument definitions (§6).

use clap::{Parser, Subcommand};

/// A miniature, content-addressed version control engine.
#[derive(Parser)]
#[command(version = env!("CARGO_PKG_VERSION"), author = "Waleed Khan <me@waleedkhan.name>")]
pub struct Opts {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a new repository in the current directory.
    Init,

    /// Stage a file for the next commit.
    Add { file: String },

    /// Commit the staged changes.
    Commit { message: String },

    /// Unstage a file, or stage its removal if it is tracked.
    Rm { file: String },

    /// Show the commit history of the current branch.
    Log,

    /// Show every commit ever made, in no particular order.
    GlobalLog,

    /// Print the ids of every commit with the given exact message.
    Find { message: String },

    /// Show the staging area and working-tree status.
    Status,

    /// `checkout -- <file>`, `checkout <commit> -- <file>`, or `checkout <branch>`.
    ///
    /// Parsed by hand in `commands::checkout` rather than with clap's own
    /// grammar, since the three forms share no fixed arity.
    Checkout {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Create a new branch pointing at the current head.
    Branch { name: String },

    /// Delete a branch (other than the current one).
    RmBranch { name: String },

    /// Move the current branch's head to a given commit.
    Reset { commit: String },

    /// Merge another branch into the current branch.
    Merge { branch: String },

    /// Record another repository's filesystem path under a name.
    AddRemote { name: String, path: String },

    /// Forget a previously recorded remote.
    RmRemote { name: String },

    /// Push the current branch's history to a remote.
    Push { remote: String, branch: String },

    /// Fetch a branch's history from a remote into a local mirror branch.
    Fetch { remote: String, branch: String },

    /// Fetch then merge a remote branch into the current branch.
    Pull { remote: String, branch: String },
}
