//! Command dispatch: translates a parsed [`crate::opts::Command`] into calls
//! against [`lib::repo::Repository`] and renders the exact output strings of
//! spec §6.

use std::path::{Path, PathBuf};

use chrono::{Local, TimeZone};
use lib::refs::RefError;
use lib::repo::{LogEntry, Repository};

use crate::opts::Command;

/// Prints `message` if the outcome carries a user-facing one; a `None`
/// message means the operation succeeded silently (§4's various outcomes).
fn report(message: Option<&str>) {
    if let Some(message) = message {
        println!("{message}");
    }
}

/// Runs `command` against the repository rooted at `cwd`, per the CLI
/// surface of §6. `Init` does not require an existing repository; every
/// other command does.
pub fn run(command: Command, cwd: &Path) -> eyre::Result<()> {
    if !matches!(command, Command::Init) && !Repository::is_repository(cwd) {
        println!("Not in an initialized Gitlet directory.");
        return Ok(());
    }

    match command {
        Command::Init => {
            Repository::init(cwd)?;
        }
        Command::Add { file } => {
            let mut repo = Repository::open(cwd)?;
            report(repo.add(&file)?.message());
        }
        Command::Commit { message } => {
            let mut repo = Repository::open(cwd)?;
            report(repo.commit(&message)?.message());
        }
        Command::Rm { file } => {
            let mut repo = Repository::open(cwd)?;
            report(repo.remove(&file)?.message());
        }
        Command::Log => {
            let repo = Repository::open(cwd)?;
            print_log(&repo.log()?);
        }
        Command::GlobalLog => {
            let repo = Repository::open(cwd)?;
            print_log(&repo.global_log()?);
        }
        Command::Find { message } => {
            let repo = Repository::open(cwd)?;
            let ids = repo.find(&message)?;
            if ids.is_empty() {
                println!("Found no commit with that message.");
            } else {
                for id in ids {
                    println!("{id}");
                }
            }
        }
        Command::Status => {
            let repo = Repository::open(cwd)?;
            print_status(&repo)?;
        }
        Command::Checkout { args } => checkout(cwd, &args)?,
        Command::Branch { name } => {
            let mut repo = Repository::open(cwd)?;
            report(repo.create_branch(&name)?.err().map(RefError::message));
        }
        Command::RmBranch { name } => {
            let mut repo = Repository::open(cwd)?;
            report(repo.delete_branch(&name)?.err().map(RefError::message));
        }
        Command::Reset { commit } => {
            let mut repo = Repository::open(cwd)?;
            report(repo.reset(&commit)?.message());
        }
        Command::Merge { branch } => {
            let mut repo = Repository::open(cwd)?;
            report(repo.merge(&branch)?.message());
        }
        Command::AddRemote { name, path } => {
            let mut repo = Repository::open(cwd)?;
            report(repo.add_remote(&name, PathBuf::from(path))?.message());
        }
        Command::RmRemote { name } => {
            let mut repo = Repository::open(cwd)?;
            report(repo.remove_remote(&name)?.message());
        }
        Command::Push { remote, branch } => {
            let mut repo = Repository::open(cwd)?;
            report(repo.push(&remote, &branch)?.message());
        }
        Command::Fetch { remote, branch } => {
            let mut repo = Repository::open(cwd)?;
            report(repo.fetch(&remote, &branch)?.message());
        }
        Command::Pull { remote, branch } => {
            let mut repo = Repository::open(cwd)?;
            let (fetch_outcome, merge_outcome) = repo.pull(&remote, &branch)?;
            match fetch_outcome.message() {
                Some(message) => println!("{message}"),
                None => report(merge_outcome.and_then(|outcome| outcome.message())),
            }
        }
    }
    Ok(())
}

/// Parses the three `checkout` forms of §6, which share no fixed arity and
/// so aren't modeled directly in `clap`'s grammar (see `opts::Command::Checkout`).
fn checkout(cwd: &Path, args: &[String]) -> eyre::Result<()> {
    match args {
        [dash_dash, file] if dash_dash == "--" => {
            let repo = Repository::open(cwd)?;
            report(repo.checkout_file(None, file)?.message());
        }
        [commit, dash_dash, file] if dash_dash == "--" => {
            let repo = Repository::open(cwd)?;
            report(repo.checkout_file(Some(commit), file)?.message());
        }
        [branch] => {
            let mut repo = Repository::open(cwd)?;
            report(repo.checkout_branch(branch)?.message());
        }
        _ => println!("Incorrect operands."),
    }
    Ok(())
}

/// The exact per-commit log rendering of §6.
fn format_entry(entry: &LogEntry) -> String {
    let mut out = String::new();
    out.push_str("===\n");
    out.push_str(&format!("commit {}\n", entry.oid));
    if let Some(second_parent) = entry.record.second_parent {
        let first_parent = entry.record.parent.expect("a merge commit always has a first parent");
        out.push_str(&format!("Merge: {} {}\n", first_parent.log_short(), second_parent.log_short()));
    }
    let date = Local
        .timestamp_opt(entry.record.timestamp, 0)
        .single()
        .expect("commit timestamps are stored as valid Unix seconds");
    out.push_str(&format!("Date: {}\n", date.format("%a %b %d %H:%M:%S %Y %z")));
    out.push_str(&entry.record.message);
    out
}

fn print_log(entries: &[LogEntry]) {
    let rendered: Vec<String> = entries.iter().map(format_entry).collect();
    println!("{}", rendered.join("\n\n"));
}

/// The classic four-section status rendering of §4.5.
fn print_status(repo: &Repository) -> eyre::Result<()> {
    println!("=== Branches ===");
    let mut branches = repo.list_branches();
    branches.sort();
    for branch in &branches {
        if branch == repo.current_branch() {
            println!("*{branch}");
        } else {
            println!("{branch}");
        }
    }
    println!();

    let status = repo.status()?;

    println!("=== Staged Files ===");
    for file in &status.staged {
        println!("{file}");
    }
    println!();

    println!("=== Removed Files ===");
    for file in &status.removed {
        println!("{file}");
    }
    println!();

    println!("=== Modifications Not Staged For Commit ===");
    for file in &status.modifications_not_staged {
        println!("{file}");
    }
    println!();

    println!("=== Untracked Files ===");
    for file in &status.untracked {
        println!("{file}");
    }
    println!();
    Ok(())
}
