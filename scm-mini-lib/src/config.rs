//! Ambient configuration read from the process environment (§10.3).

/// The commit author hint, read from `GITLET_AUTHOR` if set. `CommitRecord`
/// (§3) has no author field and §6's log format has no line for one, so this
/// is read but deliberately not threaded into `log`/`global-log` rendering —
/// doing so would change the byte-exact output those sections prescribe.
/// Reserved for a caller that wants to display it out-of-band (e.g. a future
/// `whoami`-style command).
pub fn author_hint() -> Option<String> {
    std::env::var("GITLET_AUTHOR").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn author_hint_reads_the_environment_variable() {
        std::env::set_var("GITLET_AUTHOR", "Ada Lovelace");
        assert_eq!(author_hint().as_deref(), Some("Ada Lovelace"));
        std::env::remove_var("GITLET_AUTHOR");
        assert_eq!(author_hint(), None);
    }
}
