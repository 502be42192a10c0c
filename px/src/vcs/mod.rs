//! Version control
//!
//! Thin async wrapper around the `git` binary, bound to one working directory.
//! Every invocation goes through a [`RetryPolicy`](crate::retry::RetryPolicy)
//! to absorb transient lock contention.

mod git;

pub use git::{GitClient, GitCommandResult, GitError, is_benign_warning};
