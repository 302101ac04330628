//! git::error
//!
//! Error taxonomy for the object store.
//!
//! # Categories
//!
//! - [`GitError::NotFound`]: path or object does not resolve at the ref
//! - [`GitError::Malformed`]: a git object or helper reply violated its
//!   encoding; carries an escaped excerpt of the offending bytes
//! - [`GitError::CommandFailed`] / [`GitError::Timeout`]: a git subprocess
//!   exited non-zero or ran out of time (both retryable)
//! - [`GitError::PushRejected`]: push failed even after pull-and-retry
//! - [`GitError::Stale`]: a conditional write lost a race
//! - [`GitError::HelperReset`]: the batch helper went away mid-request

use std::path::PathBuf;

use thiserror::Error;

use crate::core::types::TypeError;

/// How many bytes of offending input are quoted in a `Malformed` error.
const EXCERPT_LEN: usize = 64;

/// Errors from object store operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Requested blob/path does not resolve at the given ref.
    #[error("not found: {spec}")]
    NotFound {
        /// The `<ref>:<path>` (or plain path) that was looked up
        spec: String,
    },

    /// A parse invariant was violated.
    #[error("malformed {what}: {context}")]
    Malformed {
        /// What was being parsed (tree, commit, batch header, ...)
        what: &'static str,
        /// Description plus an excerpt of the offending bytes
        context: String,
    },

    /// A git subcommand exited with a non-zero status.
    #[error("git {command} failed (exit code {code:?}): {stderr}")]
    CommandFailed {
        /// The subcommand and its arguments
        command: String,
        /// Exit code, `None` if killed by a signal
        code: Option<i32>,
        /// Captured standard error
        stderr: String,
    },

    /// A git subcommand did not finish within the configured timeout.
    #[error("git {command} timed out")]
    Timeout {
        /// The subcommand and its arguments
        command: String,
    },

    /// Push was rejected and the pull-then-retry also failed.
    ///
    /// The commit is kept locally and will go out with the next push.
    #[error("push rejected after pull and retry: {stderr}")]
    PushRejected {
        /// Standard error of the final push attempt
        stderr: String,
    },

    /// A conditional write found the file changed since it was read.
    #[error("'{path}' changed since it was read")]
    Stale {
        /// Repository path of the file
        path: String,
    },

    /// The batch helper exited or was torn down while a request waited.
    #[error("batch helper was reset while a request was pending")]
    HelperReset,

    /// Invalid object id in git output.
    #[error("invalid object id: {0}")]
    InvalidOid(String),

    /// Repository-relative path is not acceptable.
    #[error("invalid path '{path}': {reason}")]
    InvalidPath {
        /// The offending path
        path: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// Repository could not be opened or queried.
    #[error("repository error at {path}: {message}")]
    Repository {
        /// Repository root
        path: PathBuf,
        /// Underlying error message
        message: String,
    },

    /// Filesystem or pipe error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl GitError {
    /// Build a `Malformed` error quoting the start of `bytes`.
    pub fn malformed(what: &'static str, reason: &str, bytes: &[u8]) -> Self {
        GitError::Malformed {
            what,
            context: format!("{} (near \"{}\")", reason, excerpt(bytes)),
        }
    }

    /// Whether retrying the same command may succeed.
    ///
    /// Timeouts are treated like any other non-zero exit.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GitError::CommandFailed { .. } | GitError::Timeout { .. }
        )
    }

    /// Whether the error means "nothing there" rather than "something broke".
    pub fn is_not_found(&self) -> bool {
        matches!(self, GitError::NotFound { .. })
    }

    pub(crate) fn from_git2(err: git2::Error, path: &std::path::Path) -> Self {
        GitError::Repository {
            path: path.to_path_buf(),
            message: err.message().to_string(),
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidOid(msg) => GitError::InvalidOid(msg),
            TypeError::UnknownKind(kind) => GitError::Malformed {
                what: "batch header",
                context: format!("unknown object type '{}'", kind),
            },
        }
    }
}

/// Render up to `EXCERPT_LEN` bytes with non-printables escaped.
fn excerpt(bytes: &[u8]) -> String {
    let mut out: String = bytes
        .iter()
        .take(EXCERPT_LEN)
        .flat_map(|b| std::ascii::escape_default(*b))
        .map(char::from)
        .collect();
    if bytes.len() > EXCERPT_LEN {
        out.push_str("...");
    }
    out
}
