//! git::command
//!
//! One-shot git subprocesses.
//!
//! Every invocation runs in the repository root with terminal prompts
//! disabled and pathspecs taken literally (`a[1].png` names one file, not a
//! glob). It is bounded by the configured timeout and killed if its future
//! is dropped.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use super::error::GitError;

/// Captured output of a successful git command.
#[derive(Debug, Clone)]
pub struct GitOutput {
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl GitOutput {
    /// Standard output decoded lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// Runs git subcommands against one repository.
#[derive(Debug, Clone)]
pub struct GitRunner {
    root: PathBuf,
    timeout: Duration,
}

impl GitRunner {
    pub fn new(root: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            root: root.into(),
            timeout,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Base command with the environment every git call shares.
    pub(crate) fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("git");
        cmd.args(args)
            .current_dir(&self.root)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_LITERAL_PATHSPECS", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Run `git <args>` and fail on non-zero exit.
    pub async fn run(&self, args: &[&str]) -> Result<GitOutput, GitError> {
        let output = self.run_unchecked(args).await?;
        if output.status.success() {
            Ok(GitOutput {
                stdout: output.stdout,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(command = %args.join(" "), code = ?output.status.code(), %stderr, "git command failed");
            Err(GitError::CommandFailed {
                command: args.join(" "),
                code: output.status.code(),
                stderr,
            })
        }
    }

    /// Run `git <args>` and report only whether it exited zero.
    ///
    /// Used for predicates such as `diff --cached --quiet`.
    pub async fn succeeds(&self, args: &[&str]) -> Result<bool, GitError> {
        Ok(self.run_unchecked(args).await?.status.success())
    }

    async fn run_unchecked(&self, args: &[&str]) -> Result<std::process::Output, GitError> {
        debug!(command = %args.join(" "), root = %self.root.display(), "running git");

        let child = self.command(args).output();
        match tokio::time::timeout(self.timeout, child).await {
            Ok(output) => Ok(output?),
            Err(_) => {
                warn!(command = %args.join(" "), timeout = ?self.timeout, "git command timed out");
                Err(GitError::Timeout {
                    command: args.join(" "),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn init_repo() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::process::Command::new("git")
            .args(["init", "-q"])
            .current_dir(dir.path())
            .status()
            .unwrap();
        dir
    }

    #[tokio::test]
    async fn captures_stdout() {
        let dir = init_repo();
        let git = GitRunner::new(dir.path(), Duration::from_secs(30));
        let out = git.run(&["rev-parse", "--is-inside-work-tree"]).await.unwrap();
        assert_eq!(out.text().trim(), "true");
    }

    #[tokio::test]
    async fn non_zero_exit_is_command_failed() {
        let dir = init_repo();
        let git = GitRunner::new(dir.path(), Duration::from_secs(30));
        let err = git.run(&["rev-parse", "--verify", "nope"]).await.unwrap_err();
        match err {
            GitError::CommandFailed { command, code, .. } => {
                assert_eq!(command, "rev-parse --verify nope");
                assert_eq!(code, Some(128));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn succeeds_reports_exit_status() {
        let dir = init_repo();
        let git = GitRunner::new(dir.path(), Duration::from_secs(30));
        assert!(git.succeeds(&["diff", "--cached", "--quiet"]).await.unwrap());
        assert!(!git.succeeds(&["rev-parse", "--verify", "nope"]).await.unwrap());
    }
}
