//! Git command client

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, warn};

use crate::retry::{RetryOptions, RetryPolicy};

/// stderr fragments git prints on success that are not failures
const BENIGN_STDERR: &[&str] = &[
    "warning: LF will be replaced by CRLF",
    "warning: in the working copy of",
    "warning: The file will have its original line endings",
    "Switched to a new branch",
    "Switched to branch",
    "Already on",
];

/// Errors from git invocations
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("Failed to run git: {0}")]
    Spawn(String),

    #[error("git {command} exited with {code}: {stderr}")]
    Exit { command: String, code: i32, stderr: String },

    #[error("Git command failed: {0}")]
    CommandFailed(String),
}

/// Outcome of one git command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCommandResult {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
}

impl GitCommandResult {
    fn ok(output: String) -> Self {
        Self {
            success: true,
            output,
            error: None,
        }
    }

    fn failed(output: String, error: String) -> Self {
        Self {
            success: false,
            output,
            error: Some(error),
        }
    }

    /// Convert to a `Result`, yielding stdout on success
    pub fn into_result(self) -> Result<String, GitError> {
        if self.success {
            Ok(self.output)
        } else {
            Err(GitError::CommandFailed(
                self.error.unwrap_or_else(|| "unknown error".to_string()),
            ))
        }
    }
}

/// True if `stderr` only carries warnings git emits on successful commands
pub fn is_benign_warning(stderr: &str) -> bool {
    BENIGN_STDERR.iter().any(|w| stderr.contains(w))
}

/// Git client bound to a working directory
#[derive(Debug, Clone)]
pub struct GitClient {
    working_dir: PathBuf,
    program: String,
    retry: RetryPolicy,
    global_config: Option<PathBuf>,
}

impl GitClient {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        let working_dir = working_dir.into();
        debug!(?working_dir, "GitClient::new: called");
        Self {
            working_dir,
            program: "git".to_string(),
            retry: RetryPolicy::new(RetryOptions {
                max_delay_ms: 5000,
                ..Default::default()
            }),
            global_config: None,
        }
    }

    pub fn with_retry(mut self, options: RetryOptions) -> Self {
        self.retry = RetryPolicy::new(options);
        self
    }

    /// Point `GIT_CONFIG_GLOBAL` at a shared config file for every invocation
    pub fn with_global_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_config = Some(path.into());
        self
    }

    /// Use a different executable (tests substitute a script)
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Run `git <command> <args...>` with retries
    ///
    /// A non-zero exit is retried. Once the command exits successfully, any
    /// stderr output other than known benign warnings marks the result failed.
    pub async fn execute_command(&self, command: &str, args: &[&str]) -> GitCommandResult {
        debug!(%command, ?args, dir = %self.working_dir.display(), "GitClient::execute_command: called");

        match self.retry.run(|| self.run_once(command, args)).await {
            Ok((stdout, stderr)) => {
                if !stderr.trim().is_empty() && !is_benign_warning(&stderr) {
                    debug!(%command, %stderr, "GitClient::execute_command: unexpected stderr");
                    GitCommandResult::failed(stdout, stderr)
                } else {
                    GitCommandResult::ok(stdout)
                }
            }
            Err(e) => {
                warn!(%command, error = %e, "git command failed");
                GitCommandResult::failed(String::new(), e.to_string())
            }
        }
    }

    async fn run_once(&self, command: &str, args: &[&str]) -> Result<(String, String), GitError> {
        let mut cmd = Command::new(&self.program);
        cmd.arg(command).args(args).current_dir(&self.working_dir);
        if let Some(config) = &self.global_config {
            cmd.env("GIT_CONFIG_GLOBAL", config);
        }

        let output = cmd.output().await.map_err(|e| GitError::Spawn(e.to_string()))?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(GitError::Exit {
                command: command.to_string(),
                code: output.status.code().unwrap_or(-1),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok((stdout, stderr))
    }

    pub async fn init(&self) -> GitCommandResult {
        self.execute_command("init", &[]).await
    }

    pub async fn stage(&self, path: &str) -> GitCommandResult {
        self.execute_command("add", &[path]).await
    }

    pub async fn commit(&self, message: &str) -> GitCommandResult {
        self.execute_command("commit", &["-m", message]).await
    }

    /// Commit even when nothing is staged
    pub async fn commit_allow_empty(&self, message: &str) -> GitCommandResult {
        self.execute_command("commit", &["--allow-empty", "-m", message]).await
    }

    pub async fn add_config(&self, key: &str, value: &str) -> GitCommandResult {
        self.execute_command("config", &[key, value]).await
    }

    /// True iff `status --porcelain` reports anything
    pub async fn has_changes(&self) -> bool {
        let result = self.execute_command("status", &["--porcelain"]).await;
        result.success && !result.output.trim().is_empty()
    }

    /// Current branch name, `main` if it cannot be determined
    pub async fn get_current_branch(&self) -> String {
        let result = self.execute_command("rev-parse", &["--abbrev-ref", "HEAD"]).await;
        let name = result.output.trim();
        if result.success && !name.is_empty() {
            name.to_string()
        } else {
            "main".to_string()
        }
    }

    pub async fn create_branch(&self, name: &str) -> GitCommandResult {
        self.execute_command("checkout", &["-b", name]).await
    }

    pub async fn switch_branch(&self, name: &str) -> GitCommandResult {
        self.execute_command("checkout", &[name]).await
    }

    pub async fn pull(&self) -> GitCommandResult {
        self.execute_command("pull", &[]).await
    }

    /// Push `branch` (or the current branch) to `origin`
    pub async fn push(&self, branch: Option<&str>) -> GitCommandResult {
        let branch = match branch {
            Some(b) => b.to_string(),
            None => self.get_current_branch().await,
        };
        self.execute_command("push", &["origin", &branch]).await
    }

    pub async fn reset(&self, hard: bool) -> GitCommandResult {
        let args: &[&str] = if hard { &["--hard"] } else { &[] };
        self.execute_command("reset", args).await
    }

    pub async fn clean(&self) -> GitCommandResult {
        self.execute_command("clean", &["-fd"]).await
    }
}
