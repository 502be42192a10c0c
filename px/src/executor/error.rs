//! Executor error types

use thiserror::Error;

use crate::domain::TaskResult;
use crate::modes::UnknownMode;
use crate::output::OutputError;
use crate::state::StateError;

/// Why a single task failed; recorded in its [`TaskResult`]
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    UnknownMode(#[from] UnknownMode),

    #[error("{0}")]
    Provider(String),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error("Path escapes workspace: {0}")]
    PathEscape(String),

    #[error("Failed to write {path}: {message}")]
    WriteFailed { path: String, message: String },

    #[error("git {step} failed: {message}")]
    Vcs { step: String, message: String },
}

/// Errors from `execute_tasks`
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Invalid workspace: {0}")]
    InvalidWorkspace(String),

    #[error("Project {0} already has a running plan")]
    AlreadyRunning(String),

    /// A task failed and the plan halted; `results` ends with the failed result
    #[error("Task {task_id} failed: {error}")]
    TaskFailed {
        task_id: String,
        error: String,
        results: Vec<TaskResult>,
    },

    #[error("State error: {0}")]
    State(StateError),
}

impl ExecutorError {
    /// Results collected before the plan stopped
    pub fn partial_results(&self) -> &[TaskResult] {
        match self {
            ExecutorError::TaskFailed { results, .. } => results,
            _ => &[],
        }
    }
}

impl From<StateError> for ExecutorError {
    fn from(e: StateError) -> Self {
        match e {
            StateError::AlreadyRunning(project_id) => ExecutorError::AlreadyRunning(project_id),
            other => ExecutorError::State(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_error_messages() {
        assert_eq!(
            TaskError::from(UnknownMode("qa".into())).to_string(),
            "Unknown mode: qa"
        );
        assert_eq!(
            TaskError::from(OutputError::NoCodeBlocks).to_string(),
            "No code blocks found in response"
        );
        assert_eq!(
            TaskError::PathEscape("../x".into()).to_string(),
            "Path escapes workspace: ../x"
        );
    }

    #[test]
    fn test_state_error_conversion() {
        let err: ExecutorError = StateError::AlreadyRunning("p1".into()).into();
        assert!(matches!(err, ExecutorError::AlreadyRunning(ref p) if p == "p1"));

        let err: ExecutorError = StateError::ChannelError.into();
        assert!(matches!(err, ExecutorError::State(StateError::ChannelError)));
        assert!(err.partial_results().is_empty());
    }
}
