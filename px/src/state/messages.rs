//! State manager messages
//!
//! Commands and responses for the actor pattern.

use thiserror::Error;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::domain::{ExecutionState, Task, TaskResult};

/// Errors from state operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("Project {0} already has a running plan")]
    AlreadyRunning(String),

    #[error("No execution state for project {0}")]
    NotFound(String),

    #[error("Run {run_id} is no longer current for project {project_id}")]
    StaleRun { project_id: String, run_id: Uuid },

    #[error("Channel error")]
    ChannelError,
}

/// Response from state operations
pub type StateResponse<T> = Result<T, StateError>;

/// Commands sent to the StateManager actor
#[derive(Debug)]
pub enum StateCommand {
    /// Replace the project's state with a fresh running one
    Begin {
        project_id: String,
        reply: oneshot::Sender<StateResponse<Uuid>>,
    },
    StartTask {
        project_id: String,
        run_id: Uuid,
        task: Task,
        reply: oneshot::Sender<StateResponse<()>>,
    },
    RecordResult {
        project_id: String,
        run_id: Uuid,
        task: Task,
        result: TaskResult,
        reply: oneshot::Sender<StateResponse<()>>,
    },
    Finish {
        project_id: String,
        run_id: Uuid,
        error: Option<String>,
        reply: oneshot::Sender<StateResponse<ExecutionState>>,
    },
    /// Fail the run if it is still current and running; no reply
    Abort {
        project_id: String,
        run_id: Uuid,
        reason: String,
    },
    Get {
        project_id: String,
        reply: oneshot::Sender<StateResponse<Option<ExecutionState>>>,
    },
    List {
        reply: oneshot::Sender<StateResponse<Vec<ExecutionState>>>,
    },
    Shutdown,
}
