//! Per-project execution state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Task, TaskResult};

/// Status of one `execute_tasks` invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// State of the latest plan run for a project
///
/// `results` is parallel to `completed_tasks`: both include the failing task
/// when a run fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionState {
    pub run_id: Uuid,
    pub project_id: String,
    pub status: ExecutionStatus,
    pub current_task: Option<Task>,
    pub completed_tasks: Vec<Task>,
    pub results: Vec<TaskResult>,
    pub failed: bool,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ExecutionState {
    /// Fresh running state
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            project_id: project_id.into(),
            status: ExecutionStatus::Running,
            current_task: None,
            completed_tasks: Vec::new(),
            results: Vec::new(),
            failed: false,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == ExecutionStatus::Running
    }

    /// Append a finished task; a failed result marks the run failed
    pub fn record(&mut self, task: Task, result: TaskResult) {
        if result.is_failed() {
            self.failed = true;
            self.error = result.error.clone();
        }
        self.completed_tasks.push(task);
        self.results.push(result);
    }

    /// Close the run
    pub fn finish(&mut self, error: Option<String>) {
        if let Some(error) = error {
            self.failed = true;
            self.error = Some(error);
        }
        self.status = if self.failed {
            ExecutionStatus::Failed
        } else {
            ExecutionStatus::Completed
        };
        self.current_task = None;
        self.finished_at = Some(Utc::now());
    }
}
