//! Task, TaskResult and Plan domain types

use serde::{Deserialize, Serialize};

/// A unit of work owned by one mode
///
/// `dependencies` is carried through but not used for ordering; tasks run in
/// list order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,

    /// Mode name as submitted; resolved when the task runs
    #[serde(rename = "ownerMode", alias = "owner-mode", alias = "owner_mode")]
    pub owner_mode: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<String>>,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        owner_mode: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            owner_mode: owner_mode.into(),
            dependencies: None,
        }
    }
}

/// Task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of one attempted task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    #[serde(rename = "taskId")]
    pub task_id: String,
    pub status: TaskStatus,

    /// Raw model output on success, empty on failure
    pub output: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskResult {
    /// Placeholder while the task runs
    pub fn in_progress(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            status: TaskStatus::InProgress,
            output: "Task execution in progress".to_string(),
            error: None,
        }
    }

    pub fn completed(task_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Completed,
            output: output.into(),
            error: None,
        }
    }

    pub fn failed(task_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Failed,
            output: String::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == TaskStatus::Failed
    }
}

/// An ordered task list for one project
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub tasks: Vec<Task>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PlanDocument {
    Plan(Plan),
    Tasks(Vec<Task>),
}

impl Plan {
    /// Parse a plan from JSON or YAML, either `{ tasks: [...] }` or a bare list
    pub fn parse(text: &str) -> Result<Self, serde_yaml::Error> {
        let doc: PlanDocument = serde_yaml::from_str(text)?;
        Ok(match doc {
            PlanDocument::Plan(plan) => plan,
            PlanDocument::Tasks(tasks) => Plan {
                description: None,
                tasks,
            },
        })
    }
}
