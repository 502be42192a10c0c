//! Lifecycle event types for plan execution

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{ExecutionStatus, Task, TaskResult};

/// Everything observable about a plan run
///
/// `TaskStart`, `TaskComplete` and `Error` are emitted in the order tasks
/// are processed. `PlanStarted` and `PlanFinished` bracket a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PlanEvent {
    PlanStarted {
        project_id: String,
        run_id: Uuid,
        task_count: usize,
    },
    TaskStart {
        project_id: String,
        task: Task,
    },
    TaskComplete {
        project_id: String,
        task: Task,
        result: TaskResult,
    },
    Error {
        project_id: String,
        error: String,
    },
    PlanFinished {
        project_id: String,
        run_id: Uuid,
        status: ExecutionStatus,
        completed: usize,
    },
}

impl PlanEvent {
    pub fn project_id(&self) -> &str {
        match self {
            PlanEvent::PlanStarted { project_id, .. }
            | PlanEvent::TaskStart { project_id, .. }
            | PlanEvent::TaskComplete { project_id, .. }
            | PlanEvent::Error { project_id, .. }
            | PlanEvent::PlanFinished { project_id, .. } => project_id,
        }
    }

    /// Wire name of the event
    pub fn event_type(&self) -> &'static str {
        match self {
            PlanEvent::PlanStarted { .. } => "planStarted",
            PlanEvent::TaskStart { .. } => "taskStart",
            PlanEvent::TaskComplete { .. } => "taskComplete",
            PlanEvent::Error { .. } => "error",
            PlanEvent::PlanFinished { .. } => "planFinished",
        }
    }
}

/// A timestamped event log entry for file persistence
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventLogEntry {
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    pub event: PlanEvent,
}

impl EventLogEntry {
    pub fn new(event: PlanEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_uses_wire_names() {
        let event = PlanEvent::TaskStart {
            project_id: "p1".to_string(),
            task: Task::new("1", "Title", "Desc", "code"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.event_type());
        assert_eq!(json["project_id"], "p1");
        assert_eq!(json["task"]["ownerMode"], "code");

        let back: PlanEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_error_event() {
        let event = PlanEvent::Error {
            project_id: "p2".to_string(),
            error: "boom".to_string(),
        };
        assert_eq!(event.project_id(), "p2");
        assert_eq!(serde_json::to_value(&event).unwrap()["type"], "error");
    }
}
