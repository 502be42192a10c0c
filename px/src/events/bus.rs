//! Event Bus - pub/sub for plan lifecycle events
//!
//! The EventBus uses a tokio broadcast channel. The executor emits, reporting
//! layers (CLI output, the JSONL logger) subscribe.

use tokio::sync::broadcast;
use tracing::debug;

use super::types::PlanEvent;
use crate::domain::{ExecutionStatus, Task, TaskResult};

/// Default channel capacity (events)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Central event bus
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlanEvent>,
}

impl EventBus {
    /// Create a new event bus with the given capacity
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "EventBus::new: creating event bus");
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Emit an event to all subscribers
    ///
    /// Fire-and-forget: with no subscribers the event is dropped.
    pub fn emit(&self, event: PlanEvent) {
        debug!(
            event_type = event.event_type(),
            project_id = event.project_id(),
            "EventBus::emit"
        );
        let _ = self.tx.send(event);
    }

    /// Receive every event emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<PlanEvent> {
        debug!("EventBus::subscribe: new subscriber");
        self.tx.subscribe()
    }

    /// Emitter bound to one project
    pub fn emitter_for(&self, project_id: impl Into<String>) -> EventEmitter {
        EventEmitter {
            tx: self.tx.clone(),
            project_id: project_id.into(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Handle for emitting one project's events
#[derive(Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<PlanEvent>,
    project_id: String,
}

impl EventEmitter {
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn emit(&self, event: PlanEvent) {
        debug!(event_type = event.event_type(), "EventEmitter::emit");
        let _ = self.tx.send(event);
    }

    pub fn plan_started(&self, run_id: uuid::Uuid, task_count: usize) {
        self.emit(PlanEvent::PlanStarted {
            project_id: self.project_id.clone(),
            run_id,
            task_count,
        });
    }

    pub fn task_start(&self, task: &Task) {
        self.emit(PlanEvent::TaskStart {
            project_id: self.project_id.clone(),
            task: task.clone(),
        });
    }

    pub fn task_complete(&self, task: &Task, result: &TaskResult) {
        self.emit(PlanEvent::TaskComplete {
            project_id: self.project_id.clone(),
            task: task.clone(),
            result: result.clone(),
        });
    }

    pub fn error(&self, error: &str) {
        self.emit(PlanEvent::Error {
            project_id: self.project_id.clone(),
            error: error.to_string(),
        });
    }

    pub fn plan_finished(&self, run_id: uuid::Uuid, status: ExecutionStatus, completed: usize) {
        self.emit(PlanEvent::PlanFinished {
            project_id: self.project_id.clone(),
            run_id,
            status,
            completed,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn test_event_bus_subscribe() {
        let bus = EventBus::new(16);
        assert_eq!(bus.subscriber_count(), 0);
        let _rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(16);
        bus.emitter_for("p1").error("nobody listening");
    }

    #[tokio::test]
    async fn test_emitter_order_and_project() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let emitter = bus.emitter_for("p1");
        let task = Task::new("1", "T", "D", "code");

        emitter.task_start(&task);
        emitter.task_complete(&task, &TaskResult::failed("1", "boom"));
        emitter.error("boom");

        let types: Vec<&str> = [
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
        ]
        .iter()
        .map(|e| {
            assert_eq!(e.project_id(), "p1");
            e.event_type()
        })
        .collect();
        assert_eq!(types, vec!["taskStart", "taskComplete", "error"]);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emitter_for("p1").plan_started(uuid::Uuid::now_v7(), 2);

        assert_eq!(rx1.recv().await.unwrap().event_type(), "planStarted");
        assert_eq!(rx2.recv().await.unwrap().event_type(), "planStarted");
    }
}
