//! Plan lifecycle events
//!
//! The executor emits `taskStart`, `taskComplete` and `error` as each happens,
//! in task order, plus `planStarted`/`planFinished` around every run.
//! Consumers subscribe to the [`EventBus`]; the [`EventLogger`] persists them.
//!
//! ```text
//!   TaskExecutor ──emit──▶ EventBus (tokio broadcast) ──▶ CLI progress output
//!                                                     └─▶ EventLogger (.jsonl)
//! ```

mod bus;
mod logger;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventEmitter};
pub use logger::{EventLogger, read_project_events, spawn_event_logger};
pub use types::{EventLogEntry, PlanEvent};
