//! Plan execution
//!
//! For each task, in order:
//!
//! ```text
//! resolve mode ─▶ build prompt (+ context) ─▶ model call (retry)
//!      ─▶ parse files / document ─▶ write + stage ─▶ commit ─▶ record result
//! ```
//!
//! The first failed task stops the plan.

mod engine;
mod error;

pub use engine::{RUN_ABORTED, TaskExecutor};
pub use error::{ExecutorError, TaskError};
