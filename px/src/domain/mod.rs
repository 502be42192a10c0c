//! Domain types for PlanExec

mod execution;
mod task;

pub use execution::{ExecutionState, ExecutionStatus};
pub use task::{Plan, Task, TaskResult, TaskStatus};
