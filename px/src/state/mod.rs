//! Execution state with actor pattern
//!
//! StateManager owns the per-project ExecutionState registry and processes
//! messages via channels. State lives in memory only.

mod manager;
mod messages;

pub use manager::StateManager;
pub use messages::{StateCommand, StateError, StateResponse};
