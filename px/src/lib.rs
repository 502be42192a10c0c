//! PlanExec - sequential executor for AI-generated project plans
//!
//! A plan is an ordered list of tasks, each owned by a mode (plan-manager,
//! architect, code, debug). Every task is turned into a prompt, sent to a
//! model, and the answer is written into the project's git workspace and
//! committed before the next task starts.
//!
//! # Modules
//!
//! - [`executor`] - TaskExecutor, the per-plan orchestration loop
//! - [`workspace`] - per-project directories and their repositories
//! - [`vcs`] - git command runner with retry
//! - [`modes`] - mode to model/template registry
//! - [`output`] - interpreting model output as files
//! - [`llm`] - model provider trait, OpenAI client and a scripted mock
//! - [`state`] - per-project execution state actor
//! - [`events`] - lifecycle event bus and JSONL logger
//! - [`retry`] - exponential backoff
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod cli;
pub mod config;
pub mod domain;
pub mod events;
pub mod executor;
pub mod llm;
pub mod modes;
pub mod output;
pub mod retry;
pub mod state;
pub mod vcs;
pub mod workspace;

// Re-export commonly used types
pub use config::{Config, LlmConfig, WorkspaceConfig};
pub use contextcache::{CacheConfig, ContextCache};
pub use domain::{ExecutionState, ExecutionStatus, Plan, Task, TaskResult, TaskStatus};
pub use events::{EventBus, EventEmitter, EventLogEntry, EventLogger, PlanEvent, spawn_event_logger};
pub use executor::{ExecutorError, TaskError, TaskExecutor};
pub use llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, OpenAIClient, create_client};
pub use modes::{Mode, ModeConfig, ModeRegistry, OutputKind, UnknownMode};
pub use output::{FencedBlockParser, OutputError, OutputParser, ParsedFile};
pub use retry::{RetryError, RetryOptions, RetryPolicy, with_retry};
pub use state::{StateError, StateManager};
pub use vcs::{GitClient, GitCommandResult, GitError};
pub use workspace::{FileStore, LocalFileStore, WorkspaceError, WorkspaceManager, WorkspaceStructure};
