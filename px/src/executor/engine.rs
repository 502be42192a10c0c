//! TaskExecutor - runs a plan's tasks in order against a project workspace

use std::path::{Path, PathBuf};
use std::sync::Arc;

use contextcache::ContextCache;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::{ExecutorError, TaskError};
use crate::domain::{Task, TaskResult};
use crate::events::EventBus;
use crate::llm::{CompletionRequest, LlmClient, LlmError};
use crate::modes::{ModeRegistry, OutputKind};
use crate::output::{FencedBlockParser, OutputParser, ParsedFile, doc_path};
use crate::retry::{RetryOptions, RetryPolicy};
use crate::state::StateManager;
use crate::vcs::GitClient;
use crate::workspace::{FileStore, LocalFileStore, WorkspaceManager, resolve_in_workspace};

const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Error recorded for a run whose future was dropped before it finished
pub const RUN_ABORTED: &str = "Run aborted";

/// Fails the run in the state registry unless disarmed
///
/// Held for the whole of `execute_tasks`, so a cancelled future or an early
/// return never leaves the project marked running.
struct RunGuard {
    state: StateManager,
    project_id: String,
    run_id: Uuid,
    armed: bool,
}

impl RunGuard {
    fn new(state: &StateManager, project_id: &str, run_id: Uuid) -> Self {
        Self {
            state: state.clone(),
            project_id: project_id.to_string(),
            run_id,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if self.armed {
            warn!(project_id = %self.project_id, run_id = %self.run_id, "Run ended without finishing");
            self.state.abort(&self.project_id, self.run_id, RUN_ABORTED);
        }
    }
}

/// Sequential plan executor
///
/// One instance serves every project. Runs for different projects proceed
/// independently; a second run for a project that is still running is
/// rejected.
pub struct TaskExecutor {
    workspaces: Arc<WorkspaceManager>,
    llm: Arc<dyn LlmClient>,
    state: StateManager,
    modes: ModeRegistry,
    parser: Arc<dyn OutputParser>,
    files: Arc<dyn FileStore>,
    context: Option<Arc<ContextCache>>,
    events: EventBus,
    llm_retry: RetryPolicy,
    max_tokens: u32,
}

impl TaskExecutor {
    /// Executor with built-in modes, the fenced-block parser and local files
    pub fn new(workspaces: Arc<WorkspaceManager>, llm: Arc<dyn LlmClient>, state: StateManager) -> Self {
        debug!(root = %workspaces.root_dir().display(), "TaskExecutor::new: called");
        Self {
            workspaces,
            llm,
            state,
            modes: ModeRegistry::default(),
            parser: Arc::new(FencedBlockParser),
            files: Arc::new(LocalFileStore),
            context: None,
            events: EventBus::default(),
            llm_retry: RetryPolicy::default(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_modes(mut self, modes: ModeRegistry) -> Self {
        self.modes = modes;
        self
    }

    pub fn with_parser(mut self, parser: Arc<dyn OutputParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_file_store(mut self, files: Arc<dyn FileStore>) -> Self {
        self.files = files;
        self
    }

    /// Augment prompts with snippets from the workspace
    pub fn with_context_cache(mut self, cache: Arc<ContextCache>) -> Self {
        self.context = Some(cache);
        self
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Backoff for model calls
    pub fn with_llm_retry(mut self, options: RetryOptions) -> Self {
        self.llm_retry = RetryPolicy::new(options);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn state(&self) -> &StateManager {
        &self.state
    }

    /// Run `tasks` in order for `project_id`
    ///
    /// Returns every result when all tasks complete. The first failed task
    /// halts the plan; its result is recorded and the error carries all
    /// results so far. Dropping the future before it resolves fails the run
    /// with [`RUN_ABORTED`].
    pub async fn execute_tasks(&self, project_id: &str, tasks: &[Task]) -> Result<Vec<TaskResult>, ExecutorError> {
        debug!(%project_id, task_count = tasks.len(), "TaskExecutor::execute_tasks: called");
        let run_id = self.state.begin(project_id).await?;
        let mut guard = RunGuard::new(&self.state, project_id, run_id);
        let emitter = self.events.emitter_for(project_id);

        if !self.workspaces.validate(project_id).await {
            let error = ExecutorError::InvalidWorkspace(project_id.to_string());
            warn!(%project_id, "Refusing to run plan: invalid workspace");
            let state = self.state.finish(project_id, run_id, Some(error.to_string())).await?;
            guard.disarm();
            emitter.error(&error.to_string());
            emitter.plan_finished(run_id, state.status, 0);
            return Err(error);
        }

        info!(%project_id, %run_id, tasks = tasks.len(), "Starting plan");
        emitter.plan_started(run_id, tasks.len());

        let workspace = self.workspaces.get_workspace_path(project_id);
        let git = self.workspaces.git_client(project_id);
        self.refresh_context(project_id, &workspace).await;

        let mut results = Vec::with_capacity(tasks.len());
        for task in tasks {
            self.state.start_task(project_id, run_id, task).await?;
            emitter.task_start(task);

            let result = match self.execute_task(project_id, task, &workspace, &git).await {
                Ok(output) => {
                    info!(%project_id, task_id = %task.id, "Task completed");
                    TaskResult::completed(&task.id, output)
                }
                Err(e) => {
                    warn!(%project_id, task_id = %task.id, error = %e, "Task failed");
                    TaskResult::failed(&task.id, e.to_string())
                }
            };

            self.state.record_result(project_id, run_id, task, &result).await?;
            results.push(result.clone());
            emitter.task_complete(task, &result);

            if result.is_failed() {
                break;
            }
        }

        let state = self.state.finish(project_id, run_id, None).await?;
        guard.disarm();

        if let Some(failed) = results.last().filter(|r| r.is_failed()) {
            let task_id = failed.task_id.clone();
            let error = failed.error.clone().unwrap_or_default();
            emitter.error(&error);
            emitter.plan_finished(run_id, state.status, results.len());
            return Err(ExecutorError::TaskFailed {
                task_id,
                error,
                results,
            });
        }

        info!(%project_id, %run_id, "Plan completed");
        emitter.plan_finished(run_id, state.status, results.len());
        Ok(results)
    }

    /// Prompt, call the model, write and commit; returns the raw model output
    async fn execute_task(
        &self,
        project_id: &str,
        task: &Task,
        workspace: &Path,
        git: &GitClient,
    ) -> Result<String, TaskError> {
        debug!(task_id = %task.id, mode = %task.owner_mode, "TaskExecutor::execute_task: called");
        let (mode, config) = self.modes.resolve(&task.owner_mode)?;

        let prompt = self.augment_prompt(project_id, &task.description, config.build_prompt(&task.description));
        let output = self.complete(&config.model, prompt).await?;

        let files = match mode.output_kind() {
            OutputKind::Files => self.parser.parse(&output)?,
            OutputKind::Document => vec![ParsedFile {
                path: doc_path(&task.id, &task.title),
                content: output.clone(),
            }],
        };

        let targets = files
            .iter()
            .map(|file| {
                resolve_in_workspace(workspace, &file.path).ok_or_else(|| TaskError::PathEscape(file.path.clone()))
            })
            .collect::<Result<Vec<PathBuf>, _>>()?;

        for (file, target) in files.iter().zip(&targets) {
            let written = self.files.write(target, &file.content).await;
            if !written.success {
                return Err(TaskError::WriteFailed {
                    path: file.path.clone(),
                    message: written.error.unwrap_or_default(),
                });
            }
            git.stage(&file.path).await.into_result().map_err(|e| TaskError::Vcs {
                step: "add".to_string(),
                message: e.to_string(),
            })?;
        }
        debug!(task_id = %task.id, files = files.len(), "TaskExecutor::execute_task: files staged");

        if git.has_changes().await {
            let message = format!("Task {}: {}", task.id, task.title);
            git.commit(&message).await.into_result().map_err(|e| TaskError::Vcs {
                step: "commit".to_string(),
                message: e.to_string(),
            })?;
            debug!(task_id = %task.id, "TaskExecutor::execute_task: committed");
        } else {
            debug!(task_id = %task.id, "TaskExecutor::execute_task: nothing to commit");
        }

        Ok(output)
    }

    /// One model call through the retry policy; empty output is a failure
    async fn complete(&self, model: &str, prompt: String) -> Result<String, TaskError> {
        let request = CompletionRequest::new(model, prompt, self.max_tokens);
        let llm = &self.llm;

        self.llm_retry
            .run_with(
                || {
                    let request = request.clone();
                    async move {
                        let response = llm.complete(request).await?;
                        response.content.filter(|c| !c.is_empty()).ok_or(LlmError::NoContent)
                    }
                },
                LlmError::is_retryable,
                LlmError::retry_after,
            )
            .await
            .map_err(|e| {
                debug!(attempts = e.attempts, "TaskExecutor::complete: giving up");
                TaskError::Provider(e.into_inner().to_string())
            })
    }

    /// Prefix `prompt` with relevant workspace snippets, if any
    fn augment_prompt(&self, project_id: &str, query: &str, prompt: String) -> String {
        let Some(cache) = self.context.as_ref().filter(|c| c.config().enabled) else {
            return prompt;
        };

        let context = cache.generate_context_string(project_id, query, cache.config().max_chunks);
        if context.is_empty() {
            debug!(%project_id, "TaskExecutor::augment_prompt: no relevant context");
            return prompt;
        }

        format!(
            "{}\n\nWith the above context in mind, please respond to the following:\n\n{}",
            context, prompt
        )
    }

    /// Re-index the workspace; failures only lose augmentation
    async fn refresh_context(&self, project_id: &str, workspace: &Path) {
        let Some(cache) = self.context.as_ref().filter(|c| c.config().enabled) else {
            return;
        };

        let cache = Arc::clone(cache);
        let id = project_id.to_string();
        let root = workspace.to_path_buf();
        match tokio::task::spawn_blocking(move || cache.index_project(&id, &root)).await {
            Ok(Ok(chunks)) => debug!(%project_id, chunks, "TaskExecutor::refresh_context: indexed"),
            Ok(Err(e)) => warn!(%project_id, error = %e, "Context indexing failed"),
            Err(e) => warn!(%project_id, error = %e, "Context indexing task panicked"),
        }
    }
}
