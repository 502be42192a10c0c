//! StateManager - actor that owns the per-project execution registry
//!
//! All reads and writes go through one task, so two runs for the same
//! project can never interleave their updates.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{ExecutionState, Task, TaskResult};

use super::messages::{StateCommand, StateError, StateResponse};

/// Handle to send commands to the StateManager
#[derive(Clone)]
pub struct StateManager {
    tx: mpsc::Sender<StateCommand>,
}

impl StateManager {
    /// Spawn a new StateManager actor; requires a tokio runtime
    pub fn spawn() -> Self {
        debug!("StateManager::spawn: called");
        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(actor_loop(rx));
        info!("StateManager spawned");
        Self { tx }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<StateResponse<T>>) -> StateCommand,
    ) -> StateResponse<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    /// Start a run, rejecting it if the project already has one running
    pub async fn begin(&self, project_id: &str) -> StateResponse<Uuid> {
        debug!(%project_id, "begin: called");
        self.request(|reply| StateCommand::Begin {
            project_id: project_id.to_string(),
            reply,
        })
        .await
    }

    pub async fn start_task(&self, project_id: &str, run_id: Uuid, task: &Task) -> StateResponse<()> {
        debug!(%project_id, task_id = %task.id, "start_task: called");
        self.request(|reply| StateCommand::StartTask {
            project_id: project_id.to_string(),
            run_id,
            task: task.clone(),
            reply,
        })
        .await
    }

    pub async fn record_result(
        &self,
        project_id: &str,
        run_id: Uuid,
        task: &Task,
        result: &TaskResult,
    ) -> StateResponse<()> {
        debug!(%project_id, task_id = %task.id, status = %result.status, "record_result: called");
        self.request(|reply| StateCommand::RecordResult {
            project_id: project_id.to_string(),
            run_id,
            task: task.clone(),
            result: result.clone(),
            reply,
        })
        .await
    }

    /// Close a run, marking it failed if `error` is set or a result failed
    pub async fn finish(&self, project_id: &str, run_id: Uuid, error: Option<String>) -> StateResponse<ExecutionState> {
        debug!(%project_id, ?error, "finish: called");
        self.request(|reply| StateCommand::Finish {
            project_id: project_id.to_string(),
            run_id,
            error,
            reply,
        })
        .await
    }

    /// Fail a run that will never call `finish`
    ///
    /// Usable from synchronous code such as `Drop`. A run that already
    /// finished, or was superseded, is left alone.
    pub fn abort(&self, project_id: &str, run_id: Uuid, reason: &str) {
        debug!(%project_id, %run_id, %reason, "abort: called");
        let cmd = StateCommand::Abort {
            project_id: project_id.to_string(),
            run_id,
            reason: reason.to_string(),
        };
        if let Err(e) = self.tx.try_send(cmd) {
            warn!(%project_id, %run_id, error = %e, "Failed to send abort to state manager");
        }
    }

    pub async fn get(&self, project_id: &str) -> StateResponse<Option<ExecutionState>> {
        debug!(%project_id, "get: called");
        self.request(|reply| StateCommand::Get {
            project_id: project_id.to_string(),
            reply,
        })
        .await
    }

    /// States of every project seen so far, ordered by project id
    pub async fn list(&self) -> StateResponse<Vec<ExecutionState>> {
        debug!("list: called");
        self.request(|reply| StateCommand::List { reply }).await
    }

    pub async fn shutdown(&self) -> Result<(), StateError> {
        debug!("shutdown: called");
        self.tx
            .send(StateCommand::Shutdown)
            .await
            .map_err(|_| StateError::ChannelError)
    }
}

/// Look up the state for `run_id`, rejecting superseded runs
fn current_run<'a>(
    states: &'a mut HashMap<String, ExecutionState>,
    project_id: &str,
    run_id: Uuid,
) -> StateResponse<&'a mut ExecutionState> {
    let state = states
        .get_mut(project_id)
        .ok_or_else(|| StateError::NotFound(project_id.to_string()))?;
    if state.run_id != run_id {
        return Err(StateError::StaleRun {
            project_id: project_id.to_string(),
            run_id,
        });
    }
    Ok(state)
}

/// The actor loop that owns the registry and processes commands
async fn actor_loop(mut rx: mpsc::Receiver<StateCommand>) {
    debug!("StateManager actor started");
    let mut states: HashMap<String, ExecutionState> = HashMap::new();

    while let Some(cmd) = rx.recv().await {
        match cmd {
            StateCommand::Begin { project_id, reply } => {
                debug!(%project_id, "actor_loop: Begin command");
                let running = states.get(&project_id).is_some_and(|s| s.is_running());
                let result = if running {
                    Err(StateError::AlreadyRunning(project_id))
                } else {
                    let state = ExecutionState::new(project_id.clone());
                    let run_id = state.run_id;
                    states.insert(project_id, state);
                    Ok(run_id)
                };
                let _ = reply.send(result);
            }

            StateCommand::StartTask {
                project_id,
                run_id,
                task,
                reply,
            } => {
                debug!(%project_id, task_id = %task.id, "actor_loop: StartTask command");
                let result = current_run(&mut states, &project_id, run_id).map(|state| {
                    state.current_task = Some(task);
                });
                let _ = reply.send(result);
            }

            StateCommand::RecordResult {
                project_id,
                run_id,
                task,
                result,
                reply,
            } => {
                debug!(%project_id, task_id = %task.id, "actor_loop: RecordResult command");
                let outcome = current_run(&mut states, &project_id, run_id).map(|state| {
                    state.record(task, result);
                });
                let _ = reply.send(outcome);
            }

            StateCommand::Finish {
                project_id,
                run_id,
                error,
                reply,
            } => {
                debug!(%project_id, "actor_loop: Finish command");
                let result = current_run(&mut states, &project_id, run_id).map(|state| {
                    state.finish(error);
                    state.clone()
                });
                let _ = reply.send(result);
            }

            StateCommand::Abort {
                project_id,
                run_id,
                reason,
            } => {
                debug!(%project_id, "actor_loop: Abort command");
                if let Ok(state) = current_run(&mut states, &project_id, run_id)
                    && state.is_running()
                {
                    info!(%project_id, %run_id, %reason, "Run aborted");
                    state.finish(Some(reason));
                }
            }

            StateCommand::Get { project_id, reply } => {
                let _ = reply.send(Ok(states.get(&project_id).cloned()));
            }

            StateCommand::List { reply } => {
                let mut all: Vec<ExecutionState> = states.values().cloned().collect();
                all.sort_by(|a, b| a.project_id.cmp(&b.project_id));
                let _ = reply.send(Ok(all));
            }

            StateCommand::Shutdown => {
                debug!("actor_loop: Shutdown command");
                break;
            }
        }
    }

    debug!("StateManager actor stopped");
}
