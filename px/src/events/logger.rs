//! Event Logger - persists lifecycle events to JSONL files
//!
//! Subscribes to the [`EventBus`] and appends every event to
//! `{log_dir}/{project-id}/events.jsonl`.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use super::bus::EventBus;
use super::types::{EventLogEntry, PlanEvent};

/// Writes events to per-project JSONL files
pub struct EventLogger {
    log_dir: PathBuf,
    writers: HashMap<String, BufWriter<File>>,
}

impl EventLogger {
    pub fn new(log_dir: impl AsRef<Path>) -> Self {
        let log_dir = log_dir.as_ref().to_path_buf();
        debug!(?log_dir, "EventLogger::new: creating logger");
        Self {
            log_dir,
            writers: HashMap::new(),
        }
    }

    /// Append one event to its project's log file
    pub fn write_event(&mut self, event: &PlanEvent) -> eyre::Result<()> {
        let project_id = event.project_id();
        debug!(%project_id, event_type = event.event_type(), "EventLogger::write_event");

        if !self.writers.contains_key(project_id) {
            let project_dir = self.log_dir.join(project_id);
            fs::create_dir_all(&project_dir)?;

            let log_path = project_dir.join("events.jsonl");
            debug!(?log_path, "EventLogger: opening log file");
            let file = OpenOptions::new().create(true).append(true).open(&log_path)?;
            self.writers.insert(project_id.to_string(), BufWriter::new(file));
        }

        let writer = self
            .writers
            .get_mut(project_id)
            .ok_or_else(|| eyre::eyre!("No writer for project {}", project_id))?;

        let json = serde_json::to_string(&EventLogEntry::new(event.clone()))?;
        writeln!(writer, "{}", json)?;
        writer.flush()?;

        Ok(())
    }

    /// Drop the writer for a project whose run has finished
    pub fn close_project(&mut self, project_id: &str) {
        debug!(%project_id, "EventLogger::close_project");
        if let Some(mut writer) = self.writers.remove(project_id) {
            let _ = writer.flush();
        }
    }

    /// Consume events from `rx` until the bus closes
    pub async fn run(mut self, mut rx: broadcast::Receiver<PlanEvent>) {
        debug!("EventLogger::run: starting event logger");

        loop {
            match rx.recv().await {
                Ok(event) => {
                    let project_id = event.project_id().to_string();
                    let finished = matches!(event, PlanEvent::PlanFinished { .. });

                    if let Err(e) = self.write_event(&event) {
                        error!(%project_id, error = %e, "EventLogger: failed to write event");
                    }

                    if finished {
                        self.close_project(&project_id);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(missed = n, "EventLogger: lagged behind, missed events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("EventLogger: channel closed, shutting down");
                    break;
                }
            }
        }

        for (project_id, mut writer) in self.writers.drain() {
            debug!(%project_id, "EventLogger: flushing writer on shutdown");
            let _ = writer.flush();
        }
    }
}

/// Read back a project's event log
pub fn read_project_events(log_dir: impl AsRef<Path>, project_id: &str) -> eyre::Result<Vec<EventLogEntry>> {
    let log_path = log_dir.as_ref().join(project_id).join("events.jsonl");
    debug!(?log_path, "read_project_events: reading log file");

    if !log_path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(&log_path)?;
    let mut entries = Vec::new();

    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<EventLogEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                warn!(line, error = %e, "read_project_events: failed to parse line");
            }
        }
    }

    Ok(entries)
}

/// Spawn the logger as a background task subscribed to `bus`
///
/// The subscription is taken before returning, so no event emitted after this
/// call is missed.
pub fn spawn_event_logger(bus: &EventBus, log_dir: impl AsRef<Path>) -> tokio::task::JoinHandle<()> {
    let logger = EventLogger::new(log_dir);
    let rx = bus.subscribe();
    tokio::spawn(logger.run(rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Task, TaskResult};
    use tempfile::tempdir;

    fn error_event(project_id: &str, message: &str) -> PlanEvent {
        PlanEvent::Error {
            project_id: project_id.to_string(),
            error: message.to_string(),
        }
    }

    #[test]
    fn test_write_and_read_events() {
        let temp = tempdir().unwrap();
        let mut logger = EventLogger::new(temp.path());
        let task = Task::new("1", "T", "D", "code");

        logger
            .write_event(&PlanEvent::TaskStart {
                project_id: "p1".to_string(),
                task: task.clone(),
            })
            .unwrap();
        logger
            .write_event(&PlanEvent::TaskComplete {
                project_id: "p1".to_string(),
                task,
                result: TaskResult::completed("1", "ok"),
            })
            .unwrap();

        let log_path = temp.path().join("p1").join("events.jsonl");
        assert_eq!(fs::read_to_string(&log_path).unwrap().lines().count(), 2);

        let entries = read_project_events(temp.path(), "p1").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event.event_type(), "taskStart");
        assert_eq!(entries[1].event.event_type(), "taskComplete");
    }

    #[test]
    fn test_projects_get_separate_files() {
        let temp = tempdir().unwrap();
        let mut logger = EventLogger::new(temp.path());

        logger.write_event(&error_event("p1", "a")).unwrap();
        logger.write_event(&error_event("p2", "b")).unwrap();

        assert!(temp.path().join("p1").join("events.jsonl").exists());
        assert!(temp.path().join("p2").join("events.jsonl").exists());
    }

    #[test]
    fn test_close_project() {
        let temp = tempdir().unwrap();
        let mut logger = EventLogger::new(temp.path());

        logger.write_event(&error_event("p1", "a")).unwrap();
        assert!(logger.writers.contains_key("p1"));
        logger.close_project("p1");
        assert!(!logger.writers.contains_key("p1"));
    }

    #[test]
    fn test_read_missing_project() {
        let temp = tempdir().unwrap();
        assert!(read_project_events(temp.path(), "nope").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_spawned_logger_drains_until_bus_closes() {
        let temp = tempdir().unwrap();
        let bus = EventBus::new(16);
        let handle = spawn_event_logger(&bus, temp.path());

        bus.emitter_for("p1").error("first");
        bus.emitter_for("p1").error("second");
        drop(bus);
        handle.await.unwrap();

        let entries = read_project_events(temp.path(), "p1").unwrap();
        assert_eq!(entries.len(), 2);
    }
}
