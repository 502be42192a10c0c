//! Core ContextCache implementation

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::chunk::{CodeChunk, chunk_lines};
use crate::config::CacheConfig;
use crate::rank::{score, tokenize};

/// Errors from indexing a project
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Project path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Invalid include pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

/// Indexed chunks for one project
#[derive(Debug, Clone)]
pub struct ProjectContext {
    pub project_id: String,
    pub chunks: Vec<CodeChunk>,
    pub last_updated: DateTime<Utc>,
}

/// Process-wide cache of project contexts, keyed by project id
pub struct ContextCache {
    config: CacheConfig,
    contexts: RwLock<HashMap<String, ProjectContext>>,
}

impl ContextCache {
    pub fn new(config: CacheConfig) -> Self {
        debug!(?config, "ContextCache::new: called");
        Self {
            config,
            contexts: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Read, chunk and cache every matching file under `project_path`
    ///
    /// Files that cannot be read are logged and skipped. The previous entry for
    /// `project_id` is replaced only after the whole tree has been processed.
    /// Returns the number of chunks stored.
    pub fn index_project(&self, project_id: &str, project_path: impl AsRef<Path>) -> Result<usize, ContextError> {
        let root = project_path.as_ref();
        debug!(%project_id, ?root, "ContextCache::index_project: called");

        if !root.is_dir() {
            return Err(ContextError::NotADirectory(root.to_path_buf()));
        }

        let patterns = self
            .config
            .include
            .iter()
            .map(|p| {
                glob::Pattern::new(p).map_err(|e| ContextError::InvalidPattern {
                    pattern: p.clone(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut chunks = Vec::new();
        let mut file_count = 0usize;

        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !self.is_excluded_dir(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(%project_id, error = %e, "Skipping unreadable path while indexing");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            if !patterns.iter().any(|p| p.matches_path(relative)) {
                continue;
            }

            match fs::read_to_string(entry.path()) {
                Ok(content) => {
                    let rel = relative.to_string_lossy();
                    chunks.extend(chunk_lines(&rel, &content, self.config.chunk_size));
                    file_count += 1;
                }
                Err(e) => {
                    warn!(%project_id, path = %entry.path().display(), error = %e, "Error processing file");
                }
            }
        }

        let chunk_count = chunks.len();
        self.write().insert(
            project_id.to_string(),
            ProjectContext {
                project_id: project_id.to_string(),
                chunks,
                last_updated: Utc::now(),
            },
        );

        info!(%project_id, file_count, chunk_count, "Indexing complete");
        Ok(chunk_count)
    }

    /// Top `max_chunks` chunks by term-occurrence score
    ///
    /// Ties keep indexing order. Returns an empty list when the project has not
    /// been indexed.
    pub fn find_relevant_chunks(&self, project_id: &str, prompt: &str, max_chunks: usize) -> Vec<CodeChunk> {
        debug!(%project_id, max_chunks, "ContextCache::find_relevant_chunks: called");
        let contexts = self.read();
        let Some(context) = contexts.get(project_id) else {
            debug!(%project_id, "ContextCache::find_relevant_chunks: project not indexed");
            return Vec::new();
        };

        let terms = tokenize(prompt);
        let mut scored: Vec<(usize, &CodeChunk)> = context
            .chunks
            .iter()
            .map(|chunk| (score(&chunk.content, &terms), chunk))
            .collect();

        // stable: equal scores keep their original order
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        scored
            .into_iter()
            .take(max_chunks)
            .map(|(_, chunk)| chunk.clone())
            .collect()
    }

    /// Render the relevant chunks as a prompt preamble, or `""` if there are none
    pub fn generate_context_string(&self, project_id: &str, prompt: &str, max_chunks: usize) -> String {
        let chunks = self.find_relevant_chunks(project_id, prompt, max_chunks);
        if chunks.is_empty() {
            return String::new();
        }

        let mut out = String::from("Here are some relevant code snippets from the project:\n\n");
        for chunk in &chunks {
            out.push_str(&format!(
                "File: {} (lines {}-{}):\n",
                chunk.file_path,
                chunk.start_line + 1,
                chunk.end_line
            ));
            out.push_str("```\n");
            out.push_str(&chunk.content);
            out.push_str("\n```\n\n");
        }
        out
    }

    pub fn is_project_indexed(&self, project_id: &str) -> bool {
        self.read().contains_key(project_id)
    }

    /// Snapshot of a project's cached context
    pub fn project_context(&self, project_id: &str) -> Option<ProjectContext> {
        self.read().get(project_id).cloned()
    }

    pub fn clear_project_cache(&self, project_id: &str) {
        debug!(%project_id, "ContextCache::clear_project_cache: called");
        self.write().remove(project_id);
    }

    pub fn clear_all_caches(&self) {
        debug!("ContextCache::clear_all_caches: called");
        self.write().clear();
    }

    fn is_excluded_dir(&self, entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| self.config.exclude_dirs.iter().any(|d| d == name))
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, ProjectContext>> {
        self.contexts.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ProjectContext>> {
        self.contexts.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ContextCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
