//! File store used for writing model output into a workspace

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

/// Outcome of a write or directory operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOperation {
    pub success: bool,
    pub error: Option<String>,
}

impl FileOperation {
    fn from_io(result: std::io::Result<()>) -> Self {
        match result {
            Ok(()) => Self {
                success: true,
                error: None,
            },
            Err(e) => Self {
                success: false,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Outcome of a read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReadResult {
    pub success: bool,
    pub content: Option<String>,
    pub error: Option<String>,
}

/// Path-based file access; routine I/O errors are reported, not raised
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Write `content`, creating parent directories as needed
    async fn write(&self, path: &Path, content: &str) -> FileOperation;

    async fn read(&self, path: &Path) -> FileReadResult;

    async fn ensure_directory(&self, path: &Path) -> FileOperation;
}

/// [`FileStore`] backed by the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileStore;

#[async_trait]
impl FileStore for LocalFileStore {
    async fn write(&self, path: &Path, content: &str) -> FileOperation {
        debug!(path = %path.display(), bytes = content.len(), "LocalFileStore::write: called");
        if let Some(parent) = path.parent() {
            let created = self.ensure_directory(parent).await;
            if !created.success {
                return created;
            }
        }
        FileOperation::from_io(tokio::fs::write(path, content).await)
    }

    async fn read(&self, path: &Path) -> FileReadResult {
        debug!(path = %path.display(), "LocalFileStore::read: called");
        match tokio::fs::read_to_string(path).await {
            Ok(content) => FileReadResult {
                success: true,
                content: Some(content),
                error: None,
            },
            Err(e) => FileReadResult {
                success: false,
                content: None,
                error: Some(e.to_string()),
            },
        }
    }

    async fn ensure_directory(&self, path: &Path) -> FileOperation {
        FileOperation::from_io(tokio::fs::create_dir_all(path).await)
    }
}

/// Repository metadata directory; never writable through a workspace path
const GIT_DIR: &str = ".git";

/// Resolve a workspace-relative path, refusing anything that could escape `root`
///
/// Absolute paths, `..` components and any `.git` component (in any case)
/// are rejected; `.` components are dropped.
pub fn resolve_in_workspace(root: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    let mut resolved = root.to_path_buf();
    let mut depth = 0usize;

    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                if part.to_str().is_none_or(|name| name.eq_ignore_ascii_case(GIT_DIR)) {
                    return None;
                }
                resolved.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    (depth > 0).then_some(resolved)
}
