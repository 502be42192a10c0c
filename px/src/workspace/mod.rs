//! Per-project workspaces
//!
//! Each project gets a directory under the workspace root holding its own git
//! repository. Model output is written through a [`FileStore`] and committed
//! with a [`GitClient`](crate::vcs::GitClient) from [`WorkspaceManager::git_client`].

mod files;
mod manager;

pub use files::{FileOperation, FileReadResult, FileStore, LocalFileStore, resolve_in_workspace};
pub use manager::{InitialFile, WorkspaceError, WorkspaceManager, WorkspaceStructure};
