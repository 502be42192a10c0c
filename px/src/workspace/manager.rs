//! Workspace manager for creating, validating, and removing project repositories

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::files::resolve_in_workspace;
use crate::config::WorkspaceConfig;
use crate::vcs::GitClient;

const INIT_COMMIT_MESSAGE: &str = "Initialize project workspace";

/// Error types for workspace operations
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("I/O error at {}: {message}", path.display())]
    Io { path: PathBuf, message: String },

    #[error("git {step} failed: {message}")]
    Git { step: String, message: String },

    #[error("Invalid project id: {0:?}")]
    InvalidProjectId(String),

    #[error("Workspace already exists: {0}")]
    AlreadyExists(String),

    #[error("Path escapes workspace: {0}")]
    InvalidPath(String),
}

impl WorkspaceError {
    fn io(path: &Path, e: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    }
}

/// A file seeded into a new workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialFile {
    pub path: String,
    pub content: String,
}

/// Directories and files created before the initial commit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceStructure {
    pub directories: Vec<String>,
    pub files: Vec<InitialFile>,
}

/// Owns the per-project directories under the workspace root
pub struct WorkspaceManager {
    config: WorkspaceConfig,
    initialized: OnceCell<()>,
}

impl WorkspaceManager {
    /// Create a new workspace manager
    pub fn new(config: WorkspaceConfig) -> Self {
        debug!(?config, "WorkspaceManager::new: called");
        Self {
            config,
            initialized: OnceCell::new(),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.config.root_dir
    }

    /// Path of the shared git config every workspace repository sees
    pub fn global_config_path(&self) -> PathBuf {
        self.config.root_dir.join(".gitconfig")
    }

    /// Create the root directory and shared identity config
    ///
    /// Only the first successful call has any effect.
    pub async fn initialize(&self) -> Result<(), WorkspaceError> {
        self.initialized
            .get_or_try_init(|| async {
                debug!(root = %self.config.root_dir.display(), "WorkspaceManager::initialize: first call");
                tokio::fs::create_dir_all(&self.config.root_dir)
                    .await
                    .map_err(|e| WorkspaceError::io(&self.config.root_dir, e))?;

                let path = self.global_config_path();
                let content = format!(
                    "[init]\n\tdefaultBranch = {}\n[user]\n\tname = {}\n\temail = {}\n[advice]\n\tdetachedHead = false\n",
                    self.config.default_branch, self.config.bot_name, self.config.bot_email
                );
                tokio::fs::write(&path, content)
                    .await
                    .map_err(|e| WorkspaceError::io(&path, e))?;

                info!("Initialized workspace root at {}", self.config.root_dir.display());
                Ok(())
            })
            .await
            .map(|_| ())
    }

    /// Directory for `project_id`; no I/O
    pub fn get_workspace_path(&self, project_id: &str) -> PathBuf {
        self.config.root_dir.join(project_id)
    }

    /// Directory presence; false for ids that do not name a single child of the root
    pub async fn exists(&self, project_id: &str) -> bool {
        if validate_project_id(project_id).is_err() {
            return false;
        }
        tokio::fs::try_exists(self.get_workspace_path(project_id))
            .await
            .unwrap_or(false)
    }

    /// Git client bound to the project's workspace
    pub fn git_client(&self, project_id: &str) -> GitClient {
        GitClient::new(self.get_workspace_path(project_id))
            .with_retry(self.config.git_retry.clone())
            .with_global_config(self.global_config_path())
    }

    /// Create a workspace with `structure` and commit it
    ///
    /// All-or-nothing: on any failure the partially created directory is
    /// removed before the error is returned.
    pub async fn initialize_workspace(
        &self,
        project_id: &str,
        structure: &WorkspaceStructure,
    ) -> Result<PathBuf, WorkspaceError> {
        debug!(%project_id, "WorkspaceManager::initialize_workspace: called");
        validate_project_id(project_id)?;
        self.initialize().await?;

        let path = self.get_workspace_path(project_id);
        if self.exists(project_id).await {
            debug!("WorkspaceManager::initialize_workspace: already exists");
            return Err(WorkspaceError::AlreadyExists(project_id.to_string()));
        }

        match self.populate(project_id, &path, structure).await {
            Ok(()) => {
                info!("Initialized workspace for {} at {}", project_id, path.display());
                Ok(path)
            }
            Err(e) => {
                warn!(%project_id, error = %e, "Workspace initialization failed, rolling back");
                self.cleanup(project_id).await;
                Err(e)
            }
        }
    }

    async fn populate(&self, project_id: &str, path: &Path, structure: &WorkspaceStructure) -> Result<(), WorkspaceError> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| WorkspaceError::io(path, e))?;

        for dir in &structure.directories {
            let target = resolve_in_workspace(path, dir).ok_or_else(|| WorkspaceError::InvalidPath(dir.clone()))?;
            tokio::fs::create_dir_all(&target)
                .await
                .map_err(|e| WorkspaceError::io(&target, e))?;
        }
        debug!(count = structure.directories.len(), "WorkspaceManager::populate: directories created");

        for file in &structure.files {
            let target =
                resolve_in_workspace(path, &file.path).ok_or_else(|| WorkspaceError::InvalidPath(file.path.clone()))?;
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| WorkspaceError::io(parent, e))?;
            }
            tokio::fs::write(&target, &file.content)
                .await
                .map_err(|e| WorkspaceError::io(&target, e))?;
        }
        debug!(count = structure.files.len(), "WorkspaceManager::populate: files written");

        let git = self.git_client(project_id);
        let gpg_sign = self.config.gpg_sign.to_string();
        let steps: [(&str, &str, Vec<&str>); 6] = [
            ("init", "init", vec![]),
            ("config user.name", "config", vec!["user.name", self.config.bot_name.as_str()]),
            ("config user.email", "config", vec!["user.email", self.config.bot_email.as_str()]),
            ("config commit.gpgsign", "config", vec!["commit.gpgsign", gpg_sign.as_str()]),
            ("add", "add", vec!["."]),
            ("commit", "commit", vec!["--allow-empty", "-m", INIT_COMMIT_MESSAGE]),
        ];

        for (step, command, args) in steps {
            git.execute_command(command, &args)
                .await
                .into_result()
                .map_err(|e| WorkspaceError::Git {
                    step: step.to_string(),
                    message: e.to_string(),
                })?;
            debug!(%step, "WorkspaceManager::populate: git step succeeded");
        }

        Ok(())
    }

    /// True only for an existing directory holding a working git repository
    pub async fn validate(&self, project_id: &str) -> bool {
        if validate_project_id(project_id).is_err() {
            debug!(%project_id, "WorkspaceManager::validate: invalid project id");
            return false;
        }
        let path = self.get_workspace_path(project_id);
        if !tokio::fs::metadata(&path).await.map(|m| m.is_dir()).unwrap_or(false) {
            debug!(%project_id, "WorkspaceManager::validate: no directory");
            return false;
        }
        if !tokio::fs::try_exists(path.join(".git")).await.unwrap_or(false) {
            debug!(%project_id, "WorkspaceManager::validate: no repository marker");
            return false;
        }

        let result = self
            .git_client(project_id)
            .execute_command("rev-parse", &["--is-inside-work-tree"])
            .await;
        result.success && result.output.trim() == "true"
    }

    /// Remove the project's workspace; failures are logged, never returned
    pub async fn cleanup(&self, project_id: &str) {
        debug!(%project_id, "WorkspaceManager::cleanup: called");
        if validate_project_id(project_id).is_err() {
            warn!(%project_id, "Refusing to clean up invalid project id");
            return;
        }

        let path = self.get_workspace_path(project_id);
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => info!("Removed workspace {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("WorkspaceManager::cleanup: nothing to remove");
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove workspace"),
        }
    }

    /// Project ids of every valid workspace under the root, sorted
    pub async fn list_workspaces(&self) -> Vec<String> {
        debug!("WorkspaceManager::list_workspaces: called");
        let mut entries = match tokio::fs::read_dir(&self.config.root_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!(error = %e, "WorkspaceManager::list_workspaces: root unreadable");
                return Vec::new();
            }
        };

        let mut candidates = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false)
                && let Some(name) = entry.file_name().to_str()
            {
                candidates.push(name.to_string());
            }
        }
        candidates.sort();

        let mut valid = Vec::new();
        for id in candidates {
            if self.validate(&id).await {
                valid.push(id);
            }
        }
        valid
    }
}

/// A project id must name exactly one directory under the root
fn validate_project_id(project_id: &str) -> Result<(), WorkspaceError> {
    let mut components = Path::new(project_id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(WorkspaceError::InvalidProjectId(project_id.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryOptions;
    use tempfile::tempdir;

    fn test_config(root: &Path) -> WorkspaceConfig {
        WorkspaceConfig {
            git_retry: RetryOptions {
                max_retries: 2,
                initial_delay_ms: 1,
                max_delay_ms: 2,
                factor: 2,
                jitter_ms: 0,
            },
            ..WorkspaceConfig::with_root(root)
        }
    }

    fn sample_structure() -> WorkspaceStructure {
        WorkspaceStructure {
            directories: vec!["src".into(), "docs".into()],
            files: vec![InitialFile {
                path: "README.md".into(),
                content: "# Sample\n".into(),
            }],
        }
    }

    #[test]
    fn test_get_workspace_path() {
        let manager = WorkspaceManager::new(WorkspaceConfig::with_root("/srv/ws"));
        assert_eq!(manager.get_workspace_path("p1"), PathBuf::from("/srv/ws/p1"));
    }

    #[test]
    fn test_validate_project_id() {
        assert!(validate_project_id("p1").is_ok());
        assert!(validate_project_id("").is_err());
        assert!(validate_project_id("..").is_err());
        assert!(validate_project_id("a/b").is_err());
        assert!(validate_project_id("/abs").is_err());
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("ws");
        let manager = WorkspaceManager::new(test_config(&root));

        manager.initialize().await.unwrap();
        let config = std::fs::read_to_string(manager.global_config_path()).unwrap();
        assert!(config.contains("PlanExec Bot"));
        assert!(config.contains("defaultBranch = main"));

        std::fs::write(manager.global_config_path(), "edited").unwrap();
        manager.initialize().await.unwrap();
        assert_eq!(std::fs::read_to_string(manager.global_config_path()).unwrap(), "edited");
    }

    #[tokio::test]
    async fn test_initialize_workspace_creates_repository() {
        let temp = tempdir().unwrap();
        let manager = WorkspaceManager::new(test_config(temp.path()));

        let path = manager.initialize_workspace("p1", &sample_structure()).await.unwrap();

        assert!(path.join("src").is_dir());
        assert!(path.join("docs").is_dir());
        assert_eq!(std::fs::read_to_string(path.join("README.md")).unwrap(), "# Sample\n");
        assert!(manager.exists("p1").await);
        assert!(manager.validate("p1").await);

        let git = manager.git_client("p1");
        let log = git.execute_command("log", &["--format=%s|%an"]).await;
        assert!(log.success);
        assert_eq!(log.output.trim(), "Initialize project workspace|PlanExec Bot");
        assert_eq!(git.get_current_branch().await, "main");
        assert!(!git.has_changes().await);
    }

    #[tokio::test]
    async fn test_initialize_workspace_refuses_existing() {
        let temp = tempdir().unwrap();
        let manager = WorkspaceManager::new(test_config(temp.path()));
        manager.initialize_workspace("p1", &WorkspaceStructure::default()).await.unwrap();

        let err = manager
            .initialize_workspace("p1", &WorkspaceStructure::default())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkspaceError::AlreadyExists(_)));
        assert!(manager.validate("p1").await);
    }

    #[tokio::test]
    async fn test_failed_commit_rolls_back() {
        let temp = tempdir().unwrap();
        let config = WorkspaceConfig {
            bot_name: String::new(),
            ..test_config(temp.path())
        };
        let manager = WorkspaceManager::new(config);

        let err = manager.initialize_workspace("p1", &sample_structure()).await.unwrap_err();

        assert!(err.to_string().starts_with("git commit failed"), "got: {}", err);
        assert!(!manager.get_workspace_path("p1").exists());
    }

    #[tokio::test]
    async fn test_escaping_initial_file_rolls_back() {
        let temp = tempdir().unwrap();
        let manager = WorkspaceManager::new(test_config(&temp.path().join("ws")));
        let structure = WorkspaceStructure {
            directories: vec![],
            files: vec![InitialFile {
                path: "../outside.txt".into(),
                content: "x".into(),
            }],
        };

        let err = manager.initialize_workspace("p1", &structure).await.unwrap_err();

        assert!(matches!(err, WorkspaceError::InvalidPath(_)));
        assert!(!manager.get_workspace_path("p1").exists());
        assert!(!temp.path().join("outside.txt").exists());
    }

    #[tokio::test]
    async fn test_validate_rejects_plain_directory() {
        let temp = tempdir().unwrap();
        let manager = WorkspaceManager::new(test_config(temp.path()));
        std::fs::create_dir(temp.path().join("plain")).unwrap();

        assert!(!manager.validate("plain").await);
        assert!(!manager.validate("missing").await);
    }

    #[tokio::test]
    async fn test_validate_and_exists_reject_escaping_ids() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("ws");
        let manager = WorkspaceManager::new(test_config(&root));
        manager.initialize_workspace("p1", &WorkspaceStructure::default()).await.unwrap();
        // The root's parent is itself a repository
        let parent = GitClient::new(temp.path()).with_global_config(manager.global_config_path());
        assert!(parent.init().await.success);

        for id in ["..", ".", "", "p1/..", "/abs", "ws/p1"] {
            assert!(!manager.validate(id).await, "validate accepted {id:?}");
            assert!(!manager.exists(id).await, "exists accepted {id:?}");
        }
        assert!(manager.validate("p1").await);
        assert!(manager.exists("p1").await);
    }

    #[tokio::test]
    async fn test_list_workspaces_and_cleanup() {
        let temp = tempdir().unwrap();
        let manager = WorkspaceManager::new(test_config(temp.path()));
        manager.initialize_workspace("beta", &WorkspaceStructure::default()).await.unwrap();
        manager.initialize_workspace("alpha", &WorkspaceStructure::default()).await.unwrap();
        std::fs::create_dir(temp.path().join("not-a-repo")).unwrap();

        assert_eq!(manager.list_workspaces().await, vec!["alpha", "beta"]);

        manager.cleanup("alpha").await;
        assert!(!manager.exists("alpha").await);
        assert_eq!(manager.list_workspaces().await, vec!["beta"]);

        // Removing again is a no-op
        manager.cleanup("alpha").await;
    }
}
