//! PlanExec configuration types and loading

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use contextcache::CacheConfig;
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::retry::RetryOptions;

/// Main PlanExec configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model provider configuration
    pub llm: LlmConfig,

    /// Workspace and repository settings
    pub workspace: WorkspaceConfig,

    /// Context retrieval for prompt augmentation
    pub context: CacheConfig,

    /// Per-mode model overrides (mode name -> model id)
    pub modes: HashMap<String, String>,

    /// Lifecycle event log
    pub events: EventsConfig,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Config {
    /// Validate configuration before calling the provider
    ///
    /// Checks that the API key environment variable is set.
    pub fn validate(&self) -> Result<()> {
        if std::env::var(&self.llm.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.llm.api_key_env
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .planexec.yml
        let local_config = PathBuf::from(".planexec.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/planexec/planexec.yml
        if let Some(user_config) = Self::user_config_path()
            && user_config.exists()
        {
            match Self::load_from_file(&user_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is set up
    ///
    /// Errors are ignored here; the full load reports them once logging works.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates = match config_path {
            Some(path) => vec![path.clone()],
            None => [Some(PathBuf::from(".planexec.yml")), Self::user_config_path()]
                .into_iter()
                .flatten()
                .collect(),
        };

        candidates
            .iter()
            .filter(|p| p.exists())
            .find_map(|p| Self::load_from_file(p).ok())
            .and_then(|c| c.log_level)
    }

    fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("planexec").join("planexec.yml"))
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Model provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name (currently only "openai" supported)
    pub provider: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Backoff applied to every model call
    pub retry: RetryOptions,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com".to_string(),
            max_tokens: 4096,
            timeout_ms: 300_000,
            retry: RetryOptions::default(),
        }
    }
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env).context(format!("{} is not set", self.api_key_env))
    }
}

/// Workspace and repository settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Directory holding one subdirectory per project
    #[serde(rename = "root-dir")]
    pub root_dir: PathBuf,

    /// Commit identity for workspace repositories
    #[serde(rename = "bot-name")]
    pub bot_name: String,

    #[serde(rename = "bot-email")]
    pub bot_email: String,

    /// Branch name for new repositories
    #[serde(rename = "default-branch")]
    pub default_branch: String,

    /// Sign commits (off by default)
    #[serde(rename = "gpg-sign")]
    pub gpg_sign: bool,

    /// Backoff applied to every git command
    #[serde(rename = "git-retry")]
    pub git_retry: RetryOptions,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        let root_dir = std::env::var_os("WORKSPACE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("workspaces"));

        Self {
            root_dir,
            bot_name: "PlanExec Bot".to_string(),
            bot_email: "bot@planexec.dev".to_string(),
            default_branch: "main".to_string(),
            gpg_sign: false,
            git_retry: RetryOptions {
                max_delay_ms: 5000,
                ..Default::default()
            },
        }
    }
}

impl WorkspaceConfig {
    /// Config rooted at `root_dir`, other fields defaulted
    pub fn with_root(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Default::default()
        }
    }
}

/// Lifecycle event log configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Directory for per-project `events.jsonl` files; disabled when unset
    #[serde(rename = "log-dir")]
    pub log_dir: Option<PathBuf>,
}
