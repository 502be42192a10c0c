//! Configuration for the context cache

use serde::{Deserialize, Serialize};

/// Source-like files picked up by indexing
const DEFAULT_INCLUDE: &[&str] = &[
    "**/*.ts",
    "**/*.js",
    "**/*.tsx",
    "**/*.jsx",
    "**/*.json",
    "**/*.rs",
    "**/*.py",
];

/// Build, dependency and version-control directories never descended into
const DEFAULT_EXCLUDE_DIRS: &[&str] = &["node_modules", "dist", "build", "target", ".git"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether prompt augmentation is enabled
    pub enabled: bool,

    /// Lines per chunk
    #[serde(rename = "chunk-size")]
    pub chunk_size: usize,

    /// Default number of chunks rendered into a prompt
    #[serde(rename = "max-chunks")]
    pub max_chunks: usize,

    /// Glob patterns (relative to the project root) of files to index
    pub include: Vec<String>,

    /// Directory names pruned from the walk
    #[serde(rename = "exclude-dirs")]
    pub exclude_dirs: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            chunk_size: crate::DEFAULT_CHUNK_SIZE,
            max_chunks: crate::DEFAULT_MAX_CHUNKS,
            include: DEFAULT_INCLUDE.iter().map(|s| s.to_string()).collect(),
            exclude_dirs: DEFAULT_EXCLUDE_DIRS.iter().map(|s| s.to_string()).collect(),
        }
    }
}
