//! Interpretation of model output
//!
//! Code-producing modes hand their output to an [`OutputParser`], which turns
//! it into workspace files. Document modes bypass parsing and are stored at
//! [`doc_path`].

mod fenced;

use std::sync::LazyLock;

use regex::Regex;

pub use fenced::FencedBlockParser;

/// Directory holding document-mode output
pub const DOCS_DIR: &str = "docs";

/// A file extracted from model output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFile {
    /// Path relative to the workspace root, as written by the model
    pub path: String,
    pub content: String,
}

/// Errors from output parsing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OutputError {
    #[error("No code blocks found in response")]
    NoCodeBlocks,
}

/// Turns raw model text into files
pub trait OutputParser: Send + Sync {
    /// Files in source order; an empty result is an error
    fn parse(&self, output: &str) -> Result<Vec<ParsedFile>, OutputError>;
}

static NON_SLUG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid slug pattern"));

/// Lowercase `title`, collapsing every run of other characters into `-`
pub fn slugify(title: &str) -> String {
    NON_SLUG.replace_all(&title.to_lowercase(), "-").into_owned()
}

/// Workspace-relative path for a document-mode task's output
pub fn doc_path(task_id: &str, title: &str) -> String {
    format!("{}/{}-{}.md", DOCS_DIR, task_id, slugify(title))
}
