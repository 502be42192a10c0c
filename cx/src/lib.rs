//! ContextCache - in-memory code context for prompt augmentation
//!
//! Indexes a project's source tree into fixed-size line chunks and ranks them
//! by lexical relevance to a prompt, so callers can prepend the most relevant
//! snippets to an LLM request.
//!
//! # Architecture
//!
//! ```text
//! ContextCache
//! └── {project_id} -> ProjectContext
//!     ├── chunks: [CodeChunk { file_path, start_line, end_line, content }, ...]
//!     └── last_updated
//! ```
//!
//! Entries are replaced wholesale on re-indexing, so a query never observes a
//! partially indexed project.
//!
//! # Example
//!
//! ```ignore
//! use contextcache::{CacheConfig, ContextCache};
//!
//! let cache = ContextCache::new(CacheConfig::default());
//! cache.index_project("demo", "/path/to/workspace")?;
//! let context = cache.generate_context_string("demo", "fix the login handler", 3);
//! ```

mod cache;
mod chunk;
pub mod config;
mod rank;

pub use cache::{ContextCache, ContextError, ProjectContext};
pub use chunk::{CodeChunk, chunk_lines};
pub use config::CacheConfig;
pub use rank::{score, tokenize};

/// Default chunk size (lines)
pub const DEFAULT_CHUNK_SIZE: usize = 50;

/// Default number of chunks returned for a prompt
pub const DEFAULT_MAX_CHUNKS: usize = 3;
