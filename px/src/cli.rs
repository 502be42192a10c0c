//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::workspace::InitialFile;

/// PlanExec - run AI-generated plans against git workspaces
#[derive(Parser)]
#[command(
    name = "px",
    about = "Sequential executor for AI-generated project plans",
    version,
    after_help = "Logs are written to: ~/.local/share/planexec/logs/planexec.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, help = "Log level (overrides config)")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Create a project workspace with an initial commit
    Init {
        /// Project id (one path component)
        project: String,

        /// Directory to create (repeatable)
        #[arg(short, long = "dir", value_name = "DIR")]
        dirs: Vec<String>,

        /// Initial file as PATH=CONTENT (repeatable)
        #[arg(short, long = "file", value_name = "PATH=CONTENT", value_parser = parse_initial_file)]
        files: Vec<InitialFile>,
    },

    /// Execute a plan file (JSON or YAML) against a project
    Run {
        /// Project id
        project: String,

        /// Plan file: `{ tasks: [...] }` or a bare task list
        plan: PathBuf,
    },

    /// List valid project workspaces
    List,

    /// Check that a project workspace is a usable repository
    Validate {
        /// Project id
        project: String,
    },

    /// Remove a project workspace
    Cleanup {
        /// Project id
        project: String,
    },

    /// Show the context a prompt would be augmented with
    Context {
        /// Project id
        project: String,

        /// Prompt to rank chunks against
        prompt: String,

        /// Maximum chunks to include
        #[arg(short, long)]
        max_chunks: Option<usize>,
    },

    /// List task modes with their models
    Modes,
}

/// Parse `PATH=CONTENT`; content may itself contain `=`
pub fn parse_initial_file(s: &str) -> Result<InitialFile, String> {
    match s.split_once('=') {
        Some((path, content)) if !path.is_empty() => Ok(InitialFile {
            path: path.to_string(),
            content: content.to_string(),
        }),
        _ => Err(format!("Expected PATH=CONTENT, got: {}", s)),
    }
}

/// Location of the log file written by the `px` binary
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("planexec")
        .join("logs")
        .join("planexec.log")
}
