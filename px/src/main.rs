//! PlanExec - plan executor
//!
//! CLI entry point for creating workspaces and running plans.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tokio::sync::broadcast;
use tracing::{info, warn};

use contextcache::ContextCache;
use planexec::cli::{Cli, Command, get_log_path};
use planexec::config::Config;
use planexec::domain::{Plan, TaskResult, TaskStatus};
use planexec::events::{PlanEvent, spawn_event_logger};
use planexec::executor::{ExecutorError, TaskExecutor};
use planexec::llm::create_client;
use planexec::modes::ModeRegistry;
use planexec::state::StateManager;
use planexec::workspace::{WorkspaceManager, WorkspaceStructure};

fn setup_logging(level: &str) -> Result<()> {
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Write to the log file, never stdout/stderr
    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;
    let filter = tracing_subscriber::EnvFilter::try_new(level)
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info"))
        .context("Failed to build log filter")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(filter)
        .init();

    info!("Logging initialized (level: {})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // CLI flag, then config file, then INFO
    let level = cli
        .log_level
        .clone()
        .or_else(|| Config::load_log_level(cli.config.as_ref()))
        .unwrap_or_else(|| "info".to_string());
    setup_logging(&level).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(
        "PlanExec {} loaded config: provider={}, workspaces={}",
        env!("CARGO_PKG_VERSION"),
        config.llm.provider,
        config.workspace.root_dir.display()
    );

    match cli.command {
        Command::Init { project, dirs, files } => {
            cmd_init(
                &config,
                &project,
                WorkspaceStructure {
                    directories: dirs,
                    files,
                },
            )
            .await
        }
        Command::Run { project, plan } => cmd_run(&config, &project, &plan).await,
        Command::List => cmd_list(&config).await,
        Command::Validate { project } => cmd_validate(&config, &project).await,
        Command::Cleanup { project } => cmd_cleanup(&config, &project).await,
        Command::Context {
            project,
            prompt,
            max_chunks,
        } => cmd_context(&config, &project, &prompt, max_chunks).await,
        Command::Modes => cmd_modes(&config),
    }
}

async fn workspace_manager(config: &Config) -> Result<Arc<WorkspaceManager>> {
    let workspaces = WorkspaceManager::new(config.workspace.clone());
    workspaces
        .initialize()
        .await
        .context("Failed to initialize workspace root")?;
    Ok(Arc::new(workspaces))
}

/// Create a project workspace
async fn cmd_init(config: &Config, project: &str, structure: WorkspaceStructure) -> Result<()> {
    let workspaces = workspace_manager(config).await?;
    let path = workspaces
        .initialize_workspace(project, &structure)
        .await
        .context(format!("Failed to initialize workspace for {}", project))?;

    println!("{} Initialized {} at {}", "✓".green(), project.bold(), path.display());
    Ok(())
}

/// Run a plan file to completion or first failure
async fn cmd_run(config: &Config, project: &str, plan_path: &Path) -> Result<()> {
    // Validate API key early
    config.validate()?;

    let text = fs::read_to_string(plan_path).context(format!("Failed to read plan {}", plan_path.display()))?;
    let plan = Plan::parse(&text).context(format!("Failed to parse plan {}", plan_path.display()))?;
    if let Some(description) = &plan.description {
        println!("{}", description.bold());
    }
    println!("Running {} tasks for {}", plan.tasks.len(), project.bold());
    println!();

    let workspaces = workspace_manager(config).await?;
    let llm = create_client(&config.llm).context("Failed to create LLM client")?;
    let modes = ModeRegistry::with_model_overrides(&config.modes)?;

    let mut executor = TaskExecutor::new(workspaces, llm, StateManager::spawn())
        .with_modes(modes)
        .with_llm_retry(config.llm.retry.clone())
        .with_max_tokens(config.llm.max_tokens);
    if config.context.enabled {
        executor = executor.with_context_cache(Arc::new(ContextCache::new(config.context.clone())));
    }

    let logger = config
        .events
        .log_dir
        .as_ref()
        .map(|dir| spawn_event_logger(executor.events(), dir));
    let progress = tokio::spawn(print_progress(executor.events().subscribe()));

    let outcome = executor.execute_tasks(project, &plan.tasks).await;

    // Closing the bus ends both subscribers once they drain
    drop(executor);
    let _ = progress.await;
    if let Some(logger) = logger {
        let _ = logger.await;
    }

    match outcome {
        Ok(results) => {
            println!();
            println!("{} Plan completed ({} tasks)", "✓".green(), results.len());
            Ok(())
        }
        Err(ExecutorError::TaskFailed { task_id, error, results }) => {
            println!();
            println!(
                "{} Plan halted at task {} after {} of {} tasks",
                "✗".red(),
                task_id,
                results.len(),
                plan.tasks.len()
            );
            Err(eyre::eyre!("Task {} failed: {}", task_id, error))
        }
        Err(e) => Err(e.into()),
    }
}

/// Print lifecycle events as they arrive
async fn print_progress(mut rx: broadcast::Receiver<PlanEvent>) {
    loop {
        match rx.recv().await {
            Ok(PlanEvent::TaskStart { task, .. }) => {
                println!("{} [{}] {} ({})", "→".cyan(), task.id, task.title, task.owner_mode);
            }
            Ok(PlanEvent::TaskComplete { result, .. }) => print_result(&result),
            Ok(PlanEvent::Error { error, .. }) => println!("  {} {}", "error:".red().bold(), error),
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(n)) => warn!("Progress output lagged by {} events", n),
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn print_result(result: &TaskResult) {
    match result.status {
        TaskStatus::Completed => println!("  {} {}", "✓".green(), result.task_id),
        TaskStatus::Failed => println!(
            "  {} {}: {}",
            "✗".red(),
            result.task_id,
            result.error.as_deref().unwrap_or("unknown error")
        ),
        _ => println!("  {} {}", "…".yellow(), result.task_id),
    }
}

/// List valid workspaces
async fn cmd_list(config: &Config) -> Result<()> {
    let workspaces = workspace_manager(config).await?;
    let projects = workspaces.list_workspaces().await;

    if projects.is_empty() {
        println!("No workspaces found in {}", workspaces.root_dir().display());
        return Ok(());
    }

    for project in projects {
        println!("  {}", project);
    }
    Ok(())
}

async fn cmd_validate(config: &Config, project: &str) -> Result<()> {
    let workspaces = WorkspaceManager::new(config.workspace.clone());
    if workspaces.validate(project).await {
        println!("{} {} is valid", "✓".green(), project.bold());
        Ok(())
    } else {
        println!("{} {} is not a valid workspace", "✗".red(), project.bold());
        Err(eyre::eyre!("Invalid workspace: {}", project))
    }
}

async fn cmd_cleanup(config: &Config, project: &str) -> Result<()> {
    let workspaces = WorkspaceManager::new(config.workspace.clone());
    if !workspaces.exists(project).await {
        println!("No workspace named {}", project);
        return Ok(());
    }

    workspaces.cleanup(project).await;
    println!("{} Removed {}", "✓".green(), project.bold());
    Ok(())
}

/// Index a workspace and print the context block for `prompt`
async fn cmd_context(config: &Config, project: &str, prompt: &str, max_chunks: Option<usize>) -> Result<()> {
    let workspaces = WorkspaceManager::new(config.workspace.clone());
    if !workspaces.exists(project).await {
        return Err(eyre::eyre!("No workspace named {}", project));
    }

    let cache = ContextCache::new(config.context.clone());
    let path = workspaces.get_workspace_path(project);
    let chunks = cache
        .index_project(project, &path)
        .context(format!("Failed to index {}", path.display()))?;
    info!(%project, chunks, "Indexed workspace for context query");

    let max_chunks = max_chunks.unwrap_or(config.context.max_chunks);
    let context = cache.generate_context_string(project, prompt, max_chunks);
    if context.is_empty() {
        println!("No relevant context found ({} chunks indexed)", chunks);
    } else {
        print!("{}", context);
    }
    Ok(())
}

fn cmd_modes(config: &Config) -> Result<()> {
    let modes = ModeRegistry::with_model_overrides(&config.modes)?;

    println!("Available modes:");
    println!();
    for (mode, mode_config) in modes.list() {
        println!("  {} {}", format!("{:<14}", mode.as_str()).bold(), mode_config.model);
    }
    Ok(())
}
