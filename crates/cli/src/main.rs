//! git-multimerge command-line tool.
//!
//! Merges one source ref into several target branches of the current
//! repository, then resumes, abandons, or inspects paused batches and
//! shows batch history.
//!
//! Exit status: 0 when every branch merged or was already up to date, 2
//! when the batch is paused for manual conflict resolution, 1 otherwise.

mod render;
mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use multimerge_core::errors::OrchestratorError;
use multimerge_core::{
    BatchResult, BatchStore, CancelHandle, ConflictPolicy, ContinuationToken, GitGateway,
    MergeBatch, MergeOrchestrator, MergeStrategy, MultiMergeConfig, RepositoryHandle, VcsGateway,
};

const DEFAULT_CONFIG: &str = "multimerge.toml";

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "git-multimerge",
    version,
    about = "Merge one source ref into several target branches, in order"
)]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when the
    /// default file does not exist.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Repository to operate on (overrides `repository.path`).
    #[arg(short, long, global = true)]
    repo: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Merge SOURCE into each TARGET, in the order given.
    Run {
        /// Branch, tag, or commit to merge.
        source: String,

        /// Target branches, merged first to last.
        #[arg(required = true)]
        targets: Vec<String>,

        /// ff-only, recursive, or squash.
        #[arg(short, long)]
        strategy: Option<MergeStrategy>,

        /// abort-batch, skip-and-continue, or pause-for-manual.
        #[arg(short, long)]
        policy: Option<ConflictPolicy>,

        /// Commit message template; `{source}` and `{target}` are substituted.
        #[arg(short, long)]
        message: Option<String>,

        /// Stay on the last merged target instead of the original branch.
        #[arg(long)]
        leave_checked_out: bool,

        /// Push each merged target to the configured remote.
        #[arg(long)]
        push: bool,

        /// Fast-forward each target from the remote before merging.
        #[arg(long)]
        sync: bool,

        /// Push the source branch before the first merge.
        #[arg(long)]
        push_source: bool,

        /// Delete the source branch, locally and on the remote, when every
        /// target merged.
        #[arg(long)]
        delete_source: bool,

        /// Print the result as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Continue a paused batch after resolving its conflicts.
    Resume {
        token: ContinuationToken,

        #[arg(long)]
        json: bool,
    },

    /// Discard a paused batch and its in-progress merge.
    Abandon {
        token: ContinuationToken,

        #[arg(long)]
        json: bool,
    },

    /// Show the paused batch for the repository, if any.
    Status,

    /// Show recently finished batches.
    History {
        /// Maximum number of batches to show.
        #[arg(short, long, default_value = "10")]
        limit: u32,
    },

    /// Generate a default configuration file.
    Init {
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", style::error(&format!("Error: {:#}", e)));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let Cli {
        config: config_path,
        repo,
        command,
    } = cli;

    match command {
        Commands::Init { output } => {
            init_tracing("warn");
            cmd_init(&output).map(|()| ExitCode::SUCCESS)
        }
        Commands::Validate => {
            init_tracing("warn");
            let path = config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
            cmd_validate(&path).map(|()| ExitCode::SUCCESS)
        }
        Commands::Run {
            source,
            targets,
            strategy,
            policy,
            message,
            leave_checked_out,
            push,
            sync,
            push_source,
            delete_source,
            json,
        } => {
            let config = prepare(config_path.as_deref(), repo)?;
            let mut options = config.merge.batch_options();
            options.leave_checked_out |= leave_checked_out;
            options.push_after_merge |= push;
            options.sync_with_remote |= sync;
            options.push_source_branch |= push_source;
            options.delete_source_branch |= delete_source;
            if message.is_some() {
                options.commit_message = message;
            }
            let batch = MergeBatch::new(
                source,
                targets,
                strategy.unwrap_or(config.merge.strategy),
                policy.unwrap_or(config.merge.conflict_policy),
            )
            .with_options(options);
            cmd_run(&config, batch, json).await
        }
        Commands::Resume { token, json } => {
            let config = prepare(config_path.as_deref(), repo)?;
            cmd_resume(&config, token, json).await
        }
        Commands::Abandon { token, json } => {
            let config = prepare(config_path.as_deref(), repo)?;
            cmd_abandon(&config, token, json)
        }
        Commands::Status => cmd_status(&prepare(config_path.as_deref(), repo)?),
        Commands::History { limit } => cmd_history(&prepare(config_path.as_deref(), repo)?, limit),
    }
}

/// Load the configuration for a repository command and start logging at its
/// configured level.
fn prepare(path: Option<&Path>, repo: Option<PathBuf>) -> Result<MultiMergeConfig> {
    let config = load_config(path, repo)?;
    init_tracing(&config.logging.level);
    Ok(config)
}

/// `RUST_LOG` wins over the configured level.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn load_config(path: Option<&Path>, repo: Option<PathBuf>) -> Result<MultiMergeConfig> {
    let mut config = match path {
        Some(path) => {
            MultiMergeConfig::load_from_file(path).context("failed to load configuration file")?
        }
        None if Path::new(DEFAULT_CONFIG).exists() => {
            MultiMergeConfig::load_from_file(DEFAULT_CONFIG)
                .context("failed to load configuration file")?
        }
        None => MultiMergeConfig::default(),
    };
    if let Some(repo) = repo {
        config.repository.path = repo;
    }
    config
        .resolve_env_vars()
        .context("failed to resolve environment variables")?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn open_gateway(config: &MultiMergeConfig) -> Result<GitGateway> {
    let gateway = GitGateway::open(&config.repository.path)
        .context("failed to open repository")?
        .with_remote(
            config.repository.remote.clone(),
            config.repository.token.clone(),
        );
    Ok(gateway)
}

fn open_store(config: &MultiMergeConfig) -> Result<Arc<BatchStore>> {
    let data_dir = config.data_dir();
    debug!(data_dir = %data_dir.display(), "opening batch store");
    let store = BatchStore::open_in_dir(&data_dir).context("failed to open batch store")?;
    Ok(Arc::new(store))
}

fn open_orchestrator(config: &MultiMergeConfig) -> Result<MergeOrchestrator<GitGateway>> {
    let gateway = open_gateway(config)?;
    let store = open_store(config)?;
    Ok(MergeOrchestrator::new(RepositoryHandle::new(gateway)).with_store(store))
}

/// Run `work` on a blocking worker; Ctrl-C requests cancellation, which
/// takes effect before the next branch.
async fn run_cancellable<F>(cancel: CancelHandle, work: F) -> Result<BatchResult>
where
    F: FnOnce() -> std::result::Result<BatchResult, OrchestratorError> + Send + 'static,
{
    let mut task = tokio::task::spawn_blocking(work);
    let joined = tokio::select! {
        joined = &mut task => joined,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("{}", style::warn("Cancel requested; stopping after the current branch"));
            cancel.cancel();
            task.await
        }
    };
    let result = joined.context("merge worker panicked")??;
    Ok(result)
}

fn report(result: &BatchResult, json: bool) -> Result<ExitCode> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(result).context("failed to serialize result")?
        );
    } else {
        render::print_batch(result);
    }
    Ok(render::exit_code(result))
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

async fn cmd_run(config: &MultiMergeConfig, batch: MergeBatch, json: bool) -> Result<ExitCode> {
    info!(source = %batch.source_ref, targets = batch.tasks.len(), "running merge batch");
    let mut orch = open_orchestrator(config)?;
    let cancel = orch.cancel_handle();
    let result = run_cancellable(cancel, move || orch.run(batch))
        .await
        .context("merge batch failed")?;
    report(&result, json)
}

async fn cmd_resume(
    config: &MultiMergeConfig,
    token: ContinuationToken,
    json: bool,
) -> Result<ExitCode> {
    let mut orch = open_orchestrator(config)?;
    let cancel = orch.cancel_handle();
    let result = run_cancellable(cancel, move || orch.resume(&token))
        .await
        .context("failed to resume batch")?;
    report(&result, json)
}

fn cmd_abandon(config: &MultiMergeConfig, token: ContinuationToken, json: bool) -> Result<ExitCode> {
    let mut orch = open_orchestrator(config)?;
    let result = orch.abandon(&token).context("failed to abandon batch")?;
    report(&result, json)
}

fn cmd_status(config: &MultiMergeConfig) -> Result<ExitCode> {
    let repository = open_gateway(config)?.repository_id();
    let store = open_store(config)?;

    match store
        .paused_for_repository(&repository)
        .context("failed to read paused batches")?
    {
        Some(paused) => {
            render::print_paused(&paused);
            Ok(ExitCode::from(2))
        }
        None => {
            println!();
            println!("{}", style::success("No paused batch"));
            println!("  Repository: {}", style::dim(&repository));
            println!();
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn cmd_history(config: &MultiMergeConfig, limit: u32) -> Result<ExitCode> {
    let store = open_store(config)?;
    let entries = store
        .list_history(limit)
        .context("failed to list batch history")?;

    if entries.is_empty() {
        println!("No batches recorded yet.");
        return Ok(ExitCode::SUCCESS);
    }

    println!();
    println!("{}", style::header(&format!("Recent batches ({})", entries.len())));
    println!();
    println!("{}", render::history_table(&entries));
    println!();
    Ok(ExitCode::SUCCESS)
}

fn cmd_init(output: &Path) -> Result<()> {
    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    let body = MultiMergeConfig::default()
        .to_toml()
        .context("failed to render default configuration")?;
    let contents = format!(
        "# git-multimerge configuration\n\
         # Set repository.token_env to the name of a variable holding an\n\
         # access token if pushing over HTTPS.\n\n{body}"
    );
    std::fs::write(output, contents).context("failed to write config file")?;

    println!("Default configuration written to {}", output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit the merge defaults and repository path");
    println!(
        "  2. Validate with: git-multimerge validate --config {}",
        output.display()
    );
    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let mut config =
        MultiMergeConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    let _ = config.resolve_env_vars();
    println!("  [OK] Environment variable references processed");

    match config.validate() {
        Ok(()) => println!("  [OK] All fields are valid"),
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    match GitGateway::open(&config.repository.path) {
        Ok(_) => println!("  [OK] Repository opens"),
        Err(e) => println!("  [WARN] {}", e),
    }

    println!();
    println!("Configuration summary:");
    println!("  Repository    : {}", config.repository.path.display());
    println!("  Remote        : {}", config.repository.remote);
    println!(
        "  Remote token  : {}",
        match (&config.repository.token_env, &config.repository.token) {
            (None, _) => "not configured",
            (Some(_), Some(_)) => "set",
            (Some(_), None) => "NOT SET",
        }
    );
    println!("  Strategy      : {}", config.merge.strategy);
    println!("  Conflict policy: {}", config.merge.conflict_policy);
    println!("  Commit message: {}", config.merge.commit_message);
    println!("  Data directory: {}", config.data_dir().display());
    println!();
    println!("Configuration is valid.");
    Ok(())
}
