//! qkernel - Command Line Interface
//!
//! Computes the symmetric kernel matrix of a directory of circuit files by
//! running an external overlap program once per unordered pair, in bounded
//! chunks, on a local worker pool.
//!
//! ## Commands
//!
//! - `run` - Discover items, compute the matrix and persist it
//! - `discover` - List items in index order
//! - `init-config` - Write the default configuration file
//! - `inspect` - Summarize a persisted matrix

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use qkernel::{
    init_logging, init_simple_logging, BarProgress, ClusterClient, CommandTask,
    DirectoryItemSource, Engine, EngineConfig, EngineError, FailurePolicy, ItemSource,
    JsonFileSink, LocalCluster, LogProgress, PairwiseTask, ProgressReporter, RunReport,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// qkernel - Chunked pairwise kernel matrix engine
#[derive(Parser, Debug)]
#[command(name = "qkernel")]
#[command(about = "Compute symmetric pairwise kernel matrices in bounded chunks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Discover items, compute the kernel matrix and persist it
    Run {
        /// Configuration file (default: ~/.qkernel/config.toml if present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory containing the item files
        #[arg(short, long)]
        input_dir: Option<PathBuf>,

        /// Output matrix path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Pairs submitted per chunk
        #[arg(long)]
        submission_batch_size: Option<usize>,

        /// Completed results drained per wake-up
        #[arg(long)]
        processing_batch_size: Option<usize>,

        /// Only use the first N items
        #[arg(long)]
        max_items: Option<usize>,

        /// Concurrent local workers
        #[arg(short, long)]
        workers: Option<usize>,

        /// Record failed pairs as NaN instead of aborting
        #[arg(long)]
        skip_failures: bool,

        /// Per-pair timeout in milliseconds
        #[arg(long)]
        task_timeout_ms: Option<u64>,

        /// Log chunk progress instead of drawing a progress bar
        #[arg(long)]
        no_progress: bool,

        /// Log level (trace, debug, info, warn, error)
        #[arg(short, long)]
        log_level: Option<String>,

        /// Overlap program and its argument template ({a} and {b} are substituted)
        #[arg(last = true)]
        command: Vec<String>,
    },

    /// List discovered items in index order
    Discover {
        /// Directory containing the item files
        #[arg(short, long, default_value = "qasm")]
        input_dir: PathBuf,

        /// Item file extension
        #[arg(short, long, default_value = "qasm")]
        extension: String,

        /// Only list the first N items
        #[arg(long)]
        max_items: Option<usize>,
    },

    /// Write the default configuration file
    InitConfig {
        /// Destination (default: ~/.qkernel/config.toml)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Summarize a persisted kernel matrix
    Inspect {
        /// Matrix JSON file
        matrix: PathBuf,
    },
}

/// Overrides collected from `run` flags
struct RunOverrides {
    config: Option<PathBuf>,
    input_dir: Option<PathBuf>,
    output: Option<PathBuf>,
    submission_batch_size: Option<usize>,
    processing_batch_size: Option<usize>,
    max_items: Option<usize>,
    workers: Option<usize>,
    skip_failures: bool,
    task_timeout_ms: Option<u64>,
    no_progress: bool,
    log_level: Option<String>,
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            input_dir,
            output,
            submission_batch_size,
            processing_batch_size,
            max_items,
            workers,
            skip_failures,
            task_timeout_ms,
            no_progress,
            log_level,
            command,
        } => {
            cmd_run(RunOverrides {
                config,
                input_dir,
                output,
                submission_batch_size,
                processing_batch_size,
                max_items,
                workers,
                skip_failures,
                task_timeout_ms,
                no_progress,
                log_level,
                command,
            })
            .await
        }
        Commands::Discover {
            input_dir,
            extension,
            max_items,
        } => {
            init_simple_logging("warn")?;
            cmd_discover(input_dir, extension, max_items)
        }
        Commands::InitConfig { path, force } => {
            init_simple_logging("warn")?;
            cmd_init_config(path, force)
        }
        Commands::Inspect { matrix } => {
            init_simple_logging("warn")?;
            cmd_inspect(&matrix)
        }
    }
}

/// Load the configuration file if one is given or present at the default path
fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    if let Some(path) = path {
        return EngineConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()));
    }

    match EngineConfig::default_path() {
        Ok(default) if default.exists() => EngineConfig::load(&default)
            .with_context(|| format!("Failed to load config from {}", default.display())),
        _ => Ok(EngineConfig::default()),
    }
}

fn apply_overrides(config: &mut EngineConfig, overrides: &RunOverrides) {
    if let Some(dir) = &overrides.input_dir {
        config.input.dir = dir.clone();
    }
    if let Some(path) = &overrides.output {
        config.output.path = path.clone();
    }
    if let Some(size) = overrides.submission_batch_size {
        config.engine.submission_batch_size = size;
    }
    if let Some(size) = overrides.processing_batch_size {
        config.engine.processing_batch_size = size;
    }
    if overrides.max_items.is_some() {
        config.engine.max_items = overrides.max_items;
    }
    if let Some(workers) = overrides.workers {
        config.cluster.workers = workers;
    }
    if overrides.skip_failures {
        config.engine.failure_policy = FailurePolicy::SkipAsNan;
    }
    if overrides.task_timeout_ms.is_some() {
        config.cluster.task_timeout_ms = overrides.task_timeout_ms;
    }
    if let Some(level) = &overrides.log_level {
        config.logging.level = level.clone();
    }
    if let Some((program, args)) = overrides.command.split_first() {
        config.task.command = program.clone();
        config.task.args = args.to_vec();
    }
}

async fn cmd_run(overrides: RunOverrides) -> Result<()> {
    use colored::Colorize;

    let mut config = load_config(overrides.config.as_deref())?;
    apply_overrides(&mut config, &overrides);
    config.validate().context("Invalid configuration")?;

    if let Some(log_dir) = init_logging(&config.logging)? {
        info!(log_dir = %log_dir.display(), "Writing run log");
    }

    let mut cluster = LocalCluster::new(config.cluster.workers);
    if let Some(ms) = config.cluster.task_timeout_ms {
        cluster = cluster.with_task_timeout(Duration::from_millis(ms));
    }
    let cluster = Arc::new(cluster);

    let task: Arc<dyn PairwiseTask> = Arc::new(CommandTask::new(
        config.task.command.clone(),
        config.task.args.clone(),
    ));

    let progress: Box<dyn ProgressReporter> = if overrides.no_progress {
        Box::new(LogProgress)
    } else {
        Box::new(BarProgress::new())
    };

    let mut engine = Engine::new(
        config.engine.clone(),
        Arc::clone(&cluster) as Arc<dyn ClusterClient>,
        task,
    )?
    .with_progress(progress);

    let source = DirectoryItemSource::new(&config.input.dir, &config.input.extension);
    let sink = JsonFileSink::new(&config.output.path).with_manifest(config.output.write_manifest);

    info!(
        input = %config.input.dir.display(),
        output = %config.output.path.display(),
        command = %config.task.command,
        workers = cluster.workers(),
        "Starting kernel matrix run"
    );

    let result = tokio::select! {
        result = engine.run(&source, &sink) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Received Ctrl+C, cancelling pending computations");
            cluster.shutdown();
            Err(EngineError::Interrupted("cancelled by user".into()))
        }
    };

    match result {
        Ok(report) => {
            print_report(&report, &sink);
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", "Run failed:".red().bold(), e);
            eprintln!("No matrix was written to {}", config.output.path.display());
            Err(e.into())
        }
    }
}

fn print_report(report: &RunReport, sink: &JsonFileSink) {
    use colored::Colorize;

    println!("\n{}", "Kernel Matrix Computed".bold().green());
    println!("{}", "======================".green());
    println!("  Run ID:           {}", report.run_id);
    println!("  Items:            {}", report.item_count());
    println!("  Pairs:            {}", report.pairs);
    println!("  Chunks:           {}", report.chunks);
    println!(
        "  Batch Sizes:      {} submitted / {} processed",
        report.submission_batch_size, report.processing_batch_size
    );
    if report.skipped_pairs.is_empty() {
        println!("  Skipped Pairs:    {}", "0".green());
    } else {
        println!(
            "  Skipped Pairs:    {}",
            report.skipped_pairs.len().to_string().yellow()
        );
    }
    println!("  Elapsed:          {}ms", report.elapsed_ms);
    println!("  Output:           {}", sink.path().display());
    println!();
}

fn cmd_discover(input_dir: PathBuf, extension: String, max_items: Option<usize>) -> Result<()> {
    use colored::Colorize;

    let source = DirectoryItemSource::new(&input_dir, extension);
    let mut items = source
        .discover()
        .with_context(|| format!("Failed to list {}", input_dir.display()))?;

    let found = items.len();
    if let Some(max) = max_items {
        items.truncate(max);
    }

    if items.is_empty() {
        println!("{}", format!("No items found in {}", source.location()).yellow());
        return Ok(());
    }

    for (index, item) in items.iter().enumerate() {
        println!("{:>6}  {}", index, item);
    }

    let pairs = items.len() * (items.len() + 1) / 2;
    println!(
        "\n{} items ({} found), {} pairs",
        items.len().to_string().bold(),
        found,
        pairs
    );

    Ok(())
}

fn cmd_init_config(path: Option<PathBuf>, force: bool) -> Result<()> {
    use colored::Colorize;

    let path = match path {
        Some(path) => path,
        None => EngineConfig::default_path()?,
    };

    if path.exists() && !force {
        println!(
            "{} {} already exists (use --force to overwrite)",
            "Skipped:".yellow(),
            path.display()
        );
        return Ok(());
    }

    EngineConfig::default()
        .save(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("{} {}", "Wrote default configuration to".green(), path.display());
    Ok(())
}

fn cmd_inspect(path: &Path) -> Result<()> {
    use colored::Colorize;

    let matrix = JsonFileSink::load(path)
        .with_context(|| format!("Failed to load matrix from {}", path.display()))?;

    println!("\n{}", "Kernel Matrix".bold().cyan());
    println!("{}", "=============".cyan());
    println!("  File:             {}", path.display());
    println!("  Size:             {} x {}", matrix.size(), matrix.size());

    if matrix.is_symmetric() {
        println!("  Symmetric:        {}", "yes".green());
    } else {
        println!("  Symmetric:        {}", "no".red());
    }

    let nan_pairs = matrix.nan_pairs();
    if nan_pairs == 0 {
        println!("  NaN Pairs:        {}", "0".green());
    } else {
        println!("  NaN Pairs:        {}", nan_pairs.to_string().yellow());
    }

    let manifest_path = JsonFileSink::new(path).manifest_path();
    if manifest_path.exists() {
        let content = std::fs::read_to_string(&manifest_path)
            .with_context(|| format!("Failed to read {}", manifest_path.display()))?;
        let report: RunReport = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", manifest_path.display()))?;

        println!("\n{}", "Run:".bold());
        println!("  Run ID:           {}", report.run_id);
        println!("  Items:            {}", report.item_count());
        println!("  Chunks:           {}", report.chunks);
        println!("  Elapsed:          {}ms", report.elapsed_ms);
    }

    println!();
    Ok(())
}
