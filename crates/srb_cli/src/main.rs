//! `srb` - headless front end for the super-resolution batch runner.
//!
//! Submits one batch of image files, prints the coordinator's event
//! stream to stdout, and exits nonzero when any job failed or was
//! skipped.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Local;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use srb_core::config::ConfigManager;
use srb_core::coordinator::BatchCoordinator;
use srb_core::events::{self, BatchEvent, BatchSummary};
use srb_core::logging::BatchLogger;
use srb_core::models::UpscaleModel;

#[derive(Parser)]
#[command(name = "srb", version, about = "Parallel super-resolution batch runner")]
struct Cli {
    /// Image files to upscale.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Path to the super-resolution executable (overrides config).
    #[arg(long)]
    tool: Option<PathBuf>,

    /// Model name passed to the tool (overrides config).
    #[arg(long, value_parser = parse_model)]
    model: Option<UpscaleModel>,

    /// Maximum number of jobs running simultaneously (overrides config).
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Config file location; created with defaults if absent.
    #[arg(long, default_value = "srb.toml")]
    config: PathBuf,

    /// Name for this batch's log file. Defaults to a timestamped name.
    #[arg(long)]
    batch_name: Option<String>,

    /// Suppress the tool's own output lines.
    #[arg(short, long)]
    quiet: bool,
}

fn parse_model(s: &str) -> Result<UpscaleModel, String> {
    s.parse()
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let mut manager = ConfigManager::new(&cli.config);
    manager.load_or_create()?;

    let settings = manager.settings_mut();
    if let Some(tool) = &cli.tool {
        settings.tool.executable = tool.to_string_lossy().to_string();
    }
    if let Some(model) = cli.model {
        settings.tool.model = model;
    }
    if let Some(jobs) = cli.jobs {
        settings.pool.max_concurrency = jobs;
    }
    manager.ensure_dirs_exist()?;

    for file in &cli.files {
        if !file.exists() {
            tracing::warn!("input file does not exist: {}", file.display());
        }
    }

    let batch_name = cli
        .batch_name
        .unwrap_or_else(|| format!("batch_{}", Local::now().format("%Y%m%d_%H%M%S")));
    let logger = BatchLogger::new(
        &batch_name,
        manager.logs_folder(),
        manager.settings().logging.to_log_config(),
        None,
    )?;

    let config = manager.settings().batch_config();
    let (tx, rx) = events::channel();
    let coordinator = BatchCoordinator::new(config.max_concurrency, tx);
    coordinator.start_batch(cli.files, config, Some(Arc::new(logger)));

    let summary = print_events(&rx, cli.quiet);

    if summary.failed + summary.skipped > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Print the event stream until the batch completes.
fn print_events(rx: &events::EventReceiver, quiet: bool) -> BatchSummary {
    while let Ok(event) = rx.recv() {
        match event {
            BatchEvent::Log { message, severity } => {
                println!("[{}] {}", severity, message);
            }
            BatchEvent::ToolOutput { source, line } => {
                if !quiet {
                    let name = source
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_else(|| source.display().to_string());
                    println!("  {} | {}", name, line);
                }
            }
            BatchEvent::Progress { percent } => {
                println!("[{:>3}%]", percent);
            }
            BatchEvent::JobStarted { .. } | BatchEvent::JobFinished { .. } => {}
            BatchEvent::BatchComplete { summary } => {
                println!(
                    "done: {} succeeded, {} failed, {} skipped, {} cancelled (of {})",
                    summary.succeeded,
                    summary.failed,
                    summary.skipped,
                    summary.cancelled,
                    summary.total
                );
                return summary;
            }
        }
    }

    // Channel closed without a completion event; treat as total failure.
    BatchSummary {
        failed: 1,
        ..BatchSummary::default()
    }
}
