use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use ps_scheduler::{InMemoryScheduler, Ledger, PbsScheduler, WindowStrategy};
use ps_study::{Study, StudyConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "parsweep", about = "Parametric sweeps on a PBS batch queue")]
struct Cli {
    /// Path to the study TOML file
    #[arg(short, long, global = true, default_value = "study.toml")]
    config: PathBuf,
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every unit of the sweep in canonical order
    Plan,
    /// Materialize every unit directory
    Build,
    /// Build, then submit every job through the throttled window
    Run {
        /// Maximum number of jobs eligible to run at once
        #[arg(short = 'k', long)]
        concurrency: Option<usize>,
        #[arg(long, value_enum)]
        window: Option<WindowArg>,
        /// Submit to an in-process scheduler instead of PBS
        #[arg(long)]
        dry_run: bool,
    },
    /// Delete every job listed in the study ledger
    Cancel {
        /// Also cancel jobs from ledgers of earlier runs
        #[arg(long)]
        all: bool,
    },
}

#[derive(Clone, Debug, ValueEnum)]
enum WindowArg {
    FifoSingle,
    BarrierBatch,
}

impl From<WindowArg> for WindowStrategy {
    fn from(value: WindowArg) -> Self {
        match value {
            WindowArg::FifoSingle => WindowStrategy::FifoSingle,
            WindowArg::BarrierBatch => WindowStrategy::BarrierBatch,
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = StudyConfig::load(&cli.config)
        .with_context(|| format!("loading study {}", cli.config.display()))?;

    if let Command::Run {
        concurrency,
        window,
        ..
    } = &cli.command
    {
        if let Some(k) = concurrency {
            config.submission.concurrency = *k;
        }
        if let Some(window) = window.clone() {
            config.submission.window = window.into();
        }
    }

    let study = Study::from_config(config).context("invalid study definition")?;

    match cli.command {
        Command::Plan => {
            for unit in study.plan() {
                println!("{}\t{}", unit.index, unit.name);
            }
        }
        Command::Build => {
            let contexts = study.build(&study.default_materializer())?;
            println!("built {} units in {}", contexts.len(), study.study_dir().display());
        }
        Command::Run { dry_run, .. } => {
            let contexts = study.build(&study.default_materializer())?;
            if dry_run {
                let mut scheduler = InMemoryScheduler::new();
                let mut ledger = Ledger::in_memory();
                let summary = study.execute_with_ledger(&mut scheduler, &contexts, &mut ledger)?;
                for record in &summary.records {
                    println!(
                        "{}\t{}\tafter [{}]",
                        record.job_id,
                        record.item_name,
                        record
                            .depends_on
                            .iter()
                            .map(|id| id.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    );
                }
                info!(
                    jobs = summary.item_count,
                    peak = scheduler.max_concurrency(),
                    "dry run finished"
                );
            } else {
                let mut scheduler = PbsScheduler::new(study.config().pbs.clone());
                let summary = study
                    .execute(&mut scheduler, &contexts)
                    .context("submission stopped; jobs already queued are listed above")?;
                println!(
                    "submitted {} jobs (run {}, window {}, k = {})",
                    summary.item_count, summary.run_id, summary.window, summary.concurrency
                );
            }
        }
        Command::Cancel { all } => {
            let mut scheduler = PbsScheduler::new(study.config().pbs.clone());
            let report = if all {
                study.cancel_all(&mut scheduler)
            } else {
                study.cancel(&mut scheduler)
            };
            let report = report.with_context(|| {
                format!("reading ledger {}", study.config().ledger_path().display())
            })?;
            println!(
                "deleted {} jobs, {} failed",
                report.deleted.len(),
                report.failure_count()
            );
            if !report.is_clean() {
                for failure in &report.failures {
                    warn!("{failure}");
                }
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
