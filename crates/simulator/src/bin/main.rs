//! Replicated database simulator CLI.
//!
//! Runs a command script or a seeded random workload and prints what
//! happened, one trace per line, followed by a summary.
//!
//! # Example
//!
//! ```bash
//! # Run a script against the default 10 sites and 20 items
//! repldb-sim script demos/deadlock.txt
//!
//! # Run 200 random transactions, 8 at a time, with site failures
//! repldb-sim random --seed 7 --transactions 200 --concurrency 8 --failure-ratio 0.05
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use repldb_core::{Command, Trace};
use repldb_simulation::SimulationConfig;
use repldb_simulator::{Simulator, WorkloadConfig};
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Replicated Database Simulator
///
/// Strict two-phase locking over available-copies replication, with
/// deadlock detection, site failure and recovery, and read-only snapshots.
#[derive(Parser, Debug)]
#[command(name = "repldb-sim")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Mode,

    /// Number of sites
    #[arg(long, global = true, default_value = "10")]
    sites: u32,

    /// Number of items
    #[arg(long, global = true, default_value = "20")]
    items: u32,

    /// Log level filter (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Print only the summary, not the traces
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Run a command script
    Script {
        /// Path to the script
        path: PathBuf,
    },

    /// Run a seeded random workload
    Random {
        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Transactions to run
        #[arg(short, long, default_value = "50")]
        transactions: usize,

        /// Transactions open at the same time
        #[arg(short, long, default_value = "4")]
        concurrency: usize,

        /// Maximum reads and writes per transaction
        #[arg(long, default_value = "4")]
        max_ops: u32,

        /// Probability that an operation is a read (0.0-1.0)
        #[arg(long, default_value = "0.5")]
        read_ratio: f64,

        /// Probability that a transaction is read-only (0.0-1.0)
        #[arg(long, default_value = "0.1")]
        read_only_ratio: f64,

        /// Probability of a site failure or recovery per command (0.0-0.9)
        #[arg(long, default_value = "0.02")]
        failure_ratio: f64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match &cli.log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = SimulationConfig::default()
        .with_sites(cli.sites)
        .with_items(cli.items);
    let mut simulator = Simulator::new(config);
    let quiet = cli.quiet;
    let print = |command: &Command, traces: &[Trace]| {
        if quiet {
            return;
        }
        println!("> {command}");
        for trace in traces {
            println!("{trace}");
        }
    };

    let report = match cli.command {
        Mode::Script { path } => {
            let source = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read script {}", path.display()))?;
            info!(path = %path.display(), "Running script");
            simulator
                .run_script(&source, print)
                .with_context(|| format!("Script {} halted", path.display()))?
        }
        Mode::Random {
            seed,
            transactions,
            concurrency,
            max_ops,
            read_ratio,
            read_only_ratio,
            failure_ratio,
        } => {
            let workload = WorkloadConfig::default()
                .with_seed(seed)
                .with_transactions(transactions)
                .with_concurrency(concurrency)
                .with_max_ops_per_txn(max_ops)
                .with_read_ratio(read_ratio)
                .with_read_only_ratio(read_only_ratio)
                .with_failure_ratio(failure_ratio);
            info!(?workload, "Running random workload");
            simulator
                .run_workload(workload, print)
                .context("Workload halted")?
        }
    };

    println!();
    report.print_summary();
    Ok(())
}
