//! Deadlock Manager Simulator CLI
//!
//! Runs the deadlock manager with randomized request/release traffic and
//! reports what the safety checker and recovery policy did.
//!
//! # Example
//!
//! ```bash
//! # Run for 30 seconds with the reference 4x4 ledger
//! banker-sim --duration 30s
//!
//! # Busier traffic, reproducible, JSON ledger at the end
//! banker-sim --odds 3 --tick 10ms --seed 42 --json
//! ```

use banker_manager::{metrics, DeadlockManager, LedgerConfig, ManagerConfig, TrafficConfig};
use clap::Parser;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Deadlock Manager Simulator
///
/// Runs a simulated multi-process, multi-resource allocator with the
/// Banker's algorithm as deadlock detector. Given the same seed, the ledger
/// and traffic decisions are identical every run.
#[derive(Parser, Debug)]
#[command(name = "banker-sim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Number of simulated processes
    #[arg(short = 'p', long, default_value = "4")]
    processes: usize,

    /// Number of resource classes
    #[arg(short = 'r', long, default_value = "4")]
    resources: usize,

    /// How long to run (e.g., "30s", "5m")
    #[arg(short = 'd', long, default_value = "10s")]
    duration: humantime::Duration,

    /// Sleep between traffic ticks (e.g., "100ms")
    #[arg(long, default_value = "100ms")]
    tick: humantime::Duration,

    /// Base odds k1: request 1/k1, release 1/(2*k1), check 1/(3*k1) per tick
    #[arg(long, default_value = "15")]
    odds: u32,

    /// Largest amount a single generated request asks for
    #[arg(long, default_value = "2")]
    max_request: u32,

    /// Smallest total units per resource class
    #[arg(long, default_value = "3")]
    min_total: u32,

    /// Largest total units per resource class
    #[arg(long, default_value = "5")]
    max_total: u32,

    /// Largest maximum claim per process and resource class
    #[arg(long, default_value = "2")]
    max_claim: u32,

    /// Random seed (defaults to wall clock)
    #[arg(long)]
    seed: Option<u64>,

    /// Print the final ledger as JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Print Prometheus metrics at the end
    #[arg(long)]
    metrics: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,banker_manager=info")),
        )
        .init();

    let args = Args::parse();

    let ledger = LedgerConfig::new(args.processes, args.resources)
        .with_total_units(args.min_total, args.max_total)
        .with_max_claim_limit(args.max_claim);
    let traffic = TrafficConfig::default()
        .with_tick_interval(args.tick.into())
        .with_base_odds(args.odds)
        .with_max_request_amount(args.max_request);

    let mut config = ManagerConfig::default()
        .with_ledger(ledger)
        .with_traffic(traffic);
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }

    let manager = DeadlockManager::new(config)?;

    println!("=== Initial Ledger ===");
    print!("{}", manager.snapshot());

    manager.start()?;

    let duration: Duration = args.duration.into();
    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = tokio::signal::ctrl_c() => info!("Interrupted, stopping"),
    }

    let report = manager.stop().await;
    report.print();
    manager.stats().print();

    let snapshot = manager.snapshot();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        println!("\n=== Final Ledger ===");
        print!("{}", snapshot);
    }

    if args.metrics {
        println!("\n=== Metrics ===");
        print!("{}", metrics::gather_text());
    }

    Ok(())
}
