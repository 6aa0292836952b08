//! # PageRank Service
//!
//! Computes PageRank scores for a link graph and keeps a score index up
//! to date.
//!
//! This application demonstrates:
//! - Driving a Bulk-Synchronous-Parallel graph engine from a CLI
//! - Periodic background work with graceful ctrl-c shutdown
//! - Partition-aware leadership (only partition 0 computes)
//! - Structured logging with tracing
//!
//! ## Quick Start
//! ```bash
//! cargo run -- --snapshot graph.json --once
//! ```

// =============================================================================
// MODULE DECLARATIONS
// =============================================================================

/// Configuration management
mod config;

/// Link graph snapshots and score output
mod snapshot;

// =============================================================================
// IMPORTS
// =============================================================================
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use pagerank::{
    CancellationToken, FixedPartition, InMemoryGraph, InMemoryIndex, PartitionDetector,
    PeerDnsDetector, ServiceBuilder,
};

use crate::config::Config;
use crate::snapshot::{load_into, read_snapshot, score_entries, write_scores};

// =============================================================================
// CLI ARGUMENTS
// =============================================================================
/// # Rust Concept: Derive Macros with Clap
///
/// Each field becomes a flag. `env = "..."` lets the flag fall back to an
/// environment variable, so the same binary works from a shell or a
/// container manifest.
#[derive(Parser, Debug)]
#[command(
    name = "pagerank-service",
    version = "0.1.0",
    about = "Computes PageRank scores for a link graph",
    long_about = r#"
PageRank Service - periodic link scoring for a small search engine.

The link graph is loaded from a JSON snapshot. Each update pass rebuilds
the graph, runs the calculator until scores settle, and writes every
score to the index. Only the partition 0 instance computes scores.

EXAMPLES:
  # Score once and print the results
  pagerank-service --snapshot graph.json --once

  # Keep scoring every 10 minutes with 8 workers
  pagerank-service --snapshot graph.json --interval-secs 600 -w 8

  # Run as a replica behind a headless service
  pagerank-service --snapshot graph.json --peer-service pagerank:8080
"#
)]
struct Args {
    /// JSON link graph snapshot
    #[arg(long, value_name = "FILE", env = "PAGERANK_SNAPSHOT")]
    snapshot: Option<PathBuf>,

    /// Write scores here instead of stdout
    #[arg(short = 'o', long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Compute workers (overrides COMPUTE_WORKERS)
    #[arg(short = 'w', long = "workers")]
    workers: Option<usize>,

    /// Seconds between update passes (overrides UPDATE_INTERVAL_SECS)
    #[arg(long = "interval-secs")]
    interval_secs: Option<u64>,

    /// Run a single pass and exit
    #[arg(long, default_value = "false")]
    once: bool,

    /// `host:port` resolving to every replica (overrides PEER_SERVICE_ADDR)
    #[arg(long = "peer-service", value_name = "ADDR")]
    peer_service: Option<String>,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long = "verbose", default_value = "false")]
    verbose: bool,
}

impl Args {
    /// Apply command-line overrides on top of the environment
    fn apply(&self, config: &mut Config) {
        if let Some(path) = &self.snapshot {
            config.snapshot = Some(path.clone());
        }
        if let Some(path) = &self.output {
            config.output = Some(path.clone());
        }
        if let Some(workers) = self.workers {
            config.calculator.compute_workers = workers;
        }
        if let Some(secs) = self.interval_secs {
            config.update_interval = std::time::Duration::from_secs(secs);
        }
        if let Some(addr) = &self.peer_service {
            config.peer_service = Some(addr.clone());
        }
    }
}

// =============================================================================
// MAIN FUNCTION
// =============================================================================
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    let mut config = Config::from_env()?;
    args.apply(&mut config);
    config.validate()?;

    info!(
        workers = config.calculator.compute_workers,
        damping = config.calculator.damping,
        tolerance = config.calculator.tolerance,
        "Configuration loaded"
    );

    // Validated above
    let snapshot_path = config
        .snapshot
        .clone()
        .context("A link graph snapshot is required")?;
    let graph = Arc::new(InMemoryGraph::new());
    let urls = load_into(&graph, read_snapshot(&snapshot_path)?).await?;
    info!(
        links = graph.link_count().await,
        edges = graph.edge_count().await,
        path = %snapshot_path.display(),
        "Link graph loaded"
    );

    let index = Arc::new(InMemoryIndex::new());
    let detector: Arc<dyn PartitionDetector> = match &config.peer_service {
        Some(addr) => {
            info!(hostname = %config.hostname, peers = %addr, "Using DNS partition detection");
            Arc::new(PeerDnsDetector::new(config.hostname.clone(), addr.clone()))
        }
        None => Arc::new(FixedPartition::default()),
    };

    let mut service = ServiceBuilder::new()
        .graph_api(graph.clone())
        .index_api(index.clone())
        .partition_detector(detector)
        .config(config.service_config())
        .build()?;

    if args.once {
        let cancel = CancellationToken::new();
        let on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_signal.cancel();
            }
        });

        let report = service.run_pass(&cancel).await?;
        if !report.converged {
            warn!(supersteps = report.supersteps, "Scores did not converge; writing best effort");
        }
        info!(report = %serde_json::to_string(&report)?, "Update pass finished");
    } else {
        let handle = service.start();
        let cancel = handle.cancellation_token();
        let wait = handle.wait();
        tokio::pin!(wait);

        tokio::select! {
            result = &mut wait => result?,
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for ctrl-c")?;
                info!("Shutdown requested");
                cancel.cancel();
                wait.await?;
            }
        }
    }

    let entries = score_entries(&index.ranks().await, &urls);
    write_scores(&entries, config.output.as_deref())?;
    info!(scored = entries.len(), "Scores written");
    Ok(())
}

// =============================================================================
// LOGGING INITIALIZATION
// =============================================================================
/// Initialize the tracing subscriber for structured logging.
///
/// `RUST_LOG` wins over the verbose flag when set.
fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}
