use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use coop_treasury::{
    FileSnapshotStore, InMemoryValueLedger, SnapshotStore, SystemClock, Timestamp, TreasuryConfig,
    TreasuryEngine, TreasurySnapshot,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scenario script against a fresh treasury
    Run {
        /// Scenario file (YAML)
        scenario: PathBuf,
        /// Write the final state to this snapshot file
        #[arg(long)]
        snapshot_out: Option<PathBuf>,
    },
    /// Check a snapshot and print a summary
    Inspect {
        /// Snapshot file (JSON)
        snapshot: PathBuf,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = TreasuryConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("Invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Run { scenario, snapshot_out } => run(&config, scenario, snapshot_out.as_deref()).await,
        Commands::Inspect { snapshot } => inspect(&config, snapshot).await,
        Commands::Config => {
            print!("{}", serde_yaml::to_string(&config)?);
            Ok(())
        }
    }
}

async fn run(config: &TreasuryConfig, path: &Path, snapshot_out: Option<&Path>) -> Result<()> {
    info!("Running scenario {}", path.display());
    let scenario = coop_treasury::Scenario::from_file(path)?;
    let report = scenario.run(config)?;

    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(message) => println!("[{:>3}] ok   {}: {}", outcome.index, outcome.description, message),
            Err(message) => println!("[{:>3}] FAIL {}: {}", outcome.index, outcome.description, message),
        }
    }
    println!();
    print_summary(&report.snapshot);
    println!("Custody balance: {}", report.custody_balance);

    if let Some(out) = snapshot_out {
        FileSnapshotStore::new(out).save(&report.snapshot).await?;
        println!("Snapshot written to {}", out.display());
    }
    Ok(())
}

async fn inspect(config: &TreasuryConfig, path: &Path) -> Result<()> {
    let store = FileSnapshotStore::new(path);
    let snapshot = store
        .load()
        .await?
        .with_context(|| format!("No snapshot at {}", path.display()))?;

    // Restoring runs every consistency check on the snapshot
    let custody = Arc::new(InMemoryValueLedger::new(config.custody_account.clone()));
    TreasuryEngine::restore(snapshot.clone(), config, custody, Arc::new(SystemClock))
        .context("Snapshot failed verification")?;

    print_summary(&snapshot);
    println!("Snapshot is consistent");
    Ok(())
}

fn print_summary(snapshot: &TreasurySnapshot) {
    println!("Taken at:       {}", format_time(snapshot.taken_at));
    println!("Total shares:   {}", snapshot.total_shares);
    println!("Holders:        {}", snapshot.holders());
    println!("Propose at:     {} shares", snapshot.params.min_shares_to_propose);
    println!("Voting period:  {}s", snapshot.params.voting_period_secs);

    println!("Balances:");
    for (participant, balance) in &snapshot.balances {
        println!("  {:<16} {}", participant, balance);
    }

    println!("Proposals:");
    for proposal in &snapshot.proposals {
        println!("  {} {:<9} yes {:<8} no {:<8} '{}' by {} (opened {})",
            proposal.id, proposal.status, proposal.votes_yes, proposal.votes_no,
            proposal.title, proposal.author, format_time(proposal.created_at));
    }
}

fn format_time(ts: Timestamp) -> String {
    i64::try_from(ts)
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}
