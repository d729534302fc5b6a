use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use varsync_core::{build_snapshot, DataSync, ManifestProvider, SyncConfig, TickOutcome};

mod state;

use state::StateFileSource;

/// Varsync - periodic game state reconciliation
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (.toml or .json); defaults apply when missing
    #[arg(short, long, value_name = "FILE", default_value = "varsync.toml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Sample the state file and reconcile until interrupted
    Run {
        /// JSON state file providing the game values
        #[arg(short, long, value_name = "FILE")]
        state: PathBuf,

        /// Run a single tick, wait for its submission and exit
        #[arg(long)]
        once: bool,
    },

    /// Resolve the configured manifest and print it
    Manifest,

    /// Print the snapshot the state file would produce
    Snapshot {
        #[arg(short, long, value_name = "FILE")]
        state: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Init { force } => {
            if cli.config.exists() && !force {
                anyhow::bail!("{} already exists, pass --force to overwrite", cli.config.display());
            }
            SyncConfig::default().to_file(&cli.config)?;
            println!("Wrote default configuration to {}", cli.config.display());
        }
        Commands::Run { state, once } => {
            let config = load_config(&cli.config)?;
            let source = Arc::new(StateFileSource::open(&state)?);
            let sync = Arc::new(DataSync::new(config, source)?);
            sync.start().await;

            if once {
                let mut report = sync.sample().await;
                let submission = report.settle().await;
                print_outcome(&report.outcome);
                if let Some(path) = &report.log_file {
                    println!("Log file: {}", path.display());
                }
                if let Some(Err(e)) = submission {
                    anyhow::bail!("Submission failed: {}", e);
                }
                return Ok(());
            }

            run_until_interrupted(sync, cli.config).await;
        }
        Commands::Manifest => {
            let config = load_config(&cli.config)?;
            let client = reqwest::Client::new();
            let provider = varsync_core::manifest::provider_for(&config, &client);
            let manifest = provider.resolve().await?;
            println!("{}", serde_json::to_string_pretty(&manifest)?);
        }
        Commands::Snapshot { state } => {
            let config = load_config(&cli.config)?;
            let source = StateFileSource::open(&state)?;
            let client = reqwest::Client::new();
            let manifest = varsync_core::manifest::provider_for(&config, &client)
                .resolve()
                .await?;
            let snapshot = build_snapshot(&source, &manifest);
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_thread_ids(verbose)
        .init();
}

fn load_config(path: &Path) -> anyhow::Result<SyncConfig> {
    if !path.exists() {
        info!("No configuration at {}, using defaults", path.display());
        return Ok(SyncConfig::default());
    }
    Ok(SyncConfig::from_file(path)?)
}

fn modified_at(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

async fn run_until_interrupted(sync: Arc<DataSync>, config_path: PathBuf) {
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let runner = {
        let sync = sync.clone();
        let rx = shutdown_tx.subscribe();
        tokio::spawn(async move { sync.run(rx).await })
    };

    let watcher = {
        let sync = sync.clone();
        let rx = shutdown_tx.subscribe();
        tokio::spawn(watch_config(sync, config_path, rx))
    };

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Interrupt received, stopping"),
        Err(e) => error!("Failed to listen for interrupt: {}", e),
    }
    let _ = shutdown_tx.send(());

    let _ = runner.await;
    let _ = watcher.await;
}

/// Poll the configuration file and apply edits as they land
async fn watch_config(sync: Arc<DataSync>, path: PathBuf, mut shutdown: broadcast::Receiver<()>) {
    let mut last_seen = modified_at(&path);
    let mut poll = tokio::time::interval(Duration::from_secs(2));

    loop {
        tokio::select! {
            _ = poll.tick() => {
                let modified = modified_at(&path);
                if modified.is_none() || modified == last_seen {
                    continue;
                }
                last_seen = modified;

                let applied = match SyncConfig::from_file(&path) {
                    Ok(config) => sync.apply_config(config).await,
                    Err(e) => Err(e),
                };
                if let Err(e) = applied {
                    warn!("Ignoring configuration change: {}", e);
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}

fn print_outcome(outcome: &TickOutcome) {
    match outcome {
        TickOutcome::Skipped(reason) => println!("Skipped: {:?}", reason),
        TickOutcome::Unchanged => println!("No changes since the last merge"),
        TickOutcome::Merged { entries } => println!("Merged {} entries", entries),
        TickOutcome::Retained { entries } => {
            println!("Retained {} entries for the next tick", entries)
        }
        TickOutcome::Dispatched { entries, merged } => {
            println!("Submitted {} entries (merged before ack: {})", entries, merged)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, SyncConfig::default());
    }

    #[test]
    fn test_load_config_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("varsync.toml");
        std::fs::write(&path, "sample_interval_secs = 0\n").unwrap();
        assert!(load_config(&path).is_err());

        std::fs::write(&path, "sample_interval_secs = 5\n").unwrap();
        assert_eq!(load_config(&path).unwrap().sample_interval_secs, 5);
    }
}
