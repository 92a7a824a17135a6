//! Operator binary: load a world, serve rounds on timers, save on shutdown.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::RwLock;
use tracing_subscriber::{EnvFilter, fmt};

use hege_region::graph::cache::DEFAULT_CACHE_CAPACITY;
use hege_region::notify::{LogNotifier, NoopNotifier};
use hege_region::persist::{Layout, export_scores, load_world};
use hege_region::sim::{RunConfig, run};

#[derive(Parser)]
#[command(name = "hege-region")]
#[command(about = "Regional simulation engine", version)]
struct Cli {
    /// Definitions directory (config.json, units/, buildings/, knowledge/)
    #[arg(long)]
    definitions: PathBuf,

    /// Directory of map files
    #[arg(long)]
    maps: PathBuf,

    /// Directory of region files to load
    #[arg(long)]
    regions: PathBuf,

    /// Where to save regions on shutdown; defaults to --regions
    #[arg(long)]
    save: Option<PathBuf>,

    /// Seconds between production rounds, 0 to disable
    #[arg(long, default_value_t = 60)]
    produce_every: u64,

    /// Seconds between movement rounds, 0 to disable
    #[arg(long, default_value_t = 10)]
    move_every: u64,

    /// Export scoreboards as JSONL into this directory on shutdown
    #[arg(long)]
    scores: Option<PathBuf>,

    /// Capacity of the next-hop cache shared by movement rounds
    #[arg(long, default_value_t = DEFAULT_CACHE_CAPACITY)]
    route_cache: usize,

    /// Log filter, overrides RUST_LOG
    #[arg(long)]
    log: Option<String>,

    /// Load and check everything, then exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match &cli.log {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hege_region=info")),
    };
    fmt().with_env_filter(filter).with_target(false).init();

    let layout = Layout {
        definitions: cli.definitions.clone(),
        maps: cli.maps.clone(),
        regions: cli.regions.clone(),
    };
    let (world, _maps) = load_world(&layout, Arc::new(LogNotifier::new(NoopNotifier)))
        .with_context(|| format!("loading world from {}", cli.regions.display()))?;

    if cli.check {
        tracing::info!(regions = world.regions.len(), "world is consistent");
        return Ok(());
    }

    let world = Arc::new(RwLock::new(world.with_cache_capacity(cli.route_cache)));
    let secs = |s: u64| (s > 0).then(|| Duration::from_secs(s));
    let config = RunConfig {
        produce_every: secs(cli.produce_every),
        move_every: secs(cli.move_every),
        save_dir: Some(cli.save.clone().unwrap_or_else(|| cli.regions.clone())),
    };
    run(world.clone(), config, shutdown_signal())
        .await
        .context("saving world")?;

    if let Some(dir) = &cli.scores {
        let written = export_scores(&*world.read().await, dir).context("exporting scores")?;
        tracing::info!(regions = written, dir = %dir.display(), "scores exported");
    }
    Ok(())
}

/// Resolves on SIGINT, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown requested");
}
