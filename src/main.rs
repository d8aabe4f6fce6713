/// HockeyHarvest — harvest run
///
/// What it does:
///   1. Finds regional mirrors from HARVEST_ROOT_URL (+ HARVEST_EXTRA_DOMAINS)
///   2. Pulls tournaments of every season, skips mirrors republishing known data
///   3. Walks teams and rosters, stores players with season freshness
///   4. Per-tournament player statistics, optional player-id scan
///
/// Run:
///   cargo run --bin hockey-harvest

use anyhow::Result;
use dotenv::dotenv;
use harvester::{HarvestConfig, Harvester};
use std::env;
use std::fs::File;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let config = HarvestConfig::from_env();
    info!("=== HockeyHarvest ===");
    info!("Root: {}", config.root_url);
    info!(
        "Workers: domains={} teams={} stats={} scan={}",
        config.domain_workers, config.team_workers, config.stats_workers, config.scan_workers
    );
    info!("DB: {}  Logs: {}", config.db_path.display(), config.log_dir.display());

    // Single instance lock
    let lock_file_path = env::temp_dir().join("hockey_harvest.lock");
    let lock_file = match File::create(&lock_file_path) {
        Ok(f) => f,
        Err(e) => {
            warn!("Failed to create lock file at {:?}: {}", lock_file_path, e);
            return Ok(());
        }
    };

    let mut lock = fd_lock::RwLock::new(lock_file);
    let _write_guard = match lock.try_write() {
        Ok(guard) => {
            info!("Acquired single-instance lock.");
            guard
        }
        Err(_) => {
            warn!("Another harvester is already running! Exiting.");
            return Ok(());
        }
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C: finishing in-flight work, no new jobs");
            on_signal.cancel();
        }
    });

    let harvester = Harvester::from_config(config)?;
    let summary = harvester.run(cancel).await?;

    if summary.total_errors() > 0 {
        warn!("Run finished with {} errors (see log above)", summary.total_errors());
    }
    Ok(())
}
