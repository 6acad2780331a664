use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use dotenv::dotenv;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scheduling_cell::NoShowSweeper;
use shared_config::SchedulingConfig;
use shared_database::{PostgrestStore, SystemClock};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting no-show sweeper");

    let config = SchedulingConfig::from_env();
    if !config.is_store_configured() {
        anyhow::bail!("scheduling store is not configured");
    }

    let store = Arc::new(PostgrestStore::new(&config).context("failed to build store client")?);
    let clock = Arc::new(SystemClock);
    let sweeper = NoShowSweeper::new(store, clock, config.no_show_grace_minutes);

    let mut ticker = tokio::time::interval(Duration::from_secs(config.sweep_interval_secs));
    info!("Sweeping every {}s", config.sweep_interval_secs);

    loop {
        ticker.tick().await;
        let report = sweeper
            .run_once()
            .await
            .context("no-show sweep pass failed");
        match report {
            Ok(report) if report.skipped => {
                warn!("Sweep pass skipped, previous pass still running")
            }
            Ok(report) => {
                if report.transitioned > 0 {
                    info!("Swept {} appointments to no_show", report.transitioned);
                }
            }
            Err(err) => warn!("{:#}", err),
        }
    }
}
