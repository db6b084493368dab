//! `mir4-leaderboard-sync` entry point
//!
//! Runs the sync on a fixed interval until Ctrl-C. `--once` performs a
//! single run and exits.

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use mir4_leaderboard_sync::application::RunOutcome;
use mir4_leaderboard_sync::build_scheduler;
use mir4_leaderboard_sync::domain::RankType;
use mir4_leaderboard_sync::infrastructure::logging::{init_logging, log_system_info};
use mir4_leaderboard_sync::infrastructure::{AppConfig, DatabaseConnection};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    init_logging(&config.logging, config.scheduler.utc_offset_hours)?;
    log_system_info();

    let db = DatabaseConnection::new(&config.database).await?;
    db.migrate().await?;

    let scheduler = build_scheduler(&config, &db)?;
    let rank_type = RankType(config.leaderboard.rank_type);

    if std::env::args().any(|arg| arg == "--once") {
        match scheduler.run(rank_type).await? {
            RunOutcome::Completed(report) => info!("📊 Run report: {}", serde_json::to_string(&report)?),
            RunOutcome::AlreadyRunning => info!("Another run holds the lock"),
        }
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
        }
        info!("Shutdown requested");
        signal_token.cancel();
    });

    info!(
        interval_seconds = config.scheduler.interval_seconds,
        max_concurrent_shards = config.scheduler.max_concurrent_shards,
        "⏰ Scheduler started"
    );
    scheduler
        .run_periodically(
            rank_type,
            config.scheduler.interval(),
            config.scheduler.run_on_start,
            shutdown,
        )
        .await;

    db.pool().close().await;
    Ok(())
}
