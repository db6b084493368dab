//! MIR4 Leaderboard Sync - power score ranking ingestion
//!
//! Periodically scrapes the public MIR4 ranking site shard by shard
//! (region × server) and reconciles players, clans, classes and their
//! membership history into a SQLite store.

// Module declarations
pub mod application;
pub mod domain;
pub mod infrastructure;

use std::sync::Arc;

use anyhow::{Context, Result};

use application::{LeaderboardSyncScheduler, SchedulerSettings};
use domain::SystemClock;
use infrastructure::{
    AppConfig, DatabaseConnection, HttpClient, HttpClientConfig, HttpLeaderboardSource,
    SqliteCursorStore, SqliteRankingRepository, SqliteRunLock,
};

/// Wire the production scheduler: HTTP source, SQLite stores and lock.
pub fn build_scheduler(config: &AppConfig, db: &DatabaseConnection) -> Result<LeaderboardSyncScheduler> {
    let client = Arc::new(HttpClient::new(HttpClientConfig::from(&config.http))?);
    let source = Arc::new(HttpLeaderboardSource::new(client, &config.leaderboard)?);
    let clock = SystemClock::with_utc_offset_hours(config.scheduler.utc_offset_hours)
        .context("Invalid scheduler.utc_offset_hours")?;

    Ok(LeaderboardSyncScheduler::new(
        source,
        Arc::new(SqliteRankingRepository::new(db.pool().clone())),
        Arc::new(SqliteCursorStore::new(db.pool().clone())),
        Arc::new(SqliteRunLock::new(db.pool().clone())),
        Arc::new(clock),
        scheduler_settings(config),
    ))
}

pub fn scheduler_settings(config: &AppConfig) -> SchedulerSettings {
    SchedulerSettings {
        lock_name: application::RANKING_LOCK.to_string(),
        lock_ttl: config.scheduler.lock_ttl(),
        max_concurrent_shards: config.scheduler.max_concurrent_shards,
        max_pages: config.leaderboard.max_pages,
    }
}
