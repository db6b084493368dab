//! Application layer module
//!
//! This module contains the sync workflow: topology discovery, the per-shard
//! crawl loop, row reconciliation and the run scheduler.

pub mod error;
pub mod leaderboard_source;
pub mod reconciliation;
pub mod scheduler;
pub mod shard_crawler;
pub mod topology_builder;

pub use error::{FetchError, SyncError};
pub use leaderboard_source::LeaderboardSource;
pub use reconciliation::{PageStats, ReconcileOutcome, ReconciliationEngine, Transition};
pub use scheduler::{LeaderboardSyncScheduler, RunOutcome, SchedulerSettings, SyncReport, RANKING_LOCK};
pub use shard_crawler::{ShardCrawler, ShardReport};
pub use topology_builder::ShardTopologyBuilder;
