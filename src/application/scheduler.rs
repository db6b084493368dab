//! Shard scheduler
//!
//! Owns the run lock, discovers the topology once and fans shards out over
//! a bounded number of workers. A failing or panicking shard is logged and
//! counted; its siblings keep running. The lock is released on every exit
//! path, including a panic inside the run.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::application::error::{panic_message, SyncError};
use crate::application::reconciliation::ReconciliationEngine;
use crate::application::shard_crawler::{ShardCrawler, ShardReport};
use crate::application::topology_builder::ShardTopologyBuilder;
use crate::application::LeaderboardSource;
use crate::domain::{
    CharacterClass, Clock, CursorStore, RankType, RankingRepository, RunLock, Shard,
    DEFAULT_MAX_PAGES,
};

/// Run lock name shared by every instance of the job
pub const RANKING_LOCK: &str = "mir4.server.cron.ranking";

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub lock_name: String,
    pub lock_ttl: Duration,
    pub max_concurrent_shards: usize,
    pub max_pages: u32,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            lock_name: RANKING_LOCK.to_string(),
            lock_ttl: Duration::from_secs(6 * 60 * 60),
            max_concurrent_shards: 4,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

/// Summary of one completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub shards_discovered: usize,
    pub shards_skipped: usize,
    pub shards_crawled: usize,
    pub shards_failed: usize,
    pub pages_fetched: usize,
    pub pages_failed: usize,
    pub rows_reconciled: usize,
    pub rows_dropped: usize,
    pub rows_duplicate: usize,
    pub elapsed_ms: u64,
}

impl SyncReport {
    fn absorb(&mut self, shard: &ShardReport) {
        if shard.is_skip() {
            self.shards_skipped += 1;
            return;
        }
        self.shards_crawled += 1;
        self.pages_fetched += shard.pages_fetched;
        self.pages_failed += shard.pages_failed;
        self.rows_reconciled += shard.rows_reconciled;
        self.rows_dropped += shard.rows_dropped;
        self.rows_duplicate += shard.rows_duplicate;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(SyncReport),
    /// Another run holds the lock; nothing was done.
    AlreadyRunning,
}

pub struct LeaderboardSyncScheduler {
    source: Arc<dyn LeaderboardSource>,
    repository: Arc<dyn RankingRepository>,
    cursors: Arc<dyn CursorStore>,
    lock: Arc<dyn RunLock>,
    clock: Arc<dyn Clock>,
    settings: SchedulerSettings,
}

impl LeaderboardSyncScheduler {
    pub fn new(
        source: Arc<dyn LeaderboardSource>,
        repository: Arc<dyn RankingRepository>,
        cursors: Arc<dyn CursorStore>,
        lock: Arc<dyn RunLock>,
        clock: Arc<dyn Clock>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            source,
            repository,
            cursors,
            lock,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Run one sync unless another run holds the lock.
    pub async fn run(&self, rank_type: RankType) -> Result<RunOutcome, SyncError> {
        let lock_name = self.settings.lock_name.as_str();
        let owner = Uuid::new_v4().to_string();

        let acquired = self
            .lock
            .try_acquire(lock_name, &owner, self.settings.lock_ttl)
            .await
            .map_err(|e| SyncError::lock(lock_name, &e))?;
        if !acquired {
            info!(lock = lock_name, "⏳ Sync already running, skipping this trigger");
            return Ok(RunOutcome::AlreadyRunning);
        }

        info!(lock = lock_name, owner = %owner, "🔒 Run lock acquired");
        let result = AssertUnwindSafe(self.run_locked(rank_type)).catch_unwind().await;

        if let Err(e) = self.lock.release(lock_name, &owner).await {
            error!(lock = lock_name, "Failed to release run lock: {:#}", e);
        } else {
            info!(lock = lock_name, "🔓 Run lock released");
        }

        match result {
            Ok(report) => Ok(RunOutcome::Completed(report)),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("💥 Sync run panicked: {}", message);
                Err(SyncError::RunPanicked(message))
            }
        }
    }

    async fn run_locked(&self, rank_type: RankType) -> SyncReport {
        let started = Instant::now();
        let today = self.clock.today();
        let mut report = SyncReport::default();

        if let Err(e) = self.repository.upsert_classes(&CharacterClass::ALL).await {
            error!("Failed to seed character classes: {:#}", e);
        }

        let builder = ShardTopologyBuilder::new(
            Arc::clone(&self.source),
            Arc::clone(&self.repository),
            Arc::clone(&self.clock),
        );
        let shards = builder.discover_topology().await;
        report.shards_discovered = shards.len();

        if shards.is_empty() {
            warn!("Nothing to crawl this run");
        } else {
            self.crawl_shards(shards, rank_type, today, &mut report).await;
        }

        report.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            discovered = report.shards_discovered,
            crawled = report.shards_crawled,
            skipped = report.shards_skipped,
            failed = report.shards_failed,
            pages = report.pages_fetched,
            rows = report.rows_reconciled,
            elapsed_ms = report.elapsed_ms,
            "🏁 Sync run finished"
        );
        report
    }

    async fn crawl_shards(
        &self,
        shards: Vec<Shard>,
        rank_type: RankType,
        today: chrono::NaiveDate,
        report: &mut SyncReport,
    ) {
        let engine = Arc::new(ReconciliationEngine::new(
            Arc::clone(&self.repository),
            Arc::clone(&self.clock),
        ));
        let crawler = Arc::new(ShardCrawler::new(
            Arc::clone(&self.source),
            Arc::clone(&self.cursors),
            engine,
            rank_type,
            self.settings.max_pages,
        ));
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent_shards.max(1)));
        let mut tasks = JoinSet::new();

        for shard in shards {
            let crawler = Arc::clone(&crawler);
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => return (shard, Err(SyncError::Other(e.into()))),
                };

                let result = AssertUnwindSafe(crawler.crawl(&shard, today))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|payload| {
                        Err(SyncError::ShardPanicked {
                            shard: shard.to_string(),
                            message: panic_message(payload.as_ref()),
                        })
                    });
                (shard, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(shard_report))) => report.absorb(&shard_report),
                Ok((shard, Err(e))) => {
                    error!(shard = %shard, "❌ Shard failed: {}", e);
                    report.shards_failed += 1;
                }
                Err(e) => {
                    error!("❌ Shard task aborted: {}", e);
                    report.shards_failed += 1;
                }
            }
        }
    }

    /// Trigger `run` every `interval` until `shutdown` is cancelled.
    /// Missed ticks are skipped; a run never overlaps the previous one.
    pub async fn run_periodically(
        &self,
        rank_type: RankType,
        interval: Duration,
        run_on_start: bool,
        shutdown: CancellationToken,
    ) {
        let mut ticker = if run_on_start {
            tokio::time::interval(interval)
        } else {
            tokio::time::interval_at(tokio::time::Instant::now() + interval, interval)
        };
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("🛑 Scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    match self.run(rank_type).await {
                        Ok(RunOutcome::Completed(report)) => {
                            info!("📊 Run report: {}", serde_json::to_string(&report).unwrap_or_default());
                        }
                        Ok(RunOutcome::AlreadyRunning) => {}
                        Err(e) => error!("❌ Sync run failed: {}", e),
                    }
                }
            }
        }
    }
}
