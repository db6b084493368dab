//! Per-shard crawl loop
//!
//! Pages of one shard are fetched strictly in sequence, highest first, and
//! every page is fully reconciled before the cursor moves past it.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::application::error::SyncError;
use crate::application::reconciliation::ReconciliationEngine;
use crate::application::LeaderboardSource;
use crate::domain::{CrawlMode, CrawlPlan, CursorStore, PageFetch, RankType, Shard, ShardCursor};

/// Outcome of crawling one shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardReport {
    pub mode: CrawlMode,
    pub start_page: u32,
    pub pages_fetched: usize,
    /// Pages abandoned after a transport or parse failure
    pub pages_failed: usize,
    pub rows_reconciled: usize,
    pub rows_dropped: usize,
    pub rows_duplicate: usize,
    /// The site reported no more rows before page 1 was reached
    pub exhausted: bool,
}

impl ShardReport {
    fn new(plan: &CrawlPlan) -> Self {
        Self {
            mode: plan.mode,
            start_page: plan.start_page,
            pages_fetched: 0,
            pages_failed: 0,
            rows_reconciled: 0,
            rows_dropped: 0,
            rows_duplicate: 0,
            exhausted: false,
        }
    }

    pub fn is_skip(&self) -> bool {
        self.mode == CrawlMode::Skip
    }
}

pub struct ShardCrawler {
    source: Arc<dyn LeaderboardSource>,
    cursors: Arc<dyn CursorStore>,
    engine: Arc<ReconciliationEngine>,
    rank_type: RankType,
    max_pages: u32,
}

impl ShardCrawler {
    pub fn new(
        source: Arc<dyn LeaderboardSource>,
        cursors: Arc<dyn CursorStore>,
        engine: Arc<ReconciliationEngine>,
        rank_type: RankType,
        max_pages: u32,
    ) -> Self {
        Self {
            source,
            cursors,
            engine,
            rank_type,
            max_pages,
        }
    }

    pub async fn crawl(&self, shard: &Shard, today: NaiveDate) -> Result<ShardReport, SyncError> {
        let cursor = self
            .cursors
            .read_cursor(shard.key())
            .await
            .map_err(|e| SyncError::cursor(shard, &e))?;

        let plan = CrawlPlan::decide(&cursor, today, self.max_pages);
        let mut report = ShardReport::new(&plan);

        if plan.is_skip() {
            info!(shard = %shard, "⏭️ Already synced today, skipping");
            return Ok(report);
        }

        info!(
            shard = %shard,
            mode = ?plan.mode,
            start_page = plan.start_page,
            path = %shard.config_path("page"),
            "🚀 Crawling shard"
        );

        if let Some(initial) = plan.initial_cursor() {
            self.save(shard, initial).await?;
        }

        for page in plan.pages() {
            match self.source.fetch_page(shard, page, self.rank_type).await {
                Ok(PageFetch::Rows { url, rows, skipped }) => {
                    let stats = self.engine.reconcile_page(shard, &rows, &url).await;
                    report.pages_fetched += 1;
                    report.rows_reconciled += stats.reconciled;
                    report.rows_dropped += stats.dropped + skipped;
                    report.rows_duplicate += stats.duplicates;
                    self.save(shard, plan.cursor_after_page(page)).await?;
                }
                Ok(PageFetch::Exhausted { url }) => {
                    info!(shard = %shard, page, url = %url, "Shard exhausted");
                    report.exhausted = true;
                    self.save(shard, plan.cursor_after_exhaustion()).await?;
                    break;
                }
                Err(e) => {
                    warn!(shard = %shard, page, timeout = e.is_timeout(), "Abandoning page: {}", e);
                    report.pages_failed += 1;
                    self.save(shard, plan.cursor_after_page(page)).await?;
                }
            }
        }

        info!(
            shard = %shard,
            pages = report.pages_fetched,
            failed = report.pages_failed,
            reconciled = report.rows_reconciled,
            dropped = report.rows_dropped,
            "✅ Shard crawl finished"
        );
        Ok(report)
    }

    async fn save(&self, shard: &Shard, cursor: ShardCursor) -> Result<(), SyncError> {
        self.cursors
            .write_cursor(shard, cursor)
            .await
            .map_err(|e| SyncError::cursor(shard, &e))
    }
}
