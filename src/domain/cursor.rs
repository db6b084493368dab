//! Shard cursor and crawl-mode policy.
//!
//! Responsibility:
//! - decide once per run whether a shard is skipped, fully resynced or resumed
//! - compute the cursor persisted before the first fetch and after every page
//!
//! Pages are walked in descending order, from the start page down to 1.
//! On the day a shard is first crawled the cursor stays pinned at the
//! upper bound so the next run on that same day repeats a full pass while
//! recording real progress.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};

/// Default upper bound of pages crawled in a full resync.
pub const DEFAULT_MAX_PAGES: u32 = 200;

/// Persisted per-shard crawl position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardCursor {
    pub page: u32,
    pub last_sync_date: Option<NaiveDate>,
}

impl ShardCursor {
    pub const fn new(page: u32, last_sync_date: NaiveDate) -> Self {
        Self {
            page,
            last_sync_date: Some(last_sync_date),
        }
    }

    pub fn synced_on(&self, day: NaiveDate) -> bool {
        self.last_sync_date == Some(day)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrawlMode {
    /// Fully synced today already.
    Skip,
    /// Restart from the upper bound to capture the whole board.
    FullResync,
    /// Continue a descending crawl left mid-way by a previous run.
    Resume,
}

/// Per-shard decision for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlPlan {
    pub mode: CrawlMode,
    pub start_page: u32,
    pub today: NaiveDate,
    pub max_pages: u32,
    /// Cursor was not synced today when the run started; keep it at the
    /// upper bound after every page.
    pub pinned: bool,
}

impl CrawlPlan {
    pub fn decide(cursor: &ShardCursor, today: NaiveDate, max_pages: u32) -> Self {
        let synced_today = cursor.synced_on(today);
        let mode = match (synced_today, cursor.page <= 1) {
            (true, true) => CrawlMode::Skip,
            (false, true) => CrawlMode::FullResync,
            (_, false) => CrawlMode::Resume,
        };
        let start_page = match mode {
            CrawlMode::Skip => 0,
            CrawlMode::FullResync => max_pages,
            CrawlMode::Resume => cursor.page.min(max_pages),
        };

        Self {
            mode,
            start_page,
            today,
            max_pages,
            pinned: !synced_today,
        }
    }

    pub fn is_skip(&self) -> bool {
        self.mode == CrawlMode::Skip
    }

    /// Cursor written before the first fetch; records today as sync date.
    pub fn initial_cursor(&self) -> Option<ShardCursor> {
        match self.mode {
            CrawlMode::Skip => None,
            CrawlMode::FullResync | CrawlMode::Resume => {
                Some(ShardCursor::new(self.start_page, self.today))
            }
        }
    }

    /// Cursor written once `page` has been processed.
    pub fn cursor_after_page(&self, page: u32) -> ShardCursor {
        let page = if self.pinned { self.max_pages } else { page };
        ShardCursor::new(page, self.today)
    }

    /// Cursor written when the shard reported no more rows.
    pub fn cursor_after_exhaustion(&self) -> ShardCursor {
        self.cursor_after_page(0)
    }

    /// Page numbers to fetch, highest first, never below 1.
    pub fn pages(&self) -> std::iter::Rev<std::ops::RangeInclusive<u32>> {
        (1..=self.start_page).rev()
    }
}

/// Source of "now" and of the game-day used for cursor dates.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn offset(&self) -> FixedOffset;

    fn today(&self) -> NaiveDate {
        self.now().with_timezone(&self.offset()).date_naive()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn with_utc_offset_hours(hours: i32) -> Option<Self> {
        FixedOffset::east_opt(hours * 3600).map(|offset| Self { offset })
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

/// Clock frozen at a given instant, for deterministic runs.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    pub at: DateTime<Utc>,
    pub offset: FixedOffset,
}

impl FixedClock {
    pub fn utc(at: DateTime<Utc>) -> Self {
        Self {
            at,
            offset: Utc.fix(),
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.at
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[rstest]
    #[case(ShardCursor::new(1, day(10)), CrawlMode::Skip, 0)]
    #[case(ShardCursor::new(0, day(10)), CrawlMode::Skip, 0)]
    #[case(ShardCursor::new(1, day(9)), CrawlMode::FullResync, 200)]
    #[case(ShardCursor::default(), CrawlMode::FullResync, 200)]
    #[case(ShardCursor::new(57, day(10)), CrawlMode::Resume, 57)]
    #[case(ShardCursor::new(57, day(9)), CrawlMode::Resume, 57)]
    #[case(ShardCursor::new(450, day(10)), CrawlMode::Resume, 200)]
    fn mode_selection(#[case] cursor: ShardCursor, #[case] mode: CrawlMode, #[case] start: u32) {
        let plan = CrawlPlan::decide(&cursor, day(10), DEFAULT_MAX_PAGES);
        assert_eq!(plan.mode, mode);
        assert_eq!(plan.start_page, start);
    }

    #[test]
    fn skip_fetches_nothing() {
        let plan = CrawlPlan::decide(&ShardCursor::new(1, day(10)), day(10), 200);
        assert!(plan.is_skip());
        assert_eq!(plan.pages().count(), 0);
        assert_eq!(plan.initial_cursor(), None);
    }

    #[test]
    fn full_resync_records_today_and_pins_cursor() {
        let plan = CrawlPlan::decide(&ShardCursor::new(1, day(9)), day(10), 200);
        assert_eq!(plan.initial_cursor(), Some(ShardCursor::new(200, day(10))));
        assert_eq!(plan.pages().next(), Some(200));
        assert_eq!(plan.cursor_after_page(150), ShardCursor::new(200, day(10)));
        assert_eq!(plan.cursor_after_exhaustion(), ShardCursor::new(200, day(10)));
    }

    #[test]
    fn same_day_resume_counts_down() {
        let plan = CrawlPlan::decide(&ShardCursor::new(3, day(10)), day(10), 200);
        assert!(!plan.pinned);
        assert_eq!(plan.pages().collect::<Vec<_>>(), vec![3, 2, 1]);
        assert_eq!(plan.cursor_after_page(2), ShardCursor::new(2, day(10)));
        assert_eq!(plan.cursor_after_exhaustion(), ShardCursor::new(0, day(10)));

        let next = CrawlPlan::decide(&plan.cursor_after_page(1), day(10), 200);
        assert!(next.is_skip());
    }

    #[test]
    fn fixed_clock_uses_offset_for_today() {
        let at = Utc.with_ymd_and_hms(2024, 5, 9, 20, 0, 0).unwrap();
        let utc = FixedClock::utc(at);
        assert_eq!(utc.today(), day(9));

        let manila = FixedClock {
            at,
            offset: FixedOffset::east_opt(8 * 3600).unwrap(),
        };
        assert_eq!(manila.today(), day(10));
    }
}
