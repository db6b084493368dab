//! Shared fixtures: a scripted leaderboard, a recording cursor store and a
//! steppable clock over an in-memory SQLite database.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, TimeZone, Utc};

use mir4_leaderboard_sync::application::{
    FetchError, LeaderboardSource, LeaderboardSyncScheduler, ReconciliationEngine,
    SchedulerSettings,
};
use mir4_leaderboard_sync::domain::{
    CharacterClass, Clock, CursorStore, PageFetch, RankType, RankingRepository, RawRankingRow,
    Shard, ShardCursor, ShardKey, Topology, WorldServer,
};
use mir4_leaderboard_sync::infrastructure::{
    DatabaseConnection, InMemoryRunLock, SqliteCursorStore, SqliteRankingRepository,
};

/// Observable side effects, in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Topology,
    Fetch { server_id: u32, page: u32 },
    CursorWrite { server_id: u32, cursor: ShardCursor },
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

pub fn record(log: &EventLog, event: Event) {
    log.lock().unwrap().push(event);
}

#[derive(Debug, Clone)]
pub enum Script {
    Rows(Vec<RawRankingRow>),
    Exhausted,
    Fail,
    Panic,
}

/// Leaderboard answering from a script; unscripted pages have no rows,
/// like pages past the end of a short board.
pub struct FakeSource {
    topology: Option<Topology>,
    pages: HashMap<(u32, u32), Script>,
    topology_delay: Duration,
    events: EventLog,
}

impl FakeSource {
    pub fn new(topology: Topology, events: EventLog) -> Self {
        Self {
            topology: Some(topology),
            pages: HashMap::new(),
            topology_delay: Duration::ZERO,
            events,
        }
    }

    pub fn unreachable(events: EventLog) -> Self {
        Self {
            topology: None,
            pages: HashMap::new(),
            topology_delay: Duration::ZERO,
            events,
        }
    }

    pub fn page(mut self, server_id: u32, page: u32, script: Script) -> Self {
        self.pages.insert((server_id, page), script);
        self
    }

    pub fn with_topology_delay(mut self, delay: Duration) -> Self {
        self.topology_delay = delay;
        self
    }
}

#[async_trait]
impl LeaderboardSource for FakeSource {
    async fn fetch_topology(&self) -> Result<Topology> {
        record(&self.events, Event::Topology);
        if !self.topology_delay.is_zero() {
            tokio::time::sleep(self.topology_delay).await;
        }
        self.topology.clone().ok_or_else(|| anyhow!("connection refused"))
    }

    async fn fetch_page(&self, shard: &Shard, page: u32, _rank_type: RankType) -> Result<PageFetch, FetchError> {
        record(
            &self.events,
            Event::Fetch {
                server_id: shard.server_id,
                page,
            },
        );
        let url = format!("fake://{}/{}", shard.server_id, page);

        match self.pages.get(&(shard.server_id, page)) {
            Some(Script::Rows(rows)) => Ok(PageFetch::Rows {
                url,
                rows: rows.clone(),
                skipped: 0,
            }),
            Some(Script::Fail) => Err(FetchError::Transport {
                url,
                message: "request timed out".into(),
            }),
            Some(Script::Panic) => panic!("scripted panic on {url}"),
            Some(Script::Exhausted) => Ok(PageFetch::Exhausted { url }),
            None => Ok(PageFetch::Rows {
                url,
                rows: Vec::new(),
                skipped: 0,
            }),
        }
    }
}

/// Cursor store that records every write into the event log.
pub struct RecordingCursorStore {
    inner: SqliteCursorStore,
    events: EventLog,
}

#[async_trait]
impl CursorStore for RecordingCursorStore {
    async fn read_cursor(&self, key: ShardKey) -> Result<ShardCursor> {
        self.inner.read_cursor(key).await
    }

    async fn write_cursor(&self, shard: &Shard, cursor: ShardCursor) -> Result<()> {
        record(
            &self.events,
            Event::CursorWrite {
                server_id: shard.server_id,
                cursor,
            },
        );
        self.inner.write_cursor(shard, cursor).await
    }
}

pub struct TestClock {
    now: Mutex<DateTime<Utc>>,
}

impl TestClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn advance(&self, minutes: i64) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::minutes(minutes);
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    fn offset(&self) -> FixedOffset {
        Utc.fix()
    }
}

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
}

pub fn yesterday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 9).unwrap()
}

pub fn row(username: &str, clan: &str, powerscore: i64, class: CharacterClass) -> RawRankingRow {
    RawRankingRow {
        rank: Some(1),
        username: username.to_string(),
        clan_name: clan.to_string(),
        powerscore,
        class,
    }
}

pub fn shard(region_id: u32, region: &str, server_id: u32, server: &str) -> Shard {
    Shard {
        region_id,
        region_name: region.to_string(),
        server_id,
        server_name: server.to_string(),
    }
}

pub fn topology(shards: &[Shard]) -> Topology {
    let mut topology = Topology::default();
    for s in shards {
        topology.insert(
            s.region_id,
            &s.region_name,
            WorldServer {
                id: s.server_id,
                name: s.server_name.clone(),
            },
        );
    }
    topology
}

pub fn asia011() -> Shard {
    shard(1, "ASIA", 101, "ASIA011")
}

pub fn asia012() -> Shard {
    shard(1, "ASIA", 102, "ASIA012")
}

pub struct Harness {
    pub db: DatabaseConnection,
    pub repo: Arc<SqliteRankingRepository>,
    pub cursors: Arc<SqliteCursorStore>,
    pub lock: Arc<InMemoryRunLock>,
    pub clock: Arc<TestClock>,
    pub events: EventLog,
}

impl Harness {
    pub async fn new() -> Self {
        let db = DatabaseConnection::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        let pool = db.pool().clone();

        Self {
            repo: Arc::new(SqliteRankingRepository::new(pool.clone())),
            cursors: Arc::new(SqliteCursorStore::new(pool)),
            lock: Arc::new(InMemoryRunLock::new()),
            clock: Arc::new(TestClock::at(Utc.with_ymd_and_hms(2024, 5, 10, 3, 0, 0).unwrap())),
            events: EventLog::default(),
            db,
        }
    }

    /// Store with classes seeded and the given shards' servers registered.
    pub async fn seeded(shards: &[Shard]) -> Self {
        let harness = Self::new().await;
        harness.repo.upsert_classes(&CharacterClass::ALL).await.unwrap();
        for s in shards {
            harness.repo.find_or_create_server(&s.server_name).await.unwrap();
        }
        harness
    }

    pub fn engine(&self) -> ReconciliationEngine {
        ReconciliationEngine::new(self.repo.clone(), self.clock.clone())
    }

    pub fn scheduler(&self, source: FakeSource, max_pages: u32) -> LeaderboardSyncScheduler {
        self.scheduler_with(Arc::new(source), max_pages)
    }

    pub fn scheduler_with(&self, source: Arc<dyn LeaderboardSource>, max_pages: u32) -> LeaderboardSyncScheduler {
        let cursors = RecordingCursorStore {
            inner: SqliteCursorStore::new(self.db.pool().clone()),
            events: self.events.clone(),
        };
        LeaderboardSyncScheduler::new(
            source,
            self.repo.clone(),
            Arc::new(cursors),
            self.lock.clone(),
            self.clock.clone(),
            SchedulerSettings {
                max_concurrent_shards: 2,
                max_pages,
                ..SchedulerSettings::default()
            },
        )
    }

    pub async fn set_cursor(&self, shard: &Shard, cursor: ShardCursor) {
        self.cursors.write_cursor(shard, cursor).await.unwrap();
    }

    pub async fn cursor(&self, shard: &Shard) -> ShardCursor {
        self.cursors.read_cursor(shard.key()).await.unwrap()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn fetched_pages(&self, server_id: u32) -> Vec<u32> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Fetch { server_id: id, page } if id == server_id => Some(page),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: fn(&Event) -> bool) -> usize {
        self.events().iter().filter(|e| wanted(e)).count()
    }
}
