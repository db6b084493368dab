//! Domain module - Core business logic and entities
//!
//! This module contains the leaderboard entities, shard topology and cursor
//! types, and the repository traits the application layer is written
//! against.
//!
//! Modern Rust module organization (Rust 2018+ style):
//! - Each module is its own file in the domain/ directory
//! - Public exports are defined here for convenience

pub mod character_class;
pub mod cursor;
pub mod entities;
pub mod ranking;
pub mod repositories;
pub mod shard;

pub use character_class::CharacterClass;
pub use cursor::{Clock, CrawlMode, CrawlPlan, FixedClock, ShardCursor, SystemClock, DEFAULT_MAX_PAGES};
pub use entities::{
    Character, Clan, ClanServerAffiliation, ClassAssignment, Membership, MembershipScope, Region,
    Server, ServerRegion, NO_CLAN_SENTINEL,
};
pub use ranking::{PageFetch, RankType, RawRankingRow};
pub use repositories::{CursorStore, RankingRepository, RunLock};
pub use shard::{Continent, Shard, ShardKey, Topology, WorldServer};
