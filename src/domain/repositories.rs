//! Repository interfaces for leaderboard ingestion
//!
//! Contains trait definitions for the logical find / create / update
//! operations the sync engine needs. Every write is keyed by a natural key
//! so concurrent shard tasks can repeat it safely.

use async_trait::async_trait;
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::domain::character_class::CharacterClass;
use crate::domain::cursor::ShardCursor;
use crate::domain::entities::{
    Character, Clan, ClanServerAffiliation, ClassAssignment, Membership, MembershipScope, Region,
    Server, ServerRegion,
};
use crate::domain::shard::{Shard, ShardKey};

#[async_trait]
pub trait RankingRepository: Send + Sync {
    // Topology
    async fn find_or_create_region(&self, name: &str) -> Result<Region>;
    async fn find_or_create_server(&self, name: &str) -> Result<Server>;
    async fn find_server_by_name(&self, name: &str) -> Result<Option<Server>>;
    /// Returns the link when a new row was inserted, `None` when it existed.
    async fn link_server_region(&self, server_id: i64, region_id: i64) -> Result<Option<ServerRegion>>;
    async fn upsert_classes(&self, classes: &[CharacterClass]) -> Result<()>;

    // Characters and clans
    async fn upsert_character(&self, username: &str, powerscore: i64, now: DateTime<Utc>) -> Result<Character>;
    async fn find_character_by_username(&self, username: &str) -> Result<Option<Character>>;
    async fn upsert_clan(&self, name: &str, now: DateTime<Utc>) -> Result<Clan>;
    /// Creates the clan only when missing; never refreshes `checked_at`.
    async fn ensure_clan(&self, name: &str, now: DateTime<Utc>) -> Result<Clan>;
    async fn find_clan_by_name(&self, name: &str) -> Result<Option<Clan>>;

    // Memberships
    async fn find_active_membership(&self, scope: MembershipScope, character_id: i64) -> Result<Option<Membership>>;
    async fn refresh_membership(&self, scope: MembershipScope, membership_id: i64, now: DateTime<Utc>) -> Result<()>;
    /// Closes `active_id` and opens a membership to `target_id` atomically.
    async fn move_membership(
        &self,
        scope: MembershipScope,
        active_id: i64,
        character_id: i64,
        target_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Membership>;
    async fn open_membership(&self, scope: MembershipScope, character_id: i64, target_id: i64, now: DateTime<Utc>) -> Result<Membership>;
    async fn list_memberships(&self, scope: MembershipScope, character_id: i64) -> Result<Vec<Membership>>;

    // Clan/server affiliation
    async fn find_active_affiliations(&self, clan_id: i64) -> Result<Vec<ClanServerAffiliation>>;
    /// In one transaction: disband `stale`, then make `(clan_id, server_id)`
    /// active. An active row is refreshed; otherwise the latest row for the
    /// pair disbanded at or after `revive_since` is reactivated, and only then
    /// is a new row inserted.
    async fn settle_affiliation(
        &self,
        clan_id: i64,
        server_id: i64,
        stale: &[i64],
        revive_since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<ClanServerAffiliation>;

    // Classes played
    /// Returns true when a new assignment row was inserted.
    async fn touch_class_assignment(&self, character_id: i64, class_id: i64, now: DateTime<Utc>) -> Result<bool>;
    async fn list_class_assignments(&self, character_id: i64) -> Result<Vec<ClassAssignment>>;
}

/// Persisted per-shard crawl position.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Missing cursors read as `ShardCursor::default()`.
    async fn read_cursor(&self, key: ShardKey) -> Result<ShardCursor>;
    async fn write_cursor(&self, shard: &Shard, cursor: ShardCursor) -> Result<()>;
}

/// Mutual exclusion for a whole ingestion run, leased for `ttl`.
#[async_trait]
pub trait RunLock: Send + Sync {
    /// Returns false when another owner holds an unexpired lease.
    async fn try_acquire(&self, name: &str, owner: &str, ttl: Duration) -> Result<bool>;
    async fn release(&self, name: &str, owner: &str) -> Result<()>;
    async fn is_held(&self, name: &str) -> Result<bool>;
}
