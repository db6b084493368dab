//! Port to the remote leaderboard
//!
//! The HTTP implementation lives in infrastructure; tests script it.

use anyhow::Result;
use async_trait::async_trait;

use crate::application::error::FetchError;
use crate::domain::{PageFetch, RankType, Shard, Topology};

#[async_trait]
pub trait LeaderboardSource: Send + Sync {
    /// Fetch and parse the region/server listing.
    async fn fetch_topology(&self) -> Result<Topology>;

    /// Fetch and parse one ranking page of a shard.
    ///
    /// Non-success statuses and empty bodies come back as
    /// `PageFetch::Exhausted`. A page whose table has no rows is still
    /// `PageFetch::Rows`, so the caller keeps descending. An `Err` means the
    /// page could not be retrieved and should be abandoned.
    async fn fetch_page(&self, shard: &Shard, page: u32, rank_type: RankType) -> Result<PageFetch, FetchError>;
}
