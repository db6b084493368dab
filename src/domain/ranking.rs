//! Raw ranking rows as extracted from one leaderboard page.

use serde::{Deserialize, Serialize};

use super::character_class::CharacterClass;

/// Leaderboard kind requested from the site; power score ranking is `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankType(pub u32);

impl RankType {
    pub const POWER_SCORE: Self = Self(1);
}

impl Default for RankType {
    fn default() -> Self {
        Self::POWER_SCORE
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRankingRow {
    /// Position on the board; top ranks may render as badges without text.
    pub rank: Option<u32>,
    pub username: String,
    /// Empty when the player has no clan.
    pub clan_name: String,
    pub powerscore: i64,
    pub class: CharacterClass,
}

/// Result of fetching one ranking page.
#[derive(Debug, Clone, PartialEq)]
pub enum PageFetch {
    Rows {
        url: String,
        rows: Vec<RawRankingRow>,
        /// Rows that failed to parse and were dropped.
        skipped: usize,
    },
    /// Empty body or a non-success status: stop paginating.
    Exhausted { url: String },
}
