//! Domain entities
//!
//! Rows of the normalized leaderboard store. Regions, servers, clans and
//! characters are created on first sighting and never deleted; membership
//! and affiliation rows keep history by flipping their leave/disband flag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name of the clan row that stands for "no clan".
pub const NO_CLAN_SENTINEL: &str = "--";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub id: i64,
    pub name: String,
}

/// Join row linking a server to the region it was listed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRegion {
    pub server_id: i64,
    pub region_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clan {
    pub id: i64,
    pub name: String,
    /// Last time the clan appeared on any ranking page.
    pub checked_at: DateTime<Utc>,
}

impl Clan {
    /// Whether a clan name denotes a player without a clan.
    pub fn is_unaffiliated_name(name: &str) -> bool {
        name.is_empty() || name == NO_CLAN_SENTINEL
    }

    pub fn is_unaffiliated(&self) -> bool {
        Self::is_unaffiliated_name(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: i64,
    pub username: String,
    pub powerscore: i64,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassAssignment {
    pub character_id: i64,
    pub class_id: i64,
    pub checked_at: DateTime<Utc>,
}

/// Which membership table a transition applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MembershipScope {
    Clan,
    Server,
}

impl MembershipScope {
    pub const fn table(self) -> &'static str {
        match self {
            Self::Clan => "clan_memberships",
            Self::Server => "server_memberships",
        }
    }

    pub const fn target_column(self) -> &'static str {
        match self {
            Self::Clan => "clan_id",
            Self::Server => "server_id",
        }
    }
}

impl std::fmt::Display for MembershipScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clan => write!(f, "clan"),
            Self::Server => write!(f, "server"),
        }
    }
}

/// A character's clan or server membership row.
///
/// `target_id` is the clan id or server id depending on `scope`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub id: i64,
    pub scope: MembershipScope,
    pub character_id: i64,
    pub target_id: i64,
    pub is_leave: bool,
    pub checked_at: DateTime<Utc>,
}

/// Which server a clan currently plays on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClanServerAffiliation {
    pub id: i64,
    pub clan_id: i64,
    pub server_id: i64,
    pub is_disband: bool,
    pub checked_at: DateTime<Utc>,
}
