//! Reconciliation of raw ranking rows into the normalized store
//!
//! Per row, in order:
//! 1. resolve the shard's server (unknown servers drop the row)
//! 2. upsert the character
//! 3. upsert the clan
//! 4. clan membership transition
//! 5. clan/server affiliation
//! 6. class assignment
//! 7. server membership transition
//!
//! Every step is a find-or-create followed by a conditional update, so
//! replaying a row only advances `checked_at`. Steps that close one row and
//! open another run in a single transaction.
//!
//! One engine serves one run. Clans are keyed by name, so a clan name seen
//! on two servers within the same run keeps both affiliations active; only
//! affiliations last seen before the run started are disbanded.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::domain::{
    Clan, Clock, MembershipScope, RankingRepository, RawRankingRow, Server, Shard,
};

/// What happened to one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Reconciled,
    /// The shard's server is not in the store yet.
    ServerUnknown,
}

/// Result of a membership transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Same target as the active row; `checked_at` refreshed.
    Refreshed,
    /// Active row closed and a new one opened.
    Moved { from: i64, to: i64 },
    /// No active row existed.
    Joined,
}

/// Per-page counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageStats {
    pub reconciled: usize,
    pub dropped: usize,
    /// Characters already reconciled earlier in this run.
    pub duplicates: usize,
}

pub struct ReconciliationEngine {
    repository: Arc<dyn RankingRepository>,
    clock: Arc<dyn Clock>,
    started_at: DateTime<Utc>,
    seen: Mutex<HashSet<String>>,
}

impl ReconciliationEngine {
    pub fn new(repository: Arc<dyn RankingRepository>, clock: Arc<dyn Clock>) -> Self {
        let started_at = clock.now();
        Self {
            repository,
            clock,
            started_at,
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Reconcile every row of a page. Row failures are logged and counted;
    /// a username already reconciled by this engine is skipped.
    pub async fn reconcile_page(&self, shard: &Shard, rows: &[RawRankingRow], url: &str) -> PageStats {
        let mut stats = PageStats::default();

        for row in rows {
            if self.is_seen(&row.username) {
                stats.duplicates += 1;
                continue;
            }

            match self.reconcile(shard, row).await {
                Ok(ReconcileOutcome::Reconciled) => {
                    self.mark_seen(&row.username);
                    stats.reconciled += 1;
                }
                Ok(ReconcileOutcome::ServerUnknown) => stats.dropped += 1,
                Err(e) => {
                    warn!(username = %row.username, url, "Failed to reconcile row: {:#}", e);
                    stats.dropped += 1;
                }
            }
        }

        stats
    }

    fn is_seen(&self, username: &str) -> bool {
        match self.seen.lock() {
            Ok(seen) => seen.contains(username),
            Err(poisoned) => poisoned.into_inner().contains(username),
        }
    }

    fn mark_seen(&self, username: &str) {
        match self.seen.lock() {
            Ok(mut seen) => seen.insert(username.to_string()),
            Err(poisoned) => poisoned.into_inner().insert(username.to_string()),
        };
    }

    pub async fn reconcile(&self, shard: &Shard, row: &RawRankingRow) -> Result<ReconcileOutcome> {
        let Some(server) = self.repository.find_server_by_name(&shard.server_name).await? else {
            warn!(server = %shard.server_name, username = %row.username, "Server not in topology, skipping row");
            return Ok(ReconcileOutcome::ServerUnknown);
        };

        let now = self.clock.now();
        let repo = &self.repository;

        let character = repo.upsert_character(&row.username, row.powerscore, now).await?;
        let clan = repo.upsert_clan(&row.clan_name, now).await?;

        let clan_transition = self
            .transition_membership(MembershipScope::Clan, character.id, clan.id, now)
            .await?;

        self.affiliate_clan(&clan, &server, now).await?;

        repo.touch_class_assignment(character.id, row.class.id(), now).await?;

        let server_transition = self
            .transition_membership(MembershipScope::Server, character.id, server.id, now)
            .await?;

        debug!(
            username = %row.username,
            clan = %clan.name,
            ?clan_transition,
            ?server_transition,
            "Row reconciled"
        );
        Ok(ReconcileOutcome::Reconciled)
    }

    /// Keep at most one active membership per character in `scope`.
    pub async fn transition_membership(
        &self,
        scope: MembershipScope,
        character_id: i64,
        target_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Transition> {
        let repo = &self.repository;

        match repo.find_active_membership(scope, character_id).await? {
            Some(active) if active.target_id == target_id => {
                repo.refresh_membership(scope, active.id, now).await?;
                Ok(Transition::Refreshed)
            }
            Some(active) => {
                repo.move_membership(scope, active.id, character_id, target_id, now)
                    .await?;
                debug!(%scope, character_id, from = active.target_id, to = target_id, "Membership moved");
                Ok(Transition::Moved {
                    from: active.target_id,
                    to: target_id,
                })
            }
            None => {
                repo.open_membership(scope, character_id, target_id, now).await?;
                Ok(Transition::Joined)
            }
        }
    }

    /// A named clan moves off servers it was not seen on this run; the
    /// unaffiliated clan spans all of them.
    async fn affiliate_clan(&self, clan: &Clan, server: &Server, now: DateTime<Utc>) -> Result<()> {
        let repo = &self.repository;

        let stale: Vec<i64> = if clan.is_unaffiliated() {
            Vec::new()
        } else {
            repo.find_active_affiliations(clan.id)
                .await?
                .into_iter()
                .filter(|a| a.server_id != server.id && a.checked_at < self.started_at)
                .inspect(|a| debug!(clan = %clan.name, from = a.server_id, to = server.id, "Clan changed server"))
                .map(|a| a.id)
                .collect()
        };

        repo.settle_affiliation(clan.id, server.id, &stale, self.started_at, now)
            .await
            .map(|_| ())
    }
}
