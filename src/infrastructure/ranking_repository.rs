//! SQLite implementation of `RankingRepository`
//!
//! Natural keys (region/server/clan name, username) are `UNIQUE`, so every
//! find-or-create is a single `INSERT … ON CONFLICT … RETURNING` statement
//! and stays idempotent when shard tasks race on the same row.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::domain::{
    Character, CharacterClass, Clan, ClanServerAffiliation, ClassAssignment, Membership,
    MembershipScope, RankingRepository, Region, Server, ServerRegion,
};

#[derive(Clone)]
pub struct SqliteRankingRepository {
    pool: Arc<SqlitePool>,
}

impl SqliteRankingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn character_from_row(row: &SqliteRow) -> Character {
    Character {
        id: row.get("id"),
        username: row.get("username"),
        powerscore: row.get("powerscore"),
        checked_at: row.get("checked_at"),
    }
}

fn clan_from_row(row: &SqliteRow) -> Clan {
    Clan {
        id: row.get("id"),
        name: row.get("name"),
        checked_at: row.get("checked_at"),
    }
}

fn membership_from_row(scope: MembershipScope, row: &SqliteRow) -> Membership {
    Membership {
        id: row.get("id"),
        scope,
        character_id: row.get("character_id"),
        target_id: row.get("target_id"),
        is_leave: row.get("is_leave"),
        checked_at: row.get("checked_at"),
    }
}

fn affiliation_from_row(row: &SqliteRow) -> ClanServerAffiliation {
    ClanServerAffiliation {
        id: row.get("id"),
        clan_id: row.get("clan_id"),
        server_id: row.get("server_id"),
        is_disband: row.get("is_disband"),
        checked_at: row.get("checked_at"),
    }
}

#[async_trait]
impl RankingRepository for SqliteRankingRepository {
    // ===============================
    // TOPOLOGY
    // ===============================

    async fn find_or_create_region(&self, name: &str) -> Result<Region> {
        let row = sqlx::query(
            r#"
            INSERT INTO regions (name) VALUES (?)
            ON CONFLICT (name) DO UPDATE SET name = excluded.name
            RETURNING id, name
            "#,
        )
        .bind(name)
        .fetch_one(&*self.pool)
        .await?;

        Ok(Region {
            id: row.get("id"),
            name: row.get("name"),
        })
    }

    async fn find_or_create_server(&self, name: &str) -> Result<Server> {
        let row = sqlx::query(
            r#"
            INSERT INTO servers (name) VALUES (?)
            ON CONFLICT (name) DO UPDATE SET name = excluded.name
            RETURNING id, name
            "#,
        )
        .bind(name)
        .fetch_one(&*self.pool)
        .await?;

        Ok(Server {
            id: row.get("id"),
            name: row.get("name"),
        })
    }

    async fn find_server_by_name(&self, name: &str) -> Result<Option<Server>> {
        let row = sqlx::query("SELECT id, name FROM servers WHERE name = ?")
            .bind(name)
            .fetch_optional(&*self.pool)
            .await?;

        Ok(row.map(|row| Server {
            id: row.get("id"),
            name: row.get("name"),
        }))
    }

    async fn link_server_region(&self, server_id: i64, region_id: i64) -> Result<Option<ServerRegion>> {
        let result = sqlx::query("INSERT OR IGNORE INTO server_regions (server_id, region_id) VALUES (?, ?)")
            .bind(server_id)
            .bind(region_id)
            .execute(&*self.pool)
            .await?;
        Ok((result.rows_affected() > 0).then_some(ServerRegion { server_id, region_id }))
    }

    async fn upsert_classes(&self, classes: &[CharacterClass]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for class in classes {
            sqlx::query(
                r#"
                INSERT INTO classes (id, name) VALUES (?, ?)
                ON CONFLICT (id) DO UPDATE SET name = excluded.name
                "#,
            )
            .bind(class.id())
            .bind(class.name())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    // ===============================
    // CHARACTERS AND CLANS
    // ===============================

    async fn upsert_character(&self, username: &str, powerscore: i64, now: DateTime<Utc>) -> Result<Character> {
        let row = sqlx::query(
            r#"
            INSERT INTO characters (username, powerscore, checked_at) VALUES (?, ?, ?)
            ON CONFLICT (username) DO UPDATE
                SET powerscore = excluded.powerscore, checked_at = excluded.checked_at
            RETURNING id, username, powerscore, checked_at
            "#,
        )
        .bind(username)
        .bind(powerscore)
        .bind(now)
        .fetch_one(&*self.pool)
        .await?;

        Ok(character_from_row(&row))
    }

    async fn find_character_by_username(&self, username: &str) -> Result<Option<Character>> {
        let row = sqlx::query("SELECT id, username, powerscore, checked_at FROM characters WHERE username = ?")
            .bind(username)
            .fetch_optional(&*self.pool)
            .await?;
        Ok(row.as_ref().map(character_from_row))
    }

    async fn upsert_clan(&self, name: &str, now: DateTime<Utc>) -> Result<Clan> {
        let row = sqlx::query(
            r#"
            INSERT INTO clans (name, checked_at) VALUES (?, ?)
            ON CONFLICT (name) DO UPDATE SET checked_at = excluded.checked_at
            RETURNING id, name, checked_at
            "#,
        )
        .bind(name)
        .bind(now)
        .fetch_one(&*self.pool)
        .await?;

        Ok(clan_from_row(&row))
    }

    async fn ensure_clan(&self, name: &str, now: DateTime<Utc>) -> Result<Clan> {
        let row = sqlx::query(
            r#"
            INSERT INTO clans (name, checked_at) VALUES (?, ?)
            ON CONFLICT (name) DO UPDATE SET name = excluded.name
            RETURNING id, name, checked_at
            "#,
        )
        .bind(name)
        .bind(now)
        .fetch_one(&*self.pool)
        .await?;

        Ok(clan_from_row(&row))
    }

    async fn find_clan_by_name(&self, name: &str) -> Result<Option<Clan>> {
        let row = sqlx::query("SELECT id, name, checked_at FROM clans WHERE name = ?")
            .bind(name)
            .fetch_optional(&*self.pool)
            .await?;
        Ok(row.as_ref().map(clan_from_row))
    }

    // ===============================
    // MEMBERSHIPS
    // ===============================

    async fn find_active_membership(&self, scope: MembershipScope, character_id: i64) -> Result<Option<Membership>> {
        let sql = format!(
            "SELECT id, character_id, {} AS target_id, is_leave, checked_at FROM {} WHERE character_id = ? AND is_leave = 0",
            scope.target_column(),
            scope.table()
        );
        let row = sqlx::query(&sql)
            .bind(character_id)
            .fetch_optional(&*self.pool)
            .await?;
        Ok(row.map(|row| membership_from_row(scope, &row)))
    }

    async fn refresh_membership(&self, scope: MembershipScope, membership_id: i64, now: DateTime<Utc>) -> Result<()> {
        let sql = format!("UPDATE {} SET checked_at = ? WHERE id = ?", scope.table());
        sqlx::query(&sql)
            .bind(now)
            .bind(membership_id)
            .execute(&*self.pool)
            .await?;
        Ok(())
    }

    async fn move_membership(
        &self,
        scope: MembershipScope,
        active_id: i64,
        character_id: i64,
        target_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Membership> {
        let close = format!("UPDATE {} SET is_leave = 1, checked_at = ? WHERE id = ?", scope.table());
        let open = format!(
            "INSERT INTO {} (character_id, {}, is_leave, checked_at) VALUES (?, ?, 0, ?) RETURNING id",
            scope.table(),
            scope.target_column()
        );

        let mut tx = self.pool.begin().await?;
        sqlx::query(&close)
            .bind(now)
            .bind(active_id)
            .execute(&mut *tx)
            .await?;
        let row = sqlx::query(&open)
            .bind(character_id)
            .bind(target_id)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(Membership {
            id: row.get("id"),
            scope,
            character_id,
            target_id,
            is_leave: false,
            checked_at: now,
        })
    }

    async fn open_membership(
        &self,
        scope: MembershipScope,
        character_id: i64,
        target_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Membership> {
        let sql = format!(
            "INSERT INTO {} (character_id, {}, is_leave, checked_at) VALUES (?, ?, 0, ?) RETURNING id",
            scope.table(),
            scope.target_column()
        );
        let row = sqlx::query(&sql)
            .bind(character_id)
            .bind(target_id)
            .bind(now)
            .fetch_one(&*self.pool)
            .await?;

        Ok(Membership {
            id: row.get("id"),
            scope,
            character_id,
            target_id,
            is_leave: false,
            checked_at: now,
        })
    }

    async fn list_memberships(&self, scope: MembershipScope, character_id: i64) -> Result<Vec<Membership>> {
        let sql = format!(
            "SELECT id, character_id, {} AS target_id, is_leave, checked_at FROM {} WHERE character_id = ? ORDER BY id",
            scope.target_column(),
            scope.table()
        );
        let rows = sqlx::query(&sql)
            .bind(character_id)
            .fetch_all(&*self.pool)
            .await?;
        Ok(rows.iter().map(|row| membership_from_row(scope, row)).collect())
    }

    // ===============================
    // CLAN/SERVER AFFILIATION
    // ===============================

    async fn find_active_affiliations(&self, clan_id: i64) -> Result<Vec<ClanServerAffiliation>> {
        let rows = sqlx::query(
            "SELECT id, clan_id, server_id, is_disband, checked_at FROM clan_servers WHERE clan_id = ? AND is_disband = 0 ORDER BY id",
        )
        .bind(clan_id)
        .fetch_all(&*self.pool)
        .await?;
        Ok(rows.iter().map(affiliation_from_row).collect())
    }

    async fn settle_affiliation(
        &self,
        clan_id: i64,
        server_id: i64,
        stale: &[i64],
        revive_since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<ClanServerAffiliation> {
        let mut tx = self.pool.begin().await?;

        for &id in stale {
            sqlx::query("UPDATE clan_servers SET is_disband = 1, checked_at = ? WHERE id = ? AND is_disband = 0")
                .bind(now)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        let refreshed = sqlx::query(
            r#"
            UPDATE clan_servers SET checked_at = ?
            WHERE clan_id = ? AND server_id = ? AND is_disband = 0
            RETURNING id, clan_id, server_id, is_disband, checked_at
            "#,
        )
        .bind(now)
        .bind(clan_id)
        .bind(server_id)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(row) = refreshed {
            tx.commit().await?;
            return Ok(affiliation_from_row(&row));
        }

        let latest_disbanded = sqlx::query(
            r#"
            SELECT id, clan_id, server_id, is_disband, checked_at FROM clan_servers
            WHERE clan_id = ? AND server_id = ? AND is_disband = 1
            ORDER BY id DESC LIMIT 1
            "#,
        )
        .bind(clan_id)
        .bind(server_id)
        .fetch_optional(&mut *tx)
        .await?
        .map(|row| affiliation_from_row(&row))
        .filter(|affiliation| affiliation.checked_at >= revive_since);

        let row = match latest_disbanded {
            Some(revived) => {
                sqlx::query(
                    r#"
                    UPDATE clan_servers SET is_disband = 0, checked_at = ? WHERE id = ?
                    RETURNING id, clan_id, server_id, is_disband, checked_at
                    "#,
                )
                .bind(now)
                .bind(revived.id)
                .fetch_one(&mut *tx)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO clan_servers (clan_id, server_id, is_disband, checked_at) VALUES (?, ?, 0, ?)
                    RETURNING id, clan_id, server_id, is_disband, checked_at
                    "#,
                )
                .bind(clan_id)
                .bind(server_id)
                .bind(now)
                .fetch_one(&mut *tx)
                .await?
            }
        };
        tx.commit().await?;

        Ok(affiliation_from_row(&row))
    }

    // ===============================
    // CLASSES PLAYED
    // ===============================

    async fn touch_class_assignment(&self, character_id: i64, class_id: i64, now: DateTime<Utc>) -> Result<bool> {
        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO character_classes (character_id, class_id, checked_at) VALUES (?, ?, ?)",
        )
        .bind(character_id)
        .bind(class_id)
        .bind(now)
        .execute(&*self.pool)
        .await?
        .rows_affected()
            > 0;

        if !inserted {
            sqlx::query("UPDATE character_classes SET checked_at = ? WHERE character_id = ? AND class_id = ?")
                .bind(now)
                .bind(character_id)
                .bind(class_id)
                .execute(&*self.pool)
                .await?;
        }
        Ok(inserted)
    }

    async fn list_class_assignments(&self, character_id: i64) -> Result<Vec<ClassAssignment>> {
        let rows = sqlx::query(
            "SELECT character_id, class_id, checked_at FROM character_classes WHERE character_id = ? ORDER BY class_id",
        )
        .bind(character_id)
        .fetch_all(&*self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| ClassAssignment {
                character_id: row.get("character_id"),
                class_id: row.get("class_id"),
                checked_at: row.get("checked_at"),
            })
            .collect())
    }
}
