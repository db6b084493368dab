//! SQLite implementation of `CursorStore`

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Row, SqlitePool};

use crate::domain::{CursorStore, Shard, ShardCursor, ShardKey};

#[derive(Clone)]
pub struct SqliteCursorStore {
    pool: Arc<SqlitePool>,
}

impl SqliteCursorStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

#[async_trait]
impl CursorStore for SqliteCursorStore {
    async fn read_cursor(&self, key: ShardKey) -> Result<ShardCursor> {
        let row = sqlx::query("SELECT page, last_sync_date FROM shard_cursors WHERE region_id = ? AND server_id = ?")
            .bind(key.region_id)
            .bind(key.server_id)
            .fetch_optional(&*self.pool)
            .await?;

        Ok(match row {
            Some(row) => ShardCursor {
                page: row.get::<u32, _>("page"),
                last_sync_date: row.get::<Option<NaiveDate>, _>("last_sync_date"),
            },
            None => ShardCursor::default(),
        })
    }

    async fn write_cursor(&self, shard: &Shard, cursor: ShardCursor) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO shard_cursors (region_id, server_id, region_name, server_name, page, last_sync_date, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT (region_id, server_id) DO UPDATE SET
                region_name = excluded.region_name,
                server_name = excluded.server_name,
                page = excluded.page,
                last_sync_date = excluded.last_sync_date,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(shard.region_id)
        .bind(shard.server_id)
        .bind(&shard.region_name)
        .bind(&shard.server_name)
        .bind(cursor.page)
        .bind(cursor.last_sync_date)
        .execute(&*self.pool)
        .await?;

        tracing::trace!(
            path = %shard.config_path("page"),
            page = cursor.page,
            "Cursor written"
        );
        Ok(())
    }
}
