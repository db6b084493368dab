//! Run lock implementations
//!
//! A lock is a lease: the holder owns it until it releases it or `ttl`
//! elapses, after which any other owner may take it over. This recovers
//! from a run that crashed while holding the lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::RunLock;

fn lease_end(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>> {
    let ttl = chrono::Duration::from_std(ttl).context("Lock TTL out of range")?;
    now.checked_add_signed(ttl).context("Lock TTL out of range")
}

/// Lock row in the `run_locks` table, shared by every process using the database.
#[derive(Clone)]
pub struct SqliteRunLock {
    pool: Arc<SqlitePool>,
}

impl SqliteRunLock {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

#[async_trait]
impl RunLock for SqliteRunLock {
    async fn try_acquire(&self, name: &str, owner: &str, ttl: Duration) -> Result<bool> {
        let now = Utc::now();
        let expires_at = lease_end(now, ttl)?;

        // Single statement: takes a free or expired lease, leaves a live one alone
        let result = sqlx::query(
            r#"
            INSERT INTO run_locks (name, owner, expires_at) VALUES (?, ?, ?)
            ON CONFLICT (name) DO UPDATE SET owner = excluded.owner, expires_at = excluded.expires_at
            WHERE run_locks.owner IS NULL OR run_locks.expires_at IS NULL OR run_locks.expires_at <= ?
            "#,
        )
        .bind(name)
        .bind(owner)
        .bind(expires_at)
        .bind(now)
        .execute(&*self.pool)
        .await?;

        let acquired = result.rows_affected() > 0;
        debug!(lock = name, owner, acquired, "Run lock acquisition");
        Ok(acquired)
    }

    async fn release(&self, name: &str, owner: &str) -> Result<()> {
        let result = sqlx::query("UPDATE run_locks SET owner = NULL, expires_at = NULL WHERE name = ? AND owner = ?")
            .bind(name)
            .bind(owner)
            .execute(&*self.pool)
            .await?;

        if result.rows_affected() == 0 {
            warn!(lock = name, owner, "Run lock was not held by this owner");
        }
        Ok(())
    }

    async fn is_held(&self, name: &str) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM run_locks WHERE name = ? AND owner IS NOT NULL AND expires_at > ?",
        )
        .bind(name)
        .bind(Utc::now())
        .fetch_optional(&*self.pool)
        .await?;
        Ok(row.is_some())
    }
}

#[derive(Debug, Clone)]
struct Lease {
    owner: String,
    expires_at: DateTime<Utc>,
}

/// Process-local lock.
#[derive(Default, Clone)]
pub struct InMemoryRunLock {
    leases: Arc<Mutex<HashMap<String, Lease>>>,
}

impl InMemoryRunLock {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunLock for InMemoryRunLock {
    async fn try_acquire(&self, name: &str, owner: &str, ttl: Duration) -> Result<bool> {
        let now = Utc::now();
        let mut leases = self.leases.lock().await;

        if let Some(lease) = leases.get(name) {
            if lease.expires_at > now {
                return Ok(false);
            }
        }

        leases.insert(
            name.to_string(),
            Lease {
                owner: owner.to_string(),
                expires_at: lease_end(now, ttl)?,
            },
        );
        Ok(true)
    }

    async fn release(&self, name: &str, owner: &str) -> Result<()> {
        let mut leases = self.leases.lock().await;
        if leases.get(name).is_some_and(|lease| lease.owner == owner) {
            leases.remove(name);
        }
        Ok(())
    }

    async fn is_held(&self, name: &str) -> Result<bool> {
        let leases = self.leases.lock().await;
        Ok(leases.get(name).is_some_and(|lease| lease.expires_at > Utc::now()))
    }
}
