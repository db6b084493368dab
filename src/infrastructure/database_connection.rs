// Database connection and pool management
// This module handles SQLite database connections using sqlx

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::info;

use crate::infrastructure::config::DatabaseConfig;

pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let in_memory = config.url.contains(":memory:");

        let mut options = SqliteConnectOptions::from_str(&config.url)
            .with_context(|| format!("Invalid database URL: {}", config.url))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
            if let Some(parent) = options.get_filename().parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
        }

        // Every in-memory connection is its own database
        let max_connections = if in_memory { 1 } else { config.max_connections };

        let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);
        if in_memory {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database {}", config.url))?;

        info!("🗄️ Database connected: {}", config.url);
        Ok(Self { pool })
    }

    /// Shorthand for tests and tools: default pool settings for `url`.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::new(&DatabaseConfig {
            url: url.to_string(),
            ..Default::default()
        })
        .await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS regions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS servers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS server_regions (
                server_id INTEGER NOT NULL REFERENCES servers (id),
                region_id INTEGER NOT NULL REFERENCES regions (id),
                PRIMARY KEY (server_id, region_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS classes (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS clans (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                checked_at DATETIME NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS characters (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                powerscore INTEGER NOT NULL,
                checked_at DATETIME NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS character_classes (
                character_id INTEGER NOT NULL REFERENCES characters (id),
                class_id INTEGER NOT NULL REFERENCES classes (id),
                checked_at DATETIME NOT NULL,
                PRIMARY KEY (character_id, class_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS clan_memberships (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                character_id INTEGER NOT NULL REFERENCES characters (id),
                clan_id INTEGER NOT NULL REFERENCES clans (id),
                is_leave BOOLEAN NOT NULL DEFAULT 0,
                checked_at DATETIME NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS server_memberships (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                character_id INTEGER NOT NULL REFERENCES characters (id),
                server_id INTEGER NOT NULL REFERENCES servers (id),
                is_leave BOOLEAN NOT NULL DEFAULT 0,
                checked_at DATETIME NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS clan_servers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                clan_id INTEGER NOT NULL REFERENCES clans (id),
                server_id INTEGER NOT NULL REFERENCES servers (id),
                is_disband BOOLEAN NOT NULL DEFAULT 0,
                checked_at DATETIME NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS shard_cursors (
                region_id INTEGER NOT NULL,
                server_id INTEGER NOT NULL,
                region_name TEXT NOT NULL,
                server_name TEXT NOT NULL,
                page INTEGER NOT NULL DEFAULT 0,
                last_sync_date DATE,
                updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (region_id, server_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS run_locks (
                name TEXT PRIMARY KEY,
                owner TEXT,
                expires_at DATETIME
            )
            "#,
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_clan_memberships_active ON clan_memberships (character_id) WHERE is_leave = 0",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_server_memberships_active ON server_memberships (character_id) WHERE is_leave = 0",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_clan_servers_active ON clan_servers (clan_id, server_id) WHERE is_disband = 0",
            "CREATE INDEX IF NOT EXISTS idx_clan_memberships_character ON clan_memberships (character_id)",
            "CREATE INDEX IF NOT EXISTS idx_server_memberships_character ON server_memberships (character_id)",
            "CREATE INDEX IF NOT EXISTS idx_clan_servers_clan ON clan_servers (clan_id)",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to apply schema")?;
        }

        info!("✅ Database schema ready");
        Ok(())
    }
}
