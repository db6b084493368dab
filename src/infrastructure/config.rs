//! Configuration infrastructure
//!
//! Contains configuration loading and validation for leaderboard syncing.
//!
//! Configuration is layered with the `config` crate:
//! 1. Built-in defaults (every section is optional)
//! 2. An optional TOML file (`config/default.toml` or `$MIR4_SYNC_CONFIG`)
//! 3. Environment variables, e.g. `MIR4_SYNC_SCHEDULER__MAX_CONCURRENT_SHARDS=8`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Environment variable naming an alternative config file.
pub const CONFIG_PATH_ENV: &str = "MIR4_SYNC_CONFIG";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "MIR4_SYNC";

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {source}")]
    Load {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {field}: {message}")]
    Validation { field: String, message: String },
}

impl ConfigError {
    fn invalid(field: &str, message: &str) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub leaderboard: LeaderboardConfig,
    pub http: HttpConfig,
    pub scheduler: SchedulerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection string, e.g. `sqlite:data/leaderboard.db`
    pub url: String,
    pub max_connections: u32,
    /// How long a writer waits on a locked database before failing
    pub busy_timeout_ms: u64,
}

/// Ranking site settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaderboardConfig {
    /// Ranking page; also serves the region/server listing when requested
    /// without query parameters
    pub base_url: String,
    pub rank_type: u32,
    pub list_style: String,
    /// Upper bound of pages walked by a full resync
    pub max_pages: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
    pub max_requests_per_second: u32,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Interval between run triggers
    pub interval_seconds: u64,
    /// Shards crawled in parallel
    pub max_concurrent_shards: usize,
    /// Lease on the run lock; a crashed holder is taken over after this
    pub lock_ttl_seconds: u64,
    /// Offset of the game day used for cursor dates (Asia/Manila = 8)
    pub utc_offset_hours: i32,
    /// Trigger a run immediately instead of waiting for the first tick
    pub run_on_start: bool,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,
    pub json_format: bool,
    pub console_output: bool,
    pub file_output: bool,
    /// Directory for rolling log files, relative to the working directory
    pub directory: PathBuf,
    pub file_prefix: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:data/leaderboard.db".to_string(),
            max_connections: 10,
            busy_timeout_ms: 5_000,
        }
    }
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            base_url: mir4::LEADERBOARD_URL.to_string(),
            rank_type: mir4::POWER_SCORE_RANK_TYPE,
            list_style: mir4::LIST_STYLE.to_string(),
            max_pages: crate::domain::DEFAULT_MAX_PAGES,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            max_requests_per_second: 5,
            user_agent: "mir4-leaderboard-sync/0.3 (+community bot)".to_string(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 60,
            max_concurrent_shards: 4,
            lock_ttl_seconds: 6 * 60 * 60,
            utc_offset_hours: 8,
            run_on_start: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            console_output: true,
            file_output: true,
            directory: PathBuf::from("logs"),
            file_prefix: "leaderboard-sync.log".to_string(),
        }
    }
}

impl SchedulerConfig {
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub const fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_seconds)
    }
}

impl HttpConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl AppConfig {
    /// Load from `$MIR4_SYNC_CONFIG` or the default path, then the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
        Self::from_file(&path)
    }

    /// The file is optional; missing keys fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        info!("Configuration loaded (file: {})", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::invalid("database.url", "must not be empty"));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::invalid("database.max_connections", "must be greater than 0"));
        }
        if self.leaderboard.base_url.trim().is_empty() {
            return Err(ConfigError::invalid("leaderboard.base_url", "must not be empty"));
        }
        if url::Url::parse(&self.leaderboard.base_url).is_err() {
            return Err(ConfigError::invalid("leaderboard.base_url", "must be an absolute URL"));
        }
        if self.leaderboard.max_pages == 0 {
            return Err(ConfigError::invalid("leaderboard.max_pages", "must be greater than 0"));
        }
        if self.http.timeout_seconds == 0 {
            return Err(ConfigError::invalid("http.timeout_seconds", "must be greater than 0"));
        }
        if self.http.max_requests_per_second == 0 {
            return Err(ConfigError::invalid("http.max_requests_per_second", "must be greater than 0"));
        }
        if self.scheduler.max_concurrent_shards == 0 {
            return Err(ConfigError::invalid("scheduler.max_concurrent_shards", "must be greater than 0"));
        }
        if self.scheduler.interval_seconds == 0 {
            return Err(ConfigError::invalid("scheduler.interval_seconds", "must be greater than 0"));
        }
        if self.scheduler.lock_ttl_seconds == 0 {
            return Err(ConfigError::invalid("scheduler.lock_ttl_seconds", "must be greater than 0"));
        }
        if !(-14..=14).contains(&self.scheduler.utc_offset_hours) {
            return Err(ConfigError::invalid("scheduler.utc_offset_hours", "must be within -14..=14"));
        }
        if !self.logging.console_output && !self.logging.file_output {
            return Err(ConfigError::invalid("logging", "no logging output configured"));
        }
        Ok(())
    }
}

/// MIR4 ranking site constants
pub mod mir4 {
    /// Power score ranking page
    pub const LEADERBOARD_URL: &str = "https://forum.mir4global.com/rank";

    /// `ranktype` for the power score board
    pub const POWER_SCORE_RANK_TYPE: u32 = 1;

    /// `liststyle` returning the plain ordered-list table
    pub const LIST_STYLE: &str = "ol";
}
