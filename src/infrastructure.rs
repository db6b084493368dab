//! Infrastructure layer for database connections, parsing, and external integrations
//!
//! This module provides the SQLite store, the rate-limited HTTP client,
//! HTML parsing of the MIR4 ranking site, configuration and logging.

pub mod config;
pub mod cursor_store;
pub mod database_connection;
pub mod http_client;
pub mod leaderboard_source;
pub mod logging;
pub mod parsing;
pub mod ranking_repository;
pub mod run_lock;

// Re-export commonly used items
pub use config::{mir4, AppConfig, ConfigError};
pub use cursor_store::SqliteCursorStore;
pub use database_connection::DatabaseConnection;
pub use http_client::{HttpClient, HttpClientConfig};
pub use leaderboard_source::HttpLeaderboardSource;
pub use logging::init_logging;
pub use parsing::{ParsingError, ParsingResult, RankingPageParser, TopologyParser};
pub use ranking_repository::SqliteRankingRepository;
pub use run_lock::{InMemoryRunLock, SqliteRunLock};
