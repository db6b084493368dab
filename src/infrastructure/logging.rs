//! Logging system configuration and initialization
//!
//! This module provides the logging setup for the sync job:
//! - Daily rolling file logging through a non-blocking writer
//! - Configuration file based log level control (overridable by `RUST_LOG`)
//! - Structured JSON logging (optional)
//! - Timestamps in the game server's fixed UTC offset

use anyhow::{anyhow, Result};
use chrono::{FixedOffset, Offset, Utc};
use once_cell::sync::Lazy;
use std::sync::Mutex;
use tracing::info;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

pub use crate::infrastructure::config::LoggingConfig;

// Keeps the file writer alive for the lifetime of the process
static LOG_GUARDS: Lazy<Mutex<Vec<tracing_appender::non_blocking::WorkerGuard>>> =
    Lazy::new(|| Mutex::new(Vec::new()));

/// Formats event timestamps in a fixed offset (game server local time).
#[derive(Debug, Clone, Copy)]
pub struct GameTimeFormatter {
    offset: FixedOffset,
}

impl GameTimeFormatter {
    pub fn new(utc_offset_hours: i32) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_hours * 3600)
            .unwrap_or_else(|| Utc.fix());
        Self { offset }
    }
}

impl FormatTime for GameTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        let local = Utc::now().with_timezone(&self.offset);
        write!(w, "{}", local.format("%Y-%m-%d %H:%M:%S%.3f %:z"))
    }
}

/// Build the env filter: `RUST_LOG` wins, otherwise the configured level
/// with verbose dependency targets turned down unless tracing.
pub fn build_env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut filter = EnvFilter::new(level);

        if !level.to_lowercase().contains("trace") {
            for directive in [
                "sqlx::query=warn",
                "sqlx::sqlite=warn",
                "reqwest=info",
                "hyper=warn",
                "hyper_util=warn",
                "h2=warn",
                "html5ever=warn",
                "selectors=warn",
            ] {
                if let Ok(directive) = directive.parse() {
                    filter = filter.add_directive(directive);
                }
            }
        }

        filter
    })
}

/// Initialize logging with the given configuration
///
/// # Environment Variable Override
/// ```bash
/// # Show all SQL statements
/// RUST_LOG="debug,sqlx::query=debug" mir4-leaderboard-sync
///
/// # Only the sync engine at debug
/// RUST_LOG="warn,mir4_leaderboard_sync=debug" mir4-leaderboard-sync
/// ```
pub fn init_logging(config: &LoggingConfig, utc_offset_hours: i32) -> Result<()> {
    let timer = GameTimeFormatter::new(utc_offset_hours);
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if config.file_output {
        std::fs::create_dir_all(&config.directory).map_err(|e| {
            anyhow!("Failed to create log directory {:?}: {}", config.directory, e)
        })?;

        let file_appender = rolling::daily(&config.directory, &config.file_prefix);
        let (file_writer, file_guard) = non_blocking(file_appender);
        LOG_GUARDS
            .lock()
            .map_err(|_| anyhow!("log guard registry poisoned"))?
            .push(file_guard);

        let file_layer = if config.json_format {
            fmt::Layer::new()
                .json()
                .with_writer(file_writer)
                .with_timer(timer)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false)
                .boxed()
        } else {
            fmt::Layer::new()
                .with_writer(file_writer)
                .with_timer(timer)
                .with_target(false)
                .with_ansi(false)
                .boxed()
        };
        layers.push(file_layer);
    }

    if config.console_output {
        layers.push(
            fmt::Layer::new()
                .with_writer(std::io::stdout)
                .with_timer(timer)
                .with_target(false)
                .boxed(),
        );
    }

    if layers.is_empty() {
        return Err(anyhow!("No logging output configured"));
    }

    Registry::default()
        .with(layers)
        .with(build_env_filter(&config.level))
        .try_init()
        .map_err(|e| anyhow!("failed to initialize tracing: {}", e))?;

    info!("Logging system initialized");
    info!("Log directory: {:?}", config.directory);
    info!("Log level: {}", config.level);
    info!("JSON format: {}", config.json_format);
    Ok(())
}

/// Log system information for diagnostics
pub fn log_system_info() {
    info!("=== MIR4 Leaderboard Sync ===");
    info!("Application version: {}", env!("CARGO_PKG_VERSION"));
    info!("Operating system: {}", std::env::consts::OS);
    info!("Architecture: {}", std::env::consts::ARCH);

    if let Ok(current_dir) = std::env::current_dir() {
        info!("Working directory: {:?}", current_dir);
    }
}
