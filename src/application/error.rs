//! Scheduler and shard level errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Cursor store failed for {shard}: {message}")]
    Cursor { shard: String, message: String },

    #[error("Run lock '{lock}' failed: {message}")]
    Lock { lock: String, message: String },

    #[error("Shard {shard} panicked: {message}")]
    ShardPanicked { shard: String, message: String },

    #[error("Sync run panicked: {0}")]
    RunPanicked(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure to retrieve one ranking page; the page is abandoned.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Connection failure, timeout or unreadable body.
    #[error("HTTP request failed for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("HTTP error {status}: {url}")]
    Status { status: u16, url: String },

    #[error("Malformed page {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport { message, .. } if message.contains("timed out"))
    }
}

impl SyncError {
    pub fn cursor(shard: &impl std::fmt::Display, error: &anyhow::Error) -> Self {
        Self::Cursor {
            shard: shard.to_string(),
            message: format!("{error:#}"),
        }
    }

    pub fn lock(lock: &str, error: &anyhow::Error) -> Self {
        Self::Lock {
            lock: lock.to_string(),
            message: format!("{error:#}"),
        }
    }
}

/// Best-effort message out of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_detection() {
        let timeout = FetchError::Transport {
            url: "https://example.com".into(),
            message: "request timed out (operation timed out)".into(),
        };
        assert!(timeout.is_timeout());

        let status = FetchError::Status {
            status: 404,
            url: "https://example.com".into(),
        };
        assert!(!status.is_timeout());
        assert_eq!(status.to_string(), "HTTP error 404: https://example.com");
    }
}
