//! Context carried through a parse for log correlation

use crate::domain::Shard;

/// Where the document being parsed came from
#[derive(Debug, Clone)]
pub struct ParseContext {
    pub url: String,
    /// Ranking page number; `None` for the topology listing
    pub page: Option<u32>,
    /// `REGION/SERVER`, when the page belongs to a shard
    pub shard: Option<String>,
}

impl ParseContext {
    pub fn topology(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            page: None,
            shard: None,
        }
    }

    pub fn ranking(shard: &Shard, page: u32, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            page: Some(page),
            shard: Some(shard.to_string()),
        }
    }
}
