//! HTTP backed `LeaderboardSource`

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info, warn};
use url::Url;

use crate::application::{FetchError, LeaderboardSource};
use crate::domain::{PageFetch, RankType, Shard, Topology};
use crate::infrastructure::config::LeaderboardConfig;
use crate::infrastructure::http_client::HttpClient;
use crate::infrastructure::parsing::{ParseContext, RankingPageParser, TopologyParser};

pub struct HttpLeaderboardSource {
    client: Arc<HttpClient>,
    base_url: Url,
    list_style: String,
    ranking_parser: RankingPageParser,
    topology_parser: TopologyParser,
}

impl HttpLeaderboardSource {
    pub fn new(client: Arc<HttpClient>, config: &LeaderboardConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid leaderboard URL: {}", config.base_url))?;

        Ok(Self {
            client,
            base_url,
            list_style: config.list_style.clone(),
            ranking_parser: RankingPageParser::new()?,
            topology_parser: TopologyParser::new()?,
        })
    }

    /// `{base}?ranktype=..&worldgroupid=..&worldid=..&liststyle=..&page=..`
    pub fn page_url(&self, shard: &Shard, page: u32, rank_type: RankType) -> Result<Url> {
        let params = [
            ("ranktype", rank_type.0.to_string()),
            ("worldgroupid", shard.region_id.to_string()),
            ("worldid", shard.server_id.to_string()),
            ("liststyle", self.list_style.clone()),
            ("page", page.to_string()),
        ];
        Url::parse_with_params(self.base_url.as_str(), &params).context("Failed to build ranking page URL")
    }
}

#[async_trait]
impl LeaderboardSource for HttpLeaderboardSource {
    async fn fetch_topology(&self) -> Result<Topology> {
        let url = self.base_url.as_str();
        let body = self.client.get_text(url).await?;
        let topology = self
            .topology_parser
            .parse(&body, &ParseContext::topology(url))?;

        info!(
            regions = topology.continents.len(),
            shards = topology.shard_count(),
            "🗺️ Topology fetched"
        );
        Ok(topology)
    }

    async fn fetch_page(&self, shard: &Shard, page: u32, rank_type: RankType) -> Result<PageFetch, FetchError> {
        let url = self
            .page_url(shard, page, rank_type)
            .map_err(|e| FetchError::Transport {
                url: self.base_url.to_string(),
                message: e.to_string(),
            })?
            .to_string();

        let body = match self.client.get_text(&url).await {
            Ok(body) => body,
            Err(FetchError::Status { status, url }) => {
                warn!(shard = %shard, page, status, "Non-success status, treating shard as exhausted");
                return Ok(PageFetch::Exhausted { url });
            }
            Err(e) => return Err(e),
        };

        if body.trim().is_empty() {
            debug!(shard = %shard, page, "Empty body");
            return Ok(PageFetch::Exhausted { url });
        }

        let parsed = self
            .ranking_parser
            .parse(&body, &ParseContext::ranking(shard, page, url.as_str()))
            .map_err(|source| FetchError::Parse {
                url: url.clone(),
                source: Box::new(source),
            })?;

        // Pages past the end of a shorter board render an empty table
        if parsed.is_empty() {
            debug!(shard = %shard, page, skipped = parsed.skipped, "Page has no rows");
        }

        Ok(PageFetch::Rows {
            url,
            rows: parsed.rows,
            skipped: parsed.skipped,
        })
    }
}
