//! Shard topology discovery
//!
//! Runs once per sync: fetches the region/server listing, mirrors it into
//! the relational store and hands the shard list to the scheduler.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::application::LeaderboardSource;
use crate::domain::{Clock, RankingRepository, Shard, Topology, NO_CLAN_SENTINEL};

pub struct ShardTopologyBuilder {
    source: Arc<dyn LeaderboardSource>,
    repository: Arc<dyn RankingRepository>,
    clock: Arc<dyn Clock>,
}

impl ShardTopologyBuilder {
    pub fn new(
        source: Arc<dyn LeaderboardSource>,
        repository: Arc<dyn RankingRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            repository,
            clock,
        }
    }

    /// Never fails: an unreachable or unparseable listing yields no shards.
    pub async fn discover_topology(&self) -> Vec<Shard> {
        let topology = match self.source.fetch_topology().await {
            Ok(topology) => topology,
            Err(e) => {
                error!("❌ Failed to fetch topology: {:#}", e);
                return Vec::new();
            }
        };

        if topology.is_empty() {
            warn!("⚠️ Topology listing contained no servers");
            return Vec::new();
        }

        self.persist(&topology).await;

        let shards = topology.shards();
        info!(
            regions = topology.continents.len(),
            shards = shards.len(),
            "🗺️ Topology discovered"
        );
        shards
    }

    async fn persist(&self, topology: &Topology) {
        if let Err(e) = self
            .repository
            .ensure_clan(NO_CLAN_SENTINEL, self.clock.now())
            .await
        {
            warn!("Failed to ensure no-clan sentinel: {:#}", e);
        }

        for continent in &topology.continents {
            let region = match self.repository.find_or_create_region(&continent.name).await {
                Ok(region) => region,
                Err(e) => {
                    warn!(region = %continent.name, "Failed to upsert region: {:#}", e);
                    continue;
                }
            };

            for world in &continent.servers {
                let result = async {
                    let server = self.repository.find_or_create_server(&world.name).await?;
                    self.repository.link_server_region(server.id, region.id).await
                }
                .await;

                match result {
                    Ok(Some(link)) => info!(
                        region = %region.name,
                        server = %world.name,
                        server_id = link.server_id,
                        region_id = link.region_id,
                        "Linked new server"
                    ),
                    Ok(None) => {}
                    Err(e) => warn!(region = %region.name, server = %world.name, "Failed to upsert server: {:#}", e),
                }
            }
        }
    }
}
