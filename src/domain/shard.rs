//! Shard topology types
//!
//! A shard is one (region, server) pair listed on the ranking root page and
//! crawled independently of every other shard.

use serde::{Deserialize, Serialize};

/// A game server as listed in the topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldServer {
    pub id: u32,
    pub name: String,
}

/// A region ("continent" on the site) and its servers in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Continent {
    pub region_id: u32,
    pub name: String,
    pub servers: Vec<WorldServer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shard {
    pub region_id: u32,
    pub region_name: String,
    pub server_id: u32,
    pub server_name: String,
}

impl Shard {
    pub fn key(&self) -> ShardKey {
        ShardKey {
            region_id: self.region_id,
            server_id: self.server_id,
        }
    }

    /// Legacy lower-cased `{continent}.{server}.{suffix}` path, used in logs.
    pub fn config_path(&self, suffix: &str) -> String {
        format!("{}.{}.{}", self.region_name, self.server_name, suffix).to_lowercase()
    }
}

impl std::fmt::Display for Shard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.region_name, self.server_name)
    }
}

/// Structured cursor key for a shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShardKey {
    pub region_id: u32,
    pub server_id: u32,
}

/// Parsed region/server listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    pub continents: Vec<Continent>,
}

impl Topology {
    /// Add a server under its region, merging repeated region ids.
    /// Returns false when the server was already listed for that region.
    pub fn insert(&mut self, region_id: u32, region_name: &str, server: WorldServer) -> bool {
        if let Some(continent) = self
            .continents
            .iter_mut()
            .find(|c| c.region_id == region_id)
        {
            if continent.servers.iter().any(|s| s.id == server.id) {
                return false;
            }
            continent.servers.push(server);
        } else {
            self.continents.push(Continent {
                region_id,
                name: region_name.to_string(),
                servers: vec![server],
            });
        }
        true
    }

    pub fn is_empty(&self) -> bool {
        self.continents.iter().all(|c| c.servers.is_empty())
    }

    pub fn shard_count(&self) -> usize {
        self.continents.iter().map(|c| c.servers.len()).sum()
    }

    /// Flatten into shards, region order first, then server order.
    pub fn shards(&self) -> Vec<Shard> {
        self.continents
            .iter()
            .flat_map(|continent| {
                continent.servers.iter().map(move |server| Shard {
                    region_id: continent.region_id,
                    region_name: continent.name.clone(),
                    server_id: server.id,
                    server_name: server.name.clone(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(id: u32, name: &str) -> WorldServer {
        WorldServer { id, name: name.to_string() }
    }

    #[test]
    fn duplicate_regions_merge_in_first_seen_order() {
        let mut topology = Topology::default();
        assert!(topology.insert(2, "EU", server(201, "EU011")));
        assert!(topology.insert(1, "ASIA", server(101, "ASIA011")));
        assert!(topology.insert(2, "EU", server(202, "EU012")));
        assert!(!topology.insert(2, "EU", server(202, "EU012")));

        assert_eq!(topology.continents.len(), 2);
        assert_eq!(topology.continents[0].name, "EU");
        assert_eq!(topology.continents[0].servers.len(), 2);
        assert_eq!(topology.shard_count(), 3);

        let names: Vec<String> = topology.shards().into_iter().map(|s| s.server_name).collect();
        assert_eq!(names, vec!["EU011", "EU012", "ASIA011"]);
    }

    #[test]
    fn config_path_is_lower_cased() {
        let shard = Shard {
            region_id: 1,
            region_name: "ASIA".into(),
            server_id: 101,
            server_name: "ASIA011".into(),
        };
        assert_eq!(shard.config_path("page"), "asia.asia011.page");
        assert_eq!(shard.to_string(), "ASIA/ASIA011");
    }
}
