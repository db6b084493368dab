//! Region/server listing parser
//!
//! The ranking root page lists every world as
//! `<a href="javascript:set_world('1','ASIA','101','ASIA011')">`.

use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, warn};

use super::{compile_selector, ContextualParser, ParseContext, ParsingResult};
use crate::domain::{Topology, WorldServer};

pub struct TopologyParser {
    anchor: Selector,
    set_world: Regex,
}

impl TopologyParser {
    pub fn new() -> ParsingResult<Self> {
        Ok(Self {
            anchor: compile_selector("ul li a")?,
            set_world: Regex::new(r"set_world\('(\d+)',\s*'([^']+)',\s*'(\d+)',\s*'([^']+)'\)")?,
        })
    }

    pub fn parse(&self, body: &str, context: &ParseContext) -> ParsingResult<Topology> {
        let document = Html::parse_document(body);
        self.parse_with_context(&document, context)
    }

    fn extract(&self, href: &str) -> Option<(u32, String, WorldServer)> {
        let captures = self.set_world.captures(href)?;
        let region_id = captures.get(1)?.as_str().parse().ok()?;
        let region_name = captures.get(2)?.as_str().trim();
        let server_id = captures.get(3)?.as_str().parse().ok()?;
        let server_name = captures.get(4)?.as_str().trim();
        if region_name.is_empty() || server_name.is_empty() {
            return None;
        }
        Some((
            region_id,
            region_name.to_string(),
            WorldServer {
                id: server_id,
                name: server_name.to_string(),
            },
        ))
    }
}

impl ContextualParser for TopologyParser {
    type Output = Topology;
    type Context = ParseContext;

    fn parse_with_context(&self, html: &Html, context: &Self::Context) -> ParsingResult<Self::Output> {
        let mut topology = Topology::default();

        for anchor in html.select(&self.anchor) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            if !href.contains("set_world") {
                continue;
            }
            match self.extract(href) {
                Some((region_id, region_name, server)) => {
                    let server_name = server.name.clone();
                    if !topology.insert(region_id, &region_name, server) {
                        debug!(region = %region_name, server = %server_name, "Duplicate server in listing");
                    }
                }
                None => warn!(url = %context.url, href, "Skipping malformed world anchor"),
            }
        }

        debug!(
            url = %context.url,
            regions = topology.continents.len(),
            shards = topology.shard_count(),
            "Parsed topology"
        );
        Ok(topology)
    }
}
