//! HTML parsing for the MIR4 ranking site
//!
//! Two page shapes are understood: the ranking table (one row per player)
//! and the region/server listing served by the same URL without query
//! parameters. Both parsers are tolerant: a malformed row or anchor is
//! skipped and counted, never fatal for the page.

pub mod context;
pub mod error;
pub mod ranking_page_parser;
pub mod topology_parser;

pub use context::ParseContext;
pub use error::{ParsingError, ParsingResult};
pub use ranking_page_parser::{RankingPage, RankingPageParser};
pub use topology_parser::TopologyParser;

use scraper::{Html, Selector};

/// Parser over an already-loaded document with caller supplied context
pub trait ContextualParser {
    type Output;
    type Context;

    fn parse_with_context(&self, html: &Html, context: &Self::Context) -> ParsingResult<Self::Output>;
}

/// Compile a selector, mapping the scraper error into `ParsingError`.
pub(crate) fn compile_selector(selector: &str) -> ParsingResult<Selector> {
    Selector::parse(selector).map_err(|e| ParsingError::invalid_selector(selector, &e.to_string()))
}
