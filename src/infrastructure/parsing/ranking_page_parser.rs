//! Ranking table parser
//!
//! Extracts one `RawRankingRow` per `tr.list_article`. Rows missing a
//! required field are dropped and counted so the caller can log how much of
//! a page was lost.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use super::{compile_selector, ContextualParser, ParseContext, ParsingError, ParsingResult};
use crate::domain::{CharacterClass, RawRankingRow};

/// Rows extracted from one ranking page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankingPage {
    pub rows: Vec<RawRankingRow>,
    /// Rows present in the table that failed to parse
    pub skipped: usize,
}

impl RankingPage {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub struct RankingPageParser {
    row: Selector,
    rank: Selector,
    username: Selector,
    clan: Selector,
    powerscore: Selector,
    class_icon: Selector,
    background_url: Regex,
    class_file: Regex,
}

impl RankingPageParser {
    pub fn new() -> ParsingResult<Self> {
        Ok(Self {
            row: compile_selector("tr.list_article")?,
            rank: compile_selector(".num")?,
            username: compile_selector(".user_name")?,
            clan: compile_selector("td:nth-of-type(3) span")?,
            powerscore: compile_selector(".text_right span")?,
            class_icon: compile_selector(".user_icon")?,
            background_url: Regex::new(r"background-image:\s*url\((.*?)\)")?,
            class_file: Regex::new(r"char_(\d+)\.png")?,
        })
    }

    /// Parse a raw HTML body; a blank body yields an empty page.
    pub fn parse(&self, body: &str, context: &ParseContext) -> ParsingResult<RankingPage> {
        if body.trim().is_empty() {
            return Ok(RankingPage::default());
        }
        let document = Html::parse_document(body);
        self.parse_with_context(&document, context)
    }

    fn extract_row(&self, row: &ElementRef) -> ParsingResult<RawRankingRow> {
        let username = first_text(row, &self.username)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ParsingError::required_field_missing("user_name", None))?;

        let rank = first_text(row, &self.rank).and_then(|text| text.parse::<u32>().ok());
        if rank.is_none() {
            debug!(username = %username, "Ranking row has no numeric rank");
        }

        let clan_name = first_text(row, &self.clan).unwrap_or_default();

        let powerscore_text = first_text(row, &self.powerscore)
            .ok_or_else(|| ParsingError::required_field_missing("powerscore", Some(&username)))?;
        let powerscore = parse_powerscore(&powerscore_text)?;

        let class = self.extract_class(row, &username)?;

        Ok(RawRankingRow {
            rank,
            username,
            clan_name,
            powerscore,
            class,
        })
    }

    fn extract_class(&self, row: &ElementRef, username: &str) -> ParsingResult<CharacterClass> {
        let style = row
            .select(&self.class_icon)
            .next()
            .and_then(|icon| icon.value().attr("style"))
            .ok_or_else(|| ParsingError::required_field_missing("user_icon", Some(username)))?;

        let image_url = self
            .background_url
            .captures(style)
            .and_then(|captures| captures.get(1))
            .ok_or_else(|| ParsingError::invalid_value("user_icon", style))?;

        let class_id = self
            .class_file
            .captures(image_url.as_str())
            .and_then(|captures| captures.get(1))
            .and_then(|id| id.as_str().parse::<i64>().ok())
            .ok_or_else(|| ParsingError::invalid_value("user_icon", image_url.as_str()))?;

        CharacterClass::from_id(class_id).ok_or(ParsingError::UnknownClass { class_id })
    }
}

impl ContextualParser for RankingPageParser {
    type Output = RankingPage;
    type Context = ParseContext;

    fn parse_with_context(&self, html: &Html, context: &Self::Context) -> ParsingResult<Self::Output> {
        let mut page = RankingPage::default();

        for (index, row) in html.select(&self.row).enumerate() {
            match self.extract_row(&row) {
                Ok(parsed) => page.rows.push(parsed),
                Err(e) if e.is_row_error() => {
                    warn!(url = %context.url, index, "Skipping ranking row: {}", e);
                    page.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        debug!(
            url = %context.url,
            page = ?context.page,
            rows = page.rows.len(),
            skipped = page.skipped,
            "Parsed ranking page"
        );
        Ok(page)
    }
}

fn first_text(row: &ElementRef, selector: &Selector) -> Option<String> {
    row.select(selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
}

/// `"12,345"` → 12345; decimals are rounded to the nearest integer.
pub fn parse_powerscore(text: &str) -> ParsingResult<i64> {
    let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
    let value: f64 = cleaned
        .parse()
        .map_err(|_| ParsingError::invalid_value("powerscore", text))?;
    if !value.is_finite() || value < 0.0 || value > i64::MAX as f64 {
        return Err(ParsingError::invalid_value("powerscore", text));
    }
    Ok(value.round() as i64)
}
