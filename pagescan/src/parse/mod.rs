//! Parsers that turn a page's raw HTML into data trees.
//!
//! Each parser is a pure function of the markup. The pipeline calls them on
//! the initial response body and searches whatever they return.

mod json_ld;
mod metadata;
mod schema_org;

use scraper::Selector;

use crate::errors::ParseError;
use crate::output::TreeSource;
use crate::tree::DataTree;

pub use json_ld::parse_json_ld;
pub use metadata::parse_metadata;
pub use schema_org::parse_schema_org;

/// The three markup parsers the initial response is run through.
pub trait PageParsers: Send + Sync {
    /// Extracts `<title>`, `<meta>` and related head metadata.
    fn metadata(&self, markup: &str) -> Result<DataTree, ParseError>;

    /// Extracts every JSON-LD block.
    fn json_ld(&self, markup: &str) -> Result<DataTree, ParseError>;

    /// Extracts schema.org microdata items.
    fn schema_org(&self, markup: &str) -> Result<DataTree, ParseError>;

    /// Dispatches on the source kind.
    fn parse(&self, source: TreeSource, markup: &str) -> Result<DataTree, ParseError> {
        match source {
            TreeSource::Metadata => self.metadata(markup),
            TreeSource::JsonLd => self.json_ld(markup),
            TreeSource::SchemaOrg => self.schema_org(markup),
            TreeSource::WindowProperties => Err(ParseError::Unsupported(
                "window properties are captured by the driver, not parsed".to_string(),
            )),
        }
    }
}

/// Default parsers built on `scraper`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlParsers;

impl HtmlParsers {
    /// Creates the default parser set.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl PageParsers for HtmlParsers {
    fn metadata(&self, markup: &str) -> Result<DataTree, ParseError> {
        parse_metadata(markup)
    }

    fn json_ld(&self, markup: &str) -> Result<DataTree, ParseError> {
        parse_json_ld(markup)
    }

    fn schema_org(&self, markup: &str) -> Result<DataTree, ParseError> {
        parse_schema_org(markup)
    }
}

pub(crate) fn selector(css: &str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|e| ParseError::invalid_selector(css, e))
}

/// Inserts `key -> value`, turning repeated keys into a sequence.
pub(crate) fn insert_repeated(
    map: &mut serde_json::Map<String, serde_json::Value>,
    key: &str,
    value: serde_json::Value,
) {
    match map.get_mut(key) {
        None => {
            map.insert(key.to_string(), value);
        }
        Some(serde_json::Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = serde_json::Value::Array(vec![first, value]);
        }
    }
}
