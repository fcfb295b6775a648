//! JSON-LD blocks.

use scraper::Html;
use tracing::warn;

use super::selector;
use crate::errors::ParseError;
use crate::tree::DataTree;

/// Parses every `<script type="application/ld+json">` into a sequence, in
/// document order. Blocks that are not valid JSON are skipped with a warning.
pub fn parse_json_ld(markup: &str) -> Result<DataTree, ParseError> {
    let document = Html::parse_document(markup);
    let mut blocks = Vec::new();

    for (index, script) in document
        .select(&selector(r#"script[type="application/ld+json"]"#)?)
        .enumerate()
    {
        let body = script.text().collect::<String>();
        let body = body.trim();
        if body.is_empty() {
            continue;
        }
        match serde_json::from_str::<serde_json::Value>(body) {
            Ok(value) => blocks.push(value),
            Err(e) => {
                let err = ParseError::InvalidJson {
                    source_name: format!("json-ld block {index}"),
                    reason: e.to_string(),
                };
                warn!(error = %err, "Skipping malformed JSON-LD block");
            }
        }
    }

    Ok(DataTree::from_json(&serde_json::Value::Array(blocks)))
}
