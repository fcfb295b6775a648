//! The caller-facing analysis input.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::errors::InputValidationError;
use crate::tree::SearchTerms;

#[allow(clippy::expect_used)]
static HTTP_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^https?://[^\s/?#@]+(?:[/?#]\S*)?$").expect("static regex is valid")
});

/// What to analyze: one page and the terms to look for on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisInput {
    /// Absolute `http`/`https` URL of the page.
    pub url: String,
    /// Terms to locate, matched case-insensitively.
    pub search_for: Vec<String>,
}

impl AnalysisInput {
    /// Creates an input. Call [`AnalysisInput::validate`] before use.
    #[must_use]
    pub fn new<I, S>(url: impl Into<String>, search_for: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            url: url.into(),
            search_for: search_for.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses and validates a JSON input document.
    ///
    /// # Errors
    ///
    /// Returns `InputValidationError` if the document is malformed or fails
    /// validation.
    pub fn from_json(raw: &str) -> Result<Self, InputValidationError> {
        let input: Self =
            serde_json::from_str(raw).map_err(|e| InputValidationError::new("input", e.to_string()))?;
        input.validate()?;
        Ok(input)
    }

    /// Checks the URL and the search terms.
    ///
    /// # Errors
    ///
    /// Returns `InputValidationError` naming the first offending field.
    pub fn validate(&self) -> Result<(), InputValidationError> {
        if self.url.trim().is_empty() {
            return Err(InputValidationError::new("url", "must not be empty"));
        }
        if !HTTP_URL.is_match(&self.url) {
            return Err(InputValidationError::new(
                "url",
                format!("'{}' is not an absolute http(s) URL", self.url),
            ));
        }
        if self.search_for.is_empty() {
            return Err(InputValidationError::new(
                "searchFor",
                "at least one search term is required",
            ));
        }
        if let Some(index) = self.search_for.iter().position(|t| t.trim().is_empty()) {
            return Err(InputValidationError::new(
                "searchFor",
                format!("term {index} is blank"),
            ));
        }
        Ok(())
    }

    /// The search terms, deduplicated.
    #[must_use]
    pub fn terms(&self) -> SearchTerms {
        SearchTerms::new(self.search_for.iter().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_input() {
        let input = AnalysisInput::new("https://shop.acme.example/p/1?ref=x", ["Acme", "acme", "shoe"]);
        assert!(input.validate().is_ok());
        assert_eq!(input.terms().len(), 2);
    }

    #[test]
    fn test_from_json_camel_case() {
        let input =
            AnalysisInput::from_json(r#"{"url": "http://acme.example", "searchFor": ["acme"]}"#)
                .unwrap();
        assert_eq!(input.search_for, vec!["acme".to_string()]);
    }

    #[test]
    fn test_rejects_bad_urls() {
        for url in ["", "acme.example", "ftp://acme.example", "https://", "https://a b.example"] {
            let err = AnalysisInput::new(url, ["acme"]).validate().unwrap_err();
            assert_eq!(err.field, "url", "accepted {url:?}");
        }
    }

    #[test]
    fn test_rejects_missing_or_blank_terms() {
        let none: [&str; 0] = [];
        let err = AnalysisInput::new("https://acme.example", none).validate().unwrap_err();
        assert_eq!(err.field, "searchFor");

        let err = AnalysisInput::new("https://acme.example", ["acme", "  "]).validate().unwrap_err();
        assert_eq!(err.message, "term 1 is blank");
    }

    #[test]
    fn test_from_json_malformed() {
        let err = AnalysisInput::from_json(r#"{"url": 5}"#).unwrap_err();
        assert_eq!(err.field, "input");
    }
}
