//! Error types for pagescan.
//!
//! Errors are split by where they are allowed to surface:
//!
//! - [`InputValidationError`] aborts an analysis before it starts
//! - [`ParseError`] stays inside the phase that raised it
//! - [`DriverError`] ends the analysis through the record's error fields
//! - [`StoreError`] is logged by the aggregator and never propagated
//! - [`TreeError`] reports misuse of the [`crate::tree::DataTree`] builder API

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for pagescan operations.
#[derive(Debug, Error)]
pub enum PagescanError {
    /// The caller's input was rejected.
    #[error("{0}")]
    InputValidation(#[from] InputValidationError),

    /// A page parser failed.
    #[error("{0}")]
    Parse(#[from] ParseError),

    /// The browser driver failed.
    #[error("{0}")]
    Driver(#[from] DriverError),

    /// The record store failed.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// A data tree was built incorrectly.
    #[error("{0}")]
    Tree(#[from] TreeError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for PagescanError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Error raised when the caller's analysis input is malformed.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[error("Invalid input field '{field}': {message}")]
pub struct InputValidationError {
    /// The offending input field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl InputValidationError {
    /// Creates a new input validation error.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("field".to_string(), serde_json::Value::String(self.field.clone()));
        map.insert("message".to_string(), serde_json::Value::String(self.message.clone()));
        map
    }
}

/// Errors raised while turning markup into a data tree.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    /// A JSON document could not be decoded.
    #[error("Invalid JSON in {source_name}: {reason}")]
    InvalidJson {
        /// Which source held the JSON.
        source_name: String,
        /// The decoder's message.
        reason: String,
    },

    /// A CSS selector could not be compiled.
    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector {
        /// The selector text.
        selector: String,
        /// The compiler's message.
        reason: String,
    },

    /// The parser does not handle this source.
    #[error("Unsupported source: {0}")]
    Unsupported(String),
}

impl ParseError {
    /// Creates an invalid selector error.
    #[must_use]
    pub fn invalid_selector(selector: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidSelector {
            selector: selector.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors raised by a browser driver.
#[derive(Debug, Clone, Error)]
pub enum DriverError {
    /// The driver could not start loading the page.
    #[error("Driver failed to start: {0}")]
    Start(String),

    /// The page could not be fetched.
    #[error("Fetch failed for {url}: {reason}")]
    Fetch {
        /// The requested URL.
        url: String,
        /// Why the fetch failed.
        reason: String,
    },

    /// The event receiver went away before the driver finished.
    #[error("Event channel closed")]
    ChannelClosed,
}

/// Errors raised by a record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Writing the record failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The record could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors raised by the data tree builder API.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum TreeError {
    /// The node id does not belong to this tree.
    #[error("Unknown node id {0}")]
    UnknownNode(usize),

    /// A keyed insert targeted a node that is not a mapping.
    #[error("Node {0} is not a mapping")]
    NotAMapping(usize),

    /// A push targeted a node that is not a sequence.
    #[error("Node {0} is not a sequence")]
    NotASequence(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_validation_error_display() {
        let err = InputValidationError::new("url", "must be absolute");
        assert_eq!(err.to_string(), "Invalid input field 'url': must be absolute");

        let dict = err.to_dict();
        assert_eq!(dict.get("field").unwrap(), "url");
    }

    #[test]
    fn test_wrapped_errors_keep_message() {
        let err: PagescanError = DriverError::Start("browser missing".to_string()).into();
        assert_eq!(err.to_string(), "Driver failed to start: browser missing");

        let err: PagescanError = TreeError::NotAMapping(3).into();
        assert_eq!(err.to_string(), "Node 3 is not a mapping");
    }

    #[test]
    fn test_parse_error_selector() {
        let err = ParseError::invalid_selector("[[", "unexpected token");
        assert!(err.to_string().contains("[["));
    }

    #[test]
    fn test_serde_json_error_converts() {
        let raw = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: PagescanError = raw.into();
        assert!(matches!(err, PagescanError::Serialization(_)));
    }
}
