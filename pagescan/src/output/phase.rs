//! The independently timed search phases of one analysis.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One extraction + search unit. Every phase has a completion field in the
/// record; the analysis ends once all of them are set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    /// Global page state captured by the driver.
    WindowProperties,
    /// Head metadata of the initial response.
    Metadata,
    /// schema.org microdata of the initial response.
    SchemaOrg,
    /// JSON-LD blocks of the initial response.
    JsonLd,
    /// The fully rendered markup.
    Html,
    /// Intercepted network payloads.
    XhrRequests,
}

impl Phase {
    /// Every phase, in record order.
    pub const ALL: [Self; 6] = [
        Self::WindowProperties,
        Self::Metadata,
        Self::SchemaOrg,
        Self::JsonLd,
        Self::Html,
        Self::XhrRequests,
    ];

    /// The phase name used in record keys and events.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WindowProperties => "windowProperties",
            Self::Metadata => "metadata",
            Self::SchemaOrg => "schemaOrg",
            Self::JsonLd => "jsonLd",
            Self::Html => "html",
            Self::XhrRequests => "xhrRequests",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A phase whose input is a data tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TreeSource {
    /// Head metadata.
    Metadata,
    /// JSON-LD blocks.
    JsonLd,
    /// schema.org microdata.
    SchemaOrg,
    /// Global page state; may be cyclic.
    WindowProperties,
}

impl TreeSource {
    /// The sources parsed out of the initial response body.
    pub const INITIAL_RESPONSE: [Self; 3] = [Self::Metadata, Self::JsonLd, Self::SchemaOrg];

    /// The phase this source completes.
    #[must_use]
    pub fn phase(self) -> Phase {
        match self {
            Self::Metadata => Phase::Metadata,
            Self::JsonLd => Phase::JsonLd,
            Self::SchemaOrg => Phase::SchemaOrg,
            Self::WindowProperties => Phase::WindowProperties,
        }
    }

    /// Whether trees from this source can contain cycles.
    #[must_use]
    pub fn is_cyclic(self) -> bool {
        matches!(self, Self::WindowProperties)
    }
}

impl fmt::Display for TreeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.phase().fmt(f)
    }
}
