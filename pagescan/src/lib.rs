//! # Pagescan
//!
//! Locates caller-supplied search terms across every extraction source of a
//! single fetched web page and reports where, and in what context, each term
//! occurs.
//!
//! A page is observed through several independent sources:
//!
//! - **Initial response**: the raw HTML body, parsed into metadata, JSON-LD and
//!   schema.org microdata trees
//! - **Rendered markup**: the final DOM after scripts ran
//! - **Global state**: the page's window properties, possibly cyclic
//! - **Network payloads**: intercepted request/response pairs
//!
//! Each source is searched on its own schedule and the outcomes converge on a
//! single [`output::ResultAggregator`], which ends the analysis once every
//! phase has reported or a fatal error was recorded.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pagescan::prelude::*;
//!
//! let input = AnalysisInput::new("https://example.com", ["acme"]);
//! let coordinator = PipelineCoordinator::new(AnalysisConfig::default());
//! let record = coordinator.run(driver, &input).await?;
//! println!("{}", serde_json::to_string_pretty(&record)?);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod dom;
pub mod driver;
pub mod errors;
pub mod events;
pub mod observability;
pub mod output;
pub mod parse;
pub mod pipeline;
pub mod storage;
pub mod testing;
pub mod tree;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::dom::{DomMatchDescriptor, DomSearcher, MatchLocation};
    pub use crate::driver::{BrowserDriver, DriverEvent, EventSender, NetworkPayload, ResponseBody};
    pub use crate::errors::{
        DriverError, InputValidationError, PagescanError, ParseError, StoreError, TreeError,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::output::{FieldUpdate, Phase, ResultAggregator, ResultRecord, TreeSource};
    pub use crate::parse::{HtmlParsers, PageParsers};
    pub use crate::pipeline::{AnalysisConfig, AnalysisInput, PipelineCoordinator};
    pub use crate::storage::{FileStore, MemoryStore, NoOpStore, RecordStore};
    pub use crate::tree::{
        AncestorReducer, DataTree, MatchDescriptor, Node, NodeId, PathSegment, ReducedTree,
        SearchTerms, TreeSearcher,
    };
    pub use crate::utils::{now_utc, Timestamp};
}
