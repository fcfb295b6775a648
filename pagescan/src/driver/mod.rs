//! The browser driver seam.
//!
//! A driver loads one page and reports what it observes as a stream of
//! [`DriverEvent`]s. Events may arrive in any order that respects the page
//! lifecycle; the pipeline handles each one independently.

#[cfg(feature = "http-driver")]
mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::errors::DriverError;
use crate::tree::DataTree;
use crate::utils::Timestamp;

#[cfg(feature = "http-driver")]
pub use http::{FetchConfig, HttpDriver};

/// The channel a driver reports on.
pub type EventSender = mpsc::UnboundedSender<DriverEvent>;

/// The receiving half of an [`EventSender`].
pub type EventReceiver = mpsc::UnboundedReceiver<DriverEvent>;

/// Creates a driver event channel.
#[must_use]
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// A response body captured from the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseBody {
    /// Raw text; may be markup or serialized JSON.
    Text(String),
    /// An already decoded value.
    Structured(DataTree),
}

impl ResponseBody {
    /// Converts to JSON for the record.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Text(text) => serde_json::Value::String(text.clone()),
            Self::Structured(tree) => tree.to_json(),
        }
    }
}

/// One intercepted request/response pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkPayload {
    /// HTTP method.
    pub method: String,
    /// Request URL.
    pub url: String,
    /// Captured response body.
    pub response_body: ResponseBody,
}

impl NetworkPayload {
    /// Creates a payload.
    #[must_use]
    pub fn new(method: impl Into<String>, url: impl Into<String>, response_body: ResponseBody) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            response_body,
        }
    }

    /// `"<METHOD> <url>"`.
    #[must_use]
    pub fn request_line(&self) -> String {
        format!("{} {}", self.method, self.url)
    }
}

/// Everything a driver can report about a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DriverEvent {
    /// The driver began loading the page.
    Started {
        /// When loading began.
        timestamp: Timestamp,
    },
    /// Navigation finished.
    Navigated {
        /// When navigation finished.
        timestamp: Timestamp,
    },
    /// The initial document response arrived.
    InitialResponse {
        /// Final URL of the document response.
        url: String,
        /// The raw response body.
        body: String,
    },
    /// The fully rendered markup.
    FinalMarkup {
        /// Serialized DOM.
        markup: String,
    },
    /// Global page state.
    GlobalState {
        /// The captured state; may be cyclic.
        tree: DataTree,
    },
    /// Every intercepted request/response pair.
    NetworkPayloads {
        /// The captured pairs.
        payloads: Vec<NetworkPayload>,
    },
    /// A screenshot of the rendered page.
    Screenshot {
        /// Encoded image bytes.
        bytes: Vec<u8>,
    },
    /// The driver finished.
    Done {
        /// When the driver finished.
        timestamp: Timestamp,
    },
    /// The page reported an error.
    PageError {
        /// Error detail.
        detail: String,
    },
    /// The driver failed.
    Error {
        /// Error detail.
        detail: String,
    },
}

impl DriverEvent {
    /// Short event name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::Navigated { .. } => "navigated",
            Self::InitialResponse { .. } => "initial_response",
            Self::FinalMarkup { .. } => "final_markup",
            Self::GlobalState { .. } => "global_state",
            Self::NetworkPayloads { .. } => "network_payloads",
            Self::Screenshot { .. } => "screenshot",
            Self::Done { .. } => "done",
            Self::PageError { .. } => "page_error",
            Self::Error { .. } => "error",
        }
    }
}

/// Loads a page and reports it.
///
/// `start` may return as soon as loading is under way, or only after every
/// event was sent. An `Err` means the page could not be loaded at all;
/// failures after that are reported as [`DriverEvent::Error`].
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Loads `url`, sending events on `events`.
    async fn start(&self, url: &str, events: EventSender) -> Result<(), DriverError>;
}

/// Sends one event, failing if the pipeline stopped listening.
pub fn send(events: &EventSender, event: DriverEvent) -> Result<(), DriverError> {
    events.send(event).map_err(|_| DriverError::ChannelClosed)
}
