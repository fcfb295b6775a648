//! Test doubles for the driver, store and parser seams.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::driver::{send, BrowserDriver, DriverEvent, EventSender};
use crate::errors::{DriverError, ParseError, StoreError};
use crate::output::TreeSource;
use crate::parse::{HtmlParsers, PageParsers};
use crate::storage::RecordStore;
use crate::tree::DataTree;

#[derive(Debug, Clone)]
enum Step {
    Emit(DriverEvent),
    Pause(Duration),
}

/// A driver that replays a fixed script of events.
#[derive(Debug, Default)]
pub struct ScriptedDriver {
    steps: Vec<Step>,
    start_error: Option<String>,
    started: Mutex<Vec<String>>,
}

impl ScriptedDriver {
    /// Creates a driver with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a driver that fails to start.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            start_error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Appends an event to the script.
    #[must_use]
    pub fn then_emit(mut self, event: DriverEvent) -> Self {
        self.steps.push(Step::Emit(event));
        self
    }

    /// Appends a pause to the script.
    #[must_use]
    pub fn then_pause(mut self, duration: Duration) -> Self {
        self.steps.push(Step::Pause(duration));
        self
    }

    /// Returns the URLs `start` was called with.
    #[must_use]
    pub fn started_urls(&self) -> Vec<String> {
        self.started.lock().clone()
    }
}

#[async_trait]
impl BrowserDriver for ScriptedDriver {
    async fn start(&self, url: &str, events: EventSender) -> Result<(), DriverError> {
        self.started.lock().push(url.to_string());
        if let Some(message) = &self.start_error {
            return Err(DriverError::Start(message.clone()));
        }

        for step in &self.steps {
            match step {
                Step::Emit(event) => send(&events, event.clone())?,
                Step::Pause(duration) => tokio::time::sleep(*duration).await,
            }
        }
        Ok(())
    }
}

/// A store whose writes always fail.
#[derive(Debug, Default)]
pub struct FailingStore {
    attempts: AtomicUsize,
}

impl FailingStore {
    /// Creates a failing store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of write attempts so far.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for FailingStore {
    async fn store(&self, _key: &str, _serialized: &str) -> Result<(), StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Io(std::io::Error::other("store unavailable")))
    }
}

/// A store whose writes never complete.
#[derive(Debug, Default)]
pub struct StalledStore {
    attempts: AtomicUsize,
}

impl StalledStore {
    /// Creates a stalled store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of writes started so far.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for StalledStore {
    async fn store(&self, _key: &str, _serialized: &str) -> Result<(), StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

/// The default parsers, except that one source always fails.
#[derive(Debug, Clone, Copy)]
pub struct FailingParsers {
    failing: TreeSource,
}

impl FailingParsers {
    /// Fails every parse of `failing`.
    #[must_use]
    pub fn new(failing: TreeSource) -> Self {
        Self { failing }
    }

    fn check(&self, source: TreeSource) -> Result<(), ParseError> {
        if source == self.failing {
            return Err(ParseError::InvalidJson {
                source_name: source.to_string(),
                reason: "scripted failure".to_string(),
            });
        }
        Ok(())
    }
}

impl PageParsers for FailingParsers {
    fn metadata(&self, markup: &str) -> Result<DataTree, ParseError> {
        self.check(TreeSource::Metadata)?;
        HtmlParsers.metadata(markup)
    }

    fn json_ld(&self, markup: &str) -> Result<DataTree, ParseError> {
        self.check(TreeSource::JsonLd)?;
        HtmlParsers.json_ld(markup)
    }

    fn schema_org(&self, markup: &str) -> Result<DataTree, ParseError> {
        self.check(TreeSource::SchemaOrg)?;
        HtmlParsers.schema_org(markup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::event_channel;
    use crate::utils::now_utc;

    #[tokio::test]
    async fn test_scripted_driver_replays_in_order() {
        let driver = ScriptedDriver::new()
            .then_emit(DriverEvent::Started { timestamp: now_utc() })
            .then_pause(Duration::from_millis(5))
            .then_emit(DriverEvent::PageError { detail: "x".to_string() });
        let (tx, mut rx) = event_channel();
        driver.start("https://acme.example", tx).await.unwrap();

        assert_eq!(rx.recv().await.map(|e| e.kind()), Some("started"));
        assert_eq!(rx.recv().await.map(|e| e.kind()), Some("page_error"));
        assert!(rx.recv().await.is_none());
        assert_eq!(driver.started_urls(), vec!["https://acme.example".to_string()]);
    }

    #[tokio::test]
    async fn test_failing_doubles() {
        let (tx, _rx) = event_channel();
        assert!(ScriptedDriver::failing("no browser").start("https://a.example", tx).await.is_err());

        let store = FailingStore::new();
        assert!(store.store("OUTPUT", "{}").await.is_err());
        assert_eq!(store.attempts(), 1);

        let stalled = StalledStore::new();
        let write = tokio::time::timeout(Duration::from_millis(20), stalled.store("OUTPUT", "{}")).await;
        assert!(write.is_err());
        assert_eq!(stalled.attempts(), 1);

        let parsers = FailingParsers::new(TreeSource::JsonLd);
        assert!(parsers.json_ld("<p></p>").is_err());
        assert!(parsers.metadata("<p></p>").is_ok());
    }
}
