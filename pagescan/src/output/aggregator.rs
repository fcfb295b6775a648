//! The completion-gated result aggregator.
//!
//! All phase handlers write into one [`ResultAggregator`]. Each write runs
//! the store / check / transition sequence inside a single critical section.
//! Persistence happens on a background writer that always writes the newest
//! snapshot, so a slow or stuck store never holds up the pipeline.

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::record::{FieldUpdate, ResultRecord};
use crate::errors::StoreError;
use crate::storage::RecordStore;
use crate::utils::{now_utc, Timestamp};

/// Default key records are persisted under.
pub const DEFAULT_OUTPUT_KEY: &str = "OUTPUT";

type Snapshot = Option<(u64, Arc<ResultRecord>)>;

#[derive(Debug)]
struct Inner {
    record: ResultRecord,
    version: u64,
}

/// Progress shared between the aggregator and its writer task.
#[derive(Debug)]
struct WriterState {
    /// Highest snapshot version the writer has finished with.
    written: watch::Sender<u64>,
    failures: AtomicUsize,
}

/// Drains the newest snapshot into the store until the aggregator is gone.
struct SnapshotWriter {
    store: Arc<dyn RecordStore>,
    key: String,
    pretty: bool,
    state: Arc<WriterState>,
}

impl SnapshotWriter {
    async fn run(self, mut latest: watch::Receiver<Snapshot>) {
        let mut last_digest = None;
        while latest.changed().await.is_ok() {
            let Some((version, record)) = latest.borrow_and_update().clone() else {
                continue;
            };
            match self.write(&record, &mut last_digest).await {
                Ok(true) => debug!(version, key = %self.key, "Record persisted"),
                Ok(false) => debug!(version, "Record unchanged since last write"),
                Err(e) => {
                    self.state.failures.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %e, key = %self.key, version, "Failed to persist record");
                }
            }
            self.state.written.send_replace(version);
        }
    }

    /// Returns `false` when the content matched the last successful write.
    async fn write(
        &self,
        record: &ResultRecord,
        last_digest: &mut Option<String>,
    ) -> Result<bool, StoreError> {
        let serialized = if self.pretty {
            serde_json::to_string_pretty(record)
        } else {
            serde_json::to_string(record)
        }
        .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let digest = hex::encode(Sha256::digest(serialized.as_bytes()));
        if last_digest.as_deref() == Some(digest.as_str()) {
            return Ok(false);
        }
        self.store.store(&self.key, &serialized).await?;
        *last_digest = Some(digest);
        Ok(true)
    }
}

/// Holds the record of one analysis and drives its `collecting -> ended`
/// transition.
///
/// Writes are accepted in both states. Writes after the transition are kept
/// (late diagnostics) but never move or clear `analysisEnded`.
pub struct ResultAggregator {
    inner: Mutex<Inner>,
    ended: watch::Sender<Option<Timestamp>>,
    latest: watch::Sender<Snapshot>,
    store: Arc<dyn RecordStore>,
    output_key: String,
    pretty: bool,
    writer_state: Arc<WriterState>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl ResultAggregator {
    /// Creates an aggregator around an empty record.
    #[must_use]
    pub fn new(record: ResultRecord, store: Arc<dyn RecordStore>) -> Self {
        let (ended, _) = watch::channel(record.analysis_ended);
        let (latest, _) = watch::channel(None);
        let (written, _) = watch::channel(0);
        Self {
            inner: Mutex::new(Inner { record, version: 0 }),
            ended,
            latest,
            store,
            output_key: DEFAULT_OUTPUT_KEY.to_string(),
            pretty: true,
            writer_state: Arc::new(WriterState {
                written,
                failures: AtomicUsize::new(0),
            }),
            writer: Mutex::new(None),
        }
    }

    /// Sets the key snapshots are stored under.
    #[must_use]
    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = key.into();
        self
    }

    /// Sets whether snapshots are pretty-printed.
    #[must_use]
    pub fn with_pretty_output(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Returns the key snapshots are stored under.
    #[must_use]
    pub fn output_key(&self) -> &str {
        &self.output_key
    }

    /// Applies one field write and queues the resulting record for
    /// persistence.
    ///
    /// Returns the terminal timestamp if this write ended the analysis.
    /// Waiters are released before anything is persisted.
    pub fn set(&self, update: FieldUpdate) -> Option<Timestamp> {
        let field = update.field_name();

        let (version, ended_now) = {
            let mut inner = self.inner.lock();
            inner.record.apply(update);
            inner.version += 1;

            let ended_now = if !inner.record.is_ended() && inner.record.is_complete() {
                let now = now_utc();
                let at = inner
                    .record
                    .last_phase_completed()
                    .map_or(now, |last| last.max(now));
                inner.record.mark_ended(at);
                Some(at)
            } else {
                None
            };
            // Published under the lock so the writer never sees versions
            // out of order.
            self.latest
                .send_replace(Some((inner.version, Arc::new(inner.record.clone()))));
            (inner.version, ended_now)
        };

        debug!(field = %field, version, "Record field set");
        self.ensure_writer();

        if let Some(at) = ended_now {
            info!(ended_at = %at, "Analysis ended");
            self.ended.send_replace(Some(at));
        }
        ended_now
    }

    /// Starts the writer task on first use. Without a tokio runtime the
    /// snapshots are kept until one is available.
    fn ensure_writer(&self) {
        let mut writer = self.writer.lock();
        if writer.is_some() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let mut latest = self.latest.subscribe();
        latest.mark_changed();
        let task = SnapshotWriter {
            store: self.store.clone(),
            key: self.output_key.clone(),
            pretty: self.pretty,
            state: self.writer_state.clone(),
        };
        *writer = Some(runtime.spawn(task.run(latest)));
    }

    /// Waits up to `limit` for the writer to finish with every write made so
    /// far. Returns `false` if the store did not keep up in time.
    ///
    /// A failed write counts as finished; see
    /// [`ResultAggregator::persist_failures`].
    pub async fn flush(&self, limit: Duration) -> bool {
        self.ensure_writer();
        let target = self.inner.lock().version;
        let mut written = self.writer_state.written.subscribe();
        tokio::time::timeout(limit, async move {
            written.wait_for(|version| *version >= target).await.is_ok()
        })
        .await
        .unwrap_or(false)
    }

    /// Returns a copy of the current record.
    #[must_use]
    pub fn snapshot(&self) -> ResultRecord {
        self.inner.lock().record.clone()
    }

    /// Reads one field by its serialized name.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<serde_json::Value> {
        let snapshot = self.snapshot();
        match serde_json::to_value(snapshot) {
            Ok(serde_json::Value::Object(mut map)) => map.remove(field),
            _ => None,
        }
    }

    /// Whether the analysis has ended.
    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.inner.lock().record.is_ended()
    }

    /// Number of snapshots that could not be persisted.
    #[must_use]
    pub fn persist_failures(&self) -> usize {
        self.writer_state.failures.load(Ordering::Relaxed)
    }

    /// Subscribes to the terminal transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Timestamp>> {
        self.ended.subscribe()
    }

    /// Waits until the analysis ends and returns the terminal timestamp.
    pub async fn wait_ended(&self) -> Option<Timestamp> {
        let mut rx = self.ended.subscribe();
        let ended = rx.wait_for(Option::is_some).await.ok().and_then(|at| *at);
        ended
    }
}

impl Drop for ResultAggregator {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.get_mut().take() {
            writer.abort();
        }
    }
}

impl std::fmt::Debug for ResultAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultAggregator")
            .field("output_key", &self.output_key)
            .field("ended", &*self.ended.borrow())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Phase;
    use crate::storage::{MemoryStore, MockRecordStore, NoOpStore};
    use crate::testing::StalledStore;
    use chrono::Duration as TimeDelta;
    use uuid::Uuid;

    const FLUSH: Duration = Duration::from_secs(2);

    fn record() -> ResultRecord {
        ResultRecord::new(Uuid::new_v4(), "https://acme.example", vec!["acme".to_string()])
    }

    fn aggregator() -> ResultAggregator {
        ResultAggregator::new(record(), Arc::new(NoOpStore))
    }

    #[tokio::test]
    async fn test_all_phases_end_exactly_once() {
        let aggregator = aggregator();
        let base = now_utc();
        let last = base + TimeDelta::milliseconds(50);

        for (i, phase) in Phase::ALL.iter().enumerate() {
            assert!(!aggregator.is_ended());
            let at = base + TimeDelta::milliseconds(i64::try_from(i).unwrap() * 10);
            let ended = aggregator.set(FieldUpdate::Searched(*phase, at));
            assert_eq!(ended.is_some(), i == Phase::ALL.len() - 1);
        }

        let record = aggregator.snapshot();
        let ended = record.analysis_ended.unwrap();
        assert!(ended >= last);
        assert_eq!(aggregator.wait_ended().await, Some(ended));
        assert!(record.error.is_none() && record.page_error.is_none());
    }

    #[test]
    fn test_terminal_timestamp_is_not_earlier_than_future_phase() {
        let aggregator = aggregator();
        let future = now_utc() + TimeDelta::hours(1);
        for phase in Phase::ALL {
            aggregator.set(FieldUpdate::Searched(phase, future));
        }
        assert_eq!(aggregator.snapshot().analysis_ended, Some(future));
    }

    #[test]
    fn test_late_writes_are_kept_but_never_reopen() {
        let aggregator = aggregator();
        aggregator
            .set(FieldUpdate::PageError("ReferenceError".to_string()))
            .unwrap();
        let ended = aggregator.snapshot().analysis_ended;

        assert!(aggregator.set(FieldUpdate::Error("late".to_string())).is_none());
        assert!(aggregator
            .set(FieldUpdate::Searched(Phase::Html, now_utc()))
            .is_none());

        let record = aggregator.snapshot();
        assert_eq!(record.analysis_ended, ended);
        assert_eq!(record.error.as_deref(), Some("late"));
        assert!(record.html_searched.is_some());
    }

    #[test]
    fn test_missing_phase_stalls() {
        let aggregator = aggregator();
        for phase in Phase::ALL.iter().filter(|p| **p != Phase::JsonLd) {
            aggregator.set(FieldUpdate::Searched(*phase, now_utc()));
        }
        aggregator.set(FieldUpdate::PhaseFailed(Phase::JsonLd, "bad json".to_string()));
        assert!(!aggregator.is_ended());
        assert_eq!(aggregator.snapshot().pending_phases(), vec![Phase::JsonLd]);
    }

    #[tokio::test]
    async fn test_persistence_failure_does_not_affect_state() {
        let mut store = MockRecordStore::new();
        store
            .expect_store()
            .returning(|_, _| Err(StoreError::Io(std::io::Error::other("disk full"))));

        let aggregator = ResultAggregator::new(record(), Arc::new(store));
        let ended = aggregator.set(FieldUpdate::Error("driver crashed".to_string()));

        assert!(ended.is_some());
        assert!(aggregator.is_ended());
        assert!(aggregator.flush(FLUSH).await);
        assert_eq!(aggregator.persist_failures(), 1);
        assert_eq!(aggregator.get("error"), Some(serde_json::json!("driver crashed")));
    }

    #[tokio::test]
    async fn test_stalled_store_never_blocks_the_pipeline() {
        let store = Arc::new(StalledStore::new());
        let aggregator = ResultAggregator::new(record(), store.clone());

        assert!(aggregator.set(FieldUpdate::ScrapingStarted(now_utc())).is_none());
        let ended = aggregator.set(FieldUpdate::Error("driver crashed".to_string()));
        assert!(ended.is_some());

        let waited = tokio::time::timeout(Duration::from_secs(1), aggregator.wait_ended()).await;
        assert_eq!(waited.ok().flatten(), ended);
        assert!(!aggregator.flush(Duration::from_millis(50)).await);
        assert!(store.attempts() >= 1);
    }

    #[tokio::test]
    async fn test_every_change_is_persisted_under_key() {
        let store = Arc::new(MemoryStore::new());
        let aggregator = ResultAggregator::new(record(), store.clone())
            .with_output_key("RESULT")
            .with_pretty_output(false);

        aggregator.set(FieldUpdate::ScrapingStarted(now_utc()));
        assert!(aggregator.flush(FLUSH).await);
        aggregator.set(FieldUpdate::Parsed(Phase::Html));
        assert!(aggregator.flush(FLUSH).await);
        // Same content as before; nothing new to write.
        aggregator.set(FieldUpdate::Parsed(Phase::Html));
        assert!(aggregator.flush(FLUSH).await);

        assert_eq!(store.write_count(), 2);
        let stored = store.get_json("RESULT").unwrap();
        assert_eq!(stored["htmlParsed"], serde_json::json!(true));
        assert!(stored["scrapingStarted"].is_string());
        assert!(stored["analysisEnded"].is_null());
    }

    #[tokio::test]
    async fn test_flush_writes_the_newest_snapshot() {
        let store = Arc::new(MemoryStore::new());
        let aggregator = ResultAggregator::new(record(), store.clone());
        for phase in Phase::ALL {
            aggregator.set(FieldUpdate::Searched(phase, now_utc()));
        }
        assert!(aggregator.flush(FLUSH).await);

        let stored = store.get_json(DEFAULT_OUTPUT_KEY).unwrap();
        assert!(stored["analysisEnded"].is_string());
        assert!(store.write_count() <= Phase::ALL.len());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_completions_end_once() {
        let aggregator = Arc::new(aggregator());
        let handles: Vec<_> = Phase::ALL
            .into_iter()
            .map(|phase| {
                let aggregator = aggregator.clone();
                tokio::spawn(async move { aggregator.set(FieldUpdate::Searched(phase, now_utc())) })
            })
            .collect();

        let mut transitions = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                transitions += 1;
            }
        }
        assert_eq!(transitions, 1);
        assert!(aggregator.is_ended());
    }

    #[test]
    fn test_wait_ended_resolves_after_error() {
        tokio_test::block_on(async {
            let aggregator = Arc::new(aggregator());
            let waiter = {
                let aggregator = aggregator.clone();
                tokio::spawn(async move { aggregator.wait_ended().await })
            };
            aggregator.set(FieldUpdate::Error("boom".to_string()));
            let ended = waiter.await.unwrap();
            assert_eq!(ended, aggregator.snapshot().analysis_ended);
        });
    }

    #[test]
    fn test_get_unknown_field() {
        let aggregator = aggregator();
        assert!(aggregator.get("nope").is_none());
        assert_eq!(aggregator.get("url"), Some(serde_json::json!("https://acme.example")));
        assert_eq!(aggregator.output_key(), DEFAULT_OUTPUT_KEY);
    }
}
