//! Binds driver events to phase handlers and waits for the record to end.

use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::config::AnalysisConfig;
use super::handlers::PhaseContext;
use super::input::AnalysisInput;
use crate::driver::{event_channel, BrowserDriver, DriverEvent};
use crate::errors::{DriverError, PagescanError};
use crate::events::{EventSink, NoOpEventSink, ANALYSIS_ENDED, ANALYSIS_STARTED, ANALYSIS_TIMED_OUT};
use crate::output::{FieldUpdate, Phase, ResultAggregator, ResultRecord, TreeSource};
use crate::parse::{HtmlParsers, PageParsers};
use crate::storage::{NoOpStore, RecordStore};
use crate::utils::now_utc;

/// Runs one page analysis end to end.
///
/// Every driver event is handled in its own task; all of them write into
/// one [`ResultAggregator`]. [`PipelineCoordinator::run`] returns once the
/// record reaches its terminal state.
pub struct PipelineCoordinator {
    config: AnalysisConfig,
    parsers: Arc<dyn PageParsers>,
    store: Arc<dyn RecordStore>,
    event_sink: Arc<dyn EventSink>,
}

impl PipelineCoordinator {
    /// Creates a coordinator with the default parsers, no persistence and
    /// no event sink.
    #[must_use]
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            parsers: Arc::new(HtmlParsers::new()),
            store: Arc::new(NoOpStore),
            event_sink: Arc::new(NoOpEventSink),
        }
    }

    /// Replaces the page parsers.
    #[must_use]
    pub fn with_parsers(mut self, parsers: Arc<dyn PageParsers>) -> Self {
        self.parsers = parsers;
        self
    }

    /// Sets the store records are persisted to.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = store;
        self
    }

    /// Sets the lifecycle event sink.
    #[must_use]
    pub fn with_event_sink(mut self, event_sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = event_sink;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyzes `url` for `terms`.
    ///
    /// # Errors
    ///
    /// Same as [`PipelineCoordinator::run`].
    pub async fn analyze<I, S>(
        &self,
        driver: Arc<dyn BrowserDriver>,
        url: &str,
        terms: I,
    ) -> Result<ResultRecord, PagescanError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.run(driver, &AnalysisInput::new(url, terms)).await
    }

    /// Validates `input`, starts `driver` and blocks until the record ends.
    ///
    /// Phase failures, page errors and driver errors reported as events are
    /// all returned inside the record.
    ///
    /// # Errors
    ///
    /// Returns `InputValidation` before anything runs, or `Driver` if the
    /// driver could not start. In the latter case the record's `error`
    /// field is set and persisted as well.
    pub async fn run(
        &self,
        driver: Arc<dyn BrowserDriver>,
        input: &AnalysisInput,
    ) -> Result<ResultRecord, PagescanError> {
        input.validate()?;

        let record = ResultRecord::new(Uuid::new_v4(), input.url.clone(), input.search_for.clone());
        let span = info_span!("analysis", analysis_id = %record.analysis_id, url = %input.url);
        let aggregator = Arc::new(
            ResultAggregator::new(record, self.store.clone())
                .with_output_key(self.config.output_key.clone())
                .with_pretty_output(self.config.pretty_output),
        );
        let ctx = PhaseContext {
            aggregator,
            terms: Arc::new(input.terms()),
            parsers: self.parsers.clone(),
            event_sink: self.event_sink.clone(),
            max_payload_body_bytes: self.config.max_payload_body_bytes,
        };

        self.drive(driver, &input.url, ctx).instrument(span).await
    }

    async fn drive(
        &self,
        driver: Arc<dyn BrowserDriver>,
        url: &str,
        ctx: PhaseContext,
    ) -> Result<ResultRecord, PagescanError> {
        let aggregator = ctx.aggregator.clone();
        aggregator.set(FieldUpdate::AnalysisStarted(now_utc()));
        self.event_sink
            .emit(
                ANALYSIS_STARTED,
                Some(serde_json::json!({
                    "url": url,
                    "terms": ctx.terms.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
                })),
            )
            .await;
        info!(terms = ctx.terms.len(), "Analysis started");

        let (tx, mut rx) = event_channel();
        let mut driver_task = {
            let url = url.to_string();
            tokio::spawn(async move { driver.start(&url, tx).await }.in_current_span())
        };
        let mut driver_running = true;
        let mut events_open = true;
        let mut handlers = JoinSet::new();

        let timeout = self.config.timeout();
        let deadline = async move {
            match timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = aggregator.wait_ended() => break,
                event = rx.recv(), if events_open => match event {
                    Some(event) => dispatch(&ctx, &mut handlers, event),
                    None => {
                        debug!("Driver event stream closed");
                        events_open = false;
                    }
                },
                result = &mut driver_task, if driver_running => {
                    driver_running = false;
                    let failure = match result {
                        Ok(Ok(())) => None,
                        Ok(Err(e)) => Some(e),
                        Err(join_error) => Some(DriverError::Start(format!("driver task failed: {join_error}"))),
                    };
                    if let Some(e) = failure {
                        if !aggregator.is_ended() {
                            error!(error = %e, "Driver failed");
                            aggregator.set(FieldUpdate::Error(e.to_string()));
                            self.finish(&aggregator).await;
                            return Err(e.into());
                        }
                    }
                },
                Some(joined) = handlers.join_next(), if !handlers.is_empty() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "Handler supervisor failed");
                    }
                },
                () = &mut deadline => {
                    let pending = aggregator.snapshot().pending_phases();
                    let seconds = self.config.timeout_seconds.unwrap_or_default();
                    warn!(timeout_seconds = seconds, ?pending, "Analysis timed out");
                    self.event_sink
                        .emit(
                            ANALYSIS_TIMED_OUT,
                            Some(serde_json::json!({
                                "timeout_seconds": seconds,
                                "pending": pending,
                            })),
                        )
                        .await;
                    aggregator.set(FieldUpdate::Error(format!("Analysis timed out after {seconds}s")));
                    break;
                },
            }
        }

        if driver_running {
            driver_task.abort();
        }
        Ok(self.finish(&aggregator).await)
    }

    async fn finish(&self, aggregator: &ResultAggregator) -> ResultRecord {
        let limit = self.config.flush_timeout();
        if !aggregator.flush(limit).await {
            warn!(
                flush_timeout_ms = limit.as_millis(),
                key = aggregator.output_key(),
                "Store did not catch up; returning before the last snapshot was written"
            );
        }
        let record = aggregator.snapshot();
        info!(
            error = record.error.as_deref(),
            page_error = record.page_error.as_deref(),
            pending = ?record.pending_phases(),
            "Analysis finished"
        );
        self.event_sink
            .emit(
                ANALYSIS_ENDED,
                Some(serde_json::json!({
                    "analysis_id": record.analysis_id,
                    "analysis_ended": record.analysis_ended,
                    "error": record.error,
                    "page_error": record.page_error,
                    "pending": record.pending_phases(),
                })),
            )
            .await;
        record
    }
}

impl std::fmt::Debug for PipelineCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineCoordinator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Records a plain field directly, or spawns the handler that searches
/// the event's content.
fn dispatch(ctx: &PhaseContext, handlers: &mut JoinSet<()>, event: DriverEvent) {
    debug!(event = event.kind(), "Driver event");
    let handler = ctx.clone();
    match event {
        DriverEvent::Started { timestamp } => ctx.set(FieldUpdate::ScrapingStarted(timestamp)),
        DriverEvent::Navigated { timestamp } => ctx.set(FieldUpdate::PageNavigated(timestamp)),
        DriverEvent::Done { timestamp } => ctx.set(FieldUpdate::ScrapingFinished(timestamp)),
        DriverEvent::InitialResponse { url, body } => {
            ctx.set(FieldUpdate::InitialResponse(url));
            let body: Arc<str> = body.into();
            for source in TreeSource::INITIAL_RESPONSE {
                let handler = ctx.clone();
                let body = body.clone();
                supervise(ctx, handlers, &[source.phase()], async move {
                    handler.parse_source(source, body).await;
                });
            }
        }
        DriverEvent::FinalMarkup { markup } => supervise(ctx, handlers, &[Phase::Html], async move {
            handler.final_markup(markup).await;
        }),
        DriverEvent::GlobalState { tree } => {
            supervise(ctx, handlers, &[Phase::WindowProperties], async move {
                handler.search_tree(TreeSource::WindowProperties, tree).await;
            });
        }
        DriverEvent::NetworkPayloads { payloads } => {
            supervise(ctx, handlers, &[Phase::XhrRequests], async move {
                handler.network_payloads(payloads).await;
            });
        }
        DriverEvent::Screenshot { bytes } => supervise(ctx, handlers, &[], async move {
            handler.screenshot(&bytes);
        }),
        DriverEvent::PageError { detail } => ctx.set(FieldUpdate::PageError(detail)),
        DriverEvent::Error { detail } => ctx.set(FieldUpdate::Error(detail)),
    }
}

/// Runs `task` in its own task and records a failure for each of `phases`
/// that had not completed if it panics.
fn supervise<F>(ctx: &PhaseContext, handlers: &mut JoinSet<()>, phases: &[Phase], task: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let ctx = ctx.clone();
    let phases = phases.to_vec();
    let task = tokio::spawn(task.in_current_span());
    handlers.spawn(
        async move {
            let Err(join_error) = task.await else {
                return;
            };
            let record = ctx.aggregator.snapshot();
            for phase in phases {
                if record.searched(phase).is_none() {
                    ctx.fail(phase, format!("handler failed: {join_error}")).await;
                }
            }
        }
        .in_current_span(),
    );
}
