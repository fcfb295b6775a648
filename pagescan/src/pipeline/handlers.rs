//! Per-event phase handlers.
//!
//! Each handler owns the snapshot it was given, searches it, and writes the
//! outcome into the shared aggregator. Failures stay inside the handler:
//! they land in `phaseErrors` and leave the phase's completion field unset.

use base64::Engine as _;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::dom::DomSearcher;
use crate::driver::{NetworkPayload, ResponseBody};
use crate::events::{EventSink, PHASE_COMPLETED, PHASE_FAILED};
use crate::observability::PhaseTimer;
use crate::output::{
    FieldUpdate, PayloadMatch, PayloadSearchResults, Phase, ResultAggregator, TreeSource,
};
use crate::parse::PageParsers;
use crate::tree::{AncestorReducer, DataTree, SearchTerms, TreeSearcher};
use crate::utils::now_utc;

/// Everything a handler needs; cheap to clone into a task.
#[derive(Clone)]
pub(crate) struct PhaseContext {
    pub(crate) aggregator: Arc<ResultAggregator>,
    pub(crate) terms: Arc<SearchTerms>,
    pub(crate) parsers: Arc<dyn PageParsers>,
    pub(crate) event_sink: Arc<dyn EventSink>,
    pub(crate) max_payload_body_bytes: usize,
}

impl PhaseContext {
    async fn complete(&self, timer: PhaseTimer, matches: usize) {
        let phase = timer.phase();
        self.aggregator.set(FieldUpdate::Searched(phase, now_utc()));

        let mut data = timer.finish();
        data["matches"] = matches.into();
        info!(
            phase = %phase,
            matches,
            duration_ms = data["duration_ms"].as_f64().unwrap_or_default(),
            "Phase completed"
        );
        self.event_sink.emit(PHASE_COMPLETED, Some(data)).await;
    }

    pub(crate) async fn fail(&self, phase: Phase, error: String) {
        warn!(phase = %phase, error = %error, "Phase failed");
        self.event_sink
            .emit(
                PHASE_FAILED,
                Some(serde_json::json!({"phase": phase.as_str(), "error": error})),
            )
            .await;
        self.aggregator.set(FieldUpdate::PhaseFailed(phase, error));
    }

    pub(crate) fn set(&self, update: FieldUpdate) {
        self.aggregator.set(update);
    }

    /// Parses one tree out of the initial response and searches it.
    ///
    /// Each source runs in its own task, so a failing or crashing parser
    /// only costs its own phase.
    pub(crate) async fn parse_source(&self, source: TreeSource, body: Arc<str>) {
        let parsed = self.parsers.parse(source, &body);
        drop(body);

        match parsed {
            Ok(tree) => self.search_tree(source, tree).await,
            Err(e) => {
                self.set(FieldUpdate::Parsed(source.phase()));
                self.fail(source.phase(), e.to_string()).await;
            }
        }
    }

    /// Searches one data tree and records its data, matches and context.
    pub(crate) async fn search_tree(&self, source: TreeSource, tree: DataTree) {
        let timer = PhaseTimer::start(source.phase());
        self.set(FieldUpdate::TreeData(source, tree.to_json()));

        let found = TreeSearcher::new().find(&tree, &self.terms);
        let context = AncestorReducer::new()
            .reduce(&tree, &found, source.is_cyclic())
            .to_json();
        drop(tree);
        let matches = found.len();

        self.set(FieldUpdate::TreeFound(source, found));
        self.set(FieldUpdate::TreeContext(source, context));
        self.complete(timer, matches).await;
    }

    /// Searches the fully rendered markup.
    pub(crate) async fn final_markup(&self, markup: String) {
        let timer = PhaseTimer::start(Phase::Html);
        self.set(FieldUpdate::Parsed(Phase::Html));

        let found = DomSearcher::from_html(&markup).find(&self.terms);
        let matches = found.len();

        self.set(FieldUpdate::HtmlFound(found));
        self.complete(timer, matches).await;
    }

    /// Searches every intercepted payload and keeps the ones that matched.
    pub(crate) async fn network_payloads(&self, payloads: Vec<NetworkPayload>) {
        let timer = PhaseTimer::start(Phase::XhrRequests);
        self.set(FieldUpdate::Parsed(Phase::XhrRequests));

        let found: Vec<_> = payloads
            .iter()
            .filter_map(|payload| search_payload(payload, &self.terms, self.max_payload_body_bytes))
            .collect();
        let matches = found.len();

        self.set(FieldUpdate::XhrRequests(payloads));
        self.set(FieldUpdate::XhrRequestsFound(found));
        self.complete(timer, matches).await;
    }

    pub(crate) fn screenshot(&self, bytes: &[u8]) {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        debug!(bytes = bytes.len(), "Storing screenshot");
        self.set(FieldUpdate::Screenshot(encoded));
    }
}

/// Searches one payload body. `None` when nothing matched or the body was
/// skipped.
///
/// Text that decodes to a JSON object or array is searched as a tree; any
/// other text is searched as markup.
pub(crate) fn search_payload(
    payload: &NetworkPayload,
    terms: &SearchTerms,
    max_body_bytes: usize,
) -> Option<PayloadMatch> {
    let searcher = TreeSearcher::new();
    let results = match &payload.response_body {
        ResponseBody::Structured(tree) => PayloadSearchResults::Tree(searcher.find(tree, terms)),
        ResponseBody::Text(text) if text.len() > max_body_bytes => {
            debug!(
                request = %payload.request_line(),
                bytes = text.len(),
                "Skipping oversized payload body"
            );
            return None;
        }
        ResponseBody::Text(text) => match serde_json::from_str::<serde_json::Value>(text) {
            Ok(value @ (serde_json::Value::Object(_) | serde_json::Value::Array(_))) => {
                PayloadSearchResults::Tree(searcher.find(&DataTree::from_json(&value), terms))
            }
            _ => PayloadSearchResults::Dom(DomSearcher::from_html(text).find(terms)),
        },
    };

    if results.is_empty() {
        return None;
    }
    Some(PayloadMatch {
        request: payload.request_line(),
        response: payload.response_body.to_json(),
        search_results: results,
    })
}
