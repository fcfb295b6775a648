//! The fixed-schema result record of one analysis.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::phase::{Phase, TreeSource};
use crate::dom::DomMatchDescriptor;
use crate::driver::NetworkPayload;
use crate::tree::MatchDescriptor;
use crate::utils::{latest, Timestamp};

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Search results for one intercepted payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PayloadSearchResults {
    /// The body was searched as markup.
    Dom(Vec<DomMatchDescriptor>),
    /// The body was searched as a data tree.
    Tree(Vec<MatchDescriptor>),
}

impl PayloadSearchResults {
    /// Returns the number of matches.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Dom(found) => found.len(),
            Self::Tree(found) => found.len(),
        }
    }

    /// Returns true if nothing matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An intercepted payload with at least one match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadMatch {
    /// `"<METHOD> <url>"`.
    pub request: String,
    /// The response body as captured.
    pub response: serde_json::Value,
    /// What matched in the body.
    pub search_results: PayloadSearchResults,
}

/// One write into the record.
///
/// The terminal `analysisEnded` field has no update: only the aggregator
/// sets it, exactly once.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    /// The analysis was created.
    AnalysisStarted(Timestamp),
    /// The driver began loading the page.
    ScrapingStarted(Timestamp),
    /// The page finished navigating.
    PageNavigated(Timestamp),
    /// The driver finished all its work.
    ScrapingFinished(Timestamp),
    /// URL of the initial document response.
    InitialResponse(String),
    /// A phase received its input and started searching.
    Parsed(Phase),
    /// The full data tree of a source.
    TreeData(TreeSource, serde_json::Value),
    /// Matches found in a source's tree.
    TreeFound(TreeSource, Vec<MatchDescriptor>),
    /// The reduced context around a source's matches.
    TreeContext(TreeSource, serde_json::Value),
    /// Matches found in the rendered markup.
    HtmlFound(Vec<DomMatchDescriptor>),
    /// Every intercepted payload.
    XhrRequests(Vec<NetworkPayload>),
    /// Payloads with at least one match.
    XhrRequestsFound(Vec<PayloadMatch>),
    /// A phase completed.
    Searched(Phase, Timestamp),
    /// A phase failed; does not complete it.
    PhaseFailed(Phase, String),
    /// Base64-encoded page screenshot.
    Screenshot(String),
    /// The page reported an error.
    PageError(String),
    /// The driver or the pipeline failed.
    Error(String),
}

impl FieldUpdate {
    /// The record key this update writes.
    #[must_use]
    pub fn field_name(&self) -> String {
        match self {
            Self::AnalysisStarted(_) => "analysisStarted".to_string(),
            Self::ScrapingStarted(_) => "scrapingStarted".to_string(),
            Self::PageNavigated(_) => "pageNavigated".to_string(),
            Self::ScrapingFinished(_) => "scrapingFinished".to_string(),
            Self::InitialResponse(_) => "initialResponse".to_string(),
            Self::Parsed(phase) => format!("{phase}Parsed"),
            Self::TreeData(source, _) => {
                let name = source.phase().as_str();
                let mut chars = name.chars();
                chars.next().map_or_else(String::new, |first| {
                    format!("all{}{}", first.to_ascii_uppercase(), chars.as_str())
                })
            }
            Self::TreeFound(source, _) => format!("{source}Found"),
            Self::TreeContext(source, _) => source.to_string(),
            Self::HtmlFound(_) => "htmlFound".to_string(),
            Self::XhrRequests(_) => "xhrRequests".to_string(),
            Self::XhrRequestsFound(_) => "xhrRequestsFound".to_string(),
            Self::Searched(phase, _) => format!("{phase}Searched"),
            Self::PhaseFailed(..) => "phaseErrors".to_string(),
            Self::Screenshot(_) => "screenshot".to_string(),
            Self::PageError(_) => "pageError".to_string(),
            Self::Error(_) => "error".to_string(),
        }
    }
}

/// The aggregated output of one page analysis.
///
/// Serializes as a flat JSON object. Phase completion fields
/// (`<phase>Searched`) and the two error fields drive the terminal
/// `analysisEnded` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    /// Unique id of this analysis.
    pub analysis_id: Uuid,
    /// The analyzed URL.
    pub url: String,
    /// The caller's search terms.
    pub search_for: Vec<String>,

    /// When the analysis was created.
    pub analysis_started: Option<Timestamp>,
    /// When the driver began loading the page.
    pub scraping_started: Option<Timestamp>,
    /// When the page finished navigating.
    pub page_navigated: Option<Timestamp>,
    /// When the driver finished.
    pub scraping_finished: Option<Timestamp>,

    /// Completion of the global state phase.
    pub window_properties_searched: Option<Timestamp>,
    /// Completion of the metadata phase.
    pub metadata_searched: Option<Timestamp>,
    /// Completion of the microdata phase.
    pub schema_org_searched: Option<Timestamp>,
    /// Completion of the JSON-LD phase.
    pub json_ld_searched: Option<Timestamp>,
    /// Completion of the rendered markup phase.
    pub html_searched: Option<Timestamp>,
    /// Completion of the network payload phase.
    pub xhr_requests_searched: Option<Timestamp>,
    /// Terminal marker; set once, never cleared.
    pub analysis_ended: Option<Timestamp>,

    /// URL of the initial document response.
    pub initial_response: Option<String>,

    /// Whether global state was received.
    pub window_properties_parsed: bool,
    /// Whether metadata was parsed.
    pub metadata_parsed: bool,
    /// Whether microdata was parsed.
    pub schema_org_parsed: bool,
    /// Whether JSON-LD was parsed.
    pub json_ld_parsed: bool,
    /// Whether rendered markup was received.
    pub html_parsed: bool,
    /// Whether network payloads were received.
    pub xhr_requests_parsed: bool,

    /// Reduced global state around the matches.
    pub window_properties: serde_json::Value,
    /// Matches in global state.
    pub window_properties_found: Vec<MatchDescriptor>,
    /// Full global state.
    pub all_window_properties: serde_json::Value,

    /// Reduced metadata around the matches.
    pub metadata: serde_json::Value,
    /// Matches in metadata.
    pub metadata_found: Vec<MatchDescriptor>,
    /// Full metadata.
    pub all_metadata: serde_json::Value,

    /// Reduced microdata around the matches.
    pub schema_org: serde_json::Value,
    /// Matches in microdata.
    pub schema_org_found: Vec<MatchDescriptor>,
    /// Full microdata.
    pub all_schema_org: serde_json::Value,

    /// Reduced JSON-LD around the matches.
    pub json_ld: serde_json::Value,
    /// Matches in JSON-LD.
    pub json_ld_found: Vec<MatchDescriptor>,
    /// Full JSON-LD.
    pub all_json_ld: serde_json::Value,

    /// Matches in the rendered markup.
    pub html_found: Vec<DomMatchDescriptor>,

    /// Every intercepted payload.
    pub xhr_requests: Vec<NetworkPayload>,
    /// Payloads with at least one match.
    pub xhr_requests_found: Vec<PayloadMatch>,

    /// Base64-encoded screenshot.
    pub screenshot: Option<String>,
    /// Errors of phases that ran and failed.
    pub phase_errors: BTreeMap<Phase, String>,
    /// Error reported by the page.
    pub page_error: Option<String>,
    /// Fatal driver or pipeline error.
    pub error: Option<String>,
}

/// Mutable views of one tree source's fields.
struct TreeFields<'a> {
    parsed: &'a mut bool,
    all: &'a mut serde_json::Value,
    found: &'a mut Vec<MatchDescriptor>,
    context: &'a mut serde_json::Value,
}

impl ResultRecord {
    /// Creates an empty record for one analysis.
    #[must_use]
    pub fn new(analysis_id: Uuid, url: impl Into<String>, search_for: Vec<String>) -> Self {
        Self {
            analysis_id,
            url: url.into(),
            search_for,
            analysis_started: None,
            scraping_started: None,
            page_navigated: None,
            scraping_finished: None,
            window_properties_searched: None,
            metadata_searched: None,
            schema_org_searched: None,
            json_ld_searched: None,
            html_searched: None,
            xhr_requests_searched: None,
            analysis_ended: None,
            initial_response: None,
            window_properties_parsed: false,
            metadata_parsed: false,
            schema_org_parsed: false,
            json_ld_parsed: false,
            html_parsed: false,
            xhr_requests_parsed: false,
            window_properties: empty_object(),
            window_properties_found: Vec::new(),
            all_window_properties: empty_object(),
            metadata: empty_object(),
            metadata_found: Vec::new(),
            all_metadata: empty_object(),
            schema_org: empty_object(),
            schema_org_found: Vec::new(),
            all_schema_org: empty_object(),
            json_ld: empty_object(),
            json_ld_found: Vec::new(),
            all_json_ld: empty_object(),
            html_found: Vec::new(),
            xhr_requests: Vec::new(),
            xhr_requests_found: Vec::new(),
            screenshot: None,
            phase_errors: BTreeMap::new(),
            page_error: None,
            error: None,
        }
    }

    /// Returns a phase's completion timestamp.
    #[must_use]
    pub fn searched(&self, phase: Phase) -> Option<Timestamp> {
        match phase {
            Phase::WindowProperties => self.window_properties_searched,
            Phase::Metadata => self.metadata_searched,
            Phase::SchemaOrg => self.schema_org_searched,
            Phase::JsonLd => self.json_ld_searched,
            Phase::Html => self.html_searched,
            Phase::XhrRequests => self.xhr_requests_searched,
        }
    }

    fn searched_mut(&mut self, phase: Phase) -> &mut Option<Timestamp> {
        match phase {
            Phase::WindowProperties => &mut self.window_properties_searched,
            Phase::Metadata => &mut self.metadata_searched,
            Phase::SchemaOrg => &mut self.schema_org_searched,
            Phase::JsonLd => &mut self.json_ld_searched,
            Phase::Html => &mut self.html_searched,
            Phase::XhrRequests => &mut self.xhr_requests_searched,
        }
    }

    /// Returns whether a phase received its input.
    #[must_use]
    pub fn parsed(&self, phase: Phase) -> bool {
        match phase {
            Phase::WindowProperties => self.window_properties_parsed,
            Phase::Metadata => self.metadata_parsed,
            Phase::SchemaOrg => self.schema_org_parsed,
            Phase::JsonLd => self.json_ld_parsed,
            Phase::Html => self.html_parsed,
            Phase::XhrRequests => self.xhr_requests_parsed,
        }
    }

    fn parsed_mut(&mut self, phase: Phase) -> &mut bool {
        match phase {
            Phase::WindowProperties => &mut self.window_properties_parsed,
            Phase::Metadata => &mut self.metadata_parsed,
            Phase::SchemaOrg => &mut self.schema_org_parsed,
            Phase::JsonLd => &mut self.json_ld_parsed,
            Phase::Html => &mut self.html_parsed,
            Phase::XhrRequests => &mut self.xhr_requests_parsed,
        }
    }

    fn tree_fields(&mut self, source: TreeSource) -> TreeFields<'_> {
        match source {
            TreeSource::WindowProperties => TreeFields {
                parsed: &mut self.window_properties_parsed,
                all: &mut self.all_window_properties,
                found: &mut self.window_properties_found,
                context: &mut self.window_properties,
            },
            TreeSource::Metadata => TreeFields {
                parsed: &mut self.metadata_parsed,
                all: &mut self.all_metadata,
                found: &mut self.metadata_found,
                context: &mut self.metadata,
            },
            TreeSource::SchemaOrg => TreeFields {
                parsed: &mut self.schema_org_parsed,
                all: &mut self.all_schema_org,
                found: &mut self.schema_org_found,
                context: &mut self.schema_org,
            },
            TreeSource::JsonLd => TreeFields {
                parsed: &mut self.json_ld_parsed,
                all: &mut self.all_json_ld,
                found: &mut self.json_ld_found,
                context: &mut self.json_ld,
            },
        }
    }

    /// Returns the matches recorded for a tree source.
    #[must_use]
    pub fn found(&self, source: TreeSource) -> &[MatchDescriptor] {
        match source {
            TreeSource::WindowProperties => &self.window_properties_found,
            TreeSource::Metadata => &self.metadata_found,
            TreeSource::SchemaOrg => &self.schema_org_found,
            TreeSource::JsonLd => &self.json_ld_found,
        }
    }

    /// Returns the reduced context recorded for a tree source.
    #[must_use]
    pub fn context(&self, source: TreeSource) -> &serde_json::Value {
        match source {
            TreeSource::WindowProperties => &self.window_properties,
            TreeSource::Metadata => &self.metadata,
            TreeSource::SchemaOrg => &self.schema_org,
            TreeSource::JsonLd => &self.json_ld,
        }
    }

    /// Stores an update. Never touches `analysisEnded`.
    pub fn apply(&mut self, update: FieldUpdate) {
        match update {
            FieldUpdate::AnalysisStarted(ts) => self.analysis_started = Some(ts),
            FieldUpdate::ScrapingStarted(ts) => self.scraping_started = Some(ts),
            FieldUpdate::PageNavigated(ts) => self.page_navigated = Some(ts),
            FieldUpdate::ScrapingFinished(ts) => self.scraping_finished = Some(ts),
            FieldUpdate::InitialResponse(url) => self.initial_response = Some(url),
            FieldUpdate::Parsed(phase) => *self.parsed_mut(phase) = true,
            FieldUpdate::TreeData(source, value) => {
                let fields = self.tree_fields(source);
                *fields.parsed = true;
                *fields.all = value;
            }
            FieldUpdate::TreeFound(source, found) => *self.tree_fields(source).found = found,
            FieldUpdate::TreeContext(source, value) => *self.tree_fields(source).context = value,
            FieldUpdate::HtmlFound(found) => self.html_found = found,
            FieldUpdate::XhrRequests(requests) => self.xhr_requests = requests,
            FieldUpdate::XhrRequestsFound(found) => self.xhr_requests_found = found,
            FieldUpdate::Searched(phase, ts) => *self.searched_mut(phase) = Some(ts),
            FieldUpdate::PhaseFailed(phase, message) => {
                self.phase_errors.insert(phase, message);
            }
            FieldUpdate::Screenshot(data) => self.screenshot = Some(data),
            FieldUpdate::PageError(detail) => self.page_error = Some(detail),
            FieldUpdate::Error(detail) => self.error = Some(detail),
        }
    }

    /// The completion predicate: every phase completed, or either error
    /// field is set.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.error.is_some()
            || self.page_error.is_some()
            || Phase::ALL.iter().all(|phase| self.searched(*phase).is_some())
    }

    /// Whether the terminal marker is set.
    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.analysis_ended.is_some()
    }

    /// The latest phase completion timestamp.
    #[must_use]
    pub fn last_phase_completed(&self) -> Option<Timestamp> {
        latest(Phase::ALL.iter().map(|phase| self.searched(*phase)))
    }

    /// Phases that have not completed yet.
    #[must_use]
    pub fn pending_phases(&self) -> Vec<Phase> {
        Phase::ALL
            .iter()
            .copied()
            .filter(|phase| self.searched(*phase).is_none())
            .collect()
    }

    pub(crate) fn mark_ended(&mut self, at: Timestamp) {
        if self.analysis_ended.is_none() {
            self.analysis_ended = Some(at);
        }
    }
}
