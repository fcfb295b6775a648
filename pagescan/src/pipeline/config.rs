//! Per-analysis configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::PagescanError;
use crate::output::DEFAULT_OUTPUT_KEY;

/// Configuration for one [`super::PipelineCoordinator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Upper bound on one analysis, in seconds. `None` waits until the
    /// record completes, however long a stalled phase takes.
    #[serde(default)]
    pub timeout_seconds: Option<f64>,
    /// Key the record is persisted under.
    #[serde(default = "default_output_key")]
    pub output_key: String,
    /// Whether persisted records are pretty-printed.
    #[serde(default = "default_true")]
    pub pretty_output: bool,
    /// Network payload text bodies larger than this are not searched.
    #[serde(default = "default_max_payload_body_bytes")]
    pub max_payload_body_bytes: usize,
    /// How long `run` waits for the store to catch up before returning.
    #[serde(default = "default_flush_timeout")]
    pub flush_timeout_seconds: f64,
}

fn default_output_key() -> String {
    DEFAULT_OUTPUT_KEY.to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_payload_body_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_flush_timeout() -> f64 {
    1.0
}

/// Positive, representable durations only.
fn positive_duration(seconds: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(seconds)
        .ok()
        .filter(|d| !d.is_zero())
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: None,
            output_key: default_output_key(),
            pretty_output: true,
            max_payload_body_bytes: default_max_payload_body_bytes(),
            flush_timeout_seconds: default_flush_timeout(),
        }
    }
}

impl AnalysisConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON configuration document; missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns `PagescanError::Serialization` for malformed documents.
    pub fn from_json(raw: &str) -> Result<Self, PagescanError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Sets the timeout.
    #[must_use]
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    /// Sets the persistence key.
    #[must_use]
    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = key.into();
        self
    }

    /// Sets whether persisted records are pretty-printed.
    #[must_use]
    pub fn with_pretty_output(mut self, pretty: bool) -> Self {
        self.pretty_output = pretty;
        self
    }

    /// Sets the payload body size limit.
    #[must_use]
    pub fn with_max_payload_body_bytes(mut self, bytes: usize) -> Self {
        self.max_payload_body_bytes = bytes;
        self
    }

    /// Sets how long `run` waits for pending writes.
    #[must_use]
    pub fn with_flush_timeout(mut self, seconds: f64) -> Self {
        self.flush_timeout_seconds = seconds;
        self
    }

    /// The analysis timeout. Non-positive values and values too large for a
    /// `Duration` mean no timeout.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.and_then(positive_duration)
    }

    /// The persistence flush bound; zero when unset or invalid.
    #[must_use]
    pub fn flush_timeout(&self) -> Duration {
        positive_duration(self.flush_timeout_seconds).unwrap_or_default()
    }
}
