//! A driver that fetches the page over plain HTTP.
//!
//! No scripts run, so the rendered markup is the response body, global state
//! is empty and no network payloads are intercepted. Useful for static pages
//! and for exercising the pipeline without a browser.

use async_trait::async_trait;
use reqwest::{redirect, Client};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use super::{send, BrowserDriver, DriverEvent, EventSender};
use crate::errors::DriverError;
use crate::tree::DataTree;
use crate::utils::now_utc;

/// How [`HttpDriver`] fetches a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Whole-request timeout in seconds; non-positive disables it.
    #[serde(default = "default_request_timeout")]
    pub timeout_seconds: f64,
    /// Redirects followed before giving up.
    #[serde(default = "default_redirect_limit")]
    pub max_redirects: usize,
    /// Sent as `User-Agent`.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Bodies larger than this are reported as a fetch error.
    #[serde(default = "default_body_limit")]
    pub max_response_size: usize,
    /// Sent with every request.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

fn default_request_timeout() -> f64 {
    30.0
}

fn default_redirect_limit() -> usize {
    10
}

fn default_user_agent() -> String {
    format!("pagescan/{}", env!("CARGO_PKG_VERSION"))
}

fn default_body_limit() -> usize {
    10 * 1024 * 1024
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_request_timeout(),
            max_redirects: default_redirect_limit(),
            user_agent: default_user_agent(),
            max_response_size: default_body_limit(),
            headers: HashMap::new(),
        }
    }
}

impl FetchConfig {
    /// Defaults: 30 s timeout, 10 redirects, 10 MiB bodies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Adds a request header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// The request timeout, if one applies. Values too large for a
    /// `Duration` disable it like non-positive ones.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        Duration::try_from_secs_f64(self.timeout_seconds)
            .ok()
            .filter(|d| !d.is_zero())
    }
}

/// Fetches the page with `reqwest` and reports it as a static document.
#[derive(Debug, Clone, Default)]
pub struct HttpDriver {
    config: FetchConfig,
}

impl HttpDriver {
    /// Creates a driver.
    #[must_use]
    pub fn new(config: FetchConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn client(&self) -> Result<Client, DriverError> {
        let mut builder = Client::builder();
        if let Some(timeout) = self.config.timeout() {
            builder = builder.timeout(timeout);
        }
        builder
            .user_agent(&self.config.user_agent)
            .redirect(redirect::Policy::limited(self.config.max_redirects))
            .build()
            .map_err(|e| DriverError::Start(e.to_string()))
    }

    async fn fetch(&self, client: &Client, url: &str) -> Result<(String, String), DriverError> {
        let fetch_error = |reason: String| DriverError::Fetch {
            url: url.to_string(),
            reason,
        };

        let mut request = client.get(url);
        for (key, value) in &self.config.headers {
            request = request.header(key, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| fetch_error(format!("Request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!("HTTP {}", status.as_u16())));
        }
        if let Some(length) = response.content_length() {
            if usize::try_from(length).map_or(true, |l| l > self.config.max_response_size) {
                return Err(fetch_error(format!("Response of {length} bytes is too large")));
            }
        }

        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| fetch_error(format!("Failed to read body: {e}")))?;
        if body.len() > self.config.max_response_size {
            return Err(fetch_error(format!("Response of {} bytes is too large", body.len())));
        }
        Ok((final_url, body))
    }
}

#[async_trait]
impl BrowserDriver for HttpDriver {
    async fn start(&self, url: &str, events: EventSender) -> Result<(), DriverError> {
        let client = self.client()?;
        send(&events, DriverEvent::Started { timestamp: now_utc() })?;

        let (final_url, body) = match self.fetch(&client, url).await {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(url = %url, error = %e, "Fetch failed");
                return send(&events, DriverEvent::Error { detail: e.to_string() });
            }
        };
        debug!(url = %final_url, bytes = body.len(), "Fetched page");

        send(&events, DriverEvent::Navigated { timestamp: now_utc() })?;
        send(
            &events,
            DriverEvent::InitialResponse {
                url: final_url,
                body: body.clone(),
            },
        )?;
        send(&events, DriverEvent::FinalMarkup { markup: body })?;
        send(
            &events,
            DriverEvent::GlobalState {
                tree: DataTree::from_json(&serde_json::Value::Object(serde_json::Map::new())),
            },
        )?;
        send(&events, DriverEvent::NetworkPayloads { payloads: Vec::new() })?;
        send(&events, DriverEvent::Done { timestamp: now_utc() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_config_defaults() {
        let config = FetchConfig::new()
            .with_timeout(2.5)
            .with_header("Accept-Language", "en");
        assert_eq!(config.timeout(), Some(Duration::from_millis(2500)));
        assert_eq!(config.max_redirects, 10);
        assert!(config.user_agent.starts_with("pagescan/"));
        assert_eq!(config.headers.get("Accept-Language").map(String::as_str), Some("en"));
    }

    #[test]
    fn test_fetch_config_from_partial_json() {
        let config: FetchConfig = serde_json::from_str(r#"{"timeout_seconds": 5}"#).unwrap();
        assert_eq!(config.timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.max_response_size, 10 * 1024 * 1024);
    }

    #[test]
    fn test_unrepresentable_request_timeout_is_disabled() {
        assert_eq!(FetchConfig::new().with_timeout(1e20).timeout(), None);
        assert_eq!(FetchConfig::new().with_timeout(0.0).timeout(), None);
        assert!(HttpDriver::new(FetchConfig::new().with_timeout(1e20)).client().is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_host_reports_error_event() {
        let driver = HttpDriver::new(FetchConfig::new().with_timeout(2.0));
        let (tx, mut rx) = super::super::event_channel();

        driver.start("http://127.0.0.1:9/", tx).await.unwrap();

        let mut kinds = Vec::new();
        while let Some(event) = rx.recv().await {
            kinds.push(event.kind());
        }
        assert_eq!(kinds, vec!["started", "error"]);
    }
}
