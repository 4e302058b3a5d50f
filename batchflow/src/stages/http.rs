//! HTTP client destination.
//!
//! Posts each batch's record payloads as JSON to a configured endpoint,
//! either one request per record or one request per batch.

use super::Stage;
use crate::context::StageContext;
use crate::core::{Issue, StageKind};
use crate::errors::StageError;
use crate::runner::PipeBatch;
use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Deserialize;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Content type sent with every request.
pub const CONTENT_TYPE: &str = "application/json;charset=UTF-8";

/// Default per-request timeout of the reqwest transport.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Request body compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpCompression {
    /// Send the body as is.
    #[default]
    None,
    /// Gzip the body and set `Content-Encoding: gzip`.
    Gzip,
}

/// A static header added to every request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HeaderEntry {
    /// Header name.
    pub key: String,
    /// Header value.
    pub value: String,
}

/// Typed configuration of [`HttpClientDestination`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HttpClientConfig {
    /// Endpoint receiving the POST requests.
    #[serde(rename = "conf.resourceUrl")]
    pub resource_url: String,
    /// Extra headers.
    #[serde(rename = "conf.headers", default)]
    pub headers: Vec<HeaderEntry>,
    /// Send the whole batch in one request.
    #[serde(rename = "conf.singleRequestPerBatch", default)]
    pub single_request_per_batch: bool,
    /// Body compression.
    #[serde(rename = "conf.client.httpCompression", default)]
    pub compression: HttpCompression,
}

/// An outgoing POST request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Target URL.
    pub url: String,
    /// Headers in send order.
    pub headers: Vec<(String, String)>,
    /// Encoded body.
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Returns the first header with the given name, ignoring case.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Sends requests on behalf of the destination.
///
/// Returns the response status code. Failures to reach the endpoint are
/// returned as errors; status handling is left to the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends a POST request.
    async fn post(&self, request: HttpRequest) -> Result<u16, StageError>;
}

/// The default transport, backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with the given request timeout.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post(&self, request: HttpRequest) -> Result<u16, StageError> {
        let mut builder = self.client.post(&request.url);
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        let response = builder.body(request.body).send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                StageError::retryable(e)
            } else {
                StageError::permanent(e)
            }
        })?;
        Ok(response.status().as_u16())
    }
}

/// Posts record payloads to an HTTP endpoint.
pub struct HttpClientDestination {
    config: Option<HttpClientConfig>,
    transport: Option<Arc<dyn HttpTransport>>,
}

impl std::fmt::Debug for HttpClientDestination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClientDestination")
            .field("config", &self.config)
            .field("has_transport", &self.transport.is_some())
            .finish()
    }
}

impl Default for HttpClientDestination {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClientDestination {
    /// Stage name this destination is registered under.
    pub const STAGE_NAME: &'static str = "http_client";

    /// Creates a destination that builds a reqwest transport at init.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: None,
            transport: None,
        }
    }

    /// Creates a destination using the given transport.
    #[must_use]
    pub fn with_transport(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            config: None,
            transport: Some(transport),
        }
    }

    /// Returns the configuration resolved at init.
    #[must_use]
    pub fn config(&self) -> Option<&HttpClientConfig> {
        self.config.as_ref()
    }

    fn build_request(config: &HttpClientConfig, payload: Vec<u8>) -> Result<HttpRequest, StageError> {
        let mut headers = vec![("Content-Type".to_string(), CONTENT_TYPE.to_string())];
        headers.extend(config.headers.iter().map(|h| (h.key.clone(), h.value.clone())));

        let body = match config.compression {
            HttpCompression::None => payload,
            HttpCompression::Gzip => {
                headers.push(("Content-Encoding".to_string(), "gzip".to_string()));
                gzip(&payload).map_err(StageError::permanent)?
            }
        };

        Ok(HttpRequest {
            url: config.resource_url.clone(),
            headers,
            body,
        })
    }

    async fn send(
        transport: &dyn HttpTransport,
        config: &HttpClientConfig,
        payload: Vec<u8>,
    ) -> Result<(), StageError> {
        let request = Self::build_request(config, payload)?;
        let bytes = request.body.len();
        let status = transport.post(request).await?;
        debug!(url = %config.resource_url, status, bytes, "HTTP request sent");

        match status {
            200..=299 => Ok(()),
            500..=599 => Err(StageError::retryable(anyhow::anyhow!(
                "{} responded with HTTP {status}",
                config.resource_url
            ))),
            _ => Err(StageError::permanent(anyhow::anyhow!(
                "{} responded with HTTP {status}",
                config.resource_url
            ))),
        }
    }
}

fn gzip(payload: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(payload)?;
    encoder.finish()
}

#[async_trait]
impl Stage for HttpClientDestination {
    fn kind(&self) -> StageKind {
        StageKind::Destination
    }

    async fn init(&mut self, ctx: &StageContext) -> Vec<Issue> {
        let config: HttpClientConfig = match ctx.typed_config() {
            Ok(config) => config,
            Err(issue) if ctx.config().get("conf.resourceUrl").is_none() => {
                return vec![issue.with_config_key("conf.resourceUrl")];
            }
            Err(issue) => return vec![issue],
        };

        let mut issues = Vec::new();
        if !(config.resource_url.starts_with("http://") || config.resource_url.starts_with("https://")) {
            issues.push(
                ctx.error_issue(format!(
                    "Resource URL '{}' must use http or https",
                    config.resource_url
                ))
                .with_config_key("conf.resourceUrl"),
            );
        }
        for header in config.headers.iter().filter(|h| h.key.trim().is_empty()) {
            issues.push(
                ctx.error_issue(format!("Header with value '{}' has an empty name", header.value))
                    .with_config_key("conf.headers"),
            );
        }

        if self.transport.is_none() {
            match ReqwestTransport::new(DEFAULT_REQUEST_TIMEOUT) {
                Ok(transport) => self.transport = Some(Arc::new(transport)),
                Err(e) => issues.push(ctx.error_issue(format!("Failed to build HTTP client: {e}"))),
            }
        }

        debug!(
            stage = %ctx.instance_name(),
            url = %config.resource_url,
            single_request_per_batch = config.single_request_per_batch,
            compression = ?config.compression,
            "HTTP destination configured"
        );
        self.config = Some(config);
        issues
    }

    async fn process(&mut self, ctx: &StageContext, batch: &mut PipeBatch) -> Result<(), StageError> {
        let (Some(config), Some(transport)) = (self.config.as_ref(), self.transport.as_deref()) else {
            return Err(StageError::NotConfigured(ctx.instance_name().to_string()));
        };

        let mut payloads = Vec::with_capacity(batch.records().len());
        for record in batch.records() {
            payloads.push(serde_json::to_vec(&record.value).map_err(StageError::permanent)?);
        }

        if config.single_request_per_batch {
            if payloads.is_empty() {
                return Ok(());
            }
            Self::send(transport, config, payloads.concat()).await
        } else {
            for payload in payloads {
                Self::send(transport, config, payload).await?;
            }
            Ok(())
        }
    }

    async fn destroy(&mut self) {
        self.transport = None;
    }
}
