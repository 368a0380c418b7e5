//! HTTP transport seam
//!
//! The organization API speaks JSON over HTTP with bearer authentication.
//! [`HttpTransport`] is the only place a request leaves the process;
//! [`ReqwestTransport`] is the production implementation.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;
use std::time::Duration;

/// Network-level failure (no HTTP status available)
#[derive(Debug, thiserror::Error)]
#[error("transport error for {url}: {message}")]
pub struct TransportError {
    pub url: String,
    pub message: String,
}

impl TransportError {
    #[must_use]
    pub fn new(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            message: message.into(),
        }
    }
}

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Outgoing JSON request
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub bearer: String,
    pub body: Option<Value>,
}

/// Response status and JSON body (`Null` when the body is not JSON)
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Value,
}

impl HttpResponse {
    #[must_use]
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    #[inline]
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// String field of the body
    #[must_use]
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.body.get(field).and_then(Value::as_str)
    }
}

/// Sends JSON requests
#[async_trait]
pub trait HttpTransport: Send + Sync + Debug {
    /// Send a request and return whatever status came back
    ///
    /// Only network-level failures are errors; non-200 statuses are not.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// `reqwest`-backed transport
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport with a per-request timeout
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be constructed
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::new("", e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        let mut builder = builder
            .bearer_auth(&request.bearer)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| TransportError::new(&request.url, e.to_string()))?;
        let status = resp.status().as_u16();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| TransportError::new(&request.url, e.to_string()))?;
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        tracing::debug!(url = %request.url, status, "http response");
        Ok(HttpResponse { status, body })
    }
}
