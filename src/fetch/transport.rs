//! The HTTP seam beneath the [`Fetcher`](super::Fetcher).
//!
//! A [`Transport`] issues exactly one GET and reports what happened; it never
//! retries and never interprets status codes. The retry discipline lives in
//! the fetcher, which makes it possible to exercise that discipline against a
//! scripted transport.

use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// Status and body of one completed request, whatever the status.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }
}

/// A request that never produced a response.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Other(String),
}

/// Issue a single GET.
pub trait Transport {
    async fn get(&self, url: &str, headers: HeaderMap) -> Result<RawResponse, TransportError>;
}

/// [`Transport`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build a client with a fixed per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    async fn get(&self, url: &str, headers: HeaderMap) -> Result<RawResponse, TransportError> {
        let response = self
            .client
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(classify)?;
        let status = response.status();
        let body = response.text().await.map_err(classify)?;
        Ok(RawResponse { status, body })
    }
}

fn classify(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}
