//! Scripted transport and helpers for unit tests.

use super::{Fetcher, RawResponse, RetryPolicy, Transport, TransportError};
use crate::config::PlatformConfig;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use std::sync::Mutex;
use tokio::time::Instant;
use url::Url;

type Call = (String, HeaderMap, Instant);

/// Answers each request with `handler(url, call_index)` and records the call.
pub(crate) struct ScriptedTransport<F> {
    handler: F,
    calls: Mutex<Vec<Call>>,
}

impl<F> ScriptedTransport<F>
where
    F: Fn(&str, usize) -> Result<RawResponse, TransportError>,
{
    pub(crate) fn new(handler: F) -> Self {
        Self {
            handler,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|c| c.0.clone()).collect()
    }

    pub(crate) fn headers(&self, index: usize) -> HeaderMap {
        self.calls.lock().unwrap()[index].1.clone()
    }

    pub(crate) fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|c| c.2).collect()
    }
}

impl<F> Transport for ScriptedTransport<F>
where
    F: Fn(&str, usize) -> Result<RawResponse, TransportError>,
{
    async fn get(&self, url: &str, headers: HeaderMap) -> Result<RawResponse, TransportError> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((url.to_string(), headers, Instant::now()));
            calls.len() - 1
        };
        (self.handler)(url, index)
    }
}

pub(crate) fn ok(body: impl Into<String>) -> Result<RawResponse, TransportError> {
    Ok(RawResponse::new(StatusCode::OK, body))
}

pub(crate) fn status(code: u16) -> Result<RawResponse, TransportError> {
    let status = StatusCode::from_u16(code).unwrap();
    Ok(RawResponse::new(status, String::new()))
}

/// Wrap `inner` in an HTML document long enough to pass challenge detection.
pub(crate) fn big_page(inner: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><title>t</title></head><body>{inner}<div class=\"pad\">{}</div></body></html>",
        "&nbsp;".repeat(200)
    )
}

/// Fetcher over `transport` with default platform settings and no pauses.
pub(crate) fn quick_fetcher<T: Transport>(transport: T, max_attempts: u32) -> Fetcher<T> {
    Fetcher::new(
        transport,
        &PlatformConfig::default(),
        None,
        RetryPolicy::without_pauses(max_attempts),
    )
}

pub(crate) fn query_param(url: &str, key: &str) -> Option<String> {
    Url::parse(url)
        .ok()?
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}
