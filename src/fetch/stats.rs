//! Fetch statistics shared across a run.

use super::RetryCause;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Counters updated by the fetcher after every attempt.
#[derive(Debug, Default)]
pub struct FetchStats {
    requests: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    retries: AtomicU64,
    rate_limited: AtomicU64,
    challenged: AtomicU64,
    elapsed_ms: AtomicU64,
}

/// Point-in-time copy of [`FetchStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FetchStatsSnapshot {
    /// Individual HTTP attempts, including retries.
    pub requests: u64,
    /// Logical fetches that returned a body.
    pub succeeded: u64,
    /// Logical fetches that ended in an error.
    pub failed: u64,
    pub retries: u64,
    pub rate_limited: u64,
    pub challenged: u64,
    pub elapsed_ms: u64,
}

impl FetchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_request(&self, elapsed: Duration) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.elapsed_ms
            .fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retry(&self, cause: RetryCause) {
        self.retries.fetch_add(1, Ordering::Relaxed);
        if cause == RetryCause::RateLimited {
            self.rate_limited.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_challenge(&self) {
        self.challenged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> FetchStatsSnapshot {
        FetchStatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            challenged: self.challenged.load(Ordering::Relaxed),
            elapsed_ms: self.elapsed_ms.load(Ordering::Relaxed),
        }
    }
}
