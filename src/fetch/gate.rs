//! Request spacing shared by a pool of workers.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};

/// Minimum-interval gate shared by concurrent workers hitting the same target.
///
/// Each caller of [`RequestGate::wait`] is released at least `min_interval`
/// after the previous one, so a worker pool never bursts.
#[derive(Debug)]
pub struct RequestGate {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl RequestGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: Mutex::new(None),
        }
    }

    /// Block until at least `min_interval` has passed since the previous
    /// release, then record this release.
    ///
    /// Dropping the future before it completes leaves the recorded release
    /// untouched, which is how [`Fetcher::pass_gate`](super::Fetcher::pass_gate)
    /// abandons a wait on interrupt.
    pub async fn wait(&self) {
        // Held across the sleep so releases are serialized.
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            sleep_until(prev + self.min_interval).await;
        }
        *last = Some(Instant::now());
    }
}
