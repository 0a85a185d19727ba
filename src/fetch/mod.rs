//! Resilient GET with cause-differentiated retries.
//!
//! The [`Fetcher`] wraps a [`Transport`] and turns one logical GET into an
//! attempt state machine. Each failed attempt is classified into a
//! [`RetryCause`], and the pause before the next attempt is a lookup on that
//! cause in the [`RetryPolicy`]:
//!
//! | Signal | Cause | Pause before next attempt |
//! |--------|-------|---------------------------|
//! | timeout / connection error | `Network` | `min(cap, base * 2^(n-1))` + jitter |
//! | HTTP 403, challenge page | `Forbidden` | `min(cap, base * 2^(n-1))` + jitter |
//! | HTTP 429 | `RateLimited` | rate-limit floor + rate-limit jitter |
//! | other non-2xx | fatal | none, fails immediately |
//!
//! where `n` is the number of the upcoming attempt. Every attempt draws a
//! fresh identity from the [`IdentityRotator`]. Cancellation is observed
//! before each attempt, while a request is in flight, and during pauses; it
//! yields [`FetchError::Cancelled`] and is never retried.

mod gate;
mod headers;
mod identity;
mod stats;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use gate::RequestGate;
pub use identity::{Identity, IdentityRotator};
pub use stats::{FetchStats, FetchStatsSnapshot};
pub use transport::{HttpTransport, RawResponse, Transport, TransportError};

use crate::config::PlatformConfig;
use crate::error::{CrawlError, FetchError};
use rand::{Rng, rng};
use reqwest::StatusCode;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, warn};

/// What a request is for; selects the header set and challenge detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// A rendered page, checked for challenge markers.
    Page,
    /// A structured endpoint called like an in-page request.
    Endpoint,
}

/// Retryable failure causes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryCause {
    Network,
    Forbidden,
    RateLimited,
}

impl RetryCause {
    fn exhausted(self, attempts: u32, message: String) -> FetchError {
        match self {
            RetryCause::Network => FetchError::Network { attempts, message },
            RetryCause::Forbidden => FetchError::Forbidden { attempts },
            RetryCause::RateLimited => FetchError::RateLimited { attempts },
        }
    }
}

/// Attempt budget and pause schedule per cause.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per logical fetch, including the first.
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    /// Upper bound of the uniform jitter added to backoff pauses.
    pub jitter: Duration,
    pub rate_limit_floor: Duration,
    /// Upper bound of the uniform jitter added to rate-limit pauses.
    pub rate_limit_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base: Duration::from_secs(1),
            backoff_cap: Duration::from_secs(30),
            jitter: Duration::from_secs(1),
            rate_limit_floor: Duration::from_secs(5),
            rate_limit_jitter: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// A policy that retries without pausing.
    pub fn without_pauses(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base: Duration::ZERO,
            backoff_cap: Duration::ZERO,
            jitter: Duration::ZERO,
            rate_limit_floor: Duration::ZERO,
            rate_limit_jitter: Duration::ZERO,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Backoff before attempt `next_attempt` (2-based), without jitter.
    pub fn backoff(&self, next_attempt: u32) -> Duration {
        let exponent = next_attempt.saturating_sub(1).min(16);
        self.backoff_base
            .saturating_mul(1u32 << exponent)
            .min(self.backoff_cap)
    }

    /// Pause before `next_attempt` after an attempt failed with `cause`.
    pub fn pause_after(&self, cause: RetryCause, next_attempt: u32) -> Duration {
        match cause {
            RetryCause::Network | RetryCause::Forbidden => {
                self.backoff(next_attempt) + random_up_to(self.jitter)
            }
            RetryCause::RateLimited => self.rate_limit_floor + random_up_to(self.rate_limit_jitter),
        }
    }
}

fn random_up_to(max: Duration) -> Duration {
    if max.is_zero() {
        return Duration::ZERO;
    }
    max.mul_f64(rng().random_range(0.0..1.0))
}

/// Recognizes pages substituted for content when automation is suspected.
#[derive(Debug, Clone)]
pub struct ChallengeDetector {
    markers: Vec<String>,
    min_bytes: usize,
}

impl ChallengeDetector {
    pub fn new(markers: Vec<String>, min_bytes: usize) -> Self {
        Self { markers, min_bytes }
    }

    pub fn is_challenge(&self, body: &str) -> bool {
        body.len() < self.min_bytes || self.markers.iter().any(|m| body.contains(m.as_str()))
    }
}

enum Attempt {
    Done(String),
    Retry(RetryCause, String),
    Fatal(FetchError),
}

/// One-GET-at-a-time fetcher with identity rotation and retry discipline.
pub struct Fetcher<T = HttpTransport> {
    transport: T,
    identities: IdentityRotator,
    policy: RetryPolicy,
    detector: ChallengeDetector,
    referer: String,
    stats: Arc<FetchStats>,
    cancel: CancellationToken,
}

impl<T> fmt::Debug for Fetcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetcher")
            .field("policy", &self.policy)
            .field("detector", &self.detector)
            .field("referer", &self.referer)
            .field("has_cookie", &self.identities.has_cookie())
            .finish()
    }
}

impl Fetcher<HttpTransport> {
    /// Build a fetcher over a `reqwest` client configured from `platform`.
    pub fn from_config(
        platform: &PlatformConfig,
        cookie: Option<String>,
        policy: RetryPolicy,
    ) -> Result<Self, CrawlError> {
        let transport = HttpTransport::new(platform.request_timeout())?;
        Ok(Self::new(transport, platform, cookie, policy))
    }
}

impl<T: Transport> Fetcher<T> {
    pub fn new(
        transport: T,
        platform: &PlatformConfig,
        cookie: Option<String>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            identities: IdentityRotator::new(platform.user_agents.clone(), cookie),
            policy,
            detector: ChallengeDetector::new(
                platform.challenge_markers.clone(),
                platform.min_page_bytes,
            ),
            referer: platform.root_url.clone(),
            stats: Arc::new(FetchStats::new()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_stats(mut self, stats: Arc<FetchStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn stats(&self) -> &Arc<FetchStats> {
        &self.stats
    }

    pub fn has_cookie(&self) -> bool {
        self.identities.has_cookie()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Sleep for `duration` unless cancelled first. Returns `false` on cancellation.
    pub async fn pause(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.is_cancelled();
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = sleep(duration) => true,
        }
    }

    /// Wait for `gate` to release this caller unless cancelled first.
    ///
    /// # Returns
    ///
    /// `true` once the gate lets the caller through, `false` if the token
    /// fired while queued or sleeping. A cancelled caller does not count as a
    /// release, so the gate's spacing is unaffected.
    pub async fn pass_gate(&self, gate: &RequestGate) -> bool {
        if self.is_cancelled() {
            return false;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = gate.wait() => true,
        }
    }

    /// Fetch `url` with the policy's attempt budget.
    pub async fn fetch(&self, url: &str, kind: RequestKind) -> Result<String, FetchError> {
        self.fetch_with_attempts(url, kind, self.policy.max_attempts)
            .await
    }

    /// Fetch `url`, allowing at most `max_attempts` attempts.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Forbidden`] when every attempt was blocked (403 or a
    ///   challenge page on `Page` requests)
    /// - [`FetchError::Network`] / [`FetchError::RateLimited`] when the budget
    ///   ran out on those causes
    /// - [`FetchError::Status`] immediately on any other non-2xx status
    /// - [`FetchError::Cancelled`] when the cancellation token fires
    #[instrument(level = "debug", skip(self, url), fields(%url))]
    pub async fn fetch_with_attempts(
        &self,
        url: &str,
        kind: RequestKind,
        max_attempts: u32,
    ) -> Result<String, FetchError> {
        let max_attempts = max_attempts.max(1);
        let total_t0 = Instant::now();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            if self.is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            let identity = self.identities.next_identity();
            let request_headers = headers::headers_for(kind, &identity, &self.referer);

            let attempt_t0 = Instant::now();
            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(FetchError::Cancelled),
                outcome = self.transport.get(url, request_headers) => outcome,
            };
            let attempt_dt = attempt_t0.elapsed();
            self.stats.record_request(attempt_dt);

            let (cause, message) = match self.classify(url, kind, outcome) {
                Attempt::Done(body) => {
                    self.stats.record_success();
                    debug!(
                        attempt,
                        bytes = body.len(),
                        elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                        "fetch succeeded"
                    );
                    return Ok(body);
                }
                Attempt::Fatal(e) => {
                    self.stats.record_failure();
                    error!(attempt, error = %e, "fetch failed with a non-retryable status");
                    return Err(e);
                }
                Attempt::Retry(cause, message) => (cause, message),
            };

            if attempt >= max_attempts {
                self.stats.record_failure();
                let e = cause.exhausted(attempt, message);
                error!(
                    attempt,
                    max = max_attempts,
                    ?cause,
                    elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                    error = %e,
                    "fetch exhausted retries"
                );
                return Err(e);
            }

            let pause = self.policy.pause_after(cause, attempt + 1);
            self.stats.record_retry(cause);
            warn!(
                attempt,
                max = max_attempts,
                ?cause,
                elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                ?pause,
                reason = %message,
                "fetch attempt failed; backing off"
            );
            if !self.pause(pause).await {
                return Err(FetchError::Cancelled);
            }
        }
    }

    fn classify(
        &self,
        url: &str,
        kind: RequestKind,
        outcome: Result<RawResponse, TransportError>,
    ) -> Attempt {
        let response = match outcome {
            Ok(response) => response,
            Err(e) => return Attempt::Retry(RetryCause::Network, e.to_string()),
        };

        match response.status {
            StatusCode::FORBIDDEN => Attempt::Retry(RetryCause::Forbidden, "HTTP 403".into()),
            StatusCode::TOO_MANY_REQUESTS => {
                Attempt::Retry(RetryCause::RateLimited, "HTTP 429".into())
            }
            status if !status.is_success() => Attempt::Fatal(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            }),
            _ if kind == RequestKind::Page && self.detector.is_challenge(&response.body) => {
                self.stats.record_challenge();
                Attempt::Retry(RetryCause::Forbidden, "challenge page".into())
            }
            _ => Attempt::Done(response.body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{ScriptedTransport, big_page, ok, quick_fetcher, status};
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
        assert_eq!(policy.backoff(5), Duration::from_secs(16));
        assert_eq!(policy.backoff(6), Duration::from_secs(30));
        assert_eq!(policy.backoff(40), Duration::from_secs(30));
    }

    #[test]
    fn test_rate_limit_pause_is_separate() {
        let policy = RetryPolicy::default();
        for _ in 0..20 {
            let pause = policy.pause_after(RetryCause::RateLimited, 2);
            assert!(pause >= Duration::from_secs(5) && pause < Duration::from_secs(10));
        }
    }

    #[test]
    fn test_challenge_detector() {
        let detector = ChallengeDetector::new(vec!["zh-zse-ck".into()], 20);
        assert!(detector.is_challenge("short"));
        assert!(detector.is_challenge("<html>.......... zh-zse-ck ..........</html>"));
        assert!(!detector.is_challenge("<html>a perfectly ordinary body</html>"));
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let fetcher = quick_fetcher(ScriptedTransport::new(|_, _| ok("{\"data\":[]}")), 3);
        let body = fetcher.fetch("https://x/api", RequestKind::Endpoint).await.unwrap();
        assert_eq!(body, "{\"data\":[]}");
        assert_eq!(fetcher.transport().calls().len(), 1);
        assert_eq!(fetcher.stats().snapshot().succeeded, 1);
    }

    #[tokio::test]
    async fn test_transient_failures_are_not_surfaced() {
        let transport = ScriptedTransport::new(|_, n| match n {
            0 => Err(TransportError::Timeout),
            1 => status(403),
            _ => ok("{}"),
        });
        let fetcher = quick_fetcher(transport, 5);
        assert!(fetcher.fetch("https://x/api", RequestKind::Endpoint).await.is_ok());
        assert_eq!(fetcher.transport().calls().len(), 3);
        assert_eq!(fetcher.stats().snapshot().retries, 2);
    }

    #[tokio::test]
    async fn test_fatal_status_is_not_retried() {
        let fetcher = quick_fetcher(ScriptedTransport::new(|_, _| status(404)), 5);
        let err = fetcher.fetch("https://x/missing", RequestKind::Page).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
        assert_eq!(fetcher.transport().calls().len(), 1);
    }

    #[tokio::test]
    async fn test_network_exhaustion() {
        let transport = ScriptedTransport::new(|_, _| Err(TransportError::Connect("refused".into())));
        let fetcher = quick_fetcher(transport, 3);
        let err = fetcher.fetch("https://x/", RequestKind::Page).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert!(matches!(err, FetchError::Network { attempts: 3, .. }));
        assert_eq!(fetcher.transport().calls().len(), 3);
    }

    #[tokio::test]
    async fn test_challenge_page_counts_as_block() {
        let transport = ScriptedTransport::new(|_, n| {
            if n == 0 {
                ok("<html>zh-zse-ck</html>")
            } else {
                ok(big_page("<h1>Profile</h1>"))
            }
        });
        let fetcher = quick_fetcher(transport, 3);
        let body = fetcher.fetch("https://x/people/a", RequestKind::Page).await.unwrap();
        assert!(body.contains("Profile"));
        assert_eq!(fetcher.stats().snapshot().challenged, 1);
    }

    #[tokio::test]
    async fn test_persistent_challenge_ends_forbidden() {
        let transport = ScriptedTransport::new(|_, _| ok(big_page("<div id=\"zh-zse-ck\"></div>")));
        let fetcher = quick_fetcher(transport, 3);

        let err = fetcher.fetch("https://x/people/a", RequestKind::Page).await.unwrap_err();

        assert!(matches!(err, FetchError::Forbidden { attempts: 3 }));
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert_eq!(fetcher.transport().calls().len(), 3);
        let stats = fetcher.stats().snapshot();
        assert_eq!(stats.challenged, 3);
        assert_eq!(stats.failed, 1);
    }

    #[tokio::test]
    async fn test_endpoint_bodies_skip_challenge_detection() {
        let fetcher = quick_fetcher(ScriptedTransport::new(|_, _| ok("{\"data\":[]}")), 3);
        assert!(fetcher.fetch("https://x/api", RequestKind::Endpoint).await.is_ok());
        assert_eq!(fetcher.stats().snapshot().challenged, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forbidden_exhausts_budget_on_backoff_schedule() {
        let platform = PlatformConfig::default();
        let fetcher = Fetcher::new(
            ScriptedTransport::new(|_, _| status(403)),
            &platform,
            None,
            RetryPolicy::default(),
        );

        let t0 = tokio::time::Instant::now();
        let err = fetcher.fetch("https://x/", RequestKind::Page).await.unwrap_err();
        let elapsed = t0.elapsed();

        assert!(matches!(err, FetchError::Forbidden { attempts: 5 }));
        assert_eq!(fetcher.transport().calls().len(), 5);
        // 2 + 4 + 8 + 16 seconds of backoff, plus under a second of jitter per pause.
        assert!(elapsed >= Duration::from_secs(30), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(34), "{elapsed:?}");

        let gaps: Vec<Duration> = fetcher
            .transport()
            .call_times()
            .windows(2)
            .map(|w| w[1] - w[0])
            .collect();
        for pair in gaps.windows(2) {
            assert!(pair[1] >= pair[0], "pauses must not shrink: {gaps:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_uses_its_own_delay() {
        let transport = ScriptedTransport::new(|_, n| if n == 0 { status(429) } else { ok("{}") });
        let platform = PlatformConfig::default();
        let fetcher = Fetcher::new(transport, &platform, None, RetryPolicy::default());

        let t0 = tokio::time::Instant::now();
        fetcher.fetch("https://x/api", RequestKind::Endpoint).await.unwrap();
        let elapsed = t0.elapsed();
        assert!(elapsed >= Duration::from_secs(5) && elapsed < Duration::from_secs(10));
        assert_eq!(fetcher.stats().snapshot().rate_limited, 1);
    }

    #[tokio::test]
    async fn test_rate_limit_exhaustion_is_typed() {
        let fetcher = quick_fetcher(ScriptedTransport::new(|_, _| status(429)), 2);
        let err = fetcher.fetch("https://x/api", RequestKind::Endpoint).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimited);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let fetcher = quick_fetcher(ScriptedTransport::new(|_, _| ok("{}")), 3)
            .with_cancellation(cancel);
        let err = fetcher.fetch("https://x/api", RequestKind::Endpoint).await.unwrap_err();
        assert!(matches!(err, FetchError::Cancelled));
        assert!(fetcher.transport().calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_backoff() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let transport = ScriptedTransport::new(move |_, _| {
            trigger.cancel();
            status(403)
        });
        let platform = PlatformConfig::default();
        let fetcher = Fetcher::new(transport, &platform, None, RetryPolicy::default())
            .with_cancellation(cancel);

        let err = fetcher.fetch("https://x/", RequestKind::Page).await.unwrap_err();
        assert!(matches!(err, FetchError::Cancelled));
        assert_eq!(fetcher.transport().calls().len(), 1);
        assert_eq!(fetcher.stats().snapshot().failed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gate_wait_yields_to_cancellation() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let fetcher = quick_fetcher(ScriptedTransport::new(|_, _| ok("{}")), 1)
            .with_cancellation(cancel);
        let gate = RequestGate::new(Duration::from_secs(10));
        assert!(fetcher.pass_gate(&gate).await);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });
        let t0 = tokio::time::Instant::now();
        assert!(!fetcher.pass_gate(&gate).await);
        assert!(t0.elapsed() < Duration::from_secs(2));
        assert!(!fetcher.pass_gate(&gate).await);
    }

    #[tokio::test]
    async fn test_identity_and_cookie_sent() {
        let platform = PlatformConfig {
            user_agents: vec!["OnlyAgent/2.0".into()],
            ..PlatformConfig::default()
        };
        let fetcher = Fetcher::new(
            ScriptedTransport::new(|_, _| ok("{}")),
            &platform,
            Some("z_c0=token".into()),
            RetryPolicy::without_pauses(1),
        );
        fetcher.fetch("https://x/api", RequestKind::Endpoint).await.unwrap();

        let headers = fetcher.transport().headers(0);
        assert_eq!(headers.get("user-agent").unwrap(), "OnlyAgent/2.0");
        assert_eq!(headers.get("cookie").unwrap(), "z_c0=token");
        assert_eq!(headers.get("referer").unwrap(), "https://www.zhihu.com/");
    }
}
