//! Error types for fetching and crawling.
//!
//! Two layers exist:
//! - [`FetchError`]: the final, exhausted outcome of one logical GET issued by
//!   the [`Fetcher`](crate::fetch::Fetcher). Retries that eventually succeed
//!   never surface here.
//! - [`CrawlError`]: everything that can cross the crate boundary.
//!
//! Callers should branch on [`ErrorKind`] rather than on message text.

use thiserror::Error;

/// Coarse classification of a failure, stable across both error layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Blocked as automated traffic until the attempt budget ran out.
    Forbidden,
    /// Timeouts or connection failures until the attempt budget ran out.
    Network,
    /// The platform kept answering 429 until the attempt budget ran out.
    RateLimited,
    /// A non-success status that is not an anti-bot signal.
    Status,
    /// The run was interrupted.
    Cancelled,
    /// The author URL has no recognized account shape.
    UnrecognizedReference,
    /// An article page had no recognizable body.
    ContentNotFound,
    /// Local failures: configuration, client construction, I/O, serialization.
    Other,
}

/// Final outcome of a failed fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network failure after {attempts} attempt(s): {message}")]
    Network { attempts: u32, message: String },

    #[error("blocked as automated traffic after {attempts} attempt(s); a valid session cookie is required")]
    Forbidden { attempts: u32 },

    #[error("rate limited after {attempts} attempt(s)")]
    RateLimited { attempts: u32 },

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("cancelled")]
    Cancelled,
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Network { .. } => ErrorKind::Network,
            FetchError::Forbidden { .. } => ErrorKind::Forbidden,
            FetchError::RateLimited { .. } => ErrorKind::RateLimited,
            FetchError::Status { .. } => ErrorKind::Status,
            FetchError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// Errors surfaced by crawl operations.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("unrecognized author reference: {0} (expected /org/<id> or /people/<id>)")]
    UnrecognizedReference(String),

    #[error("no article content found at {0}")]
    ContentNotFound(String),

    #[error("invalid platform configuration: {0}")]
    Config(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl CrawlError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CrawlError::Fetch(e) => e.kind(),
            CrawlError::UnrecognizedReference(_) => ErrorKind::UnrecognizedReference,
            CrawlError::ContentNotFound(_) => ErrorKind::ContentNotFound,
            CrawlError::Config(_)
            | CrawlError::Client(_)
            | CrawlError::Io(_)
            | CrawlError::Json(_)
            | CrawlError::Yaml(_) => ErrorKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_kinds() {
        assert_eq!(FetchError::Forbidden { attempts: 5 }.kind(), ErrorKind::Forbidden);
        assert_eq!(
            FetchError::Network { attempts: 2, message: "timeout".into() }.kind(),
            ErrorKind::Network
        );
        assert_eq!(FetchError::Cancelled.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_crawl_error_forwards_fetch_kind() {
        let err: CrawlError = FetchError::Forbidden { attempts: 3 }.into();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert!(err.to_string().contains("session cookie"));
    }

    #[test]
    fn test_unrecognized_reference_kind() {
        let err = CrawlError::UnrecognizedReference("https://example.com/x".into());
        assert_eq!(err.kind(), ErrorKind::UnrecognizedReference);
    }
}
