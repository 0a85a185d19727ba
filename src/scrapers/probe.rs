//! Structured endpoint discovery.
//!
//! Organization and person accounts map to different endpoint template sets,
//! tried in the configured priority order. Each candidate gets one small test
//! call; the first one answering with a well-formed listing (a `data` array,
//! possibly empty) wins. Individual candidate failures are logged and skipped.

use super::listing::{page_url, parse_listing};
use crate::config::{ID_PLACEHOLDER, PlatformConfig};
use crate::error::{CrawlError, FetchError};
use crate::fetch::{Fetcher, RequestKind, Transport};
use crate::models::{AccountKind, AuthorReference};
use crate::utils::truncate_for_log;
use tracing::{info, instrument, warn};
use url::Url;

/// Build the ordered candidate endpoints for `reference`.
///
/// Organization and person accounts draw from different template lists.
///
/// # Errors
///
/// Returns [`CrawlError::Config`] if a template does not form a valid URL once
/// the account id is substituted.
pub fn candidates(
    reference: &AuthorReference,
    platform: &PlatformConfig,
) -> Result<Vec<Url>, CrawlError> {
    let templates = match reference.kind() {
        AccountKind::Organization => &platform.org_endpoints,
        AccountKind::Person => &platform.person_endpoints,
    };

    templates
        .iter()
        .map(|template| {
            let raw = template.replace(ID_PLACEHOLDER, reference.account_id());
            Url::parse(&raw).map_err(|e| CrawlError::Config(format!("endpoint {raw:?}: {e}")))
        })
        .collect()
}

/// Return the first candidate that answers with a well-formed listing.
///
/// Returns `None` when every candidate fails or the run is cancelled; the
/// caller then falls back to the rendered page.
#[instrument(level = "info", skip_all, fields(candidates = candidates.len()))]
pub async fn probe<T: Transport>(
    fetcher: &Fetcher<T>,
    platform: &PlatformConfig,
    candidates: &[Url],
) -> Option<Url> {
    for candidate in candidates {
        let test_url = page_url(candidate, platform.probe_limit, 0, &platform.sort_key);
        info!(endpoint = %candidate, "Probing endpoint");

        let body = match fetcher.fetch(test_url.as_str(), RequestKind::Endpoint).await {
            Ok(body) => body,
            Err(FetchError::Cancelled) => {
                warn!("Probing cancelled");
                return None;
            }
            Err(e) => {
                warn!(endpoint = %candidate, error = %e, "Endpoint unavailable");
                continue;
            }
        };

        match parse_listing(&body) {
            Ok(listing) => {
                info!(endpoint = %candidate, items = listing.data.len(), "Found working endpoint");
                return Some(candidate.clone());
            }
            Err(e) => {
                warn!(
                    endpoint = %candidate,
                    error = %e,
                    preview = %truncate_for_log(&body, 200),
                    "Endpoint response has the wrong shape"
                );
            }
        }
    }

    warn!("No structured endpoint available");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::{ScriptedTransport, ok, query_param, quick_fetcher, status};

    fn reference(raw: &str) -> AuthorReference {
        AuthorReference::parse(raw).unwrap()
    }

    #[test]
    fn test_candidates_by_account_kind() {
        let platform = PlatformConfig::default();
        let org = candidates(&reference("https://www.zhihu.com/org/acme/posts"), &platform).unwrap();
        assert_eq!(org.len(), 3);
        assert_eq!(org[0].as_str(), "https://www.zhihu.com/api/v4/members/acme/articles");
        assert_eq!(org[2].as_str(), "https://www.zhihu.com/api/v4/org/acme/articles");

        let person = candidates(&reference("https://www.zhihu.com/people/bob"), &platform).unwrap();
        assert_eq!(person.len(), 2);
        assert_eq!(person[1].as_str(), "https://zhuanlan.zhihu.com/api/columns/bob/articles");
    }

    #[tokio::test]
    async fn test_third_candidate_wins_after_two_malformed() {
        let transport = ScriptedTransport::new(|_, n| match n {
            0 => ok("<html>login required</html>"),
            1 => ok(r#"{"data": {"not": "a list"}}"#),
            _ => ok(r#"{"data": []}"#),
        });
        let fetcher = quick_fetcher(transport, 1);
        let platform = PlatformConfig::default();
        let list = candidates(&reference("https://www.zhihu.com/org/acme"), &platform).unwrap();

        let found = probe(&fetcher, &platform, &list).await;

        assert_eq!(found.as_ref(), Some(&list[2]));
        let calls = fetcher.transport().calls();
        assert_eq!(calls.len(), 3);
        for (call, candidate) in calls.iter().zip(&list) {
            assert!(call.starts_with(candidate.as_str()));
            assert_eq!(query_param(call, "limit").as_deref(), Some("5"));
            assert_eq!(query_param(call, "offset").as_deref(), Some("0"));
        }
    }

    #[tokio::test]
    async fn test_probe_stops_at_first_working_candidate() {
        let fetcher = quick_fetcher(ScriptedTransport::new(|_, _| ok(r#"{"data": [{}]}"#)), 1);
        let platform = PlatformConfig::default();
        let list = candidates(&reference("https://www.zhihu.com/org/acme"), &platform).unwrap();

        assert_eq!(probe(&fetcher, &platform, &list).await, Some(list[0].clone()));
        assert_eq!(fetcher.transport().calls().len(), 1);
    }

    #[tokio::test]
    async fn test_probe_exhaustion_returns_none() {
        let transport = ScriptedTransport::new(|_, n| if n == 0 { status(403) } else { status(404) });
        let fetcher = quick_fetcher(transport, 1);
        let platform = PlatformConfig::default();
        let list = candidates(&reference("https://www.zhihu.com/people/bob"), &platform).unwrap();

        assert!(probe(&fetcher, &platform, &list).await.is_none());
        assert_eq!(fetcher.transport().calls().len(), 2);
    }
}
