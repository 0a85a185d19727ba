//! Browser-like request headers, shaped per [`RequestKind`].

use super::RequestKind;
use super::identity::Identity;
use reqwest::header::{COOKIE, HeaderMap, HeaderName, HeaderValue, REFERER, USER_AGENT};
use tracing::warn;

/// Build the full header map for one request.
///
/// `Page` requests look like a top-level navigation. `Endpoint` requests look
/// like an in-page asynchronous call: no navigation headers, accept-all, and
/// the platform root as referer.
pub(crate) fn headers_for(kind: RequestKind, identity: &Identity, referer: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();

    for (k, v) in header_pairs_for(kind) {
        headers.insert(HeaderName::from_static(k), HeaderValue::from_static(v));
    }

    if let Ok(ua) = HeaderValue::from_str(&identity.user_agent) {
        headers.insert(USER_AGENT, ua);
    }

    if kind == RequestKind::Endpoint {
        if let Ok(value) = HeaderValue::from_str(referer) {
            headers.insert(REFERER, value);
        }
    }

    if let Some(cookie) = &identity.cookie {
        match HeaderValue::from_str(cookie) {
            Ok(value) => {
                headers.insert(COOKIE, value);
            }
            Err(_) => warn!("Session cookie contains characters not allowed in a header; sending without it"),
        }
    }

    headers
}

/// Static header pairs (lowercase names, without user agent, referer or cookie).
fn header_pairs_for(kind: RequestKind) -> Vec<(&'static str, &'static str)> {
    match kind {
        RequestKind::Page => vec![
            ("accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8"),
            ("accept-language", "zh-CN,zh;q=0.9,en;q=0.8"),
            ("upgrade-insecure-requests", "1"),
            ("cache-control", "max-age=0"),
            ("sec-fetch-dest", "document"),
            ("sec-fetch-mode", "navigate"),
            ("sec-fetch-site", "none"),
            ("sec-fetch-user", "?1"),
        ],
        RequestKind::Endpoint => vec![
            ("accept", "*/*"),
            ("accept-language", "zh-CN,zh;q=0.9,en;q=0.8"),
            ("sec-fetch-dest", "empty"),
            ("sec-fetch-mode", "cors"),
            ("sec-fetch-site", "same-origin"),
            ("x-requested-with", "fetch"),
        ],
    }
}
