//! Offset pagination over a working listing endpoint.
//!
//! The loop accumulates normalized, URL-unique records until one of the stop
//! conditions in [`StopReason`] holds. None of them is an error: a malformed
//! page, a failed fetch or an interrupt mid-stream all end the stream and
//! hand back what was gathered so far.
//!
//! A page shorter than `page_size` is taken as the end of the stream. An
//! upstream that ever returns a transiently short page will therefore be
//! under-fetched by up to one page.

use super::listing::{Listing, normalize, page_url, parse_listing};
use crate::error::FetchError;
use crate::fetch::{Fetcher, RequestKind, Transport};
use crate::models::{ArticleRecord, StopReason};
use crate::utils::{looks_truncated, truncate_for_log};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

#[derive(Debug, Clone)]
pub struct PageOptions {
    pub page_size: usize,
    /// Stop once this many records are collected.
    pub max_articles: Option<usize>,
    /// Pause between page requests.
    pub delay: Duration,
    /// Stable sort key; pagination correctness depends on it.
    pub sort_key: String,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            page_size: 20,
            max_articles: None,
            delay: Duration::from_secs(1),
            sort_key: "created".to_string(),
        }
    }
}

/// Records gathered by one pagination run.
#[derive(Debug, Clone)]
pub struct Harvest {
    pub articles: Vec<ArticleRecord>,
    /// `true` iff the caller's limit, not exhaustion, ended the run.
    pub truncated: bool,
    pub stop: StopReason,
}

impl Harvest {
    pub fn cancelled() -> Self {
        Self {
            articles: Vec::new(),
            truncated: false,
            stop: StopReason::Cancelled,
        }
    }
}

/// Drive `endpoint` page by page until exhaustion, the limit, or a stop signal.
///
/// # Arguments
///
/// * `fetcher` - Shared fetcher; its interrupt token ends the run between pages
/// * `endpoint` - Working listing endpoint, without paging parameters
/// * `options` - Page size, caller limit and the pause between pages
///
/// # Returns
///
/// A [`Harvest`] with the deduplicated records in arrival order, the
/// [`StopReason`] that ended the run, and whether the limit cut off more.
#[instrument(level = "info", skip_all, fields(endpoint = %endpoint, page_size = options.page_size))]
pub async fn paginate<T: Transport>(
    fetcher: &Fetcher<T>,
    endpoint: &Url,
    options: &PageOptions,
) -> Harvest {
    let page_size = options.page_size.max(1);
    let max_articles = options.max_articles.filter(|&m| m > 0);

    let mut articles: Vec<ArticleRecord> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut offset = 0usize;
    let mut page = 1usize;

    let stop = loop {
        if fetcher.is_cancelled() {
            break StopReason::Cancelled;
        }

        let url = page_url(endpoint, page_size, offset, &options.sort_key);
        info!(page, offset, collected = articles.len(), "Fetching listing page");

        let body = match fetcher.fetch(url.as_str(), RequestKind::Endpoint).await {
            Ok(body) => body,
            Err(FetchError::Cancelled) => break StopReason::Cancelled,
            Err(e) => {
                warn!(page, offset, error = %e, "Listing page failed; keeping partial results");
                break StopReason::FetchFailed;
            }
        };
        // A page that lands after an interrupt is discarded.
        if fetcher.is_cancelled() {
            break StopReason::Cancelled;
        }

        let listing = match parse_listing(&body) {
            Ok(listing) => listing,
            Err(e) => {
                warn!(
                    page,
                    offset,
                    error = %e,
                    truncated_json = looks_truncated(&e),
                    preview = %truncate_for_log(&body, 200),
                    "Listing page has the wrong shape; treating as end of stream"
                );
                break StopReason::Malformed;
            }
        };

        let received = listing.data.len();
        if received == 0 {
            break StopReason::EmptyPage;
        }

        let mut added = 0usize;
        let mut limit_hit_at = None;
        for (index, item) in listing.data.iter().enumerate() {
            let Some(record) = normalize(item) else {
                debug!(page, index, "Skipping listing item without a url");
                continue;
            };
            if !seen.insert(record.url.clone()) {
                debug!(page, url = %record.url, "Skipping duplicate article");
                continue;
            }
            articles.push(record);
            added += 1;

            if max_articles.is_some_and(|max| articles.len() >= max) {
                limit_hit_at = Some(index);
                break;
            }
        }

        if let Some(index) = limit_hit_at {
            let truncated = if has_new_items(&listing.data[index + 1..], &seen) {
                true
            } else if received < page_size || listing.is_end() {
                false
            } else {
                peek_for_more(fetcher, endpoint, options, page_size, offset + page_size, &seen).await
            };
            info!(count = articles.len(), truncated, "Reached article limit");
            return Harvest {
                articles,
                truncated,
                stop: if truncated {
                    StopReason::LimitReached
                } else {
                    StopReason::Exhausted
                },
            };
        }

        if received < page_size {
            break StopReason::ShortPage;
        }
        if listing.is_end() {
            break StopReason::Exhausted;
        }
        if added == 0 {
            warn!(page, offset, "Full page added nothing new; upstream order is unstable");
            break StopReason::Rewound;
        }

        if !fetcher.pause(options.delay).await {
            break StopReason::Cancelled;
        }
        offset += page_size;
        page += 1;
    };

    info!(count = articles.len(), ?stop, "Pagination finished");
    Harvest {
        articles,
        truncated: false,
        stop,
    }
}

fn has_new_items(items: &[serde_json::Value], seen: &HashSet<String>) -> bool {
    items
        .iter()
        .filter_map(normalize)
        .any(|record| !seen.contains(&record.url))
}

/// Whether anything new lies past a limit that landed exactly on a full page.
///
/// Only a well-formed answer with nothing new counts as exhaustion; any other
/// outcome leaves the run marked as truncated.
async fn peek_for_more<T: Transport>(
    fetcher: &Fetcher<T>,
    endpoint: &Url,
    options: &PageOptions,
    page_size: usize,
    offset: usize,
    seen: &HashSet<String>,
) -> bool {
    if !fetcher.pause(options.delay).await {
        return true;
    }
    let url = page_url(endpoint, page_size, offset, &options.sort_key);
    debug!(offset, "Checking whether the limit truncated the stream");
    match fetcher.fetch(url.as_str(), RequestKind::Endpoint).await {
        Ok(body) => match parse_listing(&body) {
            Ok(Listing { data, .. }) => has_new_items(&data, seen),
            Err(_) => true,
        },
        Err(_) => true,
    }
}
