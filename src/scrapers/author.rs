//! One author's crawl: profile, then endpoint discovery, then pagination or
//! the rendered-page fallback.
//!
//! Requests are strictly sequential; each step waits for the previous one.
//! The profile page is requested once and doubles as the input of the link
//! fallback.

use super::fallback::extract_from_html;
use super::paginate::{Harvest, PageOptions, paginate};
use super::probe::{candidates, probe};
use super::profile::fetch_profile;
use crate::config::PlatformConfig;
use crate::error::CrawlError;
use crate::fetch::{Fetcher, Transport};
use crate::models::{AuthorReference, CrawlResult, DiscoverySource, StopReason};
use chrono::Utc;
use std::time::Duration;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Stop after this many records; unbounded when `None`.
    pub max_articles: Option<usize>,
    /// Pause between consecutive requests of the crawl.
    pub delay: Duration,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            max_articles: None,
            delay: Duration::from_secs(1),
        }
    }
}

/// Crawl the article inventory of `reference`.
///
/// Partial outcomes (an interrupt, a failing page mid-stream, a caller limit)
/// come back as `Ok` with `stop` and `truncated` set accordingly.
///
/// # Arguments
///
/// * `fetcher` - Fetcher shared with the rest of the run
/// * `platform` - Endpoint templates and paging settings
/// * `reference` - Parsed author profile URL
/// * `options` - Caller limit and the pause between listing pages
///
/// # Errors
///
/// - [`CrawlError::Config`] when an endpoint template does not form a URL
/// - [`CrawlError::Fetch`] when the profile page could not be fetched
#[instrument(level = "info", skip_all, fields(url = %reference.url(), kind = ?reference.kind()))]
pub async fn crawl_author<T: Transport>(
    fetcher: &Fetcher<T>,
    platform: &PlatformConfig,
    reference: &AuthorReference,
    options: &CrawlOptions,
) -> Result<CrawlResult, CrawlError> {
    let candidates = candidates(reference, platform)?;
    let profile_page = fetch_profile(fetcher, reference).await?;
    let author = profile_page.profile;

    let unresolved = |author| CrawlResult {
        author,
        articles: Vec::new(),
        fetched_at: Utc::now(),
        truncated: false,
        source: DiscoverySource::Unresolved,
        stop: StopReason::Cancelled,
    };

    if !fetcher.pause(options.delay).await {
        return Ok(unresolved(author));
    }

    let Some(endpoint) = probe(fetcher, platform, &candidates).await else {
        if fetcher.is_cancelled() {
            return Ok(unresolved(author));
        }
        warn!("Falling back to links on the rendered author page");
        let extraction =
            extract_from_html(&profile_page.html, reference.url(), options.max_articles);
        info!(
            count = extraction.articles.len(),
            truncated = extraction.truncated,
            "Crawl finished from rendered page"
        );
        return Ok(CrawlResult {
            author,
            articles: extraction.articles,
            fetched_at: Utc::now(),
            truncated: extraction.truncated,
            source: DiscoverySource::HtmlFallback,
            stop: if extraction.truncated {
                StopReason::LimitReached
            } else {
                StopReason::SinglePage
            },
        });
    };

    let page_options = PageOptions {
        page_size: platform.page_size,
        max_articles: options.max_articles,
        delay: options.delay,
        sort_key: platform.sort_key.clone(),
    };
    let harvest = if fetcher.pause(options.delay).await {
        paginate(fetcher, &endpoint, &page_options).await
    } else {
        Harvest::cancelled()
    };

    info!(
        count = harvest.articles.len(),
        truncated = harvest.truncated,
        stop = ?harvest.stop,
        "Crawl finished from endpoint"
    );
    Ok(CrawlResult {
        author,
        articles: harvest.articles,
        fetched_at: Utc::now(),
        truncated: harvest.truncated,
        source: DiscoverySource::Endpoint {
            url: endpoint.to_string(),
        },
        stop: harvest.stop,
    })
}
