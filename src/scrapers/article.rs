//! Single-article retrieval and parsing.
//!
//! Every field is found with an ordered selector cascade, the first match
//! winning. The body cascade prefers the first container with substantial
//! text, since the platform renders several empty wrappers with the same
//! class names around the real one.

use crate::error::{CrawlError, FetchError};
use crate::fetch::{Fetcher, RequestGate, RequestKind, Transport};
use crate::models::ArticleBody;
use crate::utils::collapse_whitespace;
use chrono::{NaiveDate, NaiveDateTime};
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, error, info, instrument, warn};

const UNTITLED: &str = "(untitled)";

/// Body text must be longer than this for a container to win outright.
const MIN_BODY_CHARS: usize = 100;

fn selectors(raw: &[&str]) -> Vec<Selector> {
    raw.iter()
        .map(|s| Selector::parse(s).expect("static article selector"))
        .collect()
}

static TITLE: Lazy<Vec<Selector>> =
    Lazy::new(|| selectors(&["h1.Post-Title", "h1.ArticleTitle", "h1", "title"]));

static CONTENT: Lazy<Vec<Selector>> = Lazy::new(|| {
    selectors(&[
        "div.Post-RichTextContainer",
        "div.RichText",
        "div.Post-RichText",
        "article.Post-Main",
        "article",
        "div.content",
    ])
});

static AUTHOR: Lazy<Vec<Selector>> =
    Lazy::new(|| selectors(&["div.AuthorInfo", "div.author-info", "a.UserLink"]));

static AUTHOR_LINK: Lazy<Vec<Selector>> = Lazy::new(|| selectors(&["a.UserLink", "a"]));

static TIME: Lazy<Vec<Selector>> =
    Lazy::new(|| selectors(&["div.ContentItem-time", "div.publish-time", "time"]));

static DASHED_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{4})-(\d{1,2})-(\d{1,2})[ T](\d{1,2}):(\d{2})(?::(\d{2}))?")
        .expect("static regex")
});

static CJK_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{4})年(\d{1,2})月(\d{1,2})日\s*(\d{1,2}):(\d{2})").expect("static regex")
});

/// Fetch and parse one article page.
///
/// # Errors
///
/// - [`CrawlError::Fetch`] when the page could not be retrieved
/// - [`CrawlError::ContentNotFound`] when no body container is present,
///   which usually means a session cookie is needed
#[instrument(level = "info", skip_all, fields(%url))]
pub async fn fetch_article<T: Transport>(
    fetcher: &Fetcher<T>,
    url: &str,
) -> Result<ArticleBody, CrawlError> {
    let body = fetcher.fetch(url, RequestKind::Page).await?;
    let article = parse_article(&body, url)?;
    info!(
        title = %article.title,
        bytes = article.content_html.len(),
        "Parsed article"
    );
    Ok(article)
}

pub fn parse_article(html: &str, url: &str) -> Result<ArticleBody, CrawlError> {
    let document = Html::parse_document(html);

    let title = first_match(&document, &TITLE)
        .map(|e| collapse_whitespace(&element_text(e)))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());

    let content = CONTENT
        .iter()
        .filter_map(|s| document.select(s).next())
        .find(|e| element_text(*e).trim().chars().count() > MIN_BODY_CHARS)
        .or_else(|| first_match(&document, &CONTENT))
        .ok_or_else(|| CrawlError::ContentNotFound(url.to_string()))?;

    let author = AUTHOR.iter().find_map(|s| {
        let block = document.select(s).next()?;
        let link = AUTHOR_LINK
            .iter()
            .find_map(|l| block.select(l).next())
            .or_else(|| (block.value().name() == "a").then_some(block))?;
        let name = collapse_whitespace(&element_text(link));
        (!name.is_empty()).then_some(name)
    });

    let published_raw = first_match(&document, &TIME)
        .map(|e| collapse_whitespace(&element_text(e)))
        .filter(|t| !t.is_empty());
    let published_at = parse_publish_time(published_raw.as_deref());

    Ok(ArticleBody {
        url: url.to_string(),
        title,
        author,
        published_raw,
        published_at,
        content_html: content.html(),
        content_text: block_text(content),
    })
}

/// Parse a rendered publish time into a local wall-clock time.
///
/// Accepts the forms the platform renders, with or without a prefix or a
/// trailing location:
///
/// ```text
/// 发布于 2024-12-27 10:59・广东
/// 2024-11-03T12:34:56
/// 2024-11-03 12:34
/// 2024年12月27日 10:59
/// ```
pub fn parse_publish_time(text: Option<&str>) -> Option<NaiveDateTime> {
    let text = text?.trim();
    if text.is_empty() {
        return None;
    }
    if let Some(c) = DASHED_TIME.captures(text) {
        return build_time(&c);
    }
    if let Some(c) = CJK_TIME.captures(text) {
        return build_time(&c);
    }
    debug!(text, "Unrecognized publish time");
    None
}

fn build_time(c: &Captures<'_>) -> Option<NaiveDateTime> {
    let num = |i: usize| -> Option<u32> { c.get(i).map_or(Some(0), |m| m.as_str().parse().ok()) };
    let year: i32 = c.get(1)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, num(2)?, num(3)?)?.and_hms_opt(num(4)?, num(5)?, num(6)?)
}

/// Fetch many articles with at most `concurrency` in flight.
///
/// Every request first passes `gate`, so the pool never bursts against the
/// target. Failures are logged and skipped; once the fetcher is cancelled no
/// new request is started. Results keep the order of `urls`.
#[instrument(level = "info", skip_all, fields(count = urls.len(), concurrency = concurrency))]
pub async fn fetch_articles<T: Transport>(
    fetcher: &Fetcher<T>,
    urls: Vec<String>,
    concurrency: usize,
    gate: &RequestGate,
) -> Vec<ArticleBody> {
    let articles: Vec<ArticleBody> = stream::iter(urls)
        .map(|url| async move {
            if !fetcher.pass_gate(gate).await {
                debug!(%url, "Skipping article after interrupt");
                return None;
            }
            match fetch_article(fetcher, &url).await {
                Ok(article) => Some(article),
                Err(CrawlError::Fetch(FetchError::Cancelled)) => {
                    debug!(%url, "Article fetch cancelled");
                    None
                }
                Err(e @ CrawlError::ContentNotFound(_)) => {
                    warn!(error = %e, "Article has no recognizable body");
                    None
                }
                Err(e) => {
                    error!(error = %e, %url, "Article fetch failed");
                    None
                }
            }
        })
        .buffered(concurrency.max(1))
        .filter_map(std::future::ready)
        .collect()
        .await;

    info!(count = articles.len(), "Fetched article bodies");
    articles
}

fn first_match<'a>(document: &'a Html, cascade: &[Selector]) -> Option<ElementRef<'a>> {
    cascade.iter().find_map(|s| document.select(s).next())
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect()
}

/// Text of `element`, one non-empty line per text node.
fn block_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
