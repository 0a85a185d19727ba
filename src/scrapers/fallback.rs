//! Best-effort article discovery from the rendered author page.
//!
//! Used only when no structured endpoint answers. The page is fetched once and
//! never paginated; it is a single rendering, so asking again returns the
//! same links.
//!
//! Link strategies run in order and their matches are unioned, since each one
//! catches links the others miss. A link counts as an article only when its
//! path has one of the two known article shapes (`/p/<id>` or
//! `/answer/<id>`).

use crate::error::FetchError;
use crate::fetch::{Fetcher, RequestKind, Transport};
use crate::models::{ArticleRecord, AuthorReference};
use crate::utils::collapse_whitespace;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{debug, info, instrument};
use url::Url;

const LINK_STRATEGIES: &[&str] = &[
    r#"a[href*="/p/"]"#,
    r#"a[href*="/answer/"]"#,
    ".ContentItem-title a",
    ".Post-Title a",
    ".ArticleItem-title a",
];

/// Titles shorter than this (in characters) are considered implausible.
const MIN_TITLE_CHARS: usize = 3;

static LINK_SELECTORS: Lazy<Vec<(&'static str, Selector)>> = Lazy::new(|| {
    LINK_STRATEGIES
        .iter()
        .map(|raw| (*raw, Selector::parse(raw).expect("static link selector")))
        .collect()
});

static ARTICLE_PATHS: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r"/p/([^/?#]+)").expect("static regex"),
        Regex::new(r"/answer/([^/?#]+)").expect("static regex"),
    ]
});

/// Records recovered from one rendered page.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub articles: Vec<ArticleRecord>,
    /// `true` iff `max_articles` cut off further links on the page.
    pub truncated: bool,
}

/// Fetch the author's rendered page and extract article links from it.
///
/// # Errors
///
/// Propagates the fetcher's final error; the page is the last resort, so
/// there is nothing further to fall back to.
#[instrument(level = "info", skip_all, fields(url = %reference.url()))]
pub async fn extract_from_page<T: Transport>(
    fetcher: &Fetcher<T>,
    reference: &AuthorReference,
    max_articles: Option<usize>,
) -> Result<Extraction, FetchError> {
    let body = fetcher
        .fetch(reference.url().as_str(), RequestKind::Page)
        .await?;
    Ok(extract_from_html(&body, reference.url(), max_articles))
}

/// Extract article links from `html`, resolving relative links against `base`.
///
/// # Arguments
///
/// * `html` - Rendered author page
/// * `base` - URL the page was served from
/// * `max_articles` - Optional cap on the number of records kept
///
/// # Returns
///
/// The unique article links in page order, with `truncated` set when the cap
/// dropped some.
pub fn extract_from_html(html: &str, base: &Url, max_articles: Option<usize>) -> Extraction {
    let document = Html::parse_document(html);
    let mut seen: HashSet<String> = HashSet::new();
    let mut articles = Vec::new();

    for (raw, selector) in LINK_SELECTORS.iter() {
        let mut matched = 0usize;
        for element in document.select(selector) {
            matched += 1;
            let Some(url) = element.value().attr("href").and_then(|h| resolve(base, h)) else {
                continue;
            };
            let Some(external_id) = article_id(&url) else {
                continue;
            };
            let url = url.to_string();
            if seen.contains(&url) {
                continue;
            }
            let Some(title) = link_title(element) else {
                debug!(%url, "Skipping link without a usable title");
                continue;
            };
            seen.insert(url.clone());
            articles.push(ArticleRecord::link_only(title, url, external_id));
        }
        if matched > 0 {
            debug!(selector = raw, matched, "Link strategy matched");
        }
    }

    let found = articles.len();
    let truncated = max_articles.is_some_and(|max| max > 0 && found > max);
    if let Some(max) = max_articles.filter(|&m| m > 0) {
        articles.truncate(max);
    }
    info!(found, kept = articles.len(), truncated, "Extracted article links from page");
    Extraction { articles, truncated }
}

fn resolve(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let mut url = base.join(href).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

/// The numeric id of an article URL, empty when the id is not numeric.
/// `None` when the path is not an article shape at all.
fn article_id(url: &Url) -> Option<String> {
    let path = url.path();
    let captures = ARTICLE_PATHS.iter().find_map(|re| re.captures(path))?;
    let id = captures.get(1).map_or("", |m| m.as_str());
    Some(if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) {
        id.to_string()
    } else {
        String::new()
    })
}

fn link_title(element: ElementRef<'_>) -> Option<String> {
    let own = collapse_whitespace(&element.text().collect::<String>());
    if own.chars().count() >= MIN_TITLE_CHARS {
        return Some(own);
    }
    let parent = element.parent().and_then(ElementRef::wrap)?;
    let text = collapse_whitespace(&parent.text().collect::<String>());
    (text.chars().count() >= MIN_TITLE_CHARS).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::{ScriptedTransport, big_page, ok, quick_fetcher, status};

    fn base() -> Url {
        Url::parse("https://www.zhihu.com/org/acme/posts").unwrap()
    }

    #[test]
    fn test_two_articles_one_other_link_and_a_duplicate() {
        let html = r#"
            <div class="List">
              <h2 class="ContentItem-title"><a href="/p/101">First article</a></h2>
              <h2 class="ContentItem-title"><a href="https://www.zhihu.com/question/5/answer/202">An answer</a></h2>
              <a href="/people/someone">A profile link</a>
              <a href="/p/101#comments">First article again</a>
            </div>"#;
        let extraction = extract_from_html(html, &base(), None);

        assert_eq!(extraction.articles.len(), 2);
        assert!(!extraction.truncated);
        let first = &extraction.articles[0];
        assert_eq!(first.url, "https://www.zhihu.com/p/101");
        assert_eq!(first.title, "First article");
        assert_eq!(first.external_id, "101");
        assert_eq!(first.vote_count, 0);
        assert!(first.created_at.is_none());
        assert_eq!(extraction.articles[1].external_id, "202");
    }

    #[test]
    fn test_short_link_text_falls_back_to_parent() {
        let html = r#"<div class="ArticleItem-title">Why Rust <a href="/p/7">›</a></div>"#;
        let extraction = extract_from_html(html, &base(), None);
        assert_eq!(extraction.articles.len(), 1);
        assert_eq!(extraction.articles[0].title, "Why Rust ›");
    }

    #[test]
    fn test_untitled_links_are_skipped() {
        let html = r#"<div><a href="/p/7">go</a></div>"#;
        assert!(extract_from_html(html, &base(), None).articles.is_empty());
    }

    #[test]
    fn test_non_numeric_id_is_left_empty() {
        let html = r#"<a href="https://zhuanlan.zhihu.com/p/draft-abc">A draft post</a>"#;
        let extraction = extract_from_html(html, &base(), None);
        assert_eq!(extraction.articles.len(), 1);
        assert_eq!(extraction.articles[0].external_id, "");
    }

    #[test]
    fn test_non_http_links_are_ignored() {
        let html = r#"<a href="javascript:open('/p/1')">Open /p/1</a>"#;
        assert!(extract_from_html(html, &base(), None).articles.is_empty());
    }

    #[test]
    fn test_max_articles_cuts_and_marks_truncated() {
        let html: String = (1..=5)
            .map(|i| format!(r#"<a href="/p/{i}">Article number {i}</a>"#))
            .collect();
        let extraction = extract_from_html(&html, &base(), Some(3));
        assert_eq!(extraction.articles.len(), 3);
        assert!(extraction.truncated);

        let extraction = extract_from_html(&html, &base(), Some(5));
        assert_eq!(extraction.articles.len(), 5);
        assert!(!extraction.truncated);
    }

    #[tokio::test]
    async fn test_extract_from_page_fetches_once() {
        let page = big_page(r#"<a href="/p/1">Only article</a>"#);
        let fetcher = quick_fetcher(ScriptedTransport::new(move |_, _| ok(page.clone())), 1);
        let reference = AuthorReference::parse("https://www.zhihu.com/org/acme/posts").unwrap();

        let extraction = extract_from_page(&fetcher, &reference, None).await.unwrap();

        assert_eq!(extraction.articles.len(), 1);
        assert_eq!(fetcher.transport().calls(), vec![reference.url().to_string()]);
    }

    #[tokio::test]
    async fn test_extract_from_page_propagates_block() {
        let fetcher = quick_fetcher(ScriptedTransport::new(|_, _| status(403)), 2);
        let reference = AuthorReference::parse("https://www.zhihu.com/org/acme").unwrap();
        let err = extract_from_page(&fetcher, &reference, None).await.unwrap_err();
        assert!(matches!(err, FetchError::Forbidden { attempts: 2 }));
    }
}
