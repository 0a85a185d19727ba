//! Author display data from the rendered profile page.

use crate::error::FetchError;
use crate::fetch::{Fetcher, RequestKind, Transport};
use crate::models::{AuthorProfile, AuthorReference};
use crate::utils::collapse_whitespace;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{info, instrument};

const UNKNOWN_AUTHOR: &str = "unknown author";

static NAME_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    ["h1.ProfileHeader-title", "span.ProfileHeader-name", "h1"]
        .iter()
        .map(|raw| Selector::parse(raw).expect("static name selector"))
        .collect()
});

// First match wins.
static COUNT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"(\d+)\s*篇文章", r"(\d+)\s*个回答", r"发表了\s*(\d+)\s*篇文章"]
        .iter()
        .map(|raw| Regex::new(raw).expect("static count pattern"))
        .collect()
});

/// The author's rendered page and what was parsed from it.
///
/// The HTML is kept so the link fallback can reuse it instead of requesting
/// the same page again.
#[derive(Debug, Clone)]
pub struct ProfilePage {
    pub profile: AuthorProfile,
    pub html: String,
}

/// Fetch and parse the profile page of `reference`.
///
/// # Errors
///
/// Propagates the fetcher's final error, including
/// [`FetchError::Cancelled`].
#[instrument(level = "info", skip_all, fields(url = %reference.url()))]
pub async fn fetch_profile<T: Transport>(
    fetcher: &Fetcher<T>,
    reference: &AuthorReference,
) -> Result<ProfilePage, FetchError> {
    let html = fetcher
        .fetch(reference.url().as_str(), RequestKind::Page)
        .await?;
    let profile = parse_profile(&html, reference);
    info!(
        name = %profile.display_name,
        estimated_articles = profile.estimated_article_count,
        "Parsed author profile"
    );
    Ok(ProfilePage { profile, html })
}

pub fn parse_profile(html: &str, reference: &AuthorReference) -> AuthorProfile {
    let document = Html::parse_document(html);

    let display_name = NAME_SELECTORS
        .iter()
        .filter_map(|selector| document.select(selector).next())
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .find(|name| !name.is_empty())
        .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());

    let page_text: String = document.root_element().text().collect();
    let estimated_article_count = COUNT_PATTERNS
        .iter()
        .find_map(|re| re.captures(&page_text))
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);

    AuthorProfile {
        display_name,
        account_id: reference.account_id().to_string(),
        profile_url: reference.url().to_string(),
        estimated_article_count,
    }
}
