//! Data models for author references, article records, and crawl results.
//!
//! This module defines the core data structures used throughout the crate:
//! - [`AuthorReference`]: a parsed, classified author URL
//! - [`AuthorProfile`]: display data scraped once from the profile page
//! - [`ArticleRecord`]: one entry of the author's article inventory
//! - [`CrawlResult`]: the assembled, immutable output of one run
//! - [`ArticleBody`]: the parsed content of a single article page

use crate::error::CrawlError;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Account classification derived from the shape of an author URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    /// `/org/<id>/...`
    Organization,
    /// `/people/<id>/...`
    Person,
}

/// A parsed author URL. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorReference {
    url: Url,
    kind: AccountKind,
    account_id: String,
}

impl AuthorReference {
    /// Parse and classify an author URL.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::UnrecognizedReference`] when the URL does not
    /// parse or its path is neither `/org/<id>` nor `/people/<id>`.
    pub fn parse(raw: &str) -> Result<Self, CrawlError> {
        let unrecognized = || CrawlError::UnrecognizedReference(raw.to_string());
        let url = Url::parse(raw.trim()).map_err(|_| unrecognized())?;

        let mut segments = url.path_segments().ok_or_else(unrecognized)?;
        let kind = match segments.next() {
            Some("org") => AccountKind::Organization,
            Some("people") => AccountKind::Person,
            _ => return Err(unrecognized()),
        };
        let account_id = match segments.next() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => return Err(unrecognized()),
        };

        Ok(Self { url, kind, account_id })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn kind(&self) -> AccountKind {
        self.kind
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }
}

/// Author display data, derived once per run from the profile page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorProfile {
    pub display_name: String,
    pub account_id: String,
    pub profile_url: String,
    /// Best-effort hint scraped from page text; 0 when unparsable.
    pub estimated_article_count: u64,
}

/// One entry of an author's article inventory.
///
/// Records discovered through the HTML fallback carry only `title`, `url`
/// and `external_id`; numeric fields are 0 and timestamps are `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub title: String,
    pub url: String,
    /// Platform identifier, empty when unknown.
    pub external_id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub excerpt: String,
    pub vote_count: u64,
    pub comment_count: u64,
}

impl ArticleRecord {
    /// A degraded record carrying only identity fields.
    pub fn link_only(title: String, url: String, external_id: String) -> Self {
        Self {
            title,
            url,
            external_id,
            created_at: None,
            updated_at: None,
            excerpt: String::new(),
            vote_count: 0,
            comment_count: 0,
        }
    }
}

/// Where the article list came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiscoverySource {
    /// A structured listing endpoint that passed probing.
    Endpoint { url: String },
    /// The rendered profile page, single page only.
    HtmlFallback,
    /// Discovery was interrupted before a source was chosen.
    Unresolved,
}

/// Why discovery stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The upstream reported or implied that no items remain.
    Exhausted,
    /// A page came back with fewer items than requested.
    ShortPage,
    /// A page came back with an empty listing.
    EmptyPage,
    /// The caller's article limit was reached.
    LimitReached,
    /// A page did not have the expected listing shape.
    Malformed,
    /// A full page contributed nothing new: the upstream reordered or rewound.
    Rewound,
    /// A page fetch failed after exhausting its retries.
    FetchFailed,
    /// The run was interrupted.
    Cancelled,
    /// The HTML fallback rendered its single page.
    SinglePage,
}

/// Output of one author crawl. Built once, never mutated after assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlResult {
    pub author: AuthorProfile,
    /// Ordered, unique by `url`.
    pub articles: Vec<ArticleRecord>,
    pub fetched_at: DateTime<Utc>,
    /// `true` iff the run stopped on the caller's limit rather than exhaustion.
    pub truncated: bool,
    pub source: DiscoverySource,
    pub stop: StopReason,
}

impl CrawlResult {
    pub fn used_fallback(&self) -> bool {
        self.source == DiscoverySource::HtmlFallback
    }
}

/// The parsed body of a single article page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleBody {
    pub url: String,
    pub title: String,
    pub author: Option<String>,
    /// Publish time as rendered on the page.
    pub published_raw: Option<String>,
    /// `published_raw` parsed as a local wall-clock time, when possible.
    pub published_at: Option<NaiveDateTime>,
    pub content_html: String,
    pub content_text: String,
}
