//! Structured listing responses: URL building, shape check, normalization.
//!
//! The platform's listing endpoints answer with JSON shaped roughly like
//!
//! ```json
//! { "data": [ { "title": "...", "url": "...", "id": 123, "created": 1700000000 } ],
//!   "paging": { "is_end": false, "totals": 42 } }
//! ```
//!
//! but nothing about that shape is documented. The only hard requirement is
//! a `data` array; every per-item field is optional with an explicit default.

use crate::models::ArticleRecord;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

const UNTITLED: &str = "(untitled)";

/// A response that passed the shape check.
#[derive(Debug, Deserialize)]
pub struct Listing {
    pub data: Vec<Value>,
    #[serde(default)]
    pub paging: Option<Value>,
}

impl Listing {
    /// `true` only when the upstream explicitly says this is the last page.
    pub fn is_end(&self) -> bool {
        self.paging
            .as_ref()
            .and_then(|p| p.get("is_end"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Parse `body`, rejecting anything without a `data` array.
pub fn parse_listing(body: &str) -> Result<Listing, serde_json::Error> {
    serde_json::from_str(body)
}

/// `endpoint?limit=..&offset=..&sort_by=..`
pub fn page_url(endpoint: &Url, limit: usize, offset: usize, sort_key: &str) -> Url {
    let mut url = endpoint.clone();
    url.query_pairs_mut()
        .append_pair("limit", &limit.to_string())
        .append_pair("offset", &offset.to_string())
        .append_pair("sort_by", sort_key);
    url
}

/// Normalize one listing element. Elements without a URL are dropped.
pub fn normalize(item: &Value) -> Option<ArticleRecord> {
    let url = string_field(item, &["url"]).filter(|u| !u.is_empty())?;

    Some(ArticleRecord {
        title: string_field(item, &["title"])
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| UNTITLED.to_string()),
        url,
        external_id: string_field(item, &["id"]).unwrap_or_default(),
        created_at: timestamp_field(item, &["created_time", "created"]),
        updated_at: timestamp_field(item, &["updated_time", "updated"]),
        excerpt: string_field(item, &["excerpt"]).unwrap_or_default(),
        vote_count: count_field(item, &["voteup_count"]),
        comment_count: count_field(item, &["comment_count"]),
    })
}

fn first<'a>(item: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| item.get(*k).filter(|v| !v.is_null()))
}

fn string_field(item: &Value, keys: &[&str]) -> Option<String> {
    match first(item, keys)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn count_field(item: &Value, keys: &[&str]) -> u64 {
    match first(item, keys) {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Epoch seconds, as a number or a numeric string.
fn timestamp_field(item: &Value, keys: &[&str]) -> Option<DateTime<Utc>> {
    let secs = match first(item, keys)? {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    DateTime::from_timestamp(secs, 0)
}
