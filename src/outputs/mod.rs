//! Serialization of crawl results.
//!
//! # Submodules
//!
//! - [`json`]: Writes a [`CrawlResult`](crate::models::CrawlResult) and any
//!   fetched article bodies as pretty-printed JSON files

pub mod json;
