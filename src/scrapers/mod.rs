//! Discovery and scraping stages for one author.
//!
//! A crawl runs in two tiers:
//!
//! 1. **Structured**: [`probe`] finds the first candidate listing endpoint
//!    that answers with a well-formed listing, then [`paginate`] walks it.
//! 2. **Rendered**: when every candidate fails, [`fallback`] extracts a
//!    single page of article links from the author's rendered page.
//!
//! # Stages
//!
//! | Stage | Module | Source | Notes |
//! |-------|--------|--------|-------|
//! | Profile | [`profile`] | Rendered page | Display name and a count hint |
//! | Endpoint discovery | [`probe`] | JSON endpoints | Candidates per account kind |
//! | Pagination | [`paginate`] | JSON endpoint | Offset paging, URL-unique |
//! | Fallback | [`fallback`] | Rendered page | Single page, degraded records |
//! | Article bodies | [`article`] | Rendered pages | Bounded, gated worker pool |
//!
//! [`author::crawl_author`] ties the first four together. Stages share the
//! caller's [`Fetcher`](crate::fetch::Fetcher), so every request goes through
//! the same retry discipline and cancellation token.

pub mod article;
pub mod author;
pub mod fallback;
pub mod listing;
pub mod paginate;
pub mod probe;
pub mod profile;
