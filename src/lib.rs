//! # author_crawl
//!
//! Retrieves an author's article inventory, and optionally the article
//! bodies, from a server-rendered content platform whose structured endpoints
//! are undocumented and whose pages sit behind an anti-automation gate.
//!
//! ## Architecture
//!
//! 1. **Fetching**: [`fetch::Fetcher`] turns one logical GET into bounded,
//!    cause-differentiated retries with rotating identities
//! 2. **Discovery**: [`scrapers::probe`] finds a working listing endpoint,
//!    [`scrapers::paginate`] walks it, and [`scrapers::fallback`] parses the
//!    rendered page when no endpoint answers
//! 3. **Output**: [`outputs::json`] writes the assembled [`models::CrawlResult`]
//!
//! ```no_run
//! use author_crawl::{CrawlOptions, Fetcher, PlatformConfig, RetryPolicy};
//! use author_crawl::{AuthorReference, crawl_author};
//!
//! # async fn run() -> Result<(), author_crawl::CrawlError> {
//! let platform = PlatformConfig::default();
//! let fetcher = Fetcher::from_config(&platform, None, RetryPolicy::default())?;
//! let reference = AuthorReference::parse("https://www.zhihu.com/org/acme/posts")?;
//! let result = crawl_author(&fetcher, &platform, &reference, &CrawlOptions::default()).await?;
//! println!("{} articles", result.articles.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod fetch;
pub mod models;
pub mod outputs;
pub mod scrapers;
pub mod utils;

pub use config::{PlatformConfig, load_platform_config};
pub use error::{CrawlError, ErrorKind, FetchError};
pub use fetch::{Fetcher, RequestGate, RequestKind, RetryPolicy};
pub use models::{
    ArticleBody, ArticleRecord, AuthorProfile, AuthorReference, CrawlResult, DiscoverySource,
    StopReason,
};
pub use scrapers::author::{CrawlOptions, crawl_author};
