//! # author_crawl
//!
//! Command-line front end: crawls one author's article inventory, writes it
//! as JSON, and optionally fetches every article body.
//!
//! ## Usage
//!
//! ```sh
//! author_crawl https://www.zhihu.com/org/acme/posts -n 100 -o ./out
//! ```
//!
//! ## Pipeline
//!
//! 1. **Profile**: read the author's display name from the rendered page
//! 2. **Discovery**: probe listing endpoints, paginate the first that works,
//!    or fall back to the rendered page
//! 3. **Output**: write the crawl result as JSON
//! 4. **Bodies** (optional): fetch article pages through a gated worker pool
//!
//! Ctrl-C stops the crawl between requests; whatever was gathered is still
//! written.

use author_crawl::fetch::RequestGate;
use author_crawl::outputs::json;
use author_crawl::scrapers::article::fetch_articles;
use author_crawl::utils::{ensure_writable_dir, load_cookie_file};
use author_crawl::{
    AuthorReference, CrawlError, CrawlOptions, ErrorKind, Fetcher, RetryPolicy, crawl_author,
    load_platform_config,
};
use clap::Parser;
use std::error::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;

use cli::Cli;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("author_crawl starting up");

    let args = Cli::parse();
    debug!(?args.author_url, ?args.output_dir, max_articles = ?args.max_articles, "Parsed CLI arguments");

    match run(&args).await {
        Ok(()) => {}
        Err(e) => match e.kind() {
            ErrorKind::Forbidden => {
                error!(error = %e, "Blocked by the platform");
                eprintln!(
                    "Access was blocked. A valid session cookie is required: pass --cookie, \
                     set CRAWL_COOKIE, or put it in {}.",
                    args.cookie_file.display()
                );
                return Err(e.into());
            }
            ErrorKind::Network | ErrorKind::RateLimited => {
                error!(error = %e, "Platform unreachable; try again later");
                return Err(e.into());
            }
            ErrorKind::Cancelled => {
                warn!("Interrupted before anything was gathered");
            }
            _ => {
                error!(error = %e, "Crawl failed");
                return Err(e.into());
            }
        },
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

async fn run(args: &Cli) -> Result<(), CrawlError> {
    let reference = AuthorReference::parse(&args.author_url)?;
    info!(url = %reference.url(), kind = ?reference.kind(), "Recognized author reference");

    let mut platform = load_platform_config(args.config.as_deref())?;
    if let Some(page_size) = args.page_size {
        platform.page_size = page_size as usize;
    }

    // Early check: ensure output dir is writable before spending requests
    if let Err(e) = ensure_writable_dir(&args.output_dir).await {
        error!(
            path = %args.output_dir.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let cookie = match args.cookie.clone().filter(|c| !c.trim().is_empty()) {
        Some(cookie) => Some(cookie),
        None => load_cookie_file(&args.cookie_file).await?,
    };
    if cookie.is_none() {
        warn!("No session cookie configured; access may be limited");
    }

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let policy = RetryPolicy::default().with_max_attempts(args.max_attempts);
    let fetcher = Fetcher::from_config(&platform, cookie, policy)?.with_cancellation(cancel);

    let options = CrawlOptions {
        max_articles: args.max_articles.map(|n| n as usize),
        delay: args.delay(),
    };
    let result = crawl_author(&fetcher, &platform, &reference, &options).await?;
    info!(
        author = %result.author.display_name,
        count = result.articles.len(),
        truncated = result.truncated,
        fallback = result.used_fallback(),
        stop = ?result.stop,
        "Crawl complete"
    );

    let stem = json::output_stem(&result, args.output.as_deref());
    json::write_crawl_result(&result, &args.output_dir, args.output.as_deref()).await?;

    if args.fetch_bodies && !fetcher.is_cancelled() {
        let urls: Vec<String> = result.articles.iter().map(|a| a.url.clone()).collect();
        let gate = RequestGate::new(args.delay());
        let bodies = fetch_articles(&fetcher, urls, args.concurrency as usize, &gate).await;
        if !bodies.is_empty() {
            json::write_article_bodies(&bodies, &args.output_dir, &stem).await?;
        }
    }

    let stats = fetcher.stats().snapshot();
    info!(
        requests = stats.requests,
        succeeded = stats.succeeded,
        failed = stats.failed,
        retries = stats.retries,
        rate_limited = stats.rate_limited,
        challenged = stats.challenged,
        elapsed_ms = stats.elapsed_ms,
        "Fetch statistics"
    );
    Ok(())
}

fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received; finishing with partial results");
                cancel.cancel();
            }
            Err(e) => warn!(error = %e, "Could not listen for Ctrl-C"),
        }
    });
}
