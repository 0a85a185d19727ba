//! Command-line interface definitions for `author_crawl`.
//!
//! Every option can be given as a flag; the session cookie can also come from
//! the `CRAWL_COOKIE` environment variable or a cookie file.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Crawl an author's article inventory.
///
/// # Examples
///
/// ```sh
/// # Everything the author has published
/// author_crawl https://www.zhihu.com/org/acme/posts
///
/// # The 50 newest, with bodies, into ./out
/// author_crawl https://www.zhihu.com/people/bob -n 50 --fetch-bodies -o ./out
///
/// # With a session cookie
/// CRAWL_COOKIE='z_c0=...' author_crawl https://www.zhihu.com/people/bob
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Author page URL (`/org/<id>` or `/people/<id>`)
    #[arg(value_name = "AUTHOR_URL")]
    pub author_url: String,

    /// Stop after this many articles
    #[arg(short = 'n', long, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_articles: Option<u64>,

    /// Seconds to wait between requests
    #[arg(long, default_value_t = 1.0, value_parser = parse_delay)]
    pub delay: f64,

    /// Session cookie sent with every request
    #[arg(long, env = "CRAWL_COOKIE", hide_env_values = true)]
    pub cookie: Option<String>,

    /// File to read the session cookie from when --cookie is absent
    #[arg(long, default_value = "cookie.txt")]
    pub cookie_file: PathBuf,

    /// Directory for output files
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// File name prefix for output files (defaults to the author's name)
    #[arg(long)]
    pub output: Option<String>,

    /// Optional path to a platform config YAML file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Attempts per request, including the first
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_attempts: u32,

    /// Items requested per listing page (overrides the config file)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub page_size: Option<u64>,

    /// Also fetch and save every article's body
    #[arg(long)]
    pub fetch_bodies: bool,

    /// Article bodies fetched at once when --fetch-bodies is set
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u64).range(1..=16))]
    pub concurrency: u64,
}

impl Cli {
    pub fn delay(&self) -> Duration {
        Duration::from_secs_f64(self.delay)
    }
}

fn parse_delay(raw: &str) -> Result<f64, String> {
    let secs: f64 = raw.parse().map_err(|e| format!("{e}"))?;
    if secs.is_finite() && secs >= 0.0 {
        Ok(secs)
    } else {
        Err("delay must be a non-negative number of seconds".to_string())
    }
}
