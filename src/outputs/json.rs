//! JSON output for crawl results and article bodies.
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── Acme Engineering_articles_20250506_081500.json
//! └── Acme Engineering_bodies_20250506_081500.json
//! ```
//!
//! The stem is the caller's `--output` prefix when given, otherwise the
//! author's display name reduced to a file-system-safe form.

use crate::error::CrawlError;
use crate::models::{ArticleBody, CrawlResult};
use crate::utils::safe_file_stem;
use chrono::Local;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

/// Longest author-derived stem, in characters.
const MAX_STEM_CHARS: usize = 30;

/// File stem shared by all outputs of one run.
pub fn output_stem(result: &CrawlResult, prefix: Option<&str>) -> String {
    match prefix.map(str::trim).filter(|p| !p.is_empty()) {
        Some(prefix) => prefix.to_string(),
        None => safe_file_stem(&result.author.display_name, MAX_STEM_CHARS),
    }
}

fn timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Write `result` as pretty JSON to `{dir}/{stem}_articles_{timestamp}.json`.
///
/// # Arguments
///
/// * `result` - The crawl to serialize
/// * `dir` - Existing output directory
/// * `prefix` - Optional file stem overriding the author-derived one
///
/// # Returns
///
/// The path written.
#[instrument(level = "info", skip_all, fields(dir = %dir.display()))]
pub async fn write_crawl_result(
    result: &CrawlResult,
    dir: &Path,
    prefix: Option<&str>,
) -> Result<PathBuf, CrawlError> {
    let path = dir.join(format!(
        "{}_articles_{}.json",
        output_stem(result, prefix),
        timestamp()
    ));
    write_pretty(result, dir, &path).await?;
    info!(path = %path.display(), count = result.articles.len(), "Wrote crawl result");
    Ok(path)
}

/// Write fetched bodies to `{dir}/{stem}_bodies_{timestamp}.json`.
#[instrument(level = "info", skip_all, fields(dir = %dir.display(), count = bodies.len()))]
pub async fn write_article_bodies(
    bodies: &[ArticleBody],
    dir: &Path,
    stem: &str,
) -> Result<PathBuf, CrawlError> {
    let path = dir.join(format!("{stem}_bodies_{}.json", timestamp()));
    write_pretty(bodies, dir, &path).await?;
    info!(path = %path.display(), "Wrote article bodies");
    Ok(path)
}

async fn write_pretty<S: Serialize + ?Sized>(
    value: &S,
    dir: &Path,
    path: &Path,
) -> Result<(), CrawlError> {
    let json = serde_json::to_string_pretty(value)?;

    if let Err(e) = fs::create_dir_all(dir).await {
        error!(dir = %dir.display(), error = %e, "Failed to create output dir");
        return Err(e.into());
    }
    fs::write(path, json).await?;
    Ok(())
}
