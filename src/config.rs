//! Platform constants treated as configuration.
//!
//! The structured endpoints and page markers of the target platform are not a
//! designed protocol; they shift over time. Everything here can be overridden
//! from a YAML file passed with `--config`, and every field has a default so a
//! partial file is enough.
//!
//! ```yaml
//! page_size: 10
//! person_endpoints:
//!   - "https://www.zhihu.com/api/v4/members/{id}/articles"
//! ```

use crate::error::CrawlError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, instrument};

/// Placeholder substituted with the account id in endpoint templates.
pub const ID_PLACEHOLDER: &str = "{id}";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Platform root, sent as the referer on endpoint calls.
    pub root_url: String,
    /// Endpoint templates for organization accounts, in priority order.
    pub org_endpoints: Vec<String>,
    /// Endpoint templates for person accounts, in priority order.
    pub person_endpoints: Vec<String>,
    /// Stable sort key passed on every listing call.
    pub sort_key: String,
    /// Items requested per page during pagination.
    pub page_size: usize,
    /// Items requested by the probe's test call.
    pub probe_limit: usize,
    /// Body substrings that identify a challenge page.
    pub challenge_markers: Vec<String>,
    /// Rendered pages shorter than this are treated as challenge pages.
    pub min_page_bytes: usize,
    pub request_timeout_secs: u64,
    pub user_agents: Vec<String>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            root_url: "https://www.zhihu.com/".to_string(),
            org_endpoints: vec![
                "https://www.zhihu.com/api/v4/members/{id}/articles".to_string(),
                "https://zhuanlan.zhihu.com/api/columns/{id}/articles".to_string(),
                "https://www.zhihu.com/api/v4/org/{id}/articles".to_string(),
            ],
            person_endpoints: vec![
                "https://www.zhihu.com/api/v4/members/{id}/articles".to_string(),
                "https://zhuanlan.zhihu.com/api/columns/{id}/articles".to_string(),
            ],
            sort_key: "created".to_string(),
            page_size: 20,
            probe_limit: 5,
            challenge_markers: vec!["zh-zse-ck".to_string()],
            min_page_bytes: 1000,
            request_timeout_secs: 20,
            user_agents: vec![
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15".to_string(),
            ],
        }
    }
}

impl PlatformConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Reject configurations that cannot drive a crawl.
    pub fn validate(&self) -> Result<(), CrawlError> {
        if self.page_size == 0 {
            return Err(CrawlError::Config("page_size must be positive".into()));
        }
        if self.probe_limit == 0 {
            return Err(CrawlError::Config("probe_limit must be positive".into()));
        }
        if self.user_agents.is_empty() {
            return Err(CrawlError::Config("user_agents must not be empty".into()));
        }
        for template in self.org_endpoints.iter().chain(&self.person_endpoints) {
            if !template.contains(ID_PLACEHOLDER) {
                return Err(CrawlError::Config(format!(
                    "endpoint template {template:?} lacks the {ID_PLACEHOLDER} placeholder"
                )));
            }
        }
        Ok(())
    }
}

/// Load a [`PlatformConfig`] from a YAML file, or the defaults when no path is given.
///
/// # Errors
///
/// Returns [`CrawlError::Io`] or [`CrawlError::Yaml`] when the file cannot be
/// read or parsed, and [`CrawlError::Config`] when the result fails validation.
#[instrument(level = "info")]
pub fn load_platform_config(path: Option<&str>) -> Result<PlatformConfig, CrawlError> {
    let config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            let config: PlatformConfig = serde_yaml::from_str(&raw)?;
            info!(path, "Loaded platform configuration");
            config
        }
        None => PlatformConfig::default(),
    };
    config.validate()?;
    Ok(config)
}
