//! Fluent builder for `DownloadConfig` with validation on `build()`.

use std::path::PathBuf;

use anyhow::{Result, anyhow};

use super::types::DownloadConfig;
use crate::utils::constants::DEFAULT_MAX_DEPTH;

/// Builder for [`DownloadConfig`]. `start_url`, `crawl_id`, and
/// `base_dir` are required; everything else has defaults.
#[derive(Debug, Default)]
pub struct DownloadConfigBuilder {
    start_url: Option<String>,
    crawl_id: Option<String>,
    base_dir: Option<PathBuf>,
    max_depth: Option<u8>,
    overwrite: bool,
    use_browser: bool,
    headless: Option<bool>,
    allow_subdomains: Option<bool>,
    limit: Option<usize>,
    request_timeout_secs: Option<u64>,
    browser_timeout_secs: Option<u64>,
    render_delay_ms: Option<u64>,
    max_file_size: Option<u64>,
    max_concurrency: Option<usize>,
    ssrf_test_allowlist: Option<Vec<String>>,
}

impl DownloadConfig {
    #[must_use]
    pub fn builder() -> DownloadConfigBuilder {
        DownloadConfigBuilder::default()
    }
}

impl DownloadConfigBuilder {
    #[must_use]
    pub fn start_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        // Accept bare hostnames the way users type them.
        let normalized = if url.starts_with("http://") || url.starts_with("https://") {
            url
        } else {
            format!("https://{url}")
        };
        self.start_url = Some(normalized);
        self
    }

    #[must_use]
    pub fn crawl_id(mut self, id: impl Into<String>) -> Self {
        self.crawl_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn max_depth(mut self, depth: u8) -> Self {
        self.max_depth = Some(depth);
        self
    }

    #[must_use]
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    #[must_use]
    pub fn use_browser(mut self, use_browser: bool) -> Self {
        self.use_browser = use_browser;
        self
    }

    #[must_use]
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = Some(headless);
        self
    }

    #[must_use]
    pub fn allow_subdomains(mut self, allow: bool) -> Self {
        self.allow_subdomains = Some(allow);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = Some(secs);
        self
    }

    #[must_use]
    pub fn browser_timeout_secs(mut self, secs: u64) -> Self {
        self.browser_timeout_secs = Some(secs);
        self
    }

    #[must_use]
    pub fn render_delay_ms(mut self, millis: u64) -> Self {
        self.render_delay_ms = Some(millis);
        self
    }

    #[must_use]
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = Some(bytes);
        self
    }

    #[must_use]
    pub fn max_concurrency(mut self, workers: usize) -> Self {
        self.max_concurrency = Some(workers);
        self
    }

    /// Admit the named hosts past the SSRF guard. Test infrastructure
    /// only; leaving this unset keeps the guard fully closed.
    #[must_use]
    pub fn ssrf_test_allowlist<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ssrf_test_allowlist = Some(hosts.into_iter().map(Into::into).collect());
        self
    }

    pub fn build(self) -> Result<DownloadConfig> {
        let start_url = self.start_url.ok_or_else(|| anyhow!("start_url is required"))?;
        let crawl_id = self.crawl_id.ok_or_else(|| anyhow!("crawl_id is required"))?;
        let base_dir = self.base_dir.ok_or_else(|| anyhow!("base_dir is required"))?;

        if !is_filesystem_safe_token(&crawl_id) {
            return Err(anyhow!(
                "crawl_id {crawl_id:?} must be a non-empty token of \
                 [A-Za-z0-9._-] and must not start with a dot"
            ));
        }

        if let Some(0) = self.max_concurrency {
            return Err(anyhow!("max_concurrency must be at least 1"));
        }
        if let Some(0) = self.max_file_size {
            return Err(anyhow!("max_file_size must be positive"));
        }

        // Normalize to an absolute path so path containment checks and
        // index records are stable regardless of the caller's cwd.
        let base_dir = std::path::absolute(&base_dir)
            .map_err(|e| anyhow!("cannot make base_dir absolute: {e}"))?;

        // Headed browsing is a debug convenience only.
        #[cfg(not(debug_assertions))]
        let headless = true;
        #[cfg(debug_assertions)]
        let headless = self.headless.unwrap_or(true);

        Ok(DownloadConfig {
            start_url,
            crawl_id,
            base_dir,
            max_depth: self.max_depth.unwrap_or(DEFAULT_MAX_DEPTH),
            overwrite: self.overwrite,
            use_browser: self.use_browser,
            headless,
            allow_subdomains: self.allow_subdomains.unwrap_or(true),
            limit: self.limit,
            request_timeout_secs: self.request_timeout_secs,
            browser_timeout_secs: self.browser_timeout_secs,
            render_delay_ms: self.render_delay_ms,
            max_file_size: self.max_file_size,
            max_concurrency: self.max_concurrency,
            ssrf_test_allowlist: self.ssrf_test_allowlist,
        })
    }
}

fn is_filesystem_safe_token(token: &str) -> bool {
    !token.is_empty()
        && !token.starts_with('.')
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}
