//! Core configuration types for recursive downloads.
//!
//! `DownloadConfig` carries every parameter of one crawl. Fields are
//! private; getters apply defaults so the rest of the crate never deals
//! with `Option` plumbing.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::utils::constants::{
    DEFAULT_BROWSER_TIMEOUT_SECS, DEFAULT_MAX_CONCURRENCY, DEFAULT_MAX_FILE_SIZE,
    DEFAULT_REQUEST_TIMEOUT_SECS,
};

/// Configuration for one crawl.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// URL the crawl starts from.
    pub(crate) start_url: String,

    /// Filesystem-safe token identifying this crawl; names the index
    /// file and the content subdirectory. Validated in the builder.
    pub(crate) crawl_id: String,

    /// Base directory for all crawl output.
    ///
    /// **INVARIANT:** Always an absolute path (normalized in builder).
    pub(crate) base_dir: PathBuf,

    /// Inclusive recursion depth bound: pages at exactly this depth are
    /// fetched, only recursion beyond it is suppressed.
    pub(crate) max_depth: u8,

    /// Whether pre-existing target files may be replaced.
    pub(crate) overwrite: bool,

    /// Select the browser-rendered backend instead of plain HTTP.
    pub(crate) use_browser: bool,

    /// Run the browser headless. Forced on in release builds.
    pub(crate) headless: bool,

    /// Follow links on subdomains of the start host.
    pub(crate) allow_subdomains: bool,

    /// Optional cap on total pages dispatched in this crawl.
    pub(crate) limit: Option<usize>,

    pub(crate) request_timeout_secs: Option<u64>,
    pub(crate) browser_timeout_secs: Option<u64>,

    /// Extra wait after DOM ready for script-driven rendering, browser
    /// backend only.
    pub(crate) render_delay_ms: Option<u64>,

    pub(crate) max_file_size: Option<u64>,
    pub(crate) max_concurrency: Option<usize>,

    /// Hosts admitted past the SSRF guard. Test infrastructure only;
    /// never set by default.
    pub(crate) ssrf_test_allowlist: Option<Vec<String>>,
}

impl DownloadConfig {
    #[must_use]
    pub fn start_url(&self) -> &str {
        &self.start_url
    }

    #[must_use]
    pub fn crawl_id(&self) -> &str {
        &self.crawl_id
    }

    #[must_use]
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    #[must_use]
    pub fn max_depth(&self) -> u8 {
        self.max_depth
    }

    #[must_use]
    pub fn overwrite(&self) -> bool {
        self.overwrite
    }

    #[must_use]
    pub fn use_browser(&self) -> bool {
        self.use_browser
    }

    #[must_use]
    pub fn headless(&self) -> bool {
        self.headless
    }

    #[must_use]
    pub fn allow_subdomains(&self) -> bool {
        self.allow_subdomains
    }

    #[must_use]
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    #[must_use]
    pub fn browser_timeout(&self) -> Duration {
        Duration::from_secs(
            self.browser_timeout_secs
                .unwrap_or(DEFAULT_BROWSER_TIMEOUT_SECS),
        )
    }

    /// Timeout applied to a single fetch attempt on the active backend.
    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        if self.use_browser {
            self.browser_timeout()
        } else {
            self.request_timeout()
        }
    }

    #[must_use]
    pub fn render_delay(&self) -> Option<Duration> {
        self.render_delay_ms.map(Duration::from_millis)
    }

    #[must_use]
    pub fn max_file_size(&self) -> u64 {
        self.max_file_size.unwrap_or(DEFAULT_MAX_FILE_SIZE)
    }

    #[must_use]
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
            .unwrap_or(DEFAULT_MAX_CONCURRENCY)
            .max(1)
    }

    #[must_use]
    pub fn ssrf_test_allowlist(&self) -> Option<&[String]> {
        self.ssrf_test_allowlist.as_deref()
    }

    /// Path of this crawl's JSONL index file:
    /// `<base>/index/<crawl_id>.jsonl`.
    #[must_use]
    pub fn index_file_path(&self) -> PathBuf {
        self.base_dir
            .join("index")
            .join(format!("{}.jsonl", self.crawl_id))
    }

    /// Root directory for this crawl's mirrored content:
    /// `<base>/content/<crawl_id>/`.
    #[must_use]
    pub fn content_root(&self) -> PathBuf {
        self.base_dir.join("content").join(&self.crawl_id)
    }
}
