//! Request/response types shared by the fetch backends.

use std::path::PathBuf;
use std::time::Duration;

use crate::index::FetchStatus;

/// Everything a backend needs to fetch one URL.
///
/// The target path has already been validated by the path guard; the
/// backend still re-checks existence immediately before its final rename
/// to close the TOCTOU window.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Canonical URL to fetch.
    pub url: String,
    /// Validated destination inside the crawl's content root.
    pub target_path: PathBuf,
    /// Whether a pre-existing target may be replaced.
    pub overwrite: bool,
    /// Hard cap on downloaded bytes.
    pub max_size: u64,
    /// Per-attempt timeout.
    pub timeout: Duration,
}

/// Structured result of one fetch attempt.
///
/// Backends never raise errors to the caller: every failure path is
/// converted into an outcome with a populated `error_message`.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub status: FetchStatus,
    /// Saved file, present for `Success` and `Skipped`.
    pub local_path: Option<PathBuf>,
    /// Hex MD5 of the saved bytes; present only on success.
    pub content_md5: Option<String>,
    /// Transport status code, when one was obtained.
    pub http_status: Option<u16>,
    /// Candidate outbound links scanned from the content; raw attribute
    /// values, resolved and filtered by the scheduler.
    pub discovered_links: Vec<String>,
    pub error_message: Option<String>,
}

impl FetchOutcome {
    #[must_use]
    pub fn success(
        path: PathBuf,
        md5_hex: String,
        http_status: Option<u16>,
        links: Vec<String>,
    ) -> Self {
        Self {
            status: FetchStatus::Success,
            local_path: Some(path),
            content_md5: Some(md5_hex),
            http_status,
            discovered_links: links,
            error_message: None,
        }
    }

    #[must_use]
    pub fn skipped_existing(path: PathBuf) -> Self {
        Self {
            status: FetchStatus::Skipped,
            local_path: Some(path),
            content_md5: None,
            http_status: None,
            discovered_links: Vec::new(),
            error_message: None,
        }
    }

    #[must_use]
    pub fn failed_request(message: impl Into<String>, http_status: Option<u16>) -> Self {
        Self::failure(FetchStatus::FailedRequest, message, http_status)
    }

    #[must_use]
    pub fn failed_paywall(message: impl Into<String>, http_status: Option<u16>) -> Self {
        Self::failure(FetchStatus::FailedPaywall, message, http_status)
    }

    /// Defensive category for invariant violations inside the fetcher;
    /// indicates a bug rather than a network condition.
    #[must_use]
    pub fn failed_internal(message: impl Into<String>) -> Self {
        Self::failure(FetchStatus::FailedInternal, message, None)
    }

    fn failure(status: FetchStatus, message: impl Into<String>, http_status: Option<u16>) -> Self {
        Self {
            status,
            local_path: None,
            content_md5: None,
            http_status,
            discovered_links: Vec::new(),
            error_message: Some(message.into()),
        }
    }
}
