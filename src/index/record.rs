//! The persisted audit-trail entry for one processed URL.
//!
//! Every URL dequeued from the frontier produces exactly one record in
//! the crawl's JSONL index; records are append-only and immutable once
//! written.

use serde::{Deserialize, Serialize};

use crate::utils::constants::MAX_ERROR_MESSAGE_CHARS;

/// Terminal classification of one fetch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    /// Content saved, hash computed.
    Success,
    /// Target file exists and overwrite was not requested.
    Skipped,
    /// URL's host fell outside the start domain at processing time.
    SkippedDomain,
    /// Transport failure: timeout, DNS error, non-2xx status, reset.
    FailedRequest,
    /// Disallowed by the origin's robots.txt.
    FailedRobotstxt,
    /// Target resolved to a private or internal address.
    FailedSsrf,
    /// Content looked like a login/paywall page; not retriable.
    FailedPaywall,
    /// Path computation or validation failed before any fetch.
    FailedPrecheck,
    /// Programming-invariant violation; indicates a bug, crawl continues.
    FailedInternal,
}

impl FetchStatus {
    /// Whether this outcome produced usable content on disk.
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

/// One line of the JSONL index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// The URL as encountered, pre-canonicalization.
    pub original_url: String,
    /// Normalized form; the deduplication key.
    pub canonical_url: String,
    /// Absolute path to saved content; empty when no file was produced.
    pub local_path: String,
    /// Hex MD5 of the fetched bytes; present only on success.
    pub content_md5: Option<String>,
    pub fetch_status: FetchStatus,
    /// Transport-level status code, when one was obtained.
    pub http_status: Option<u16>,
    /// Truncated error description for failed outcomes.
    pub error_message: Option<String>,
}

impl IndexRecord {
    /// Start a record for a URL; status and result fields are filled in
    /// as processing advances.
    #[must_use]
    pub fn new(
        original_url: impl Into<String>,
        canonical_url: impl Into<String>,
        fetch_status: FetchStatus,
    ) -> Self {
        Self {
            original_url: original_url.into(),
            canonical_url: canonical_url.into(),
            local_path: String::new(),
            content_md5: None,
            fetch_status,
            http_status: None,
            error_message: None,
        }
    }

    #[must_use]
    pub fn with_local_path(mut self, path: impl Into<String>) -> Self {
        self.local_path = path.into();
        self
    }

    #[must_use]
    pub fn with_content_md5(mut self, md5_hex: impl Into<String>) -> Self {
        self.content_md5 = Some(md5_hex.into());
        self
    }

    #[must_use]
    pub fn with_http_status(mut self, status: Option<u16>) -> Self {
        self.http_status = status;
        self
    }

    /// Attach an error message, truncated to the configured bound.
    #[must_use]
    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(truncate_chars(&message.into(), MAX_ERROR_MESSAGE_CHARS));
        self
    }
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.chars().take(max_chars).collect()
}
