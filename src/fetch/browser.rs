//! Browser-rendered fetch backend.
//!
//! Each fetch takes a fresh page from a shared browser, gated by a
//! cross-crawl limiter so browser work stays bounded even when several
//! crawls run in the same process. The page is closed on every exit
//! path, including navigation failure and timeout.

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use chromiumoxide::browser::Browser;
use chromiumoxide::Page;
use log::warn;
use tokio::sync::{AcquireError, Semaphore, SemaphorePermit};

use super::links::extract_candidate_links;
use super::paywall::looks_like_paywall;
use super::save::{self, FinalizeResult};
use super::types::{FetchOutcome, FetchRequest};
use super::ContentFetcher;
use crate::utils::constants::LINK_SCAN_PREFIX_BYTES;

/// Cross-crawl bound on simultaneous browser-rendered fetches.
///
/// Browser pages are heavyweight; this limiter is owned by the process's
/// composition root and shared across crawl instances, independent of
/// each crawl's own concurrency bound.
#[derive(Debug)]
pub struct BrowserLimiter {
    permits: Semaphore,
}

impl BrowserLimiter {
    #[must_use]
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            permits: Semaphore::new(max_concurrent.max(1)),
        }
    }

    pub async fn acquire(&self) -> Result<SemaphorePermit<'_>, AcquireError> {
        self.permits.acquire().await
    }
}

/// Fetcher that renders pages in a shared Chromium instance.
#[derive(Clone)]
pub struct BrowserFetcher {
    browser: Arc<Browser>,
    limiter: Arc<BrowserLimiter>,
    /// Extra wait after DOM ready for script-driven rendering.
    render_delay: Option<Duration>,
}

impl BrowserFetcher {
    #[must_use]
    pub fn new(
        browser: Arc<Browser>,
        limiter: Arc<BrowserLimiter>,
        render_delay: Option<Duration>,
    ) -> Self {
        Self {
            browser,
            limiter,
            render_delay,
        }
    }

    async fn fetch_on_page(&self, page: &Page, request: &FetchRequest) -> FetchOutcome {
        let navigation = async {
            page.goto(request.url.as_str())
                .await
                .map_err(|e| anyhow!("navigation failed: {e}"))?;
            page.wait_for_navigation()
                .await
                .map_err(|e| anyhow!("page load failed: {e}"))?;
            if let Some(delay) = self.render_delay {
                tokio::time::sleep(delay).await;
            }
            page.content()
                .await
                .map_err(|e| anyhow!("failed to read rendered content: {e}"))
        };

        let html = match tokio::time::timeout(request.timeout, navigation).await {
            Ok(Ok(html)) => html,
            Ok(Err(e)) => return FetchOutcome::failed_request(format!("{e:#}"), None),
            Err(_) => {
                return FetchOutcome::failed_request(
                    format!("browser fetch timed out after {:?}", request.timeout),
                    None,
                );
            }
        };

        if html.len() as u64 > request.max_size {
            return FetchOutcome::failed_request(
                format!(
                    "rendered content of {} bytes exceeds limit of {} bytes",
                    html.len(),
                    request.max_size
                ),
                None,
            );
        }

        let scanned = scan_prefix(&html);
        if looks_like_paywall(scanned) {
            return FetchOutcome::failed_paywall("content matched paywall/login heuristics", None);
        }
        let links = extract_candidate_links(scanned);

        match save::write_bytes_atomic(
            html.into_bytes(),
            request.target_path.clone(),
            request.overwrite,
        )
        .await
        {
            Ok((FinalizeResult::Written(path), md5_hex)) => {
                FetchOutcome::success(path, md5_hex, None, links)
            }
            Ok((FinalizeResult::SkippedExisting(path), _)) => {
                FetchOutcome::skipped_existing(path)
            }
            Err(e) => FetchOutcome::failed_internal(format!("{e:#}")),
        }
    }
}

impl ContentFetcher for BrowserFetcher {
    async fn fetch(&self, request: &FetchRequest) -> FetchOutcome {
        let _permit = match self.limiter.acquire().await {
            Ok(permit) => permit,
            Err(_) => return FetchOutcome::failed_internal("browser limiter closed"),
        };

        let page = match self.browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                return FetchOutcome::failed_request(
                    format!("failed to create browser page: {e}"),
                    None,
                );
            }
        };

        let outcome = self.fetch_on_page(&page, request).await;

        // Close on every exit path; a leaked page keeps the renderer
        // process alive.
        if let Err(e) = page.close().await {
            warn!(
                target: "docmirror::fetch",
                "failed to close browser page for {}: {e}",
                request.url
            );
        }

        outcome
    }
}

/// Take the bounded scan window, backing up to a char boundary.
fn scan_prefix(html: &str) -> &str {
    if html.len() <= LINK_SCAN_PREFIX_BYTES {
        return html;
    }
    let mut end = LINK_SCAN_PREFIX_BYTES;
    while !html.is_char_boundary(end) {
        end -= 1;
    }
    &html[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_prefix_respects_char_boundaries() {
        let small = "short document";
        assert_eq!(scan_prefix(small), small);

        let mut big = "x".repeat(LINK_SCAN_PREFIX_BYTES - 1);
        big.push('é'); // 2-byte char straddles the boundary
        big.push_str("tail");
        let scanned = scan_prefix(&big);
        assert_eq!(scanned.len(), LINK_SCAN_PREFIX_BYTES - 1);
    }

    #[tokio::test]
    async fn limiter_caps_concurrent_permits() {
        let limiter = BrowserLimiter::new(2);
        let p1 = limiter.acquire().await.unwrap();
        let _p2 = limiter.acquire().await.unwrap();
        // Third permit is not immediately available
        assert!(
            tokio::time::timeout(Duration::from_millis(50), limiter.acquire())
                .await
                .is_err()
        );
        drop(p1);
        assert!(limiter.acquire().await.is_ok());
    }
}
