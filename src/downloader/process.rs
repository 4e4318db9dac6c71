//! Per-URL processing pipeline.
//!
//! Every dequeued URL runs the same gate sequence: SSRF check, domain
//! scope check, robots.txt check, path preparation, then the fetch
//! itself. Whatever happens, exactly one index record is appended; a
//! per-URL failure never aborts the crawl.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, info, warn};
use url::Url;

use super::frontier::{Frontier, QueueItem};
use crate::config::DownloadConfig;
use crate::fetch::{FetchRequest, Fetcher};
use crate::guards::{PathDecision, RobotsChecker, SsrfGuard, mirror_path_for_url, prepare_target_path};
use crate::index::{FetchStatus, IndexRecord, IndexWriter};
use crate::utils::{canonicalize_url, extract_host, is_fetchable_url, is_same_site};

/// Running totals for the end-of-crawl summary.
#[derive(Debug, Default)]
pub struct CrawlStats {
    pub succeeded: AtomicUsize,
    pub skipped: AtomicUsize,
    pub failed: AtomicUsize,
}

impl CrawlStats {
    fn count(&self, status: FetchStatus) {
        match status {
            FetchStatus::Success => self.succeeded.fetch_add(1, Ordering::Relaxed),
            FetchStatus::Skipped | FetchStatus::SkippedDomain => {
                self.skipped.fetch_add(1, Ordering::Relaxed)
            }
            _ => self.failed.fetch_add(1, Ordering::Relaxed),
        };
    }
}

/// Everything a worker needs to process one URL. Built once per crawl
/// and shared behind an `Arc`.
pub struct CrawlContext {
    pub config: DownloadConfig,
    /// Lowercase host of the (canonicalized) start URL.
    pub start_host: String,
    pub fetcher: Fetcher,
    pub client: reqwest::Client,
    pub ssrf_guard: Arc<SsrfGuard>,
    pub robots: RobotsChecker,
    pub frontier: Frontier,
    pub index: IndexWriter,
    pub stats: CrawlStats,
}

/// Run the full pipeline for one dequeued URL.
pub async fn process_url(ctx: Arc<CrawlContext>, item: QueueItem) {
    let record = evaluate(&ctx, &item).await;
    ctx.stats.count(record.fetch_status);
    ctx.index.append(record).await;
}

async fn evaluate(ctx: &CrawlContext, item: &QueueItem) -> IndexRecord {
    let url = &item.canonical_url;
    let base_record = |status| IndexRecord::new(&item.original_url, url, status);

    if ctx.ssrf_guard.is_private_or_internal(url).await {
        warn!(
            target: "docmirror::crawl",
            "blocked private/internal target: {url}"
        );
        return base_record(FetchStatus::FailedSsrf)
            .with_error_message("target resolves to a private or internal address");
    }

    match extract_host(url) {
        Ok(host) => {
            if !is_same_site(&host, &ctx.start_host, ctx.config.allow_subdomains()) {
                debug!(
                    target: "docmirror::crawl",
                    "skipping off-site URL: {url}"
                );
                return base_record(FetchStatus::SkippedDomain);
            }
        }
        Err(e) => {
            return base_record(FetchStatus::FailedPrecheck).with_error_message(format!("{e:#}"));
        }
    }

    if !ctx.robots.is_allowed(url, &ctx.client).await {
        info!(
            target: "docmirror::crawl",
            "disallowed by robots.txt: {url}"
        );
        return base_record(FetchStatus::FailedRobotstxt)
            .with_error_message("disallowed by robots.txt");
    }

    let content_root = ctx.config.content_root();
    let requested = match mirror_path_for_url(url, &content_root) {
        Ok(path) => path,
        Err(e) => {
            return base_record(FetchStatus::FailedPrecheck)
                .with_error_message(format!("path mapping failed: {e}"));
        }
    };

    let target_path =
        match prepare_target_path(&requested, &content_root, ctx.config.overwrite()) {
            Ok(PathDecision::Ready(path)) => path,
            Ok(PathDecision::SkipExisting(path)) => {
                debug!(
                    target: "docmirror::crawl",
                    "target exists, skipping: {}",
                    path.display()
                );
                return base_record(FetchStatus::Skipped)
                    .with_local_path(path.to_string_lossy());
            }
            Err(e) => {
                return base_record(FetchStatus::FailedPrecheck)
                    .with_error_message(format!("path validation failed: {e}"));
            }
        };

    let request = FetchRequest {
        url: url.clone(),
        target_path,
        overwrite: ctx.config.overwrite(),
        max_size: ctx.config.max_file_size(),
        timeout: ctx.config.fetch_timeout(),
    };
    let outcome = ctx.fetcher.fetch(&request).await;

    if outcome.status.is_success() && item.depth < ctx.config.max_depth() {
        enqueue_discovered(ctx, item, &outcome.discovered_links);
    }

    let mut record = base_record(outcome.status).with_http_status(outcome.http_status);
    if let Some(path) = &outcome.local_path {
        record = record.with_local_path(path.to_string_lossy());
    }
    if let Some(md5_hex) = outcome.content_md5 {
        record = record.with_content_md5(md5_hex);
    }
    if let Some(message) = outcome.error_message {
        record = record.with_error_message(message);
    }
    record
}

/// Resolve, filter, and enqueue links scanned out of fetched content.
///
/// Off-site and duplicate links are dropped silently here; only links
/// that reach the queue ever produce index records.
fn enqueue_discovered(ctx: &CrawlContext, item: &QueueItem, links: &[String]) {
    let base = match Url::parse(&item.canonical_url) {
        Ok(base) => base,
        Err(_) => return,
    };

    let mut queued = 0usize;
    for raw in links {
        let resolved = match base.join(raw) {
            Ok(resolved) => resolved.to_string(),
            Err(_) => continue,
        };
        if !is_fetchable_url(&resolved) {
            continue;
        }
        let canonical = match canonicalize_url(&resolved) {
            Ok(canonical) => canonical,
            Err(_) => continue,
        };
        let Ok(host) = extract_host(&canonical) else {
            continue;
        };
        if !is_same_site(&host, &ctx.start_host, ctx.config.allow_subdomains()) {
            continue;
        }
        if ctx.frontier.enqueue_if_new(QueueItem {
            original_url: resolved,
            canonical_url: canonical,
            depth: item.depth + 1,
        }) {
            queued += 1;
        }
    }

    if queued > 0 {
        debug!(
            target: "docmirror::crawl",
            "queued {queued} links from {} at depth {}",
            item.canonical_url,
            item.depth
        );
    }
}
