//! The crawl scheduler.
//!
//! `start_recursive_download` owns one crawl end to end: it validates the
//! start URL, opens the index, selects a fetch backend, then drives a
//! bounded pool of workers over the frontier until it drains. Setup
//! failures are fatal and typed; anything that goes wrong for an
//! individual URL is recorded in the index and the crawl keeps going.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use log::{error, info, warn};
use thiserror::Error;
use tokio::task::JoinHandle;

use super::frontier::{Frontier, QueueItem};
use super::process::{self, CrawlContext, CrawlStats};
use crate::browser_setup;
use crate::config::DownloadConfig;
use crate::fetch::{BrowserFetcher, BrowserLimiter, Fetcher, HttpFetcher};
use crate::guards::{RobotsChecker, SsrfGuard};
use crate::index::IndexWriter;
use crate::utils::constants::{MAX_REDIRECTS, ROBOTS_AGENT_TOKEN, USER_AGENT};
use crate::utils::{canonicalize_url, extract_host};

/// Fatal crawl-setup errors. Once the crawl is running, per-URL problems
/// go to the index instead of surfacing here.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("invalid start URL {url:?}: {reason}")]
    InvalidStartUrl { url: String, reason: String },

    #[error("failed to create output directory {path}: {source}")]
    CreateDirs {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to open index file: {0}")]
    IndexOpen(#[source] anyhow::Error),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("failed to launch browser: {0}")]
    BrowserLaunch(#[source] anyhow::Error),
}

/// Run one recursive documentation download to completion.
///
/// The returned `Ok(())` means the crawl ran and the index is complete;
/// it says nothing about how many individual pages succeeded. The
/// `browser_limiter` is shared by the caller across crawls so total
/// browser work in the process stays bounded.
pub async fn start_recursive_download(
    config: DownloadConfig,
    browser_limiter: Arc<BrowserLimiter>,
) -> Result<(), DownloadError> {
    let start_canonical = canonicalize_url(config.start_url()).map_err(|e| {
        DownloadError::InvalidStartUrl {
            url: config.start_url().to_string(),
            reason: e.to_string(),
        }
    })?;
    let start_host =
        extract_host(&start_canonical).map_err(|e| DownloadError::InvalidStartUrl {
            url: config.start_url().to_string(),
            reason: format!("{e:#}"),
        })?;

    let content_root = config.content_root();
    std::fs::create_dir_all(&content_root).map_err(|source| DownloadError::CreateDirs {
        path: content_root.clone(),
        source,
    })?;
    let index_path = config.index_file_path();
    if let Some(index_dir) = index_path.parent() {
        std::fs::create_dir_all(index_dir).map_err(|source| DownloadError::CreateDirs {
            path: index_dir.to_path_buf(),
            source,
        })?;
    }

    let (index, index_task) = IndexWriter::spawn(&index_path)
        .await
        .map_err(DownloadError::IndexOpen)?;

    let ssrf_guard = Arc::new(match config.ssrf_test_allowlist() {
        Some(hosts) => SsrfGuard::with_test_allowlist(hosts.iter().cloned()),
        None => SsrfGuard::new(),
    });

    // The pre-fetch SSRF gate sees only the dequeued URL; each redirect
    // hop is screened here so a public host cannot 302 into a private
    // address. The policy callback is synchronous, so the screen covers
    // name patterns and IP literals (no DNS per hop).
    let redirect_guard = Arc::clone(&ssrf_guard);
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() > MAX_REDIRECTS {
                return attempt.error("too many redirects");
            }
            if redirect_guard.classify_host_literal(attempt.url()) == Some(true) {
                return attempt.error("redirect targets a private or internal address");
            }
            attempt.follow()
        }))
        .build()?;

    // Launched lazily only for browser crawls; carried outside the
    // context so cleanup can reclaim it after workers finish.
    let mut browser_parts: Option<(Arc<chromiumoxide::Browser>, JoinHandle<()>, PathBuf)> = None;
    let fetcher = if config.use_browser() {
        let profile_dir = std::env::temp_dir().join(format!(
            "docmirror_chrome_{}_{}",
            std::process::id(),
            config.crawl_id()
        ));
        let (browser, handler_task, data_dir) =
            browser_setup::launch_browser(config.headless(), Some(profile_dir))
                .await
                .map_err(DownloadError::BrowserLaunch)?;
        let browser = Arc::new(browser);
        browser_parts = Some((Arc::clone(&browser), handler_task, data_dir));
        Fetcher::Browser(BrowserFetcher::new(
            browser,
            browser_limiter,
            config.render_delay(),
        ))
    } else {
        Fetcher::Http(HttpFetcher::new(client.clone()))
    };

    let ctx = Arc::new(CrawlContext {
        start_host,
        fetcher,
        client,
        ssrf_guard,
        robots: RobotsChecker::new(ROBOTS_AGENT_TOKEN, config.request_timeout()),
        frontier: Frontier::new(),
        index,
        stats: CrawlStats::default(),
        config,
    });

    ctx.frontier.enqueue_if_new(QueueItem {
        original_url: ctx.config.start_url().to_string(),
        canonical_url: start_canonical,
        depth: 0,
    });

    let started_at = std::time::Instant::now();

    info!(
        target: "docmirror::crawl",
        "starting crawl {} from {} (max_depth={}, concurrency={})",
        ctx.config.crawl_id(),
        ctx.config.start_url(),
        ctx.config.max_depth(),
        ctx.config.max_concurrency()
    );

    run_dispatch_loop(&ctx).await;

    let stats_line = format!(
        "{} succeeded, {} skipped, {} failed, {} unique URLs seen in {:.1?}",
        ctx.stats.succeeded.load(Ordering::Relaxed),
        ctx.stats.skipped.load(Ordering::Relaxed),
        ctx.stats.failed.load(Ordering::Relaxed),
        ctx.frontier.visited_count(),
        started_at.elapsed()
    );
    let crawl_id = ctx.config.crawl_id().to_string();

    // Dropping the context releases the last index sender, letting the
    // writer task drain and exit before we report completion.
    drop(ctx);
    if let Err(e) = index_task.await {
        error!(target: "docmirror::index", "index writer task failed: {e}");
    }

    if let Some(parts) = browser_parts {
        cleanup_browser(parts).await;
    }

    info!(target: "docmirror::crawl", "crawl {crawl_id} finished: {stats_line}");
    Ok(())
}

/// Drive workers until the frontier drains or the page limit is reached.
///
/// The in-flight set is refilled up to the concurrency bound whenever a
/// worker finishes, so discovery by running workers keeps feeding the
/// pool without any separate coordinator.
async fn run_dispatch_loop(ctx: &Arc<CrawlContext>) {
    let max_concurrency = ctx.config.max_concurrency();
    let limit = ctx.config.limit();
    let mut dispatched = 0usize;
    let mut active: FuturesUnordered<JoinHandle<()>> = FuturesUnordered::new();

    loop {
        while active.len() < max_concurrency {
            if limit.is_some_and(|cap| dispatched >= cap) {
                break;
            }
            let Some(item) = ctx.frontier.pop() else {
                break;
            };
            dispatched += 1;
            active.push(tokio::spawn(process::process_url(Arc::clone(ctx), item)));
        }

        match active.next().await {
            Some(Ok(())) => {}
            Some(Err(e)) => {
                error!(target: "docmirror::crawl", "crawl worker panicked: {e}");
            }
            None => break,
        }
    }

    if limit.is_some_and(|cap| dispatched >= cap) && !ctx.frontier.is_empty() {
        info!(
            target: "docmirror::crawl",
            "page limit of {dispatched} reached with URLs still queued"
        );
    }
}

/// Shut the browser down and remove its profile directory.
///
/// Best-effort throughout: cleanup problems are logged, never returned.
async fn cleanup_browser((browser, handler_task, data_dir): (Arc<chromiumoxide::Browser>, JoinHandle<()>, PathBuf)) {
    match Arc::try_unwrap(browser) {
        Ok(mut browser) => {
            if let Err(e) = browser.close().await {
                warn!(target: "docmirror::browser", "failed to close browser: {e}");
            }
            if let Err(e) = browser.wait().await {
                warn!(target: "docmirror::browser", "failed waiting for browser exit: {e}");
            }
        }
        Err(_) => {
            warn!(
                target: "docmirror::browser",
                "browser still referenced at cleanup; skipping close"
            );
        }
    }

    handler_task.abort();
    let _ = handler_task.await;

    if let Err(e) = tokio::fs::remove_dir_all(&data_dir).await {
        warn!(
            target: "docmirror::browser",
            "failed to remove browser profile {}: {e}",
            data_dir.display()
        );
    }
}
