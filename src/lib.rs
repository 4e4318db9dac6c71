//! Recursive documentation downloader.
//!
//! Crawls a documentation site from a start URL, mirroring pages to a
//! local content tree and recording every processed URL in an append-only
//! JSONL index. Recursion is depth-bounded and same-site only; every
//! write is confined to the crawl's content root, targets are screened
//! against private/internal addresses, and robots.txt is honored.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use docmirror::{BrowserLimiter, DownloadConfig, start_recursive_download};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = DownloadConfig::builder()
//!     .start_url("https://docs.example.com/guide/")
//!     .crawl_id("example-guide")
//!     .base_dir("/var/lib/docmirror")
//!     .max_depth(2)
//!     .build()?;
//!
//! let limiter = Arc::new(BrowserLimiter::new(4));
//! start_recursive_download(config, limiter).await?;
//! # Ok(())
//! # }
//! ```

pub mod browser_setup;
pub mod config;
pub mod downloader;
pub mod fetch;
pub mod guards;
pub mod index;
pub mod utils;

pub use config::{DownloadConfig, DownloadConfigBuilder};
pub use downloader::{DownloadError, start_recursive_download};
pub use fetch::{BrowserFetcher, BrowserLimiter, ContentFetcher, FetchOutcome, FetchRequest, Fetcher, HttpFetcher};
pub use guards::{PathDecision, PathGuardError, RobotsChecker, SsrfGuard};
pub use index::{FetchStatus, IndexRecord, IndexWriter};
