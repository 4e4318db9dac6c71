//! Content fetch backends.
//!
//! Two backends implement the same [`ContentFetcher`] contract: a plain
//! HTTP fetcher and a browser-rendered fetcher. The scheduler dispatches
//! through the [`Fetcher`] enum, so adding a third backend does not touch
//! scheduler code.

pub mod browser;
pub mod http;
mod links;
mod paywall;
mod save;
pub mod types;

use std::future::Future;

pub use browser::{BrowserFetcher, BrowserLimiter};
pub use http::HttpFetcher;
pub use types::{FetchOutcome, FetchRequest};

/// A backend that retrieves one URL's content into a local file.
///
/// Implementations validate nothing about the target path (that is the
/// path guard's job) but own atomic persistence, size enforcement,
/// hashing, link scanning, and outcome classification. They never raise
/// errors for per-URL problems: every failure becomes a [`FetchOutcome`].
pub trait ContentFetcher: Send + Sync {
    fn fetch(&self, request: &FetchRequest) -> impl Future<Output = FetchOutcome> + Send;
}

/// Backend selection, decided once per crawl.
#[derive(Clone)]
pub enum Fetcher {
    Http(HttpFetcher),
    Browser(BrowserFetcher),
}

impl Fetcher {
    pub async fn fetch(&self, request: &FetchRequest) -> FetchOutcome {
        match self {
            Self::Http(fetcher) => fetcher.fetch(request).await,
            Self::Browser(fetcher) => fetcher.fetch(request).await,
        }
    }
}
