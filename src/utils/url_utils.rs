//! URL manipulation utilities.
//!
//! Canonicalization here defines the deduplication key for the whole
//! crawl: two URLs that canonicalize to the same string are treated as
//! the same document.

use anyhow::Result;
use url::Url;

/// Canonicalize a URL for use as a deduplication key.
///
/// Lowercases scheme and host, strips default ports, normalizes dot
/// segments (all via the `url` crate's WHATWG parsing), and removes the
/// query and fragment. The operation is idempotent:
/// `canonicalize_url(canonicalize_url(u)) == canonicalize_url(u)`.
pub fn canonicalize_url(raw: &str) -> Result<String, url::ParseError> {
    let mut parsed = Url::parse(raw)?;
    parsed.set_fragment(None);
    parsed.set_query(None);
    Ok(parsed.into())
}

/// Check whether a URL is something the crawler can fetch.
///
/// Skips data URLs, javascript URLs, and other non-http schemes.
#[must_use]
pub fn is_fetchable_url(url: &str) -> bool {
    if url.is_empty() {
        return false;
    }

    if url.starts_with("data:") || url.starts_with("javascript:") || url.starts_with("mailto:") {
        return false;
    }

    match Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

/// Extract the lowercase host from a URL.
pub fn extract_host(url: &str) -> Result<String> {
    let parsed = Url::parse(url).map_err(|e| anyhow::anyhow!("failed to parse URL: {e}"))?;
    parsed
        .host_str()
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| anyhow::anyhow!("URL has no host: {url}"))
}

/// Check whether `host` belongs to the crawl's start site.
///
/// A host matches when it equals the start host, or (when
/// `allow_subdomains` is set) when it is a subdomain of it.
#[must_use]
pub fn is_same_site(host: &str, start_host: &str, allow_subdomains: bool) -> bool {
    let host = host.to_ascii_lowercase();
    let start_host = start_host.to_ascii_lowercase();
    if host == start_host {
        return true;
    }
    if allow_subdomains {
        // "docs.example.com" is under "example.com"; "notexample.com" is not.
        return host
            .strip_suffix(&start_host)
            .is_some_and(|prefix| prefix.ends_with('.'));
    }
    false
}
