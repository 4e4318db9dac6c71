//! Shared configuration constants for docmirror
//!
//! Default values and bounds used throughout the codebase to ensure
//! consistency and avoid magic numbers.

/// Default maximum crawl depth: 2 levels
///
/// Limits how deep the crawler will follow links from the starting URL.
/// Depth is inclusive: pages at exactly this depth are still fetched,
/// only recursion beyond it is suppressed.
pub const DEFAULT_MAX_DEPTH: u8 = 2;

/// Default number of concurrent worker tasks per crawl.
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

/// Default per-request timeout for plain HTTP fetches, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default timeout for browser navigation + rendering, in seconds.
///
/// Browser fetches need more headroom than plain HTTP: navigation,
/// DOM-ready wait, and script-driven rendering all count against it.
pub const DEFAULT_BROWSER_TIMEOUT_SECS: u64 = 60;

/// Default cap on a single fetched document: 10 MiB
///
/// Enforced both via the Content-Length pre-check and a running byte
/// counter while streaming, so a lying server cannot exhaust disk.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Maximum number of bytes of saved content scanned for outbound links
/// and paywall markers. Documentation pages put their navigation well
/// within this window; scanning the whole body of large files is wasted
/// work.
pub const LINK_SCAN_PREFIX_BYTES: usize = 512 * 1024;

/// Upper bound on `error_message` length in index records, in characters.
///
/// Transport libraries can produce very long error chains; truncating
/// keeps the JSONL index from bloating.
pub const MAX_ERROR_MESSAGE_CHARS: usize = 2000;

/// Maximum length of a single mirrored path component, in bytes.
pub const MAX_PATH_COMPONENT_BYTES: usize = 120;

/// Maximum total length of a mirrored file path, in bytes.
pub const MAX_TOTAL_PATH_BYTES: usize = 1024;

/// Bound on iterative percent-decoding passes in the path guard.
///
/// Two passes catch double-encoded traversal sequences; more passes only
/// amplify decode bombs.
pub const MAX_PERCENT_DECODE_PASSES: usize = 3;

/// User agent sent on HTTP fetches and robots.txt requests.
pub const USER_AGENT: &str = concat!("docmirror/", env!("CARGO_PKG_VERSION"));

/// Token matched against `User-agent:` lines in robots.txt.
pub const ROBOTS_AGENT_TOKEN: &str = "docmirror";

/// Maximum redirects followed on a single HTTP fetch.
pub const MAX_REDIRECTS: usize = 10;
