//! SSRF protection for fetch targets.
//!
//! Before any network fetch, the target hostname is checked against
//! internal-name patterns and resolved via forward DNS; if any returned
//! address falls in a loopback, private, link-local, reserved, or
//! multicast range the URL is rejected. Resolution or parse failure is
//! treated as internal (fail closed).

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use log::{debug, warn};
use url::Url;

/// Hostname suffixes that never leave internal infrastructure.
const INTERNAL_SUFFIXES: &[&str] = &[".local", ".internal", ".test", ".example"];

/// Guard that rejects URLs targeting private or internal hosts.
///
/// Constructed by the composition root and passed in explicitly; the
/// test-infrastructure allowlist is only active when built with
/// [`SsrfGuard::with_test_allowlist`], never by default.
#[derive(Debug, Default)]
pub struct SsrfGuard {
    test_allowlist: Option<HashSet<String>>,
}

impl SsrfGuard {
    #[must_use]
    pub fn new() -> Self {
        Self {
            test_allowlist: None,
        }
    }

    /// Build a guard that admits the named hosts/IPs. Intended solely for
    /// test infrastructure (local mock servers); production crawls use
    /// [`SsrfGuard::new`].
    #[must_use]
    pub fn with_test_allowlist<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let allowlist = hosts
            .into_iter()
            .map(|h| h.into().to_ascii_lowercase())
            .collect();
        Self {
            test_allowlist: Some(allowlist),
        }
    }

    /// Classify a URL's host without DNS.
    ///
    /// `Some(true)` — internal by name pattern or IP literal; `Some(false)`
    /// — allowlisted or a public IP literal; `None` — a name that needs
    /// resolution. Used directly on redirect hops, where the policy
    /// callback cannot resolve asynchronously; name-based hops that pass
    /// here are still subject to the full pre-fetch check when they are
    /// dequeued as discovered links.
    #[must_use]
    pub fn classify_host_literal(&self, url: &Url) -> Option<bool> {
        let Some(host) = url.host_str() else {
            return Some(true);
        };
        let host = host.trim_matches(['[', ']']).to_ascii_lowercase();

        if let Some(allowlist) = &self.test_allowlist
            && allowlist.contains(&host)
        {
            debug!(target: "docmirror::ssrf", "test allowlist admits host: {host}");
            return Some(false);
        }

        if host == "localhost" || INTERNAL_SUFFIXES.iter().any(|s| host.ends_with(s)) {
            return Some(true);
        }

        host.parse::<IpAddr>().ok().map(ip_is_internal)
    }

    /// Check whether `url` points at a private or internal target.
    ///
    /// Returns `true` (blocked) when the hostname is absent, matches an
    /// internal pattern, resolves to any internal address, or cannot be
    /// resolved at all.
    pub async fn is_private_or_internal(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return true;
        };
        // Patterns and IP literals settle without DNS; names fall
        // through to resolution, where every returned address must be
        // acceptable.
        if let Some(verdict) = self.classify_host_literal(&parsed) {
            return verdict;
        }
        let Some(host) = parsed.host_str() else {
            return true;
        };
        let host = host.to_ascii_lowercase();

        let port = parsed.port_or_known_default().unwrap_or(443);
        match tokio::net::lookup_host((host.as_str(), port)).await {
            Ok(addrs) => {
                let mut any = false;
                for socket_addr in addrs {
                    any = true;
                    if ip_is_internal(socket_addr.ip()) {
                        debug!(
                            target: "docmirror::ssrf",
                            "host {host} resolves to internal address {}",
                            socket_addr.ip()
                        );
                        return true;
                    }
                }
                // Empty resolution is as suspicious as a failed one.
                !any
            }
            Err(e) => {
                warn!(target: "docmirror::ssrf", "DNS resolution failed for {host}: {e}");
                true
            }
        }
    }
}

/// Classify an address as internal (loopback/private/link-local/reserved/
/// multicast/unspecified) for SSRF purposes.
#[must_use]
pub fn ip_is_internal(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => ipv4_is_internal(v4),
        IpAddr::V6(v6) => ipv6_is_internal(v6),
    }
}

fn ipv4_is_internal(addr: Ipv4Addr) -> bool {
    let octets = addr.octets();
    addr.is_loopback()
        || addr.is_private()
        || addr.is_link_local()
        || addr.is_unspecified()
        || addr.is_broadcast()
        || addr.is_documentation()
        || addr.is_multicast()
        // 100.64.0.0/10 carrier-grade NAT
        || (octets[0] == 100 && (octets[1] & 0xc0) == 64)
        // 198.18.0.0/15 benchmarking
        || (octets[0] == 198 && (octets[1] & 0xfe) == 18)
        // 240.0.0.0/4 reserved
        || octets[0] >= 240
}

fn ipv6_is_internal(addr: Ipv6Addr) -> bool {
    if let Some(mapped) = addr.to_ipv4_mapped() {
        return ipv4_is_internal(mapped);
    }
    let segments = addr.segments();
    addr.is_loopback()
        || addr.is_unspecified()
        || addr.is_multicast()
        // fc00::/7 unique local
        || (segments[0] & 0xfe00) == 0xfc00
        // fe80::/10 link local
        || (segments[0] & 0xffc0) == 0xfe80
}
