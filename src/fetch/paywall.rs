//! Paywall/login-wall detection.
//!
//! A best-effort keyword classifier over the scanned content prefix. It
//! distinguishes "the page is a login gate" from generic transport
//! failure because the remediation differs: a paywalled page is not
//! retriable by the crawler. This is a heuristic, not a security
//! boundary; false positives and negatives are expected.

/// Markers that almost always indicate a credential form.
const PASSWORD_INPUT_MARKERS: &[&str] = &[
    r#"type="password""#,
    r"type='password'",
    "type=password",
];

/// Phrases common to login walls and paywalls. Matched case-insensitively.
const LOGIN_KEYWORDS: &[&str] = &[
    "sign in to continue",
    "log in to continue",
    "login to continue",
    "subscribe to continue",
    "subscription required",
    "paywall",
    "create a free account to",
];

/// Check whether content looks like a paywall or login gate.
pub(crate) fn looks_like_paywall(content: &str) -> bool {
    let lowered = content.to_lowercase();
    PASSWORD_INPUT_MARKERS
        .iter()
        .chain(LOGIN_KEYWORDS)
        .any(|marker| lowered.contains(marker))
}
