//! Candidate link extraction from fetched content.
//!
//! Scans `href=` / `src=` attribute values in the first portion of the
//! saved document. This is deliberately a lexical scan, not an HTML
//! parse: the values are only candidates, resolved and filtered by the
//! scheduler before anything is enqueued.

use std::sync::OnceLock;

use regex::Regex;

fn attr_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // href = "..."  |  src = '...'
        Regex::new(r#"(?i)\b(?:href|src)\s*=\s*["']([^"']+)["']"#)
            .unwrap_or_else(|e| unreachable!("link pattern is a constant: {e}"))
    })
}

/// Extract raw candidate link values from an HTML prefix.
///
/// Fragment-only references and non-fetchable schemes are dropped here;
/// relative references pass through for the caller to resolve against
/// the page URL.
pub(crate) fn extract_candidate_links(content: &str) -> Vec<String> {
    attr_pattern()
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|value| {
            !value.is_empty()
                && !value.starts_with('#')
                && !value.starts_with("javascript:")
                && !value.starts_with("mailto:")
                && !value.starts_with("data:")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_href_and_src_values() {
        let html = r#"<a href="/docs/a">A</a><img src='img/logo.png'><a HREF="https://example.com/b">B</a>"#;
        let links = extract_candidate_links(html);
        assert_eq!(links, vec!["/docs/a", "img/logo.png", "https://example.com/b"]);
    }

    #[test]
    fn tolerates_whitespace_around_equals() {
        let html = r#"<a href = "/spaced">x</a>"#;
        assert_eq!(extract_candidate_links(html), vec!["/spaced"]);
    }

    #[test]
    fn drops_fragments_and_non_fetchable_schemes() {
        let html = r##"<a href="#top">top</a>
            <a href="javascript:void(0)">js</a>
            <a href="mailto:a@b.c">mail</a>
            <img src="data:image/png;base64,AAAA">
            <a href="/keep">keep</a>"##;
        assert_eq!(extract_candidate_links(html), vec!["/keep"]);
    }

    #[test]
    fn empty_content_yields_no_links() {
        assert!(extract_candidate_links("").is_empty());
        assert!(extract_candidate_links("plain text, no markup").is_empty());
    }
}
