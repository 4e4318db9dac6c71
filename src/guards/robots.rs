//! robots.txt fetching, caching, and rule evaluation.
//!
//! One fetch per origin, cached for the life of the checker. Matching is
//! longest-rule-wins with `*`-suffix prefix patterns; ties go to allow.
//! An unreachable or missing robots.txt fails open — robots.txt being
//! down is not treated as disallow, it is only logged.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use log::{debug, warn};
use url::Url;

/// A single Allow/Disallow rule.
#[derive(Debug, Clone)]
struct RobotsRule {
    pattern: String,
    allow: bool,
}

/// Parsed rule set for one origin.
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    rules: Vec<RobotsRule>,
}

impl RobotsRules {
    /// Evaluate a URL path against the rule set.
    ///
    /// The longest matching pattern wins; when an Allow and a Disallow
    /// match at the same length, allow wins. No matching rule means
    /// allowed.
    #[must_use]
    pub fn is_allowed(&self, path: &str) -> bool {
        let mut best: Option<(usize, bool)> = None;
        for rule in &self.rules {
            if let Some(len) = rule_match_len(path, &rule.pattern) {
                let better = match best {
                    None => true,
                    Some((best_len, best_allow)) => {
                        len > best_len || (len == best_len && rule.allow && !best_allow)
                    }
                };
                if better {
                    best = Some((len, rule.allow));
                }
            }
        }
        best.is_none_or(|(_, allow)| allow)
    }
}

/// Match a path against a rule pattern, returning the pattern length on
/// match (used for longest-match ordering). A trailing `*` makes the
/// pattern an explicit prefix wildcard; patterns are prefix matches
/// either way, per the de-facto robots.txt convention.
fn rule_match_len(path: &str, pattern: &str) -> Option<usize> {
    let prefix = pattern.strip_suffix('*').unwrap_or(pattern);
    if prefix.is_empty() {
        // "Disallow: *" style catch-all
        return Some(pattern.len());
    }
    path.starts_with(prefix).then_some(pattern.len())
}

/// Per-origin robots.txt checker with an in-process cache.
///
/// The cache is shared by all workers of a crawl; a benign race where two
/// workers fetch the same origin concurrently is acceptable — robots.txt
/// content is idempotent, so last write wins.
#[derive(Debug)]
pub struct RobotsChecker {
    cache: DashMap<String, Arc<RobotsRules>>,
    agent_token: String,
    /// Bound on each robots.txt fetch. An origin that accepts the
    /// connection but never answers must not stall a worker; the fetch
    /// times out and fails open like any other fetch error.
    fetch_timeout: Duration,
}

impl RobotsChecker {
    #[must_use]
    pub fn new(agent_token: impl Into<String>, fetch_timeout: Duration) -> Self {
        Self {
            cache: DashMap::new(),
            agent_token: agent_token.into().to_ascii_lowercase(),
            fetch_timeout,
        }
    }

    /// Check whether `url` may be fetched according to its origin's
    /// robots.txt. Never blocks the crawl on robots.txt problems: parse
    /// failures and fetch errors all answer `true`.
    pub async fn is_allowed(&self, url: &str, client: &reqwest::Client) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return true;
        };
        let Some(origin) = origin_of(&parsed) else {
            return true;
        };
        let path = match parsed.path() {
            "" => "/",
            p => p,
        };

        let rules = match self.cache.get(&origin) {
            Some(entry) => Arc::clone(entry.value()),
            None => {
                let fetched = Arc::new(self.fetch_rules(&origin, client).await);
                self.cache.insert(origin.clone(), Arc::clone(&fetched));
                fetched
            }
        };

        let allowed = rules.is_allowed(path);
        if !allowed {
            debug!(target: "docmirror::robots", "robots.txt disallows {path} on {origin}");
        }
        allowed
    }

    async fn fetch_rules(&self, origin: &str, client: &reqwest::Client) -> RobotsRules {
        let robots_url = format!("{origin}/robots.txt");
        match client
            .get(&robots_url)
            .timeout(self.fetch_timeout)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(body) => parse_robots(&body, &self.agent_token),
                Err(e) => {
                    warn!(
                        target: "docmirror::robots",
                        "failed to read robots.txt body from {robots_url}, failing open: {e}"
                    );
                    RobotsRules::default()
                }
            },
            Ok(response) => {
                // 404 means no policy; any other status also fails open.
                debug!(
                    target: "docmirror::robots",
                    "robots.txt returned {} for {robots_url}, allowing all",
                    response.status()
                );
                RobotsRules::default()
            }
            Err(e) => {
                warn!(
                    target: "docmirror::robots",
                    "failed to fetch {robots_url}, failing open: {e}"
                );
                RobotsRules::default()
            }
        }
    }
}

fn origin_of(parsed: &Url) -> Option<String> {
    let host = parsed.host_str()?;
    let scheme = parsed.scheme();
    Some(match parsed.port() {
        Some(port) => format!("{scheme}://{host}:{port}"),
        None => format!("{scheme}://{host}"),
    })
}

/// Parse a robots.txt body, keeping rules from the wildcard group and
/// from groups naming `agent_token`. When the bot-specific group has any
/// rules they take precedence over the wildcard group.
fn parse_robots(body: &str, agent_token: &str) -> RobotsRules {
    let mut wildcard = Vec::new();
    let mut specific = Vec::new();
    let mut group_is_wildcard = false;
    let mut group_is_specific = false;
    let mut collecting_agents = true;

    for raw_line in body.lines() {
        let line = raw_line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let Some((field, value)) = line.split_once(':') else {
            continue;
        };
        let field = field.trim().to_ascii_lowercase();
        let value = value.trim();

        match field.as_str() {
            "user-agent" => {
                // Consecutive User-agent lines form one group header; a
                // rule line closes the header.
                if !collecting_agents {
                    group_is_wildcard = false;
                    group_is_specific = false;
                    collecting_agents = true;
                }
                let agent = value.to_ascii_lowercase();
                if agent == "*" {
                    group_is_wildcard = true;
                } else if agent.contains(agent_token) {
                    group_is_specific = true;
                }
            }
            "allow" | "disallow" => {
                collecting_agents = false;
                // An empty Disallow means "allow everything": no rule.
                if value.is_empty() {
                    continue;
                }
                let rule = RobotsRule {
                    pattern: value.to_string(),
                    allow: field == "allow",
                };
                if group_is_specific {
                    specific.push(rule.clone());
                }
                if group_is_wildcard {
                    wildcard.push(rule);
                }
            }
            _ => {
                collecting_agents = false;
            }
        }
    }

    RobotsRules {
        rules: if specific.is_empty() { wildcard } else { specific },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> RobotsRules {
        parse_robots(body, "docmirror")
    }

    #[test]
    fn empty_body_allows_all() {
        let rules = parse("");
        assert!(rules.is_allowed("/anything"));
    }

    #[test]
    fn disallow_blocks_prefix() {
        let rules = parse("User-agent: *\nDisallow: /private/\n");
        assert!(!rules.is_allowed("/private/page"));
        assert!(rules.is_allowed("/public/page"));
        assert!(rules.is_allowed("/priv"));
    }

    #[test]
    fn longest_match_wins() {
        let rules = parse("User-agent: *\nDisallow: /docs/\nAllow: /docs/public/\n");
        assert!(!rules.is_allowed("/docs/internal"));
        assert!(rules.is_allowed("/docs/public/page"));
    }

    #[test]
    fn tie_defaults_to_allow() {
        let rules = parse("User-agent: *\nDisallow: /a/\nAllow: /a/\n");
        assert!(rules.is_allowed("/a/page"));
    }

    #[test]
    fn star_suffix_matches_by_prefix() {
        let rules = parse("User-agent: *\nDisallow: /search*\n");
        assert!(!rules.is_allowed("/search"));
        assert!(!rules.is_allowed("/search?q=x"));
        assert!(rules.is_allowed("/sea"));
    }

    #[test]
    fn bare_star_disallows_everything() {
        let rules = parse("User-agent: *\nDisallow: *\n");
        assert!(!rules.is_allowed("/anything"));
    }

    #[test]
    fn specific_agent_group_takes_precedence() {
        let body = "User-agent: *\nDisallow: /\n\nUser-agent: docmirror\nDisallow: /private/\n";
        let rules = parse(body);
        assert!(rules.is_allowed("/public"));
        assert!(!rules.is_allowed("/private/x"));
    }

    #[test]
    fn rules_for_other_agents_ignored() {
        let rules = parse("User-agent: Googlebot\nDisallow: /nobot/\n");
        assert!(rules.is_allowed("/nobot/page"));
    }

    #[test]
    fn shared_group_header_applies_to_all_agents() {
        let body = "User-agent: docmirror\nUser-agent: otherbot\nDisallow: /shared/\n";
        let rules = parse(body);
        assert!(!rules.is_allowed("/shared/x"));
    }

    #[test]
    fn comments_and_blank_lines_ignored() {
        let body = "# policy\nUser-agent: * # everyone\nDisallow: /secret/ # hidden\n\n";
        let rules = parse(body);
        assert!(!rules.is_allowed("/secret/x"));
    }

    #[test]
    fn empty_disallow_produces_no_rule() {
        let rules = parse("User-agent: *\nDisallow:\n");
        assert!(rules.is_allowed("/anything"));
    }

    #[tokio::test]
    async fn unresponsive_origin_fails_open_within_timeout() {
        use tokio::io::AsyncReadExt;

        // Accept connections, read the request, never reply.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    while let Ok(n) = socket.read(&mut buf).await {
                        if n == 0 {
                            break;
                        }
                    }
                });
            }
        });

        let checker = RobotsChecker::new("docmirror", Duration::from_millis(200));
        let client = reqwest::Client::new();
        let url = format!("http://{addr}/docs/page");

        let allowed =
            tokio::time::timeout(Duration::from_secs(5), checker.is_allowed(&url, &client))
                .await
                .expect("robots check must not hang on an unresponsive origin");
        assert!(allowed, "fetch timeout must fail open");
    }
}
