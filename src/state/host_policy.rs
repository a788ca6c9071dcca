//! Per-host crawl policy
//!
//! One value type carries everything a worker needs to crawl a host
//! politely: robots allow/disallow rules, crawl delay, page cap, retry
//! budget and the running page count. It is built once per claim and
//! cached in the frontier store as JSON.

use robotstxt::DefaultMatcher;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Current serialized policy layout
pub const POLICY_VERSION: u32 = 1;

/// Fallback limits applied to every host before robots.txt is consulted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyDefaults {
    pub crawl_delay_secs: u64,
    pub max_pages: u32,
    pub max_retries: u32,
}

impl Default for PolicyDefaults {
    fn default() -> Self {
        Self {
            crawl_delay_secs: 5,
            max_pages: 10,
            max_retries: 5,
        }
    }
}

/// Crawl rules for a single host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostPolicy {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Canonical host key (lowercase, no `www.`)
    pub name: String,

    #[serde(default)]
    pub allowed_prefixes: Vec<String>,

    #[serde(default)]
    pub disallowed_prefixes: Vec<String>,

    pub crawl_delay_secs: u64,

    pub max_pages: u32,

    pub max_retries: u32,

    #[serde(default)]
    pub pages_crawled: u32,
}

fn default_version() -> u32 {
    POLICY_VERSION
}

impl HostPolicy {
    /// Creates a policy with no robots rules and the given defaults
    pub fn with_defaults(name: impl Into<String>, defaults: &PolicyDefaults) -> Self {
        Self {
            version: POLICY_VERSION,
            name: name.into(),
            allowed_prefixes: Vec::new(),
            disallowed_prefixes: Vec::new(),
            crawl_delay_secs: defaults.crawl_delay_secs,
            max_pages: defaults.max_pages,
            max_retries: defaults.max_retries,
            pages_crawled: 0,
        }
    }

    pub fn crawl_delay(&self) -> Duration {
        Duration::from_secs(self.crawl_delay_secs)
    }

    /// Returns true once the page cap has been reached
    pub fn page_cap_reached(&self) -> bool {
        self.pages_crawled >= self.max_pages
    }

    pub fn record_page(&mut self) {
        self.pages_crawled = self.pages_crawled.saturating_add(1);
    }

    /// Checks a URL against the allow/disallow rules
    ///
    /// Matching follows robots.txt semantics: the longest matching rule wins,
    /// `Allow` wins ties, and `*`/`$` wildcards are honored.
    pub fn is_allowed(&self, url: &str) -> bool {
        if self.disallowed_prefixes.is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.rules_text(), "*", url)
    }

    /// Renders the rules as a single wildcard robots.txt group
    fn rules_text(&self) -> String {
        let mut text = String::from("User-agent: *\n");
        for prefix in &self.allowed_prefixes {
            text.push_str("Allow: ");
            text.push_str(prefix);
            text.push('\n');
        }
        for prefix in &self.disallowed_prefixes {
            text.push_str("Disallow: ");
            text.push_str(prefix);
            text.push('\n');
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> HostPolicy {
        HostPolicy::with_defaults("example.com", &PolicyDefaults::default())
    }

    #[test]
    fn test_defaults() {
        let policy = policy();
        assert_eq!(policy.version, POLICY_VERSION);
        assert_eq!(policy.crawl_delay(), Duration::from_secs(5));
        assert_eq!(policy.max_pages, 10);
        assert_eq!(policy.pages_crawled, 0);
    }

    #[test]
    fn test_no_rules_allows_everything() {
        assert!(policy().is_allowed("https://example.com/anything/"));
    }

    #[test]
    fn test_disallowed_prefix() {
        let mut policy = policy();
        policy.disallowed_prefixes.push("/private/".to_string());

        assert!(!policy.is_allowed("https://example.com/private/page/"));
        assert!(policy.is_allowed("https://example.com/public/"));
    }

    #[test]
    fn test_allow_overrides_shorter_disallow() {
        let mut policy = policy();
        policy.disallowed_prefixes.push("/docs/".to_string());
        policy.allowed_prefixes.push("/docs/public/".to_string());

        assert!(policy.is_allowed("https://example.com/docs/public/intro/"));
        assert!(!policy.is_allowed("https://example.com/docs/internal/"));
    }

    #[test]
    fn test_wildcard_pattern() {
        let mut policy = policy();
        policy.disallowed_prefixes.push("/*/drafts/".to_string());

        assert!(!policy.is_allowed("https://example.com/team/drafts/x/"));
        assert!(policy.is_allowed("https://example.com/team/posts/x/"));
    }

    #[test]
    fn test_page_cap() {
        let mut policy = policy();
        policy.max_pages = 2;
        policy.record_page();
        assert!(!policy.page_cap_reached());
        policy.record_page();
        assert!(policy.page_cap_reached());
    }

    #[test]
    fn test_json_missing_optional_fields() {
        let json = r#"{"name":"example.com","crawl_delay_secs":3,"max_pages":7,"max_retries":2}"#;
        let policy: HostPolicy = serde_json::from_str(json).unwrap();
        assert_eq!(policy.version, POLICY_VERSION);
        assert!(policy.allowed_prefixes.is_empty());
        assert_eq!(policy.pages_crawled, 0);
    }
}
