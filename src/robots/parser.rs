//! Robots.txt rule extraction
//!
//! Tokenizing is left to `robotstxt`; this module only decides which of the
//! parsed directives apply to the crawler. `User-agent`, `Allow`,
//! `Disallow`, `Crawl-delay` and `Sitemap` are kept, everything else is
//! ignored.

use robotstxt::{parse_robotstxt, RobotsParseHandler};

/// Rules that apply to the crawler, gathered from a robots.txt body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RobotsRules {
    pub allow: Vec<String>,
    pub disallow: Vec<String>,
    /// Crawl delay in seconds, if a qualifying group declared a valid one
    pub crawl_delay: Option<u64>,
    /// Sitemap URLs, collected regardless of group
    pub sitemaps: Vec<String>,
}

/// Parses a robots.txt body for `*` and the crawler's own agent name
///
/// Rules from every qualifying group are accumulated rather than taking
/// the first matching group. Consecutive `User-agent` lines form one group;
/// a group qualifies if any of its agents is `*` or equals `agent`
/// (case-insensitive). Empty `Allow`/`Disallow` values carry no rule.
///
/// # Example
///
/// ```
/// use spider::robots::parse_robots;
///
/// let rules = parse_robots("User-agent: *\nDisallow: /private/\nSitemap: https://x.com/sitemap.xml", "spider");
/// assert_eq!(rules.disallow, vec!["/private/".to_string()]);
/// assert_eq!(rules.sitemaps, vec!["https://x.com/sitemap.xml".to_string()]);
/// ```
pub fn parse_robots(content: &str, agent: &str) -> RobotsRules {
    let mut collector = RuleCollector::new(agent);
    parse_robotstxt(content, &mut collector);
    collector.rules
}

/// Collects the directives of every group addressed to `*` or our agent
struct RuleCollector {
    agent: String,
    rules: RobotsRules,
    group_agents: Vec<String>,
    in_agent_lines: bool,
    active: bool,
}

impl RuleCollector {
    fn new(agent: &str) -> Self {
        Self {
            agent: agent.to_lowercase(),
            rules: RobotsRules::default(),
            group_agents: Vec::new(),
            in_agent_lines: false,
            active: false,
        }
    }

    /// Any directive other than `User-agent` closes the current agent list
    fn end_agent_lines(&mut self) {
        self.in_agent_lines = false;
    }
}

/// Product token of a `User-agent` value, e.g. `Googlebot` for `Googlebot/2.1`
fn product_token(value: &str) -> String {
    if value.starts_with('*') {
        return "*".to_string();
    }
    value
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect::<String>()
        .to_lowercase()
}

impl RobotsParseHandler for RuleCollector {
    fn handle_robots_start(&mut self) {}

    fn handle_robots_end(&mut self) {}

    fn handle_user_agent(&mut self, _line_num: u32, user_agent: &str) {
        if !self.in_agent_lines {
            self.group_agents.clear();
        }
        self.in_agent_lines = true;
        self.group_agents.push(product_token(user_agent));
        self.active = self
            .group_agents
            .iter()
            .any(|ua| ua == "*" || *ua == self.agent);
    }

    fn handle_allow(&mut self, _line_num: u32, value: &str) {
        self.end_agent_lines();
        if self.active && !value.is_empty() {
            self.rules.allow.push(value.to_string());
        }
    }

    fn handle_disallow(&mut self, _line_num: u32, value: &str) {
        self.end_agent_lines();
        if self.active && !value.is_empty() {
            self.rules.disallow.push(value.to_string());
        }
    }

    fn handle_sitemap(&mut self, _line_num: u32, value: &str) {
        self.end_agent_lines();
        if !value.is_empty() {
            self.rules.sitemaps.push(value.to_string());
        }
    }

    fn handle_unknown_action(&mut self, _line_num: u32, action: &str, value: &str) {
        self.end_agent_lines();
        if self.active && action.eq_ignore_ascii_case("crawl-delay") {
            if let Ok(delay) = value.trim().parse::<u64>() {
                self.rules.crawl_delay = Some(delay);
            }
        }
    }
}
