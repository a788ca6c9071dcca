use crate::crawler::DEFAULT_USER_AGENT;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Spider
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub output: OutputConfig,
    /// URLs pushed to the new-host set at startup
    #[serde(default)]
    pub seeds: Vec<String>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of hosts crawled concurrently
    #[serde(rename = "max-workers", default = "default_max_workers")]
    pub max_workers: usize,

    /// Default attempts per page fetch
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Default page cap per host
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// Default delay between requests to one host (seconds)
    #[serde(rename = "crawl-delay", default = "default_crawl_delay")]
    pub crawl_delay: u64,

    /// Attempts for a host's robots.txt
    #[serde(rename = "robots-retries", default = "default_robots_retries")]
    pub robots_retries: u32,

    /// Attempts per sitemap document
    #[serde(rename = "sitemap-retries", default = "default_sitemap_retries")]
    pub sitemap_retries: u32,

    /// Base sleep when no host can be claimed (milliseconds)
    #[serde(rename = "idle-backoff-ms", default = "default_idle_backoff_ms")]
    pub idle_backoff_ms: u64,

    /// Age after which an unreleased claim is considered abandoned (seconds)
    #[serde(rename = "claim-lease-secs", default = "default_claim_lease_secs")]
    pub claim_lease_secs: u64,

    /// Consecutive store failures tolerated by the claim loop
    #[serde(rename = "max-store-failures", default = "default_max_store_failures")]
    pub max_store_failures: u32,

    /// Per-request HTTP timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Stop once the frontier is empty and no worker is running
    #[serde(rename = "exit-when-idle", default)]
    pub exit_when_idle: bool,
}

impl CrawlerConfig {
    pub fn crawl_delay(&self) -> Duration {
        Duration::from_secs(self.crawl_delay)
    }

    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }

    pub fn claim_lease(&self) -> Duration {
        Duration::from_secs(self.claim_lease_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            max_retries: default_max_retries(),
            max_pages: default_max_pages(),
            crawl_delay: default_crawl_delay(),
            robots_retries: default_robots_retries(),
            sitemap_retries: default_sitemap_retries(),
            idle_backoff_ms: default_idle_backoff_ms(),
            claim_lease_secs: default_claim_lease_secs(),
            max_store_failures: default_max_store_failures(),
            request_timeout_secs: default_request_timeout_secs(),
            exit_when_idle: false,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Agent name matched against robots.txt `User-agent` groups
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Value sent in the `User-Agent` request header
    #[serde(default = "default_agent_header")]
    pub header: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            header: default_agent_header(),
        }
    }
}

/// Frontier backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Redis,
}

/// Frontier store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// SQLite frontier database file
    #[serde(default = "default_store_path")]
    pub path: String,

    /// Redis endpoint
    #[serde(default = "default_store_url")]
    pub url: String,

    /// Redis key prefix
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
            url: default_store_url(),
            namespace: default_namespace(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite pages database
    #[serde(rename = "database-path", default = "default_database_path")]
    pub database_path: String,

    /// Pages buffered between workers and the writer task
    #[serde(rename = "queue-capacity", default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_max_workers() -> usize {
    10
}

fn default_max_retries() -> u32 {
    5
}

fn default_max_pages() -> u32 {
    10
}

fn default_crawl_delay() -> u64 {
    5
}

fn default_robots_retries() -> u32 {
    3
}

fn default_sitemap_retries() -> u32 {
    1
}

fn default_idle_backoff_ms() -> u64 {
    500
}

fn default_claim_lease_secs() -> u64 {
    3600
}

fn default_max_store_failures() -> u32 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_agent_name() -> String {
    "spider".to_string()
}

fn default_agent_header() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_store_path() -> String {
    "./frontier.db".to_string()
}

fn default_store_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_namespace() -> String {
    "spider".to_string()
}

fn default_database_path() -> String {
    "./pages.db".to_string()
}

fn default_queue_capacity() -> usize {
    64
}
